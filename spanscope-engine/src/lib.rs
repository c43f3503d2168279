//! The "engine" crate decides which spans of a trace match a search. It
//! offers two matchers over the same attribute surface (span tags, process
//! tags and log fields):
//!
//! - [`filter_spans`] evaluates a typed [`StructuredFilter`] (service name,
//!   operation name, duration bounds, tag predicates).
//! - [`search_spans`] evaluates a free-text query made of inclusion terms and
//!   `-`-prefixed exclusion terms.
//!
//! Both return `None` when no filtering happened (no spans, or nothing to
//! filter by), which callers must keep apart from an empty set of matches.
//! Neither mutates the spans and neither keeps state between calls.

mod attribute;
mod filter;
mod models;
mod search;

pub use attribute::{attribute_pairs, AttributePairs, AttributeSource, AttributeView};
pub use filter::duration::{parse_duration, DurationFilter};
pub use filter::structured::{filter_spans, BasicSpanFilter, StructuredFilter, TagPredicate};
pub use filter::text::{search_spans, search_spans_with, TextQuery};
pub use filter::{InputError, MatchResult, ValueStringComparison};
pub use models::{
    FromOperator, KeyValue, Log, Micros, Process, Span, SpanId, StringOperator, ToOperator, Value,
    ValueOperator,
};
pub use search::{SearchOptions, SpanSearch};
