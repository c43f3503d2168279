//! Enumeration of every key/value pair visible on a span.
//!
//! Both the structured filter and the free-text search look for attributes in
//! the same places: the span's own tags, the tags of the process that emitted
//! it and the fields of each of its log events. [`attribute_pairs`] is the one
//! place that knows about those sources.

use std::iter::FusedIterator;
use std::slice::Iter;

use crate::models::{KeyValue, Log, Span, Value};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttributeSource {
    Span,
    Process,
    Log { index: usize },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AttributeView<'a> {
    pub source: AttributeSource,
    pub key: &'a str,
    pub value: &'a Value,
}

/// Yields span tags, then process tags, then the fields of each log event in
/// order. Nothing is cached; every call walks the span again.
pub fn attribute_pairs(span: &Span) -> AttributePairs<'_> {
    AttributePairs {
        source: AttributeSource::Span,
        current: span.tags.iter(),
        process_tags: Some(span.process.tags.iter()),
        logs: span.logs().iter().enumerate(),
    }
}

pub struct AttributePairs<'a> {
    source: AttributeSource,
    current: Iter<'a, KeyValue>,
    process_tags: Option<Iter<'a, KeyValue>>,
    logs: std::iter::Enumerate<Iter<'a, Log>>,
}

impl<'a> Iterator for AttributePairs<'a> {
    type Item = AttributeView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(kv) = self.current.next() {
                return Some(AttributeView {
                    source: self.source,
                    key: &kv.key,
                    value: &kv.value,
                });
            }

            if let Some(process_tags) = self.process_tags.take() {
                self.source = AttributeSource::Process;
                self.current = process_tags;
                continue;
            }

            let (index, log) = self.logs.next()?;
            self.source = AttributeSource::Log { index };
            self.current = log.fields.iter();
        }
    }
}

impl FusedIterator for AttributePairs<'_> {}
