use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::attribute::attribute_pairs;
use crate::models::{FromOperator, Span, StringOperator, ToOperator, ValueOperator};

use super::duration::DurationFilter;
use super::{InputError, MatchResult, ValueStringComparison};

/// A condition on the attributes of a span. Without a value, only the
/// presence of the key is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPredicate {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<StringOperator>,
}

impl TagPredicate {
    pub fn new(key: impl Into<String>) -> TagPredicate {
        TagPredicate {
            key: key.into(),
            value: None,
            operator: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> TagPredicate {
        self.value = Some(value.into());
        self
    }

    pub fn with_operator(mut self, operator: StringOperator) -> TagPredicate {
        self.operator = Some(operator);
        self
    }
}

/// The typed filter handed over by whatever holds the search state. Every
/// field is optional; omitted operators take their defaults (`=` for names
/// and tags, `>` for `from`, `<` for `to`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name_operator: Option<StringOperator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_name_operator: Option<StringOperator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_operator: Option<FromOperator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_operator: Option<ToOperator>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagPredicate>,
}

impl StructuredFilter {
    /// Whether any predicate is configured. An inactive filter does not
    /// filter at all.
    pub fn is_active(&self) -> bool {
        non_empty(&self.service_name).is_some()
            || non_empty(&self.span_name).is_some()
            || non_blank(&self.from).is_some()
            || non_blank(&self.to).is_some()
            || self.tags.iter().any(|tag| !tag.key.is_empty())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// A [`StructuredFilter`] with its durations parsed and regexes compiled.
#[derive(Debug, Clone)]
pub enum BasicSpanFilter {
    ServiceName(ValueStringComparison),
    Name(ValueStringComparison),
    Duration(DurationFilter),
    Tag(TagFilter),
    Not(Box<BasicSpanFilter>),
    And(Vec<BasicSpanFilter>),
}

#[derive(Debug, Clone)]
pub struct TagFilter {
    key: String,
    value: Option<ValueStringComparison>,
}

impl TagFilter {
    /// True if any attribute pair on the span has the key and, when a value
    /// is given, a matching value.
    fn is_present(&self, span: &Span) -> bool {
        attribute_pairs(span).any(|attr| {
            attr.key == self.key
                && self
                    .value
                    .as_ref()
                    .map(|value| value.compare(&attr.value.as_text()))
                    .unwrap_or(true)
        })
    }
}

impl BasicSpanFilter {
    /// Builds the filter, or `None` if nothing is configured.
    pub fn from_filter(filter: &StructuredFilter) -> Result<Option<BasicSpanFilter>, InputError> {
        let mut filters = vec![];

        if let Some(service_name) = non_empty(&filter.service_name) {
            let op = filter.service_name_operator.unwrap_or_default();
            let comparison = ValueStringComparison::from_input(op.is_regex(), service_name)?;
            filters.push(negate_if(op, BasicSpanFilter::ServiceName(comparison)));
        }

        if let Some(span_name) = non_empty(&filter.span_name) {
            let op = filter.span_name_operator.unwrap_or_default();
            let comparison = ValueStringComparison::from_input(op.is_regex(), span_name)?;
            filters.push(negate_if(op, BasicSpanFilter::Name(comparison)));
        }

        if let Some(from) = non_blank(&filter.from) {
            let op = ValueOperator::from(filter.from_operator.unwrap_or_default());
            filters.push(BasicSpanFilter::Duration(DurationFilter::from_input(op, from)?));
        }

        if let Some(to) = non_blank(&filter.to) {
            let op = ValueOperator::from(filter.to_operator.unwrap_or_default());
            filters.push(BasicSpanFilter::Duration(DurationFilter::from_input(op, to)?));
        }

        for tag in filter.tags.iter().filter(|tag| !tag.key.is_empty()) {
            let op = tag.operator.unwrap_or_default();
            let value = tag
                .value
                .as_deref()
                .map(|value| ValueStringComparison::from_input(op.is_regex(), value))
                .transpose()?;

            let tag_filter = BasicSpanFilter::Tag(TagFilter {
                key: tag.key.clone(),
                value,
            });

            filters.push(negate_if(op, tag_filter));
        }

        let filter = match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(BasicSpanFilter::And(filters)),
        };

        Ok(filter)
    }

    pub fn matches(&self, span: &Span) -> bool {
        match self {
            BasicSpanFilter::ServiceName(comparison) => {
                comparison.compare(&span.process.service_name)
            }
            BasicSpanFilter::Name(comparison) => comparison.compare(&span.operation_name),
            BasicSpanFilter::Duration(filter) => filter.matches(span.duration_micros),
            BasicSpanFilter::Tag(filter) => filter.is_present(span),
            BasicSpanFilter::Not(inner) => !inner.matches(span),
            BasicSpanFilter::And(filters) => filters.iter().all(|f| f.matches(span)),
        }
    }
}

fn negate_if(op: StringOperator, filter: BasicSpanFilter) -> BasicSpanFilter {
    if op.is_negated() {
        BasicSpanFilter::Not(Box::new(filter))
    } else {
        filter
    }
}

/// Returns the ids of the spans satisfying every configured predicate.
///
/// The result is `None` when `spans` is absent or the filter is inactive. A
/// malformed duration or regex fails the whole call.
#[instrument(level = tracing::Level::TRACE, skip_all)]
pub fn filter_spans(
    filter: &StructuredFilter,
    spans: Option<&[Span]>,
) -> Result<Option<MatchResult>, InputError> {
    tracing::debug!(?filter, "filtering spans");

    let Some(spans) = spans else {
        return Ok(None);
    };

    let span_filter = BasicSpanFilter::from_filter(filter)
        .inspect_err(|err| tracing::debug!(?err, "rejected span filter"))?;

    let Some(span_filter) = span_filter else {
        return Ok(None);
    };

    let matched: MatchResult = spans
        .iter()
        .filter(|span| span_filter.matches(span))
        .map(|span| span.id.clone())
        .collect();

    tracing::trace!(matched = matched.len(), total = spans.len(), "filtered spans");

    Ok(Some(matched))
}
