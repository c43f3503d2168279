use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::filter::structured::{filter_spans, StructuredFilter};
use crate::filter::text::search_spans_with;
use crate::filter::{InputError, MatchResult};
use crate::models::Span;

/// Tuning for the free-text search. The defaults compare case-sensitively
/// and require identifiers to be equal as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub case_insensitive: bool,
    pub ignore_id_leading_zeros: bool,
}

/// Everything a search box can hold at once: the structured filter, a
/// free-text query and the options for the latter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpanSearch {
    #[serde(flatten)]
    pub filter: StructuredFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub options: SearchOptions,
}

impl SpanSearch {
    /// Spans must satisfy both the structured filter and the query. Whichever
    /// part is inactive is skipped; if both are, the result is `None`.
    #[instrument(level = tracing::Level::TRACE, skip_all)]
    pub fn search(&self, spans: Option<&[Span]>) -> Result<Option<MatchResult>, InputError> {
        let filtered = filter_spans(&self.filter, spans)?;
        let searched = self
            .query
            .as_deref()
            .and_then(|query| search_spans_with(query, spans, &self.options));

        let matched = match (filtered, searched) {
            (Some(filtered), Some(searched)) => {
                Some(filtered.intersection(&searched).cloned().collect())
            }
            (filtered, searched) => filtered.or(searched),
        };

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::structured::TagPredicate;
    use crate::fixtures;

    fn ids(ids: &[&str]) -> Option<MatchResult> {
        Some(ids.iter().map(|id| id.to_string()).collect())
    }

    #[test]
    fn combine_filter_and_query() {
        let spans = fixtures::sample_spans();

        let search = SpanSearch {
            filter: StructuredFilter {
                tags: vec![TagPredicate::new("tagKey1")],
                ..Default::default()
            },
            query: Some("-serviceName0".to_owned()),
            options: SearchOptions::default(),
        };

        assert_eq!(search.search(Some(&spans)).unwrap(), ids(&["span-id-2"]));
    }

    #[test]
    fn either_part_alone() {
        let spans = fixtures::sample_spans();

        let search = SpanSearch {
            query: Some("operationName0".to_owned()),
            ..Default::default()
        };
        assert_eq!(search.search(Some(&spans)).unwrap(), ids(&["span-id-0"]));

        let search = SpanSearch {
            filter: StructuredFilter {
                to: Some("4ms".to_owned()),
                ..Default::default()
            },
            query: Some("  ".to_owned()),
            ..Default::default()
        };
        assert_eq!(search.search(Some(&spans)).unwrap(), ids(&["span-id-0"]));
    }

    #[test]
    fn nothing_to_search() {
        let spans = fixtures::sample_spans();

        assert_eq!(SpanSearch::default().search(Some(&spans)), Ok(None));

        let search = SpanSearch {
            query: Some("span".to_owned()),
            ..Default::default()
        };
        assert_eq!(search.search(None), Ok(None));
    }

    #[test]
    fn invalid_filter_fails_search() {
        let spans = fixtures::sample_spans();

        let search = SpanSearch {
            filter: StructuredFilter {
                from: Some("soon".to_owned()),
                ..Default::default()
            },
            query: Some("span".to_owned()),
            ..Default::default()
        };
        assert_eq!(search.search(Some(&spans)), Err(InputError::InvalidDuration));
    }

    #[test]
    fn deserialize_search_document() {
        let search: SpanSearch = serde_json::from_str(
            r#"{
                "serviceName": "serviceName0",
                "serviceNameOperator": "!=",
                "query": "TAGKEY1",
                "options": { "caseInsensitive": true }
            }"#,
        )
        .unwrap();

        assert!(search.options.case_insensitive);
        assert!(!search.options.ignore_id_leading_zeros);

        let spans = fixtures::sample_spans();
        assert_eq!(search.search(Some(&spans)).unwrap(), ids(&["span-id-2"]));
    }
}
