use std::borrow::Cow;

use tracing::instrument;

use crate::attribute::attribute_pairs;
use crate::models::Span;
use crate::search::SearchOptions;

use super::MatchResult;

/// A free-text query split into the terms a span must contain and the terms
/// it must not contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextQuery {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TextQuery {
    /// Splits on whitespace. A term starting with `-` is an exclusion; a bare
    /// `-` carries no text and is dropped. Any input is a valid query.
    pub fn parse(query: &str) -> TextQuery {
        let terms = parsers::terms(query)
            .map(|(_, terms)| terms)
            .unwrap_or_default();

        let mut parsed = TextQuery::default();
        for term in terms {
            match term.strip_prefix('-') {
                Some("") => {}
                Some(excluded) => parsed.exclude.push(excluded.to_owned()),
                None => parsed.include.push(term.to_owned()),
            }
        }

        parsed
    }

    /// A query without any term does not filter.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, span: &Span, options: &SearchOptions) -> bool {
        self.matcher(options).matches(span)
    }

    fn matcher<'a>(&'a self, options: &'a SearchOptions) -> TextMatcher<'a> {
        TextMatcher {
            include: self.include.iter().map(|t| normalize(t, options)).collect(),
            exclude: self.exclude.iter().map(|t| normalize(t, options)).collect(),
            options,
        }
    }
}

fn normalize<'a>(text: &'a str, options: &SearchOptions) -> Cow<'a, str> {
    if options.case_insensitive {
        Cow::Owned(text.to_lowercase())
    } else {
        Cow::Borrowed(text)
    }
}

/// Terms normalized once per search rather than once per span.
struct TextMatcher<'a> {
    include: Vec<Cow<'a, str>>,
    exclude: Vec<Cow<'a, str>>,
    options: &'a SearchOptions,
}

impl TextMatcher<'_> {
    fn matches(&self, span: &Span) -> bool {
        self.include.iter().all(|term| self.term_matches(term, span))
            && !self.exclude.iter().any(|term| self.term_matches(term, span))
    }

    fn term_matches(&self, term: &str, span: &Span) -> bool {
        self.id_matches(term, &span.id)
            || self.contains(&span.operation_name, term)
            || self.contains(&span.process.service_name, term)
            || attribute_pairs(span).any(|attr| {
                self.contains(attr.key, term) || self.contains(&attr.value.as_text(), term)
            })
    }

    fn id_matches(&self, term: &str, id: &str) -> bool {
        let id = normalize(id, self.options);
        if self.options.ignore_id_leading_zeros {
            let trimmed_term = term.trim_start_matches('0');
            let trimmed_id = id.trim_start_matches('0');
            // all-zero terms and ids only match exactly
            if trimmed_term.is_empty() || trimmed_id.is_empty() {
                term == id
            } else {
                trimmed_term == trimmed_id
            }
        } else {
            term == id
        }
    }

    fn contains(&self, haystack: &str, term: &str) -> bool {
        normalize(haystack, self.options).contains(term)
    }
}

/// Returns the ids of the spans containing every inclusion term and none of
/// the exclusion terms, using the default (case-sensitive) options.
pub fn search_spans(query: &str, spans: Option<&[Span]>) -> Option<MatchResult> {
    search_spans_with(query, spans, &SearchOptions::default())
}

/// The result is `None` when `spans` is absent or the query has no terms.
#[instrument(level = tracing::Level::TRACE, skip_all)]
pub fn search_spans_with(
    query: &str,
    spans: Option<&[Span]>,
    options: &SearchOptions,
) -> Option<MatchResult> {
    tracing::debug!(?query, ?options, "searching spans");

    let spans = spans?;

    let query = TextQuery::parse(query);
    if query.is_empty() {
        return None;
    }

    let matcher = query.matcher(options);
    let matched: MatchResult = spans
        .iter()
        .filter(|span| matcher.matches(span))
        .map(|span| span.id.clone())
        .collect();

    tracing::trace!(matched = matched.len(), total = spans.len(), "searched spans");

    Some(matched)
}

mod parsers {
    use nom::bytes::complete::{take_while, take_while1};
    use nom::combinator::eof;
    use nom::multi::separated_list0;
    use nom::{IResult, Parser};

    fn whitespace(input: &str) -> IResult<&str, &str> {
        take_while(|c: char| c.is_whitespace()).parse(input)
    }

    fn expect_whitespace(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| c.is_whitespace()).parse(input)
    }

    fn term(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| !c.is_whitespace()).parse(input)
    }

    pub fn terms(input: &str) -> IResult<&str, Vec<&str>> {
        let (input, _) = whitespace(input)?;
        let (input, list) = separated_list0(expect_whitespace, term).parse(input)?;
        let (input, _) = whitespace(input)?;
        let (input, _) = eof(input)?;

        Ok((input, list))
    }
}
