//! A compact one-line form of [`StructuredFilter`], for places that hold the
//! filter as text (an address bar, a saved search):
//!
//! ```text
//! #service: frontend #name: !~^health #duration: >=3.05ms @http.method: GET @error: !*
//! ```
//!
//! `#` introduces a span property (`service`, `name`, `duration`) and `@` an
//! attribute key. Values may be prefixed with `!`, `~` or `!~` (or a
//! comparison for `#duration`) and quoted when they contain whitespace or
//! syntax characters. An attribute without a value, or with the value `*`,
//! only checks for the key.

use std::fmt::{Display, Error as FmtError, Formatter};
use std::str::FromStr;

use crate::models::{FromOperator, StringOperator, ToOperator};

use super::duration::parse_duration;
use super::structured::{StructuredFilter, TagPredicate};
use super::InputError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FilterPropertyKind {
    Inherent,
    Attribute,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum InputOperator {
    NotEquals,
    Matches,
    NotMatches,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputValue {
    Any,
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterPredicate {
    property_kind: FilterPropertyKind,
    property: String,
    condition: Option<(Option<InputOperator>, InputValue)>,
}

impl StructuredFilter {
    pub fn parse(input: &str) -> Result<StructuredFilter, InputError> {
        let (_, predicates) = parsers::predicates(input).map_err(|_| InputError::InvalidSyntax)?;

        let mut filter = StructuredFilter::default();
        for predicate in predicates {
            filter.apply(predicate)?;
        }

        Ok(filter)
    }

    fn apply(&mut self, predicate: FilterPredicate) -> Result<(), InputError> {
        use InputOperator::*;

        match predicate.property_kind {
            FilterPropertyKind::Inherent => {
                let Some((op, value)) = predicate.condition else {
                    return Err(InputError::InvalidSyntax);
                };
                let InputValue::Text(value) = value else {
                    return Err(InputError::InvalidSyntax);
                };

                match predicate.property.as_str() {
                    "service" => {
                        if self.service_name.is_some() {
                            return Err(InputError::DuplicateProperty);
                        }
                        self.service_name_operator = string_operator(op)?;
                        self.service_name = Some(value);
                    }
                    "name" => {
                        if self.span_name.is_some() {
                            return Err(InputError::DuplicateProperty);
                        }
                        self.span_name_operator = string_operator(op)?;
                        self.span_name = Some(value);
                    }
                    "duration" => {
                        parse_duration(&value)?;
                        match op {
                            Some(Gt) => self.set_from(FromOperator::GreaterThan, value)?,
                            Some(Gte) => self.set_from(FromOperator::GreaterOrEqual, value)?,
                            Some(Lt) => self.set_to(ToOperator::LessThan, value)?,
                            Some(Lte) => self.set_to(ToOperator::LessOrEqual, value)?,
                            Some(_) => return Err(InputError::InvalidDurationOperator),
                            None => return Err(InputError::MissingDurationOperator),
                        }
                    }
                    _ => return Err(InputError::InvalidInherentProperty),
                }
            }
            FilterPropertyKind::Attribute => {
                let (op, value) = match predicate.condition {
                    Some((op, InputValue::Text(value))) => (op, Some(value)),
                    Some((op, InputValue::Any)) => (op, None),
                    None => (None, None),
                };

                self.tags.push(TagPredicate {
                    key: predicate.property,
                    value,
                    operator: string_operator(op)?,
                });
            }
        }

        Ok(())
    }

    fn set_from(&mut self, op: FromOperator, value: String) -> Result<(), InputError> {
        if self.from.is_some() {
            return Err(InputError::DuplicateProperty);
        }
        self.from_operator = explicit(op);
        self.from = Some(value);
        Ok(())
    }

    fn set_to(&mut self, op: ToOperator, value: String) -> Result<(), InputError> {
        if self.to.is_some() {
            return Err(InputError::DuplicateProperty);
        }
        self.to_operator = explicit(op);
        self.to = Some(value);
        Ok(())
    }
}

/// Default operators are left unset so that parsing gives back what the
/// caller would have written by hand.
fn explicit<T: Default + PartialEq>(op: T) -> Option<T> {
    if op == T::default() {
        None
    } else {
        Some(op)
    }
}

fn string_operator(op: Option<InputOperator>) -> Result<Option<StringOperator>, InputError> {
    match op {
        None => Ok(None),
        Some(InputOperator::NotEquals) => Ok(Some(StringOperator::NotEquals)),
        Some(InputOperator::Matches) => Ok(Some(StringOperator::Matches)),
        Some(InputOperator::NotMatches) => Ok(Some(StringOperator::NotMatches)),
        Some(_) => Err(InputError::InvalidSyntax),
    }
}

impl FromStr for StructuredFilter {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StructuredFilter::parse(s)
    }
}

impl Display for StructuredFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        let mut parts = vec![];

        if let Some(service_name) = self.service_name.as_deref().filter(|v| !v.is_empty()) {
            let prefix = string_prefix(self.service_name_operator.unwrap_or_default());
            parts.push(format!("#service: {prefix}{}", quote_value(service_name)));
        }

        if let Some(span_name) = self.span_name.as_deref().filter(|v| !v.is_empty()) {
            let prefix = string_prefix(self.span_name_operator.unwrap_or_default());
            parts.push(format!("#name: {prefix}{}", quote_value(span_name)));
        }

        if let Some(from) = self.from.as_deref().filter(|v| !v.trim().is_empty()) {
            let prefix = match self.from_operator.unwrap_or_default() {
                FromOperator::GreaterThan => ">",
                FromOperator::GreaterOrEqual => ">=",
            };
            parts.push(format!("#duration: {prefix}{}", quote_value(from)));
        }

        if let Some(to) = self.to.as_deref().filter(|v| !v.trim().is_empty()) {
            let prefix = match self.to_operator.unwrap_or_default() {
                ToOperator::LessThan => "<",
                ToOperator::LessOrEqual => "<=",
            };
            parts.push(format!("#duration: {prefix}{}", quote_value(to)));
        }

        for tag in self.tags.iter().filter(|tag| !tag.key.is_empty()) {
            let op = tag.operator.unwrap_or_default();
            let key = quote_name(&tag.key);
            match (&tag.value, op) {
                (None, StringOperator::Equals) => parts.push(format!("@{key}")),
                (None, op) => parts.push(format!("@{key}: {}*", string_prefix(op))),
                (Some(value), op) => parts.push(format!(
                    "@{key}: {}{}",
                    string_prefix(op),
                    quote_value(value)
                )),
            }
        }

        write!(f, "{}", parts.join(" "))
    }
}

fn string_prefix(op: StringOperator) -> &'static str {
    match op {
        StringOperator::Equals => "",
        StringOperator::NotEquals => "!",
        StringOperator::Matches => "~",
        StringOperator::NotMatches => "!~",
    }
}

fn needs_escapes(s: &str) -> bool {
    s.is_empty()
        || s.contains(['"', '\\', '#', '@', ':', '<', '>', '=', '!', '~', '*'])
        || s.contains(|c: char| c.is_whitespace())
}

fn quote_value(s: &str) -> String {
    if needs_escapes(s) {
        quote(s)
    } else {
        s.to_owned()
    }
}

fn quote_name(s: &str) -> String {
    if s.chars().all(parsers::is_name_char) {
        s.to_owned()
    } else {
        quote(s)
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

mod parsers {
    use super::*;

    use nom::branch::alt;
    use nom::bytes::complete::{escaped, tag, take_while, take_while1};
    use nom::character::complete::{char, none_of, one_of};
    use nom::combinator::{cut, eof, map, opt};
    use nom::multi::separated_list0;
    use nom::sequence::{delimited, preceded};
    use nom::{IResult, Parser};

    pub fn is_name_char(c: char) -> bool {
        c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '/')
    }

    fn whitespace(input: &str) -> IResult<&str, &str> {
        take_while(|c: char| c.is_whitespace()).parse(input)
    }

    fn expect_whitespace(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| c.is_whitespace()).parse(input)
    }

    fn name(input: &str) -> IResult<&str, String> {
        alt((
            map(quoted_value, |v| v.map(unescape).unwrap_or_default()),
            map(take_while1(is_name_char), |v: &str| v.to_owned()),
        ))
        .parse(input)
    }

    fn property(input: &str) -> IResult<&str, (FilterPropertyKind, String)> {
        use FilterPropertyKind::*;

        alt((
            map(preceded(char('#'), cut(name)), |name| (Inherent, name)),
            map(preceded(char('@'), cut(name)), |name| (Attribute, name)),
        ))
        .parse(input)
    }

    fn operator(input: &str) -> IResult<&str, InputOperator> {
        use InputOperator::*;

        alt((
            map(tag("!~"), |_| NotMatches),
            map(tag("!"), |_| NotEquals),
            map(tag("~"), |_| Matches),
            map(tag(">="), |_| Gte),
            map(tag(">"), |_| Gt),
            map(tag("<="), |_| Lte),
            map(tag("<"), |_| Lt),
        ))
        .parse(input)
    }

    fn value(input: &str) -> IResult<&str, InputValue> {
        alt((
            map(quoted_value, |v| {
                InputValue::Text(v.map(unescape).unwrap_or_default())
            }),
            map(unquoted_value, |v| match v {
                "*" => InputValue::Any,
                v => InputValue::Text(v.to_owned()),
            }),
        ))
        .parse(input)
    }

    fn condition(input: &str) -> IResult<&str, (Option<InputOperator>, InputValue)> {
        let (input, _) = whitespace(input)?;
        let (input, _) = char(':').parse(input)?;
        let (input, _) = whitespace(input)?;
        let (input, op) = opt(operator).parse(input)?;
        let (input, value) = cut(value).parse(input)?;

        Ok((input, (op, value)))
    }

    fn escaped_value(input: &str) -> IResult<&str, &str> {
        escaped(none_of("\\\""), '\\', one_of("\"\\")).parse(input)
    }

    fn quoted_value(input: &str) -> IResult<&str, Option<&str>> {
        delimited(char('\"'), opt(escaped_value), char('\"')).parse(input)
    }

    fn unquoted_value(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| !c.is_whitespace() && c != '"' && c != '@' && c != '#' && c != ':')
            .parse(input)
    }

    fn predicate(input: &str) -> IResult<&str, FilterPredicate> {
        let (input, (property_kind, property)) = property(input)?;
        let (input, condition) = opt(condition).parse(input)?;

        let predicate = FilterPredicate {
            property_kind,
            property,
            condition,
        };

        Ok((input, predicate))
    }

    pub fn predicates(input: &str) -> IResult<&str, Vec<FilterPredicate>> {
        let (input, _) = whitespace(input)?;
        let (input, list) = separated_list0(expect_whitespace, predicate).parse(input)?;
        let (input, _) = whitespace(input)?;
        let (input, _) = eof(input)?;

        Ok((input, list))
    }

    fn unescape(input: &str) -> String {
        let mut input = input.to_owned();
        let mut escaped = false;
        input.retain(|c| match (escaped, c) {
            (true, _) => {
                escaped = false;
                true
            }
            (false, '\\') => {
                escaped = true;
                false
            }
            (false, _) => true,
        });

        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inherent_properties() {
        let filter = StructuredFilter::parse(
            "#service: frontend #name: !~^health #duration: >=3.05ms #duration: <1s",
        )
        .unwrap();

        assert_eq!(
            filter,
            StructuredFilter {
                service_name: Some("frontend".to_owned()),
                span_name: Some("^health".to_owned()),
                span_name_operator: Some(StringOperator::NotMatches),
                from: Some("3.05ms".to_owned()),
                from_operator: Some(FromOperator::GreaterOrEqual),
                to: Some("1s".to_owned()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn parse_attributes() {
        let filter =
            StructuredFilter::parse("@http.method: GET @error @retry: !* @db.statement: ~\"select *\"")
                .unwrap();

        assert_eq!(
            filter.tags,
            vec![
                TagPredicate::new("http.method").with_value("GET"),
                TagPredicate::new("error"),
                TagPredicate::new("retry").with_operator(StringOperator::NotEquals),
                TagPredicate::new("db.statement")
                    .with_value("select *")
                    .with_operator(StringOperator::Matches),
            ]
        );
    }

    #[test]
    fn parse_extra_whitespace() {
        let expected = StructuredFilter {
            service_name: Some("api".to_owned()),
            ..Default::default()
        };

        assert_eq!(StructuredFilter::parse("#service :api").unwrap(), expected);
        assert_eq!(StructuredFilter::parse("#service: api").unwrap(), expected);
        assert_eq!(StructuredFilter::parse("  #service : api  ").unwrap(), expected);
        assert_eq!(StructuredFilter::parse("").unwrap(), StructuredFilter::default());
    }

    #[test]
    fn parse_quoted_values() {
        let filter = StructuredFilter::parse(r#"@"odd key": "va\\lue\"""#).unwrap();
        assert_eq!(filter.tags[0].key, "odd key");
        assert_eq!(filter.tags[0].value.as_deref(), Some("va\\lue\""));

        let filter = StructuredFilter::parse(r#"@k: """#).unwrap();
        assert_eq!(filter.tags[0].value.as_deref(), Some(""));

        let filter = StructuredFilter::parse(r#"@k: "*""#).unwrap();
        assert_eq!(filter.tags[0].value.as_deref(), Some("*"));
    }

    #[test]
    fn reject_malformed_filters() {
        assert_eq!(StructuredFilter::parse("#service:a#name:b"), Err(InputError::InvalidSyntax));
        assert_eq!(StructuredFilter::parse("@k:"), Err(InputError::InvalidSyntax));
        assert_eq!(StructuredFilter::parse("service: a"), Err(InputError::InvalidSyntax));
        assert_eq!(StructuredFilter::parse("#service"), Err(InputError::InvalidSyntax));
        assert_eq!(StructuredFilter::parse("#service: >a"), Err(InputError::InvalidSyntax));
        assert_eq!(StructuredFilter::parse("@k: <=4"), Err(InputError::InvalidSyntax));
        assert_eq!(
            StructuredFilter::parse("#level: ERROR"),
            Err(InputError::InvalidInherentProperty)
        );
        assert_eq!(
            StructuredFilter::parse("#duration: 3ms"),
            Err(InputError::MissingDurationOperator)
        );
        assert_eq!(
            StructuredFilter::parse("#duration: !3ms"),
            Err(InputError::InvalidDurationOperator)
        );
        assert_eq!(
            StructuredFilter::parse("#duration: >soon"),
            Err(InputError::InvalidDuration)
        );
        assert_eq!(
            StructuredFilter::parse("#service: serviceName0 #service: serviceName2"),
            Err(InputError::DuplicateProperty)
        );
        assert_eq!(
            StructuredFilter::parse("#name: a #name: !b"),
            Err(InputError::DuplicateProperty)
        );
        assert_eq!(
            StructuredFilter::parse("#duration: >4ms #duration: >1ms"),
            Err(InputError::DuplicateProperty)
        );
        assert_eq!(
            StructuredFilter::parse("#duration: <4ms #duration: <=9ms"),
            Err(InputError::DuplicateProperty)
        );
        // one lower and one upper bound is a range
        assert!(StructuredFilter::parse("#duration: >1ms #duration: <4ms").is_ok());
        // repeated attribute keys are separate predicates
        assert_eq!(
            StructuredFilter::parse("@k: a @k: !b").unwrap().tags.len(),
            2
        );
    }

    #[test]
    fn display_parses_back() {
        let filter = StructuredFilter {
            service_name: Some("front end".to_owned()),
            service_name_operator: Some(StringOperator::NotEquals),
            span_name: Some("GET /api".to_owned()),
            from: Some("3.05ms".to_owned()),
            to: Some("2s".to_owned()),
            to_operator: Some(ToOperator::LessOrEqual),
            tags: vec![
                TagPredicate::new("error"),
                TagPredicate::new("retry").with_operator(StringOperator::NotMatches),
                TagPredicate::new("http.status_code").with_value("500"),
                TagPredicate::new("quote\"key").with_value("*"),
            ],
            ..Default::default()
        };

        let text = filter.to_string();
        assert_eq!(
            text,
            r#"#service: !"front end" #name: "GET /api" #duration: >3.05ms #duration: <=2s @error @retry: !~* @http.status_code: 500 @"quote\"key": "*""#
        );
        assert_eq!(text.parse::<StructuredFilter>().unwrap(), filter);
    }
}
