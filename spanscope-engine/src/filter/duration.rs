use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit0, multispace0};
use nom::combinator::{eof, opt};
use nom::sequence::preceded;
use nom::Parser;

use crate::models::{Micros, ValueOperator};

use super::InputError;

const NANOS_PER_MICRO: u128 = 1000;
const MAX_FRACTION_DIGITS: usize = 18;

/// Parses a duration like `"2ms"` or `"3.05 ms"` into microseconds.
///
/// The numeric part is an unsigned decimal. It is converted through integer
/// nanoseconds so a decimal input lands on the exact microsecond value it
/// names; digits finer than a nanosecond are dropped.
pub fn parse_duration(text: &str) -> Result<Micros, InputError> {
    let (_, (_, integer, fraction, _, unit, _, _)) = (
        multispace0,
        digit0,
        opt(preceded(char('.'), digit0)),
        multispace0,
        take_while1(|c: char| c.is_alphabetic()),
        multispace0,
        eof,
    )
        .parse(text)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| InputError::InvalidDuration)?;

    let fraction = fraction.unwrap_or_default();
    if integer.is_empty() && fraction.is_empty() {
        return Err(InputError::InvalidDuration);
    }

    let unit_nanos: u128 = match unit {
        "ns" | "nanosecond" | "nanoseconds" => 1,
        "μs" | "µs" | "us" | "microsecond" | "microseconds" => 1000,
        "ms" | "millisecond" | "milliseconds" => 1000 * 1000,
        "s" | "second" | "seconds" => 1000 * 1000 * 1000,
        "m" | "min" | "minute" | "minutes" => 60 * 1000 * 1000 * 1000,
        "h" | "hour" | "hours" => 60 * 60 * 1000 * 1000 * 1000,
        "d" | "day" | "days" => 24 * 60 * 60 * 1000 * 1000 * 1000,
        _ => return Err(InputError::InvalidDuration),
    };

    let whole: u128 = if integer.is_empty() {
        0
    } else {
        integer.parse().map_err(|_| InputError::InvalidDuration)?
    };

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    let fraction_nanos = if fraction.is_empty() {
        0
    } else {
        let digits: u128 = fraction.parse().map_err(|_| InputError::InvalidDuration)?;
        digits * unit_nanos / 10u128.pow(fraction.len() as u32)
    };

    let nanos = whole
        .checked_mul(unit_nanos)
        .and_then(|n| n.checked_add(fraction_nanos))
        .ok_or(InputError::InvalidDuration)?;

    Ok(nanos as f64 / NANOS_PER_MICRO as f64)
}

#[derive(Debug, PartialEq, Clone)]
pub struct DurationFilter {
    op: ValueOperator,
    measure: Micros,
}

impl DurationFilter {
    pub fn from_input(op: ValueOperator, value: &str) -> Result<DurationFilter, InputError> {
        let measure = parse_duration(value)?;

        Ok(DurationFilter { op, measure })
    }

    pub fn matches(&self, duration: Micros) -> bool {
        self.op.compare(duration, self.measure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_common_units() {
        assert_eq!(parse_duration("2ms").unwrap(), 2000.0);
        assert_eq!(parse_duration("3.05ms").unwrap(), 3050.0);
        assert_eq!(parse_duration("1500ns").unwrap(), 1.5);
        assert_eq!(parse_duration("7us").unwrap(), 7.0);
        assert_eq!(parse_duration("7µs").unwrap(), 7.0);
        assert_eq!(parse_duration("1s").unwrap(), 1_000_000.0);
        assert_eq!(parse_duration("1.5 seconds").unwrap(), 1_500_000.0);
        assert_eq!(parse_duration("2m").unwrap(), 120_000_000.0);
        assert_eq!(parse_duration("1h").unwrap(), 3_600_000_000.0);
        assert_eq!(parse_duration("1d").unwrap(), 86_400_000_000.0);
    }

    #[test]
    fn parse_loose_forms() {
        assert_eq!(parse_duration(" 10ms ").unwrap(), 10_000.0);
        assert_eq!(parse_duration(".5ms").unwrap(), 500.0);
        assert_eq!(parse_duration("3.ms").unwrap(), 3000.0);
        assert_eq!(parse_duration("0.0000000001s").unwrap(), 0.0);
    }

    #[test]
    fn reject_invalid_durations() {
        assert_eq!(parse_duration(""), Err(InputError::InvalidDuration));
        assert_eq!(parse_duration("ms"), Err(InputError::InvalidDuration));
        assert_eq!(parse_duration("12"), Err(InputError::InvalidDuration));
        assert_eq!(parse_duration("-3ms"), Err(InputError::InvalidDuration));
        assert_eq!(parse_duration("3 parsecs"), Err(InputError::InvalidDuration));
        assert_eq!(parse_duration("3ms5"), Err(InputError::InvalidDuration));
        assert_eq!(parse_duration("1e3ms"), Err(InputError::InvalidDuration));
        assert_eq!(parse_duration("1.2.3ms"), Err(InputError::InvalidDuration));
        assert_eq!(
            parse_duration("999999999999999999999999999999999d"),
            Err(InputError::InvalidDuration)
        );
    }

    #[test]
    fn duration_filter_compares_in_micros() {
        let filter = DurationFilter::from_input(ValueOperator::Gt, "3.05ms").unwrap();
        assert!(!filter.matches(3050.0));
        assert!(filter.matches(5000.0));

        let filter = DurationFilter::from_input(ValueOperator::Gte, "3.05ms").unwrap();
        assert!(filter.matches(3050.0));
    }
}
