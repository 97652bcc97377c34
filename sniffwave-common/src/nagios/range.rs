//! Monitoring-plugin threshold ranges (`[@]start:end`).

use std::fmt;
use std::str::FromStr;

use crate::error::RangeError;

/// A parsed threshold range.
///
/// `N` is shorthand for `0:N`, an empty start means `0`, an empty end means
/// no upper bound and `~` as start means no lower bound. A leading `@`
/// inverts the match.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRange {
    start: f64,
    end: f64,
    inverted: bool,
    text: String,
}

impl ThresholdRange {
    /// True when `value` should raise the alert tied to this range: outside
    /// `start..=end`, or inside it for an inverted range.
    pub fn in_range(&self, value: f64) -> bool {
        let outside = value < self.start || value > self.end;
        outside != self.inverted
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// The range as the operator wrote it.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for ThresholdRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = |reason: &str| RangeError {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let (inverted, body) = match text.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (start, end) = body.split_once(':').unwrap_or(("", body));

        let start = match start.trim() {
            "~" => f64::NEG_INFINITY,
            "" => 0.0,
            value => parse_bound(value).ok_or_else(|| invalid("start is not a number"))?,
        };
        let end = match end.trim() {
            "" => f64::INFINITY,
            value => parse_bound(value).ok_or_else(|| invalid("end is not a number"))?,
        };
        if start > end {
            return Err(invalid("start is greater than end"));
        }

        Ok(Self {
            start,
            end,
            inverted,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for ThresholdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_bound(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
