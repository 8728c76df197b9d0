//! Device status responses.

use std::fmt::{self, Display, Formatter};

/// Result of a single read attempt.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ResponseOutcome {
    /// First byte of the device's input report.
    StatusCode(u8),
    /// No report arrived within the read timeout.
    Timeout,
}

impl ResponseOutcome {
    /// Classify a raw input report.
    pub fn from_report(report: &[u8]) -> Self {
        match report.first() {
            Some(&code) => Self::StatusCode(code),
            None => Self::Timeout,
        }
    }
}

impl Display for ResponseOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusCode(code) => write!(f, "received response code: {}", code),
            Self::Timeout => write!(f, "data receive timeout"),
        }
    }
}

/// Human-readable description of a response.
pub fn decode(outcome: ResponseOutcome) -> String {
    outcome.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_byte_is_status() {
        assert_eq!(ResponseOutcome::from_report(&[7, 1, 2, 3]), ResponseOutcome::StatusCode(7));
    }

    #[test]
    fn empty_report_is_timeout() {
        assert_eq!(ResponseOutcome::from_report(&[]), ResponseOutcome::Timeout);
    }

    #[test]
    fn timeout_differs_from_zero_status() {
        let zero = decode(ResponseOutcome::StatusCode(0));
        let timeout = decode(ResponseOutcome::Timeout);

        assert_eq!(zero, "received response code: 0");
        assert_eq!(timeout, "data receive timeout");
        assert_ne!(zero, timeout);
    }
}
