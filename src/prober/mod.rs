use crate::resolver::ResolveError;
use serde::Serialize;
use std::io;
use std::net::IpAddr;

pub mod tcp_connect;

/// Result of a single connect attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProbeOutcome {
    Success { address: IpAddr, duration_ms: f64 },
    Failure { reason: FailureReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Could not resolve host")]
    Unresolved,
    #[error("No address found with requested protocol")]
    NoAddressFound,
    #[error("Connection timed out")]
    TimedOut,
    #[error("Connection refused")]
    Refused,
    #[error("Connection failed: {0}")]
    Io(String),
}

impl From<&ResolveError> for FailureReason {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::Lookup { .. } => FailureReason::Unresolved,
            ResolveError::NoAddressFound { .. } => FailureReason::NoAddressFound,
            ResolveError::TimedOut { .. } => FailureReason::TimedOut,
        }
    }
}

impl From<&io::Error> for FailureReason {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => FailureReason::TimedOut,
            io::ErrorKind::ConnectionRefused => FailureReason::Refused,
            _ => FailureReason::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AddressFamily;

    #[test]
    fn io_errors_map_to_categories() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(FailureReason::from(&refused), FailureReason::Refused);
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(FailureReason::from(&timed_out), FailureReason::TimedOut);
        let other = io::Error::other("network is unreachable");
        assert_eq!(
            FailureReason::from(&other).to_string(),
            "Connection failed: network is unreachable"
        );
    }

    #[test]
    fn resolve_errors_map_to_categories() {
        let err = ResolveError::NoAddressFound { host: "h".into(), family: AddressFamily::V6 };
        assert_eq!(FailureReason::from(&err), FailureReason::NoAddressFound);
        let err = ResolveError::TimedOut { host: "h".into() };
        assert_eq!(FailureReason::from(&err), FailureReason::TimedOut);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let ok = ProbeOutcome::Success { address: "127.0.0.1".parse().unwrap(), duration_ms: 1.5 };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["address"], "127.0.0.1");

        let failed = ProbeOutcome::Failure { reason: FailureReason::Refused };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "refused");
    }
}
