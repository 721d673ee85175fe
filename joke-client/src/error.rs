use std::time::Duration;

use tower::BoxError;

/// Every way a fetch can fail.
///
/// Inside the tower stack these travel as [`BoxError`]; the client turns
/// them back into a `JokeError` before handing them to the caller, so
/// callers only ever match on this enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JokeError {
    /// The request could not be delivered, or the service answered with a
    /// non-success status or an unreadable body.
    #[error("Transport failure: {message}")]
    Transport {
        message: String,
        /// HTTP status, when the service answered at all.
        status: Option<u16>,
    },

    /// The call did not finish within its time budget and was abandoned.
    #[error("Request exceeded its {budget:?} time budget")]
    Timeout { budget: Duration },

    /// The service understood the request and explicitly rejected it.
    #[error("JokeAPI error {code}: {message}")]
    Domain {
        code: i64,
        message: String,
        /// Reasons reported by the service, in the order it gave them.
        causes: Vec<String>,
        additional_info: Option<String>,
    },

    /// The local request budget is used up.
    ///
    /// Nothing was sent. `retry_after` is the time until the budget refills.
    #[error("Request budget exhausted; retry after {retry_after:?}")]
    AdmissionDenied { retry_after: Duration },
}

impl JokeError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// A short, stable label for the failure kind, used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Domain { .. } => "domain",
            Self::AdmissionDenied { .. } => "admission_denied",
        }
    }
}

impl From<BoxError> for JokeError {
    fn from(err: BoxError) -> Self {
        match err.downcast::<JokeError>() {
            Ok(joke_err) => *joke_err,
            Err(other) => Self::transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for JokeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
            status: err.status().map(|status| status.as_u16()),
        }
    }
}

/// Errors raised while building a [`JokeClient`](crate::JokeClient).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Base URL `{0}` cannot carry a path")]
    OpaqueBaseUrl(String),

    #[error("Could not construct the HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_joke_error_survives_round_trip() {
        let original = JokeError::AdmissionDenied {
            retry_after: Duration::from_secs(3),
        };
        let boxed: BoxError = Box::new(original.clone());

        assert_eq!(JokeError::from(boxed), original);
    }

    #[test]
    fn test_foreign_box_error_is_transport() {
        let boxed: BoxError = "connection reset".into();

        assert_eq!(
            JokeError::from(boxed),
            JokeError::Transport {
                message: "connection reset".to_string(),
                status: None,
            }
        );
    }
}
