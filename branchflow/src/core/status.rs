//! Assertion status values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of evaluating a pipeline step.
///
/// `None` is the only fully-successful value; every other status stops a
/// composite and triggers rollback in the enclosing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionStatus {
    /// No error.
    None,
    /// The step evaluated to false.
    Falsified,
    /// The step could not be evaluated.
    Failed,
    /// An unexpected server-side fault.
    ServerError,
    /// The request was malformed.
    BadRequest,
    /// Credentials are required.
    AuthRequired,
    /// Credentials were supplied but rejected.
    AuthFailed,
    /// The requestor is not authorized.
    Unauthorized,
    /// A downstream service is unavailable.
    ServiceUnavailable,
    /// The target service could not be resolved.
    ServiceNotFound,
    /// A downstream response was malformed.
    BadResponse,
    /// The step does not apply to this request.
    NotApplicable,
    /// No status was produced.
    Undefined,
}

impl Default for AssertionStatus {
    fn default() -> Self {
        Self::Undefined
    }
}

impl fmt::Display for AssertionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Falsified => write!(f, "FALSIFIED"),
            Self::Failed => write!(f, "FAILED"),
            Self::ServerError => write!(f, "SERVER_ERROR"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::AuthRequired => write!(f, "AUTH_REQUIRED"),
            Self::AuthFailed => write!(f, "AUTH_FAILED"),
            Self::Unauthorized => write!(f, "UNAUTHORIZED"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
            Self::ServiceNotFound => write!(f, "SERVICE_NOT_FOUND"),
            Self::BadResponse => write!(f, "BAD_RESPONSE"),
            Self::NotApplicable => write!(f, "NOT_APPLICABLE"),
            Self::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

impl AssertionStatus {
    /// Returns true only for the fully-successful status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::None => "No Error",
            Self::Falsified => "Assertion Falsified",
            Self::Failed => "Error in Assertion Processing",
            Self::ServerError => "Internal Server Error",
            Self::BadRequest => "Bad Request",
            Self::AuthRequired => "Authentication Required",
            Self::AuthFailed => "Authentication Failed",
            Self::Unauthorized => "Not Authorized",
            Self::ServiceUnavailable => "Service Temporarily Unavailable",
            Self::ServiceNotFound => "Service Not Found",
            Self::BadResponse => "Bad Response",
            Self::NotApplicable => "Not Applicable",
            Self::Undefined => "Undefined",
        }
    }
}
