use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Error value recorded by a handler and consumed by the fault middleware
/// once the response is produced.
///
/// Couples a status code with an optional underlying cause and an optional
/// user-facing hint. The value is immutable after construction; the code is
/// deliberately unvalidated because deciding what to do with an unusable
/// code is response-time policy, not construction-time policy.
#[derive(Debug)]
pub struct Fault {
    code: u16,
    cause: Option<anyhow::Error>,
    hint: String,
}

impl Fault {
    /// Create a fault from a status code, an underlying cause, and a
    /// user-facing hint
    pub fn new(code: u16, cause: impl Into<anyhow::Error>, hint: impl Into<String>) -> Self {
        Self {
            code,
            cause: Some(cause.into()),
            hint: hint.into(),
        }
    }

    /// Create a fault carrying a status code and a user-facing hint, with
    /// no underlying cause
    pub fn with_hint(code: u16, hint: impl Into<String>) -> Self {
        Self {
            code,
            cause: None,
            hint: hint.into(),
        }
    }

    /// Create a fault carrying only a status code
    #[must_use]
    pub fn bare(code: u16) -> Self {
        Self {
            code,
            cause: None,
            hint: String::new(),
        }
    }

    /// Status code this fault asks the response to carry
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// User-facing hint, empty when none was given
    #[must_use]
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Underlying cause, when one was recorded
    #[must_use]
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

/// Renders the cause's message, or nothing when there is no cause
impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{cause}"),
            None => Ok(()),
        }
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let cause = self.cause.as_ref()?;
        Some(cause.as_ref())
    }
}

impl From<u16> for Fault {
    fn from(code: u16) -> Self {
        Self::bare(code)
    }
}

impl From<StatusCode> for Fault {
    fn from(code: StatusCode) -> Self {
        Self::bare(code.as_u16())
    }
}

/// Serializes as `{"code", "cause", "hint"}` with the cause rendered as its
/// display string, `null` when absent
impl Serialize for Fault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("Fault", 3)?;
        record.serialize_field("code", &self.code)?;
        record.serialize_field("cause", &self.cause.as_ref().map(ToString::to_string))?;
        record.serialize_field("hint", &self.hint)?;
        record.end()
    }
}
