use std::fmt;

use serde::{de, ser};

use super::CodingPath;

pub type Result<T> = std::result::Result<T, Error>;

/// A native value kind a context may be unable to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ArrayBuffer,
    Date,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ArrayBuffer => f.write_str("ArrayBuffer"),
            Capability::Date => f.write_str("Date"),
        }
    }
}

/// An error raised while encoding into or decoding from a [`JSValue`](crate::JSValue).
///
/// Every variant carries the [`CodingPath`] of the value that failed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A value's encoding did not store anything.
    #[error("{value} did not encode any values at {path}")]
    EncodingProducedNoValue { value: String, path: CodingPath },

    /// A keyed container has no entry for `key`.
    #[error("no value associated with key \"{key}\" at {path}")]
    KeyNotFound { key: String, path: CodingPath },

    /// A value was required but none is available.
    #[error("expected {expected} value but {reason} at {path}")]
    ValueNotFound {
        expected: String,
        reason: String,
        path: CodingPath,
    },

    /// The JS value is of a different type than the one requested.
    #[error("expected to decode {expected} but found {actual} instead at {path}")]
    TypeMismatch {
        expected: String,
        actual: String,
        path: CodingPath,
    },

    /// The context cannot create the native value kind required.
    #[error("{capability} values are not supported by this context at {path}")]
    CapabilityUnavailable {
        capability: Capability,
        path: CodingPath,
    },

    /// The value has the right type but cannot be represented in the target.
    #[error("{message} at {path}")]
    DataCorrupted { message: String, path: CodingPath },

    /// An error raised by a `Serialize` or `Deserialize` implementation.
    #[error("{message} at {path}")]
    Custom { message: String, path: CodingPath },

    /// The JavaScript engine failed while creating or reading a value, for
    /// instance because a getter threw.
    #[error("{message} at {path}")]
    Engine { message: String, path: CodingPath },

    /// Raised through serde's constructors, which know nothing of the coding
    /// path. Converted into one of the variants above by the innermost
    /// encoder or decoder frame it passes through.
    #[doc(hidden)]
    #[error("{0}")]
    Pending(Pending),
}

#[doc(hidden)]
#[derive(Debug)]
pub enum Pending {
    MissingField(&'static str),
    InvalidType { expected: String, actual: String },
    DataCorrupted(String),
    Custom(String),
}

impl fmt::Display for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::MissingField(field) => write!(f, "missing field `{field}`"),
            Pending::InvalidType { expected, actual } => {
                write!(f, "invalid type: {actual}, expected {expected}")
            }
            Pending::DataCorrupted(message) | Pending::Custom(message) => f.write_str(message),
        }
    }
}

impl Error {
    /// The coding path of the failing value, if the error has been located.
    pub fn path(&self) -> Option<&CodingPath> {
        match self {
            Error::EncodingProducedNoValue { path, .. }
            | Error::KeyNotFound { path, .. }
            | Error::ValueNotFound { path, .. }
            | Error::TypeMismatch { path, .. }
            | Error::CapabilityUnavailable { path, .. }
            | Error::DataCorrupted { path, .. }
            | Error::Custom { path, .. }
            | Error::Engine { path, .. } => Some(path),
            Error::Pending(_) => None,
        }
    }

    /// Locates a pending error at `path`. Located errors are returned as is.
    pub(crate) fn resolve(self, path: &CodingPath) -> Self {
        let pending = match self {
            Error::Pending(pending) => pending,
            located => return located,
        };
        let path = path.clone();
        match pending {
            Pending::MissingField(field) => Error::KeyNotFound {
                key: field.to_string(),
                path,
            },
            Pending::InvalidType { expected, actual } => Error::TypeMismatch {
                expected,
                actual,
                path,
            },
            Pending::DataCorrupted(message) => Error::DataCorrupted { message, path },
            Pending::Custom(message) => Error::Custom { message, path },
        }
    }

    /// Replaces the path of an error raised outside of any coding frame.
    pub(crate) fn with_path(self, path: &CodingPath) -> Self {
        match self.resolve(path) {
            Error::CapabilityUnavailable { capability, .. } => Error::CapabilityUnavailable {
                capability,
                path: path.clone(),
            },
            Error::Engine { message, .. } => Error::Engine {
                message,
                path: path.clone(),
            },
            other => other,
        }
    }

    pub(crate) fn data_corrupted(message: impl Into<String>, path: &CodingPath) -> Self {
        Error::DataCorrupted {
            message: message.into(),
            path: path.clone(),
        }
    }

    pub(crate) fn engine(error: impl fmt::Display, path: &CodingPath) -> Self {
        Error::Engine {
            message: error.to_string(),
            path: path.clone(),
        }
    }

    pub(crate) fn key_must_be_a_string() -> Self {
        Error::Pending(Pending::DataCorrupted(
            "map keys must be strings, numbers, booleans or chars".to_string(),
        ))
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Pending(Pending::Custom(msg.to_string()))
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Pending(Pending::Custom(msg.to_string()))
    }

    fn invalid_type(unexp: de::Unexpected, exp: &dyn de::Expected) -> Self {
        Error::Pending(Pending::InvalidType {
            expected: exp.to_string(),
            actual: unexp.to_string(),
        })
    }

    fn invalid_value(unexp: de::Unexpected, exp: &dyn de::Expected) -> Self {
        Error::Pending(Pending::DataCorrupted(format!(
            "invalid value: {unexp}, expected {exp}"
        )))
    }

    fn invalid_length(len: usize, exp: &dyn de::Expected) -> Self {
        Error::Pending(Pending::DataCorrupted(format!(
            "invalid length {len}, expected {exp}"
        )))
    }

    fn unknown_variant(variant: &str, expected: &'static [&'static str]) -> Self {
        Error::Pending(Pending::DataCorrupted(format!(
            "unknown variant `{variant}`, expected one of {expected:?}"
        )))
    }

    fn unknown_field(field: &str, expected: &'static [&'static str]) -> Self {
        Error::Pending(Pending::DataCorrupted(format!(
            "unknown field `{field}`, expected one of {expected:?}"
        )))
    }

    fn missing_field(field: &'static str) -> Self {
        Error::Pending(Pending::MissingField(field))
    }

    fn duplicate_field(field: &'static str) -> Self {
        Error::Pending(Pending::DataCorrupted(format!("duplicate field `{field}`")))
    }
}
