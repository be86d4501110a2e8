use std::{
    error::Error,
    fmt::{self, Display},
};

use facet_core::Shape;
use facet_reflect::ReflectError;

/// Error type for copy operations.
#[derive(Debug)]
pub struct CopyError {
    kind: CopyErrorKind,
}

impl CopyError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &CopyErrorKind {
        &self.kind
    }
}

impl Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}
impl Error for CopyError {}

impl<K: Into<CopyErrorKind>> From<K> for CopyError {
    fn from(value: K) -> Self {
        let kind = value.into();
        CopyError { kind }
    }
}

/// Detailed classification of copy errors.
///
/// Unmatched fields, missing hooks and values that cannot be coerced are not
/// errors: the destination simply keeps its value for those fields.
#[derive(Debug)]
#[non_exhaustive]
pub enum CopyErrorKind {
    /// The destination cannot be written in place: it is an empty `Option`
    /// or sits behind a shared pointer.
    Unaddressable(&'static Shape),
    /// Error from the reflection system while building the destination.
    Reflect(ReflectError),
    /// A fallible conversion rejected the source value: a wrapper's
    /// `try_from` (such as `NonZero`) or a `FromStr` parse of text.
    Decode {
        /// Path of the destination field being written.
        path: String,
        /// The underlying error.
        error: ReflectError,
    },
    /// Nested records went deeper than the configured limit.
    DepthExceeded {
        /// The configured maximum depth.
        limit: usize,
    },
}

impl Display for CopyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyErrorKind::Unaddressable(shape) => {
                write!(f, "cannot copy into {shape}: destination is not addressable")
            }
            CopyErrorKind::Reflect(reflect_error) => write!(f, "{reflect_error}"),
            CopyErrorKind::Decode { path, error } => {
                write!(f, "failed to decode value for {path}: {error}")
            }
            CopyErrorKind::DepthExceeded { limit } => {
                write!(f, "nested records exceed the maximum depth of {limit}")
            }
        }
    }
}

impl From<ReflectError> for CopyErrorKind {
    fn from(value: ReflectError) -> Self {
        Self::Reflect(value)
    }
}
