use std::{
    borrow::Cow,
    fmt::{self, Display},
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Exception kinds surfaced by the object model.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `TypeError` -> "TypeError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Attribute failures that are not a plain miss: read-only properties, missing
    /// instance stores, `super()` misses.
    AttributeError,
    /// Bad arguments, bad bases, metaclass conflicts, uncallable values.
    TypeError,
    ValueError,
    /// Re-entrant descriptor or hook calls went deeper than the configured limit.
    RecursionError,
    /// Generic failure raised by native callables.
    RuntimeError,
}

impl ExcType {
    /// Creates an exception of this kind with a message.
    #[must_use]
    pub fn msg(self, message: impl Into<String>) -> RunError {
        RunError::Exc(SimpleException::new_msg(self, message))
    }

    /// Creates the structural "nothing produced a value" error for a read.
    ///
    /// `owner` is the already formatted description of the object, e.g. `'A' object`
    /// or `type object 'A'`.
    #[must_use]
    pub fn attribute_not_found(owner: impl Display, name: &str) -> RunError {
        RunError::AttributeNotFound {
            owner: owner.to_string(),
            name: name.to_owned(),
        }
    }

    /// Creates an AttributeError in the CPython shape `'<type>' object has no attribute '<attr>'`.
    ///
    /// Used for write/delete failures, where the miss is a real exception rather
    /// than the end of a read lookup.
    #[must_use]
    pub fn attribute_error(type_name: impl Display, attr: &str) -> RunError {
        Self::AttributeError.msg(format!("'{type_name}' object has no attribute '{attr}'"))
    }

    /// Creates an AttributeError for a property accessor that was never supplied.
    #[must_use]
    pub fn attribute_error_property(property: &str, type_name: &str, accessor: &str) -> RunError {
        Self::AttributeError.msg(format!(
            "property '{property}' of '{type_name}' object has no {accessor}"
        ))
    }

    /// Creates an AttributeError for writes to instances without a value store.
    #[must_use]
    pub fn attribute_error_no_dict(type_name: &str, attr: &str) -> RunError {
        Self::AttributeError.msg(format!(
            "'{type_name}' object has no attribute '{attr}' and no __dict__ for setting new attributes"
        ))
    }

    #[must_use]
    pub fn type_error(message: impl Into<String>) -> RunError {
        Self::TypeError.msg(message)
    }

    /// Creates a TypeError for calling a value that is not callable.
    #[must_use]
    pub fn type_error_not_callable(type_name: &str) -> RunError {
        Self::TypeError.msg(format!("'{type_name}' object is not callable"))
    }

    #[must_use]
    pub fn recursion_error() -> RunError {
        Self::RecursionError.msg("maximum recursion depth exceeded while resolving attributes")
    }

    /// Creates the RuntimeError for a handle whose object was reclaimed by a collection.
    #[must_use]
    pub fn freed_object() -> RunError {
        Self::RuntimeError.msg("object already freed")
    }
}

/// An exception raised by a native callable, descriptor or hook.
///
/// Carries only the kind and an optional message; these values travel through
/// resolution unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleException {
    exc_type: ExcType,
    arg: Option<String>,
}

impl SimpleException {
    #[must_use]
    pub fn new(exc_type: ExcType, arg: Option<String>) -> Self {
        Self { exc_type, arg }
    }

    #[must_use]
    pub fn new_msg(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            arg: Some(message.into()),
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}: {arg}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

/// Every way an object model operation can fail.
///
/// `AttributeNotFound` is reserved for the end of a read lookup. Type creation
/// failures come back as `InconsistentHierarchy` / `DuplicateBase`, and anything
/// raised by a callable is carried in `Exc` untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// No lookup step produced a value.
    AttributeNotFound {
        /// Formatted owner description (`'A' object`, `type object 'A'`).
        owner: String,
        name: String,
    },
    /// C3 merge found no valid head: the bases order their ancestors contradictorily.
    InconsistentHierarchy { bases: Vec<String> },
    /// The same class appears more than once among the direct bases.
    DuplicateBase { name: String },
    /// An exception raised by a descriptor, hook or native callable, or by a
    /// builtin operation.
    Exc(SimpleException),
}

impl RunError {
    /// Returns the exception kind this error surfaces as.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::AttributeNotFound { .. } => ExcType::AttributeError,
            Self::InconsistentHierarchy { .. } | Self::DuplicateBase { .. } => ExcType::TypeError,
            Self::Exc(exc) => exc.exc_type(),
        }
    }

    /// Short kind name: the structural variant name, or the exception kind for `Exc`.
    ///
    /// Scenario files match errors against this string.
    #[must_use]
    pub fn kind(&self) -> Cow<'static, str> {
        match self {
            Self::AttributeNotFound { .. } => Cow::Borrowed("AttributeNotFound"),
            Self::InconsistentHierarchy { .. } => Cow::Borrowed("InconsistentHierarchy"),
            Self::DuplicateBase { .. } => Cow::Borrowed("DuplicateBase"),
            Self::Exc(exc) => Cow::Borrowed(exc.exc_type().into()),
        }
    }

    /// Returns the attribute name if this is an `AttributeNotFound`.
    #[must_use]
    pub fn missing_attribute(&self) -> Option<&str> {
        match self {
            Self::AttributeNotFound { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeNotFound { owner, name } => {
                write!(f, "AttributeError: {owner} has no attribute '{name}'")
            }
            Self::InconsistentHierarchy { bases } => write!(
                f,
                "TypeError: Cannot create a consistent method resolution order (MRO) for bases {}",
                bases.join(", ")
            ),
            Self::DuplicateBase { name } => write!(f, "TypeError: duplicate base class {name}"),
            Self::Exc(exc) => write!(f, "{exc}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(exc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_python_messages() {
        let err = ExcType::attribute_not_found("'A' object", "q");
        assert_eq!(err.to_string(), "AttributeError: 'A' object has no attribute 'q'");

        let err = RunError::InconsistentHierarchy {
            bases: vec!["K1".to_owned(), "K2".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot create a consistent method resolution order (MRO) for bases K1, K2"
        );
        assert_eq!(err.exc_type(), ExcType::TypeError);
    }

    #[test]
    fn kind_names_structural_variants() {
        assert_eq!(ExcType::attribute_not_found("x", "y").kind(), "AttributeNotFound");
        assert_eq!(RunError::DuplicateBase { name: "A".into() }.kind(), "DuplicateBase");
        assert_eq!(ExcType::type_error("boom").kind(), "TypeError");
    }
}
