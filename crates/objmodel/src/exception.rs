use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::resource::ResourceError;

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Error kinds produced by the object model.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `MethodNotFound` -> "MethodNotFound").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    // --- definition and lookup ---
    /// A class was defined against a parent that is not registered.
    ParentNotFound,
    /// A method name is absent after exhausting the inheritance chain.
    MethodNotFound,
    /// A class or instance attribute lookup exhausted the inheritance chain.
    AttributeNotFound,
    /// Too many arguments, or too few after default-filling.
    ArityMismatch,

    // --- handles ---
    /// A class id or class name that the registry does not know.
    ClassNotFound,
    /// A released, stale or foreign instance handle.
    InstanceNotFound,

    // --- raised by method bodies ---
    TypeError,
    ValueError,

    // --- resource limits ---
    RecursionError,
    MemoryError,
    TimeoutError,
}

impl ErrorKind {
    /// Creates an error of this kind with a message.
    #[must_use]
    pub fn msg(self, message: impl Into<String>) -> RunError {
        RunError::new(self, Some(message.into()))
    }

    /// Error for a parent that could not be resolved while defining `class_name`.
    #[must_use]
    pub(crate) fn parent_not_found(class_name: &str, parent: impl Display) -> RunError {
        Self::ParentNotFound.msg(format!("cannot define '{class_name}': parent {parent} is not defined"))
    }

    #[must_use]
    pub(crate) fn method_not_found(class_name: &str, method: &str) -> RunError {
        Self::MethodNotFound.msg(format!("'{class_name}' has no method '{method}'"))
    }

    #[must_use]
    pub(crate) fn attribute_not_found(owner: &str, attr: &str) -> RunError {
        Self::AttributeNotFound.msg(format!("'{owner}' has no attribute '{attr}'"))
    }

    #[must_use]
    pub(crate) fn class_not_found(class: impl Display) -> RunError {
        Self::ClassNotFound.msg(format!("class {class} is not defined"))
    }

    #[must_use]
    pub(crate) fn instance_not_found(instance: impl Display) -> RunError {
        Self::InstanceNotFound.msg(format!("instance {instance} does not exist or was released"))
    }

    /// Error for a value of the wrong type, e.g. `expected int, got str`.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> RunError {
        Self::TypeError.msg(message)
    }

    #[must_use]
    pub fn value_error(message: impl Into<String>) -> RunError {
        Self::ValueError.msg(message)
    }

    /// Error for a call that supplied more positional arguments than the signature accepts.
    #[must_use]
    pub(crate) fn too_many_args(func_name: &str, expected: usize, actual: usize) -> RunError {
        let plural = if expected == 1 { "argument" } else { "arguments" };
        let verb = if actual == 1 { "was" } else { "were" };
        Self::ArityMismatch.msg(format!(
            "{func_name}() takes {expected} positional {plural} but {actual} {verb} given"
        ))
    }

    /// Error for required parameters left unfilled after default substitution.
    #[must_use]
    pub(crate) fn missing_args(func_name: &str, missing: &[&str]) -> RunError {
        let plural = if missing.len() == 1 { "argument" } else { "arguments" };
        let quoted: Vec<String> = missing.iter().map(|name| format!("'{name}'")).collect();
        let names = match quoted.as_slice() {
            [] => String::new(),
            [one] => one.clone(),
            [init @ .., last] => format!("{} and {last}", init.join(", ")),
        };
        Self::ArityMismatch.msg(format!(
            "{func_name}() missing {} required positional {plural}: {names}",
            missing.len()
        ))
    }
}

/// An error raised by the object model or by a method body.
///
/// Errors are always returned to the immediate caller of the failing operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunError {
    kind: ErrorKind,
    message: Option<String>,
}

impl RunError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: Option<String>) -> Self {
        Self { kind, message }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Consumes the error and returns its message.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind: &'static str = self.kind.into();
        match &self.message {
            Some(message) => write!(f, "{kind}: {message}"),
            None => f.write_str(kind),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ErrorKind> for RunError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, None)
    }
}

impl From<ResourceError> for RunError {
    /// Maps resource errors to error kinds:
    /// - `Allocation`, `Memory` → `MemoryError`
    /// - `Operation`, `Time` → `TimeoutError`
    /// - `Recursion`, `Inheritance` → `RecursionError`
    fn from(err: ResourceError) -> Self {
        let kind = match err {
            ResourceError::Allocation { .. } | ResourceError::Memory { .. } => ErrorKind::MemoryError,
            ResourceError::Operation { .. } | ResourceError::Time { .. } => ErrorKind::TimeoutError,
            ResourceError::Recursion { .. } | ResourceError::Inheritance { .. } => ErrorKind::RecursionError,
        };
        Self::new(kind, Some(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn kind_round_trips_through_strum() {
        let name: &'static str = ErrorKind::ArityMismatch.into();
        assert_eq!(name, "ArityMismatch");
        assert_eq!(ErrorKind::from_str("MethodNotFound"), Ok(ErrorKind::MethodNotFound));
    }

    #[test]
    fn missing_args_lists_names() {
        let err = ErrorKind::missing_args("f", &["a", "b", "c"]);
        assert_eq!(
            err.to_string(),
            "ArityMismatch: f() missing 3 required positional arguments: 'a', 'b' and 'c'"
        );
    }

    #[test]
    fn too_many_args_message() {
        let err = ErrorKind::too_many_args("speak", 1, 2);
        assert_eq!(err.message(), Some("speak() takes 1 positional argument but 2 were given"));
    }

    #[test]
    fn resource_errors_map_to_kinds() {
        let err: RunError = ResourceError::Recursion { limit: 10, depth: 11 }.into();
        assert_eq!(err.kind(), ErrorKind::RecursionError);
        let err: RunError = ResourceError::Allocation { limit: 1, count: 2 }.into();
        assert_eq!(err.kind(), ErrorKind::MemoryError);
    }
}
