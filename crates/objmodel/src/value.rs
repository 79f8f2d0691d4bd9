//! Runtime value representation.
//!
//! `Value` is what method bodies receive as arguments, store in attribute maps and
//! return. Containers own their contents, so cloning a value never aliases mutable
//! state; instances and classes are referenced through handles.

use std::fmt::{self, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    exception::{ErrorKind, RunResult},
    heap::InstanceId,
    types::ClassId,
};

/// A value manipulated by method bodies.
///
/// `Str`, `List` and `Dict` are the opaque collection types; the object model never
/// inspects them beyond rendering and equality.
#[derive(Debug, Clone, Default, PartialEq, IntoStaticStr, Serialize, Deserialize)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Self>),
    /// Insertion-ordered mapping with string keys.
    Dict(IndexMap<String, Self>),
    /// Handle to an instance owned by a runtime's instance store.
    Instance(InstanceId),
    /// Handle to a class registered in a runtime's registry.
    Class(ClassId),
}

impl Value {
    /// Returns the variant name, used in type error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Truth value testing: `None`, `false`, zero and empty containers are falsy.
    ///
    /// Instances and classes are always truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Dict(map) => !map.is_empty(),
            Self::Instance(_) | Self::Class(_) => true,
        }
    }

    pub fn as_int(&self) -> RunResult<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::Bool(b) => Ok(i64::from(*b)),
            other => Err(expected("int", other)),
        }
    }

    /// Returns the value as a float, promoting integers.
    pub fn as_float(&self) -> RunResult<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            other => Err(expected("float", other)),
        }
    }

    pub fn as_str(&self) -> RunResult<&str> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(expected("str", other)),
        }
    }

    pub fn as_bool(&self) -> RunResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(expected("bool", other)),
        }
    }

    pub fn as_list(&self) -> RunResult<&[Self]> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(expected("list", other)),
        }
    }

    pub fn as_dict(&self) -> RunResult<&IndexMap<String, Self>> {
        match self {
            Self::Dict(map) => Ok(map),
            other => Err(expected("dict", other)),
        }
    }

    pub fn as_instance(&self) -> RunResult<InstanceId> {
        match self {
            Self::Instance(id) => Ok(*id),
            other => Err(expected("instance", other)),
        }
    }

    pub fn as_class(&self) -> RunResult<ClassId> {
        match self {
            Self::Class(id) => Ok(*id),
            other => Err(expected("class", other)),
        }
    }

    /// Adds two numeric values, or concatenates two strings or lists.
    ///
    /// Integer addition is checked; overflow is a `ValueError`.
    pub fn add(&self, other: &Self) -> RunResult<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_add(*b)
                .map(Self::Int)
                .ok_or_else(|| ErrorKind::value_error("integer overflow in addition")),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                Ok(Self::Float(self.as_float()? + other.as_float()?))
            }
            (Self::Str(a), Self::Str(b)) => Ok(Self::Str(format!("{a}{b}"))),
            (Self::List(a), Self::List(b)) => Ok(Self::List(a.iter().chain(b).cloned().collect())),
            _ => Err(ErrorKind::type_error(format!(
                "unsupported operand types for +: '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Subtracts two numeric values.
    pub fn sub(&self, other: &Self) -> RunResult<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_sub(*b)
                .map(Self::Int)
                .ok_or_else(|| ErrorKind::value_error("integer overflow in subtraction")),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                Ok(Self::Float(self.as_float()? - other.as_float()?))
            }
            _ => Err(ErrorKind::type_error(format!(
                "unsupported operand types for -: '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Multiplies two numeric values.
    pub fn mul(&self, other: &Self) -> RunResult<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_mul(*b)
                .map(Self::Int)
                .ok_or_else(|| ErrorKind::value_error("integer overflow in multiplication")),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                Ok(Self::Float(self.as_float()? * other.as_float()?))
            }
            _ => Err(ErrorKind::type_error(format!(
                "unsupported operand types for *: '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Writes the literal form used inside containers: strings are quoted.
    ///
    /// Instance and class handles are written as opaque handles; the runtime renders
    /// them through their class instead.
    pub(crate) fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            other => other.str_fmt(f),
        }
    }

    /// Writes the plain text form: strings are written verbatim.
    pub(crate) fn str_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.repr_fmt(f)?;
                }
                f.write_char(']')
            }
            Self::Dict(map) => {
                f.write_char('{')?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{key}': ")?;
                    item.repr_fmt(f)?;
                }
                f.write_char('}')
            }
            Self::Instance(id) => write!(f, "<instance {id}>"),
            Self::Class(id) => write!(f, "<class {id}>"),
        }
    }
}

fn expected(what: &str, got: &Value) -> crate::RunError {
    ErrorKind::type_error(format!("expected {what}, got {}", got.type_name()))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.str_fmt(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<IndexMap<String, Self>> for Value {
    fn from(map: IndexMap<String, Self>) -> Self {
        Self::Dict(map)
    }
}

impl From<InstanceId> for Value {
    fn from(id: InstanceId) -> Self {
        Self::Instance(id)
    }
}

impl From<ClassId> for Value {
    fn from(id: ClassId) -> Self {
        Self::Class(id)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl<V: Into<Self>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::List(vec![Value::None]).is_truthy());
        assert!(!Value::Dict(IndexMap::new()).is_truthy());
    }

    #[test]
    fn add_promotes_and_concatenates() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(Value::Int(2).add(&Value::Float(0.5)), Ok(Value::Float(2.5)));
        assert_eq!(Value::from("ab").add(&Value::from("cd")), Ok(Value::from("abcd")));
        let err = Value::Int(1).add(&Value::from("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeError);
    }

    #[test]
    fn overflow_is_value_error() {
        let err = Value::Int(i64::MAX).add(&Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueError);
    }

    #[test]
    fn containers_render_with_quoted_strings() {
        let mut map = IndexMap::new();
        map.insert("b".to_owned(), Value::Int(1));
        map.insert("a".to_owned(), Value::List(vec![Value::from("x"), Value::Float(2.0)]));
        assert_eq!(Value::Dict(map).to_string(), "{'b': 1, 'a': ['x', 2.0]}");
        assert_eq!(Value::from("plain").to_string(), "plain");
    }

    #[test]
    fn accessor_type_errors_name_both_types() {
        let err = Value::from("10").as_int().unwrap_err();
        assert_eq!(err.message(), Some("expected int, got Str"));
    }
}
