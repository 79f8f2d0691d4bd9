use std::ops::Index;

use smallvec::SmallVec;

use crate::{
    exception::{ErrorKind, RunResult},
    value::Value,
};

/// Positional arguments for a call.
///
/// Backed by a `SmallVec` because nearly every call passes at most a handful of
/// arguments, which keeps the common case free of heap allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgValues(SmallVec<[Value; 4]>);

impl ArgValues {
    #[must_use]
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Value> {
        self.0.into_vec()
    }

    /// Unpacks exactly `N` arguments, e.g. `let [name, salary] = args.into_array("f")?;`.
    ///
    /// After binding, the count always equals the method's parameter count, so this
    /// only fails when a body destructures a different number than it declared.
    pub fn into_array<const N: usize>(self, func_name: &str) -> RunResult<[Value; N]> {
        let len = self.len();
        <[Value; N]>::try_from(self.into_vec()).map_err(|_| {
            ErrorKind::ArityMismatch.msg(format!("{func_name}() expected {N} arguments, got {len}"))
        })
    }
}

impl Index<usize> for ArgValues {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl FromIterator<Value> for ArgValues {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ArgValues {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArgValues {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<Value> for ArgValues {
    fn extend<I: IntoIterator<Item = Value>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl From<()> for ArgValues {
    fn from((): ()) -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for ArgValues {
    fn from(values: Vec<Value>) -> Self {
        Self(SmallVec::from_vec(values))
    }
}

impl From<Value> for ArgValues {
    fn from(value: Value) -> Self {
        let mut args = Self::new();
        args.push(value);
        args
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for ArgValues {
    fn from(values: [V; N]) -> Self {
        values.into_iter().map(Into::into).collect()
    }
}

/// Builds an [`ArgValues`] from expressions convertible into [`Value`].
///
/// ```
/// use objmodel::{Value, args};
///
/// let args = args!["Alice", 100];
/// assert_eq!(args[0], Value::from("Alice"));
/// assert_eq!(args.len(), 2);
/// assert!(args![].is_empty());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::ArgValues::new()
    };
    ($($arg:expr),+ $(,)?) => {
        <$crate::ArgValues as ::core::iter::FromIterator<$crate::Value>>::from_iter([$($crate::Value::from($arg)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_array_checks_length() {
        let [a, b] = ArgValues::from([1, 2]).into_array("f").unwrap();
        assert_eq!((a, b), (Value::Int(1), Value::Int(2)));

        let err = ArgValues::from([1]).into_array::<2>("f").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
    }

    #[test]
    fn macro_accepts_mixed_types() {
        let args = crate::args!["x", 1, 2.5, true];
        assert_eq!(
            args.into_vec(),
            vec![Value::from("x"), Value::Int(1), Value::Float(2.5), Value::Bool(true)]
        );
    }
}
