//! Method signatures and the default-parameter resolver.
//!
//! A signature is an ordered list of positional parameter names. The last
//! `defaults.len()` parameters are optional: their defaults are literal values
//! captured when the signature is built. The implicit binding parameter (the
//! instance or class a method is bound to) is not part of the signature.

use crate::{
    args::ArgValues,
    exception::{ErrorKind, RunResult},
    value::Value,
};

/// Positional parameters of a method, with defaults for a trailing subset.
///
/// # Default Values
///
/// Defaults are stored per trailing parameter. For example if
/// `params = [owner, balance]` and `defaults = [0]`, then `balance` defaults to `0`.
/// The builder only appends optional parameters after required ones, so a default
/// can never precede a required parameter.
///
/// Binding clones the stored default each time it is used, so a mutable default
/// (e.g. a list) is never shared between calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    /// Parameter names in declaration order.
    params: Vec<String>,
    /// Defaults for the last `defaults.len()` parameters.
    defaults: Vec<Value>,
}

impl Signature {
    /// Creates a signature whose parameters are all required.
    #[must_use]
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            defaults: Vec::new(),
        }
    }

    /// Creates a signature with no parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends an optional parameter with a literal default.
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(name.into());
        self.defaults.push(default.into());
        self
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Number of parameters without a default.
    #[must_use]
    pub fn required_count(&self) -> usize {
        self.params.len() - self.defaults.len()
    }

    /// Returns the default for the parameter at `position`, if it has one.
    #[must_use]
    pub fn default_for(&self, position: usize) -> Option<&Value> {
        position
            .checked_sub(self.required_count())
            .and_then(|offset| self.defaults.get(offset))
    }

    /// Binds call-site arguments to parameters.
    ///
    /// Supplied arguments fill parameters from the left; every trailing parameter not
    /// covered receives a clone of its default.
    ///
    /// # Errors
    /// Returns `ArityMismatch` if more arguments are supplied than there are
    /// parameters, or if a required parameter is left unfilled.
    pub fn bind(&self, mut args: ArgValues, func_name: &str) -> RunResult<ArgValues> {
        let supplied = args.len();
        let param_count = self.param_count();

        // fast path: every parameter supplied
        if supplied == param_count {
            return Ok(args);
        }
        if supplied > param_count {
            return Err(ErrorKind::too_many_args(func_name, param_count, supplied));
        }

        let required = self.required_count();
        if supplied < required {
            let missing: Vec<&str> = self.params[supplied..required].iter().map(String::as_str).collect();
            return Err(ErrorKind::missing_args(func_name, &missing));
        }

        args.extend(self.defaults[supplied - required..].iter().cloned());
        debug_assert_eq!(args.len(), param_count);
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn speak() -> Signature {
        Signature::empty().optional("sound", "yip")
    }

    #[test]
    fn missing_trailing_uses_default() {
        let bound = speak().bind(ArgValues::new(), "speak").unwrap();
        assert_eq!(bound.into_vec(), vec![Value::from("yip")]);
    }

    #[test]
    fn supplied_value_wins_over_default() {
        let bound = speak().bind(ArgValues::from(["arf"]), "speak").unwrap();
        assert_eq!(bound.into_vec(), vec![Value::from("arf")]);
    }

    #[test]
    fn too_many_arguments() {
        let err = speak().bind(ArgValues::from(["a", "b"]), "speak").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
        assert_eq!(err.message(), Some("speak() takes 1 positional argument but 2 were given"));
    }

    #[test]
    fn required_parameter_left_unfilled() {
        let sig = Signature::new(["owner"]).optional("balance", 0);
        let err = sig.bind(ArgValues::new(), "__init__").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
        assert_eq!(
            err.message(),
            Some("__init__() missing 1 required positional argument: 'owner'")
        );
    }

    #[test]
    fn only_uncovered_defaults_are_filled() {
        let sig = Signature::new(["a"]).optional("b", 2).optional("c", 3);
        let bound = sig.bind(ArgValues::from([1, 20]), "f").unwrap();
        assert_eq!(bound.into_vec(), vec![Value::Int(1), Value::Int(20), Value::Int(3)]);
    }

    #[test]
    fn default_position_lookup() {
        let sig = Signature::new(["a"]).optional("b", 2);
        assert_eq!(sig.default_for(0), None);
        assert_eq!(sig.default_for(1), Some(&Value::Int(2)));
        assert_eq!(sig.default_for(2), None);
        assert_eq!(sig.required_count(), 1);
    }

    #[test]
    fn mutable_default_is_not_shared() {
        let sig = Signature::empty().optional("items", Value::List(vec![]));
        let first = sig.bind(ArgValues::new(), "f").unwrap();
        let Value::List(mut items) = first.into_vec().remove(0) else {
            panic!("expected list");
        };
        items.push(Value::Int(1));

        let second = sig.bind(ArgValues::new(), "f").unwrap();
        assert_eq!(second.into_vec(), vec![Value::List(vec![])]);
    }
}
