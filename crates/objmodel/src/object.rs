use std::fmt::{self, Write};

use indexmap::IndexMap;

/// A detached snapshot of a runtime value.
///
/// Produced by [`Runtime::export`](crate::Runtime::export). Unlike [`Value`](crate::Value),
/// an `Object` owns everything it refers to: instances are copied out as their class
/// name plus attributes, so the snapshot stays meaningful after the runtime is gone.
///
/// # JSON Serialization
///
/// [`Object::to_json_value`] gives the natural mapping used for output:
/// - `None` → `null`
/// - `Bool`, `Int`, `Float`, `Str`, `List`, `Dict` → the matching JSON value
/// - `Instance` → `{"$instance": {"class": "...", "attributes": {...}}}`
/// - `Class` → `{"$class": "..."}`
/// - `Cycle` → `{"$cycle": "..."}`
///
/// The derived serde impls use the externally tagged format and are meant for
/// round-tripping snapshots, not for display.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Self>),
    Dict(IndexMap<String, Self>),
    /// An instance with its owner class name and instance attributes.
    Instance {
        class: String,
        attributes: IndexMap<String, Self>,
    },
    /// A class handle, by name.
    Class(String),
    /// An instance already being exported further up the same snapshot.
    ///
    /// Instance attributes can reference each other, so export stops at the first
    /// repeat and records the class name instead.
    Cycle(String),
}

impl Object {
    /// Converts to a `serde_json::Value` using the natural JSON mapping.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::{Value as JV, json};
        match self {
            Self::None => JV::Null,
            Self::Bool(b) => JV::Bool(*b),
            Self::Int(i) => json!(i),
            Self::Float(f) => {
                if f.is_nan() || f.is_infinite() {
                    JV::Null
                } else {
                    json!(f)
                }
            }
            Self::Str(s) => JV::String(s.clone()),
            Self::List(items) => JV::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Dict(map) => JV::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json_value())).collect()),
            Self::Instance { class, attributes } => {
                let attributes: serde_json::Map<String, JV> =
                    attributes.iter().map(|(k, v)| (k.clone(), v.to_json_value())).collect();
                json!({"$instance": {"class": class, "attributes": attributes}})
            }
            Self::Class(name) => json!({"$class": name}),
            Self::Cycle(name) => json!({"$cycle": name}),
        }
    }

    fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            other => other.str_fmt(f),
        }
    }

    fn str_fmt(&self, f: &mut impl Write) -> fmt::Result {
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
            Self::Dict(map) => write_fields(f, map),
            Self::Instance { class, attributes } => {
                f.write_str(class)?;
                write_fields(f, attributes)
            }
            Self::Class(name) => write!(f, "<class '{name}'>"),
            Self::Cycle(name) => write!(f, "<{name} ...>"),
        }
    }
}

fn write_fields(f: &mut impl Write, map: &IndexMap<String, Object>) -> fmt::Result {
    f.write_char('{')?;
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "'{key}': ")?;
        value.repr_fmt(f)?;
    }
    f.write_char('}')
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.str_fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn account() -> Object {
        let mut attributes = IndexMap::new();
        attributes.insert("owner".to_owned(), Object::Str("Alice".to_owned()));
        attributes.insert("balance".to_owned(), Object::Int(120));
        Object::Instance {
            class: "BankAccount".to_owned(),
            attributes,
        }
    }

    #[test]
    fn instance_json_keeps_attribute_order() {
        assert_eq!(
            account().to_json_value(),
            json!({"$instance": {"class": "BankAccount", "attributes": {"owner": "Alice", "balance": 120}}})
        );
        let text = serde_json::to_string(&account().to_json_value()).unwrap();
        assert!(text.find("owner").unwrap() < text.find("balance").unwrap());
    }

    #[test]
    fn non_finite_float_is_null() {
        assert_eq!(Object::Float(f64::NAN).to_json_value(), serde_json::Value::Null);
    }

    #[test]
    fn display_renders_instance_fields() {
        assert_eq!(account().to_string(), "BankAccount{'owner': 'Alice', 'balance': 120}");
        assert_eq!(Object::Class("Dog".to_owned()).to_string(), "<class 'Dog'>");
    }

    #[test]
    fn derived_serde_round_trips() {
        let text = serde_json::to_string(&account()).unwrap();
        let back: Object = serde_json::from_str(&text).unwrap();
        assert_eq!(back, account());
    }
}
