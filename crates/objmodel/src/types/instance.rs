use indexmap::IndexMap;

use super::ClassId;
use crate::value::Value;

/// An instance created by constructing a class.
///
/// Holds the id of its owner class and the instance-private attributes. Attribute
/// lookup checks these first, then class attributes starting at the owner class.
/// Once an instance attribute exists it shadows the class attribute of the same
/// name for good: there is no way to remove it.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Class this instance was constructed from. Never changes.
    owner_class: ClassId,
    /// Instance-private attributes in assignment order.
    attributes: IndexMap<String, Value>,
}

impl Instance {
    /// Creates an instance with an empty attribute map.
    #[must_use]
    pub fn new(owner_class: ClassId) -> Self {
        Self {
            owner_class,
            attributes: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn owner_class(&self) -> ClassId {
        self.owner_class
    }

    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    /// Returns the instance's own attribute, ignoring class attributes.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Sets an instance attribute. Returns the previous value, if any.
    pub fn set_attr(&mut self, name: &str, value: Value) -> Option<Value> {
        self.attributes.insert(name.to_owned(), value)
    }

    /// Approximate size in bytes, used for memory accounting.
    ///
    /// Must equal the allocation charge plus one [`Self::attribute_size`] per insert.
    pub(crate) fn estimate_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.attributes.keys().map(|key| Self::attribute_size(key)).sum::<usize>()
    }

    /// Approximate size in bytes of one attribute entry.
    pub(crate) fn attribute_size(name: &str) -> usize {
        name.len() + std::mem::size_of::<Value>()
    }
}
