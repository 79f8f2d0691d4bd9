//! Class descriptors and the class registry.
//!
//! `ClassDescriptor` represents a class created by [`Registry::define`]: its name,
//! at most one parent, a method table and the class-level attributes.
//!
//! # Lookup
//!
//! Method and class-attribute lookup both walk the chain iteratively: the class
//! itself first, then each parent in turn, ending in an explicit not-found result
//! at the root. A parent must already be registered when a child is defined, so
//! the chain is acyclic, and its length is checked against the tracker's
//! inheritance depth limit at definition time.
//!
//! # Class attributes
//!
//! - Class attributes are shared by every instance of the class and its descendants
//! - Writing a class attribute always writes the named class's own map, creating a
//!   shadow there even if the name currently resolves to an ancestor

use std::fmt;

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    args::ArgValues,
    exception::{ErrorKind, RunResult},
    function::{MethodDescriptor, MethodKind},
    resource::{ResourceError, ResourceTracker},
    runtime::Frame,
    signature::Signature,
    value::Value,
};

/// Handle to a class in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    /// Returns the raw registry index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap())
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a class definition names its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    Id(ClassId),
    /// Resolved against the names registered at definition time.
    Name(String),
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl From<ClassId> for ParentRef {
    fn from(id: ClassId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ParentRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ParentRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Everything needed to define a class: name, optional parent, method table and
/// class attribute defaults.
///
/// ```
/// use objmodel::{ClassDef, NoLimitTracker, Runtime, Signature, Value, args};
///
/// let mut rt = Runtime::new(NoLimitTracker);
/// let calc = rt
///     .define_class(ClassDef::new("Calculator").static_method(
///         "add",
///         Signature::new(["x", "y"]),
///         |_, args| args[0].add(&args[1]),
///     ))
///     .unwrap();
/// assert_eq!(rt.invoke(calc, "add", args![5, 3]).unwrap(), Value::Int(8));
/// ```
pub struct ClassDef<T: ResourceTracker> {
    name: String,
    parent: Option<ParentRef>,
    methods: IndexMap<String, MethodDescriptor<T>>,
    class_attributes: IndexMap<String, Value>,
}

impl<T: ResourceTracker> ClassDef<T> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            methods: IndexMap::new(),
            class_attributes: IndexMap::new(),
        }
    }

    /// Sets the single parent class, by id or by name.
    #[must_use]
    pub fn parent(mut self, parent: impl Into<ParentRef>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds a method. A later method with the same name replaces an earlier one.
    #[must_use]
    pub fn method(mut self, name: impl Into<String>, method: MethodDescriptor<T>) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    #[must_use]
    pub fn instance_method<F>(self, name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync + 'static,
    {
        self.method(name, MethodDescriptor::new(MethodKind::Instance, signature, body))
    }

    #[must_use]
    pub fn class_method<F>(self, name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync + 'static,
    {
        self.method(name, MethodDescriptor::new(MethodKind::Class, signature, body))
    }

    #[must_use]
    pub fn static_method<F>(self, name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync + 'static,
    {
        self.method(name, MethodDescriptor::new(MethodKind::Static, signature, body))
    }

    /// Adds a class attribute with its initial value.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.class_attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A registered class.
///
/// Everything except `class_attributes` is fixed once the class is defined.
pub struct ClassDescriptor<T: ResourceTracker> {
    name: String,
    parent: Option<ClassId>,
    /// Number of ancestors; 0 for a root class.
    depth: usize,
    methods: AHashMap<String, MethodDescriptor<T>>,
    /// Class-level attributes, shared by instances and descendants unless shadowed.
    class_attributes: IndexMap<String, Value>,
}

impl<T: ResourceTracker> ClassDescriptor<T> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<ClassId> {
        self.parent
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the method defined directly on this class, ignoring ancestors.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor<T>> {
        self.methods.get(name)
    }

    /// Names of the methods defined directly on this class, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn class_attributes(&self) -> &IndexMap<String, Value> {
        &self.class_attributes
    }

    fn estimate_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.name.len()
            + self.methods.len() * std::mem::size_of::<MethodDescriptor<T>>()
            + self.class_attributes.len() * std::mem::size_of::<Value>()
    }
}

impl<T: ResourceTracker> fmt::Debug for ClassDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("depth", &self.depth)
            .field("methods", &self.method_names())
            .field("class_attributes", &self.class_attributes)
            .finish()
    }
}

/// Stores every defined class. Entries are never removed, so a `ClassId` stays
/// valid for the registry's lifetime.
pub struct Registry<T: ResourceTracker> {
    classes: Vec<ClassDescriptor<T>>,
    /// Most recent class defined under each name.
    names: AHashMap<String, ClassId>,
}

impl<T: ResourceTracker> Default for Registry<T> {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            names: AHashMap::new(),
        }
    }
}

impl<T: ResourceTracker> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.classes).finish()
    }
}

impl<T: ResourceTracker> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class.
    ///
    /// Fails with `ParentNotFound` if the parent is named but not registered, and with
    /// `RecursionError` if the chain would exceed the tracker's inheritance depth.
    /// Redefining an existing name rebinds the name; the earlier class stays valid for
    /// handles that already refer to it.
    pub fn define(&mut self, def: ClassDef<T>, tracker: &mut T) -> RunResult<ClassId> {
        let ClassDef {
            name,
            parent,
            methods,
            class_attributes,
        } = def;

        let parent = match parent {
            None => None,
            Some(ParentRef::Id(id)) => {
                if id.index() >= self.classes.len() {
                    return Err(ErrorKind::parent_not_found(&name, ParentRef::Id(id)));
                }
                Some(id)
            }
            Some(ParentRef::Name(parent_name)) => match self.names.get(&parent_name) {
                Some(&id) => Some(id),
                None => return Err(ErrorKind::parent_not_found(&name, ParentRef::Name(parent_name))),
            },
        };
        let depth = match parent {
            Some(id) => self.classes[id.index()].depth + 1,
            None => 0,
        };
        tracker.check_inheritance_depth(depth)?;

        let descriptor = ClassDescriptor {
            name,
            parent,
            depth,
            methods: methods.into_iter().collect(),
            class_attributes,
        };
        tracker.on_allocate(|| descriptor.estimate_size())?;

        let index = u32::try_from(self.classes.len()).map_err(|_| ResourceError::Allocation {
            limit: u32::MAX as usize,
            count: self.classes.len() + 1,
        })?;
        let id = ClassId(index);
        self.names.insert(descriptor.name.clone(), id);
        self.classes.push(descriptor);
        Ok(id)
    }

    pub fn get(&self, id: ClassId) -> RunResult<&ClassDescriptor<T>> {
        self.classes.get(id.index()).ok_or_else(|| ErrorKind::class_not_found(id))
    }

    fn get_mut(&mut self, id: ClassId) -> RunResult<&mut ClassDescriptor<T>> {
        self.classes.get_mut(id.index()).ok_or_else(|| ErrorKind::class_not_found(id))
    }

    /// Looks up the class most recently defined under `name`.
    pub fn class_id(&self, name: &str) -> RunResult<ClassId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ErrorKind::class_not_found(format!("'{name}'")))
    }

    pub fn class_name(&self, id: ClassId) -> RunResult<&str> {
        Ok(self.get(id)?.name())
    }

    pub fn parent_of(&self, id: ClassId) -> RunResult<Option<ClassId>> {
        Ok(self.get(id)?.parent())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterates the chain from `id` itself up to the root.
    pub fn ancestors(&self, id: ClassId) -> RunResult<Ancestors<'_, T>> {
        let start = self.get(id)?;
        Ok(Ancestors {
            registry: self,
            next: Some(id),
            remaining: start.depth + 1,
        })
    }

    /// Checks if `class` is `ancestor` or one of its descendants.
    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> RunResult<bool> {
        self.get(ancestor)?;
        Ok(self.ancestors(class)?.any(|(id, _)| id == ancestor))
    }

    /// Resolves a method by walking the chain from `start`.
    ///
    /// Returns the class that defines the method along with a clone of its
    /// descriptor (cheap: the body is reference counted).
    pub fn resolve_method(&self, start: ClassId, name: &str) -> RunResult<(ClassId, MethodDescriptor<T>)> {
        self.find_method(start, name)?
            .ok_or_else(|| ErrorKind::method_not_found(self.classes[start.index()].name(), name))
    }

    /// Like [`Self::resolve_method`] but returns `Ok(None)` when nothing in the chain
    /// defines `name`.
    pub fn find_method(&self, start: ClassId, name: &str) -> RunResult<Option<(ClassId, MethodDescriptor<T>)>> {
        Ok(self
            .ancestors(start)?
            .find_map(|(id, class)| class.method(name).map(|method| (id, method.clone()))))
    }

    /// Returns the class attribute `name` as seen from `class`.
    ///
    /// Searches the class's own attributes, then each ancestor's. Fails with
    /// `AttributeNotFound` at the root.
    pub fn get_class_attribute(&self, class: ClassId, name: &str) -> RunResult<Value> {
        self.lookup_class_attribute(class, name)?
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ErrorKind::attribute_not_found(self.classes[class.index()].name(), name))
    }

    /// Returns the class in `class`'s chain whose own map currently supplies `name`.
    pub fn class_attribute_owner(&self, class: ClassId, name: &str) -> RunResult<ClassId> {
        self.lookup_class_attribute(class, name)?
            .map(|(owner, _)| owner)
            .ok_or_else(|| ErrorKind::attribute_not_found(self.classes[class.index()].name(), name))
    }

    pub(crate) fn lookup_class_attribute(&self, class: ClassId, name: &str) -> RunResult<Option<(ClassId, &Value)>> {
        Ok(self
            .ancestors(class)?
            .find_map(|(id, descriptor)| descriptor.class_attributes.get(name).map(|value| (id, value))))
    }

    /// Writes `name` into `class`'s own attribute map, never into an ancestor's.
    ///
    /// Returns the value previously stored directly on `class`, if any.
    pub fn set_class_attribute(&mut self, class: ClassId, name: &str, value: Value) -> RunResult<Option<Value>> {
        Ok(self.get_mut(class)?.class_attributes.insert(name.to_owned(), value))
    }
}

/// Iterator over a class and its ancestors, nearest first.
///
/// Bounded by the starting class's depth, so it always terminates.
pub struct Ancestors<'a, T: ResourceTracker> {
    registry: &'a Registry<T>,
    next: Option<ClassId>,
    remaining: usize,
}

impl<'a, T: ResourceTracker> Iterator for Ancestors<'a, T> {
    type Item = (ClassId, &'a ClassDescriptor<T>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.next?;
        let class = self.registry.classes.get(id.index())?;
        self.remaining -= 1;
        self.next = class.parent;
        Some((id, class))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
