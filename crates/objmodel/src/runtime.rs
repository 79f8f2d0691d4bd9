//! The runtime: class registry, instance store and dispatcher behind one handle.
//!
//! # Dispatch
//!
//! Every call goes through the same steps:
//!
//! 1. Resolve the effective class of the target (an instance's owner class, or the
//!    class handle itself).
//! 2. Walk the chain from that class to find the method.
//! 3. Check the binding: instance-bound methods need an instance target.
//! 4. Bind arguments, filling omitted trailing parameters from their defaults.
//! 5. Charge the tracker (operation count, deadline, nesting depth) and run the body
//!    with a [`Frame`] describing the binding.
//!
//! Class-bound methods always receive the class dispatch started from, never the
//! class that happens to define the body. Parent delegation ([`Frame::super_invoke`])
//! resolves above the *defining* class but keeps that starting binding.

use std::{any::Any, sync::Arc};

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    args::ArgValues,
    exception::{ErrorKind, RunError, RunResult},
    function::{MethodDescriptor, MethodKind},
    heap::{Heap, HeapStats, InstanceId},
    object::Object,
    resource::{MAX_DATA_RECURSION_DEPTH, ResourceTracker},
    tracer::{DispatchTracer, NoopTracer},
    types::{ClassDef, ClassId, Instance, Registry},
    value::Value,
};

/// Name of the method run on a fresh instance by [`Runtime::construct`].
pub const INITIALIZER: &str = "__init__";

/// Name of the method [`Runtime::display`] calls to render an instance.
pub const DISPLAY_HOOK: &str = "__str__";

/// Name of the method [`Runtime::equals`] calls to compare two instances.
pub const EQUALITY_HOOK: &str = "__eq__";

/// The handle a dispatch starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Instance(InstanceId),
    Class(ClassId),
}

impl From<InstanceId> for Target {
    fn from(id: InstanceId) -> Self {
        Self::Instance(id)
    }
}

impl From<ClassId> for Target {
    fn from(id: ClassId) -> Self {
        Self::Class(id)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        match target {
            Target::Instance(id) => Self::Instance(id),
            Target::Class(id) => Self::Class(id),
        }
    }
}

impl TryFrom<&Value> for Target {
    type Error = RunError;

    fn try_from(value: &Value) -> RunResult<Self> {
        match value {
            Value::Instance(id) => Ok(Self::Instance(*id)),
            Value::Class(id) => Ok(Self::Class(*id)),
            other => Err(ErrorKind::type_error(format!(
                "cannot call methods on a value of type {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for Target {
    type Error = RunError;

    fn try_from(value: Value) -> RunResult<Self> {
        Self::try_from(&value)
    }
}

/// An object model instance: classes, instances and everything needed to call
/// methods on them.
///
/// Generic over the resource tracker so the unlimited case costs nothing. Every
/// mutating operation takes `&mut self`; a multi-threaded host wraps the runtime
/// in a `Mutex` (it is `Send`).
#[derive(Debug)]
pub struct Runtime<T: ResourceTracker> {
    registry: Registry<T>,
    heap: Heap<T>,
    tracer: Box<dyn DispatchTracer>,
    /// Number of method bodies currently executing.
    depth: usize,
}

impl<T: ResourceTracker> Runtime<T> {
    /// Creates an empty runtime that charges `tracker` for its work.
    #[must_use]
    pub fn new(tracker: T) -> Self {
        Self {
            registry: Registry::new(),
            heap: Heap::new(tracker),
            tracer: Box::new(NoopTracer),
            depth: 0,
        }
    }

    /// Replaces the dispatch tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: impl DispatchTracer) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    /// Swaps in a new tracer and returns the previous one.
    pub fn replace_tracer(&mut self, tracer: Box<dyn DispatchTracer>) -> Box<dyn DispatchTracer> {
        std::mem::replace(&mut self.tracer, tracer)
    }

    #[must_use]
    pub fn tracer(&self) -> &dyn DispatchTracer {
        self.tracer.as_ref()
    }

    /// Returns the tracer as its concrete type, if it is a `U`.
    ///
    /// ```
    /// use objmodel::{NoLimitTracker, ProfilingTracer, Runtime};
    ///
    /// let rt = Runtime::new(NoLimitTracker).with_tracer(ProfilingTracer::new());
    /// let report = rt.tracer_as::<ProfilingTracer>().unwrap().report();
    /// assert_eq!(report.total_calls, 0);
    /// ```
    #[must_use]
    pub fn tracer_as<U: Any>(&self) -> Option<&U> {
        self.tracer.as_any().downcast_ref::<U>()
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        self.heap.tracker()
    }

    #[must_use]
    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// Number of method bodies currently executing.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    // ------------------------------------------------------------------
    // classes
    // ------------------------------------------------------------------

    /// Registers a class and returns its handle.
    ///
    /// # Errors
    /// `ParentNotFound` if the named parent is not registered, `RecursionError` if the
    /// chain would be too deep, `MemoryError` if the tracker refuses the allocation.
    pub fn define_class(&mut self, def: ClassDef<T>) -> RunResult<ClassId> {
        let id = self.registry.define(def, self.heap.tracker_mut())?;
        let class = self.registry.get(id)?;
        self.tracer.on_define_class(class.name(), class.depth());
        Ok(id)
    }

    /// Looks up the class most recently defined under `name`.
    pub fn class_id(&self, name: &str) -> RunResult<ClassId> {
        self.registry.class_id(name)
    }

    pub fn class_name(&self, class: ClassId) -> RunResult<&str> {
        self.registry.class_name(class)
    }

    /// Checks if `class` is `ancestor` or derives from it.
    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> RunResult<bool> {
        self.registry.is_subclass(class, ancestor)
    }

    /// Reads a class attribute, walking up from `class`.
    pub fn get_class_attribute(&self, class: ClassId, name: &str) -> RunResult<Value> {
        self.registry.get_class_attribute(class, name)
    }

    /// Writes a class attribute into `class`'s own map.
    ///
    /// The write is visible through every instance of `class` and of its descendants
    /// that do not shadow `name`. Ancestors are never touched.
    pub fn set_class_attribute(&mut self, class: ClassId, name: &str, value: impl Into<Value>) -> RunResult<()> {
        let descriptor = self.registry.get(class)?;
        if !descriptor.class_attributes().contains_key(name) {
            self.heap
                .tracker_mut()
                .on_container_insert(|| name.len() + std::mem::size_of::<Value>())?;
        }
        self.registry.set_class_attribute(class, name, value.into())?;
        self.tracer.on_class_attr_write(self.registry.class_name(class)?, name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // instances
    // ------------------------------------------------------------------

    /// Creates an instance of `class` and runs its initializer with `args`.
    ///
    /// The initializer is resolved through the chain like any other method. If none
    /// exists, only an empty argument list is accepted. If the initializer fails the
    /// instance is released before the error is returned.
    pub fn construct(&mut self, class: ClassId, args: impl Into<ArgValues>) -> RunResult<InstanceId> {
        let args = args.into();
        let initializer = self.registry.find_method(class, INITIALIZER)?;
        if initializer.is_none() && !args.is_empty() {
            return Err(ErrorKind::ArityMismatch.msg(format!(
                "{}() takes no arguments",
                self.registry.class_name(class)?
            )));
        }

        let id = self.heap.allocate(Instance::new(class))?;
        self.tracer.on_construct(self.registry.class_name(class)?);

        if let Some((defining, method)) = initializer
            && let Err(err) = self.call_method(Target::Instance(id), class, defining, &method, INITIALIZER, args)
        {
            // the body may already have released it
            if self.heap.get(id).is_ok() {
                self.release(id)?;
            }
            return Err(err);
        }
        Ok(id)
    }

    /// Releases an instance. Its handle, and every copy of it, becomes stale.
    pub fn release(&mut self, instance: InstanceId) -> RunResult<()> {
        let freed = self.heap.free(instance)?;
        self.tracer.on_release(self.registry.class_name(freed.owner_class())?);
        Ok(())
    }

    pub fn class_of(&self, instance: InstanceId) -> RunResult<ClassId> {
        Ok(self.heap.get(instance)?.owner_class())
    }

    /// Checks if `value` is an instance of `class` or of one of its descendants.
    pub fn is_instance(&self, value: &Value, class: ClassId) -> RunResult<bool> {
        match value {
            Value::Instance(id) => self.registry.is_subclass(self.class_of(*id)?, class),
            _ => Ok(false),
        }
    }

    /// Reads an attribute as seen through an instance.
    ///
    /// The instance's own attributes win; otherwise the class attribute is resolved
    /// starting from the owner class.
    pub fn get_attr(&self, instance: InstanceId, name: &str) -> RunResult<Value> {
        let object = self.heap.get(instance)?;
        if let Some(value) = object.get_attr(name) {
            return Ok(value.clone());
        }
        let class = object.owner_class();
        match self.registry.lookup_class_attribute(class, name)? {
            Some((_, value)) => Ok(value.clone()),
            None => Err(ErrorKind::attribute_not_found(self.registry.class_name(class)?, name)),
        }
    }

    /// Writes an instance attribute. Class state is never touched, so this creates a
    /// shadow when a class attribute of the same name exists.
    pub fn set_attr(&mut self, instance: InstanceId, name: &str, value: impl Into<Value>) -> RunResult<()> {
        self.heap.set_attr(instance, name, value.into())
    }

    /// Checks if `name` resolves through the instance or its class chain.
    pub fn has_attr(&self, instance: InstanceId, name: &str) -> RunResult<bool> {
        let object = self.heap.get(instance)?;
        if object.get_attr(name).is_some() {
            return Ok(true);
        }
        Ok(self
            .registry
            .lookup_class_attribute(object.owner_class(), name)?
            .is_some())
    }

    /// Snapshot of the instance's own attributes, in assignment order.
    pub fn instance_attributes(&self, instance: InstanceId) -> RunResult<IndexMap<String, Value>> {
        Ok(self.heap.get(instance)?.attributes().clone())
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    // ------------------------------------------------------------------
    // dispatch
    // ------------------------------------------------------------------

    /// Resolves `name` for a target without calling it.
    ///
    /// Returns the class that defines the method and its descriptor.
    pub fn resolve_method(
        &self,
        target: impl Into<Target>,
        name: &str,
    ) -> RunResult<(ClassId, MethodDescriptor<T>)> {
        let start = self.effective_class(target.into())?;
        self.registry.resolve_method(start, name)
    }

    /// Calls method `name` on an instance or class.
    ///
    /// # Errors
    /// - `MethodNotFound` if nothing in the chain defines `name`
    /// - `TypeError` for an instance-bound method invoked through a class handle
    /// - `ArityMismatch` if the arguments cannot be bound to the signature
    /// - any error the body returns
    pub fn invoke(&mut self, target: impl Into<Target>, name: &str, args: impl Into<ArgValues>) -> RunResult<Value> {
        let target = target.into();
        let start = self.effective_class(target)?;
        let (defining, method) = self.registry.resolve_method(start, name)?;
        self.call_method(target, start, defining, &method, name, args.into())
    }

    fn effective_class(&self, target: Target) -> RunResult<ClassId> {
        match target {
            Target::Instance(id) => self.class_of(id),
            Target::Class(id) => {
                self.registry.get(id)?;
                Ok(id)
            }
        }
    }

    /// Binds and runs a resolved method.
    ///
    /// `start` is the class dispatch started from; `defining` is where `method` lives.
    fn call_method(
        &mut self,
        target: Target,
        start: ClassId,
        defining: ClassId,
        method: &MethodDescriptor<T>,
        name: &str,
        args: ArgValues,
    ) -> RunResult<Value> {
        let kind = method.kind();
        if kind == MethodKind::Instance && matches!(target, Target::Class(_)) {
            return Err(ErrorKind::type_error(format!(
                "{name}() needs an instance of '{}', got the class",
                self.registry.class_name(start)?
            )));
        }
        let args = method.signature().bind(args, name)?;

        let tracker = self.heap.tracker_mut();
        tracker.check_time()?;
        tracker.check_recursion_depth(self.depth)?;

        let class_name = self.registry.class_name(start)?;
        self.depth += 1;
        self.tracer.on_call(class_name, name, kind, self.depth);

        let body = Arc::clone(method.body());
        let mut frame = Frame {
            runtime: self,
            target,
            start,
            defining_class: defining,
            kind,
            method: name,
        };
        let result = body(&mut frame, args);

        self.depth -= 1;
        self.tracer.on_return(self.depth);
        result
    }

    // ------------------------------------------------------------------
    // protocol hooks
    // ------------------------------------------------------------------

    /// Renders a value as text.
    ///
    /// Instances use their `__str__` method when one resolves (it must return a
    /// string), and `<Name object>` otherwise. Classes render as `<class 'Name'>`.
    /// Instances nested in containers are rendered the same way.
    pub fn display(&mut self, value: &Value) -> RunResult<String> {
        let mut out = String::new();
        self.display_into(value, &mut out, false, 0)?;
        Ok(out)
    }

    fn display_into(&mut self, value: &Value, out: &mut String, quoted: bool, depth: u16) -> RunResult<()> {
        if depth > MAX_DATA_RECURSION_DEPTH {
            out.push_str("...");
            return Ok(());
        }
        match value {
            Value::Instance(id) => {
                let text = self.display_instance(*id)?;
                out.push_str(&text);
            }
            Value::Class(id) => {
                out.push_str("<class '");
                out.push_str(self.registry.class_name(*id)?);
                out.push_str("'>");
            }
            Value::Str(s) if quoted => {
                out.push('\'');
                out.push_str(&s.replace('\'', "\\'"));
                out.push('\'');
            }
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.display_into(item, out, true, depth + 1)?;
                }
                out.push(']');
            }
            Value::Dict(map) => {
                out.push('{');
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push('\'');
                    out.push_str(key);
                    out.push_str("': ");
                    self.display_into(item, out, true, depth + 1)?;
                }
                out.push('}');
            }
            scalar => out.push_str(&scalar.to_string()),
        }
        Ok(())
    }

    fn display_instance(&mut self, id: InstanceId) -> RunResult<String> {
        let class = self.class_of(id)?;
        match self.registry.find_method(class, DISPLAY_HOOK)? {
            Some((defining, method)) => {
                match self.call_method(Target::Instance(id), class, defining, &method, DISPLAY_HOOK, ArgValues::new())? {
                    Value::Str(text) => Ok(text),
                    other => Err(ErrorKind::type_error(format!(
                        "{DISPLAY_HOOK} returned non-string (type {})",
                        other.type_name()
                    ))),
                }
            }
            None => Ok(format!("<{} object>", self.registry.class_name(class)?)),
        }
    }

    /// Compares two values.
    ///
    /// Two instances are compared with `a`'s `__eq__` method when one resolves, and by
    /// identity otherwise. Everything else compares structurally, with instances
    /// nested in containers compared by identity.
    pub fn equals(&mut self, a: &Value, b: &Value) -> RunResult<bool> {
        let (Value::Instance(left), Value::Instance(_)) = (a, b) else {
            return Ok(a == b);
        };
        let class = self.class_of(*left)?;
        match self.registry.find_method(class, EQUALITY_HOOK)? {
            Some((defining, method)) => {
                let result = self.call_method(
                    Target::Instance(*left),
                    class,
                    defining,
                    &method,
                    EQUALITY_HOOK,
                    ArgValues::from(b.clone()),
                )?;
                Ok(result.is_truthy())
            }
            None => Ok(a == b),
        }
    }

    /// Copies a value out of the runtime.
    ///
    /// Instances become [`Object::Instance`] records holding their class name and
    /// their own attributes. An instance reached again while it is still being
    /// exported becomes [`Object::Cycle`].
    ///
    /// # Errors
    /// `RecursionError` if values nest deeper than [`MAX_DATA_RECURSION_DEPTH`], for
    /// example a long linked list of instances.
    pub fn export(&self, value: &Value) -> RunResult<Object> {
        let mut visited = AHashSet::new();
        self.export_inner(value, &mut visited, 0)
    }

    fn export_inner(&self, value: &Value, visited: &mut AHashSet<InstanceId>, depth: u16) -> RunResult<Object> {
        if depth > MAX_DATA_RECURSION_DEPTH {
            return Err(ErrorKind::RecursionError.msg(format!(
                "maximum data depth exceeded while exporting ({MAX_DATA_RECURSION_DEPTH} levels)"
            )));
        }
        Ok(match value {
            Value::None => Object::None,
            Value::Bool(b) => Object::Bool(*b),
            Value::Int(i) => Object::Int(*i),
            Value::Float(f) => Object::Float(*f),
            Value::Str(s) => Object::Str(s.clone()),
            Value::List(items) => Object::List(
                items
                    .iter()
                    .map(|item| self.export_inner(item, visited, depth + 1))
                    .collect::<RunResult<_>>()?,
            ),
            Value::Dict(map) => Object::Dict(self.export_map(map, visited, depth + 1)?),
            Value::Class(id) => Object::Class(self.registry.class_name(*id)?.to_owned()),
            Value::Instance(id) => {
                let instance = self.heap.get(*id)?;
                let class = self.registry.class_name(instance.owner_class())?.to_owned();
                if !visited.insert(*id) {
                    return Ok(Object::Cycle(class));
                }
                let attributes = self.export_map(instance.attributes(), visited, depth + 1)?;
                visited.remove(id);
                Object::Instance { class, attributes }
            }
        })
    }

    fn export_map(
        &self,
        map: &IndexMap<String, Value>,
        visited: &mut AHashSet<InstanceId>,
        depth: u16,
    ) -> RunResult<IndexMap<String, Object>> {
        map.iter()
            .map(|(key, value)| Ok((key.clone(), self.export_inner(value, visited, depth)?)))
            .collect()
    }
}

/// The call context a method body receives.
///
/// Describes the binding (the instance or class the method was invoked through) and
/// gives the body access back into the runtime.
#[derive(Debug)]
pub struct Frame<'a, T: ResourceTracker> {
    runtime: &'a mut Runtime<T>,
    target: Target,
    /// Class dispatch started from: the instance's owner class or the class handle.
    start: ClassId,
    /// Class whose method table holds the executing body.
    defining_class: ClassId,
    kind: MethodKind,
    method: &'a str,
}

impl<T: ResourceTracker> Frame<'_, T> {
    /// The bound instance.
    ///
    /// # Errors
    /// `TypeError` unless the executing method is instance-bound.
    pub fn this(&self) -> RunResult<InstanceId> {
        match (self.kind, self.target) {
            (MethodKind::Instance, Target::Instance(id)) => Ok(id),
            _ => Err(ErrorKind::type_error(format!(
                "{}() is a {} method and has no bound instance",
                self.method,
                self.kind_name()
            ))),
        }
    }

    /// The bound class: the most-derived class dispatch started from.
    ///
    /// Available to instance-bound methods too (it is the instance's owner class).
    ///
    /// # Errors
    /// `TypeError` for static methods, which have no binding.
    pub fn cls(&self) -> RunResult<ClassId> {
        match self.kind {
            MethodKind::Static => Err(ErrorKind::type_error(format!(
                "{}() is a static method and has no bound class",
                self.method
            ))),
            MethodKind::Instance | MethodKind::Class => Ok(self.start),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            MethodKind::Instance => "instance",
            MethodKind::Class => "class",
            MethodKind::Static => "static",
        }
    }

    /// The handle the method was invoked through.
    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    #[must_use]
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// The class whose method table holds the executing body.
    #[must_use]
    pub fn defining_class(&self) -> ClassId {
        self.defining_class
    }

    #[must_use]
    pub fn method_name(&self) -> &str {
        self.method
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime<T> {
        &*self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime<T> {
        &mut *self.runtime
    }

    /// Reads an attribute through the bound instance.
    pub fn get(&self, name: &str) -> RunResult<Value> {
        self.runtime.get_attr(self.this()?, name)
    }

    /// Writes an attribute on the bound instance.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> RunResult<()> {
        let this = self.this()?;
        self.runtime.set_attr(this, name, value)
    }

    /// Reads a class attribute as seen from the bound class.
    pub fn class_attr(&self, name: &str) -> RunResult<Value> {
        self.runtime.get_class_attribute(self.cls()?, name)
    }

    pub fn get_class_attribute(&self, class: ClassId, name: &str) -> RunResult<Value> {
        self.runtime.get_class_attribute(class, name)
    }

    pub fn set_class_attribute(&mut self, class: ClassId, name: &str, value: impl Into<Value>) -> RunResult<()> {
        self.runtime.set_class_attribute(class, name, value)
    }

    pub fn class_id(&self, name: &str) -> RunResult<ClassId> {
        self.runtime.class_id(name)
    }

    pub fn construct(&mut self, class: ClassId, args: impl Into<ArgValues>) -> RunResult<InstanceId> {
        self.runtime.construct(class, args)
    }

    pub fn invoke(&mut self, target: impl Into<Target>, name: &str, args: impl Into<ArgValues>) -> RunResult<Value> {
        self.runtime.invoke(target, name, args)
    }

    pub fn display(&mut self, value: &Value) -> RunResult<String> {
        self.runtime.display(value)
    }

    pub fn equals(&mut self, a: &Value, b: &Value) -> RunResult<bool> {
        self.runtime.equals(a, b)
    }

    /// Calls `name` as defined above the class that defines the executing body.
    ///
    /// The binding is kept: the same instance, or the same most-derived class for
    /// class-bound methods.
    ///
    /// # Errors
    /// `MethodNotFound` if the defining class has no parent or nothing above it
    /// defines `name`.
    pub fn super_invoke(&mut self, name: &str, args: impl Into<ArgValues>) -> RunResult<Value> {
        let registry = &self.runtime.registry;
        let defining = registry.get(self.defining_class)?;
        let Some(parent) = defining.parent() else {
            return Err(ErrorKind::MethodNotFound.msg(format!(
                "'{}' has no parent to delegate '{name}' to",
                defining.name()
            )));
        };
        let (owner, method) = registry.resolve_method(parent, name)?;
        self.runtime.tracer.on_super(defining.name(), name);
        self.runtime
            .call_method(self.target, self.start, owner, &method, name, args.into())
    }
}
