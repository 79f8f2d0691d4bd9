use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{
    args::ArgValues,
    exception::RunResult,
    resource::ResourceTracker,
    runtime::Frame,
    signature::Signature,
    value::Value,
};

/// How a method is bound when it is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
pub enum MethodKind {
    /// Bound to the instance it is invoked through. Calling it through a class
    /// handle is a `TypeError`.
    Instance,
    /// Bound to the most-derived class through which dispatch started.
    Class,
    /// No implicit binding; behaves as a plain function scoped under the class.
    Static,
}

/// The callable logic of a method.
///
/// Receives the call [`Frame`] (binding plus access back into the runtime) and the
/// arguments after default-filling, so `args.len()` always equals the signature's
/// parameter count.
pub type MethodBody<T> = Arc<dyn Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync>;

/// A method as stored in a class's method table.
///
/// Created once when the class is defined; the signature's defaults are literal
/// values captured at that point.
pub struct MethodDescriptor<T: ResourceTracker> {
    kind: MethodKind,
    signature: Signature,
    body: MethodBody<T>,
}

impl<T: ResourceTracker> MethodDescriptor<T> {
    pub fn new<F>(kind: MethodKind, signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync + 'static,
    {
        Self {
            kind,
            signature,
            body: Arc::new(body),
        }
    }

    /// An instance-bound method.
    pub fn instance<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync + 'static,
    {
        Self::new(MethodKind::Instance, signature, body)
    }

    /// A class-bound method.
    pub fn class<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync + 'static,
    {
        Self::new(MethodKind::Class, signature, body)
    }

    /// An unbound (static) method.
    pub fn static_method<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Frame<'_, T>, ArgValues) -> RunResult<Value> + Send + Sync + 'static,
    {
        Self::new(MethodKind::Static, signature, body)
    }

    #[must_use]
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn body(&self) -> &MethodBody<T> {
        &self.body
    }
}

impl<T: ResourceTracker> Clone for MethodDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            signature: self.signature.clone(),
            body: Arc::clone(&self.body),
        }
    }
}

impl<T: ResourceTracker> fmt::Debug for MethodDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("kind", &self.kind)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
