pub(crate) mod class;
pub(crate) mod instance;

pub use class::{Ancestors, ClassDef, ClassDescriptor, ClassId, ParentRef, Registry};
pub use instance::Instance;
