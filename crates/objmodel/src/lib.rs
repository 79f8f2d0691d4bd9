#![doc = include_str!("../../../README.md")]
mod args;
mod exception;
mod function;
mod heap;
mod object;
mod resource;
mod runtime;
mod signature;
mod tracer;
mod types;
mod value;

pub use crate::{
    args::ArgValues,
    exception::{ErrorKind, RunError, RunResult},
    function::{MethodBody, MethodDescriptor, MethodKind},
    heap::{HeapStats, InstanceId},
    object::Object,
    resource::{
        DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, MAX_DATA_RECURSION_DEPTH, MAX_INHERITANCE_DEPTH, NoLimitTracker,
        ResourceError, ResourceLimits, ResourceTracker,
    },
    runtime::{DISPLAY_HOOK, EQUALITY_HOOK, Frame, INITIALIZER, Runtime, Target},
    signature::Signature,
    tracer::{DispatchTracer, NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent},
    types::{Ancestors, ClassDef, ClassDescriptor, ClassId, Instance, ParentRef, Registry},
    value::Value,
};
