use std::{
    fmt,
    time::{Duration, Instant},
};

/// Error returned when a resource limit is exceeded.
///
/// Converted into a [`RunError`](crate::RunError) with a `MemoryError`, `TimeoutError`
/// or `RecursionError` kind when it crosses the public API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum number of dispatched calls exceeded.
    Operation { limit: usize, count: usize },
    /// Maximum execution time exceeded.
    Time { limit: Duration, elapsed: Duration },
    /// Maximum memory usage exceeded.
    Memory { limit: usize, used: usize },
    /// Maximum dispatch nesting depth exceeded.
    Recursion { limit: usize, depth: usize },
    /// Maximum length of a single inheritance chain exceeded.
    Inheritance { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Operation { limit, count } => {
                write!(f, "operation limit exceeded: {count} > {limit}")
            }
            Self::Time { limit, elapsed } => {
                write!(f, "time limit exceeded: {elapsed:?} > {limit:?}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::Recursion { .. } => {
                write!(f, "maximum recursion depth exceeded")
            }
            Self::Inheritance { limit, depth } => {
                write!(f, "inheritance chain too deep: {depth} > {limit}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Trait for tracking resource usage of a [`Runtime`](crate::Runtime).
///
/// Implementations can enforce limits on allocations, dispatched calls, time and memory.
/// The runtime is generic over its tracker, so [`NoLimitTracker`] compiles the checks
/// down to almost nothing.
pub trait ResourceTracker: fmt::Debug + Send + 'static {
    /// Called before each instance or class allocation.
    ///
    /// Returns `Ok(())` if the allocation should proceed, or `Err(ResourceError)`
    /// if a limit would be exceeded.
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError>;

    /// Called before a new key is inserted into an existing attribute map.
    ///
    /// Counts against the allocation budget so attribute maps cannot grow without bound.
    /// `get_size` is the size of the new entry; it is released again with the instance.
    fn on_container_insert(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        self.on_allocate(get_size)
    }

    /// Called when an instance is released.
    fn on_free(&mut self, get_size: impl FnOnce() -> usize);

    /// Called once per dispatched call to check operation and time limits.
    fn check_time(&mut self) -> Result<(), ResourceError>;

    /// Called before entering a method body.
    ///
    /// # Arguments
    /// * `current_depth` - Current dispatch depth (before the new call is entered)
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;

    /// Called when a class is defined with the depth its new descriptor would have.
    ///
    /// The root of a chain has depth 0, so `depth` is the number of ancestors.
    fn check_inheritance_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth > MAX_INHERITANCE_DEPTH {
            Err(ResourceError::Inheritance {
                limit: MAX_INHERITANCE_DEPTH,
                depth,
            })
        } else {
            Ok(())
        }
    }

    /// Returns the total number of allocations tracked, if this tracker records them.
    fn allocation_count(&self) -> Option<usize> {
        None
    }

    /// Returns the current approximate memory usage in bytes, if tracked.
    fn current_memory_bytes(&self) -> Option<usize> {
        None
    }
}

/// A tracker that enforces nothing except the default recursion limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self, _get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_container_insert(&mut self, _get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_free(&mut self, _get_size: impl FnOnce() -> usize) {}

    #[inline]
    fn check_time(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Enforces the default depth of 1000 so runaway recursion through `invoke`
    /// surfaces as an error instead of overflowing the native stack.
    #[inline]
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if current_depth >= DEFAULT_MAX_RECURSION_DEPTH {
            Err(ResourceError::Recursion {
                limit: DEFAULT_MAX_RECURSION_DEPTH,
                depth: current_depth + 1,
            })
        } else {
            Ok(())
        }
    }
}

/// Configuration for resource limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Use `ResourceLimits::default()` for no limits, or build custom limits
/// with the builder pattern. Serializable so hosts can keep limits in a config file.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum number of dispatched calls.
    pub max_operations: Option<usize>,
    /// Maximum number of allocations (instances, classes and new attribute slots).
    pub max_allocations: Option<usize>,
    /// Maximum execution time.
    pub max_duration: Option<Duration>,
    /// Maximum approximate memory in bytes.
    pub max_memory: Option<usize>,
    /// Maximum dispatch nesting depth.
    pub max_recursion_depth: Option<usize>,
    /// Maximum number of ancestors a class may have.
    pub max_inheritance_depth: Option<usize>,
}

/// Recommended maximum dispatch depth if not otherwise specified.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Maximum depth of single-path inheritance chains.
///
/// Bounds every chain walk. A limit of 1000 matches the default recursion limit
/// and is sufficient for any practical class hierarchy.
pub const MAX_INHERITANCE_DEPTH: usize = 1000;

/// Maximum nesting depth when rendering or exporting values.
///
/// Instances can reference each other through their attributes, so traversal
/// needs a bound to terminate on cycles.
pub const MAX_DATA_RECURSION_DEPTH: u16 = 200;

impl ResourceLimits {
    /// Creates limits with everything disabled except max recursion, which is set to 1000.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
            ..Default::default()
        }
    }

    /// Sets the maximum number of allocations.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum number of dispatched calls.
    #[must_use]
    pub fn max_operations(mut self, limit: usize) -> Self {
        self.max_operations = Some(limit);
        self
    }

    /// Sets the maximum execution duration.
    #[must_use]
    pub fn max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    /// Sets the maximum memory usage in bytes.
    #[must_use]
    pub fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    /// Sets the maximum dispatch depth.
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: Option<usize>) -> Self {
        self.max_recursion_depth = limit;
        self
    }

    /// Sets the maximum number of ancestors a class may have.
    #[must_use]
    pub fn max_inheritance_depth(mut self, limit: usize) -> Self {
        self.max_inheritance_depth = Some(limit);
        self
    }
}

/// A resource tracker that enforces configurable limits.
///
/// Tracks allocation count, memory usage, dispatched calls and execution time,
/// returning errors when limits are exceeded.
#[derive(Debug)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    /// When execution started (for time limit checking).
    start_time: Instant,
    /// Total number of allocations made.
    allocation_count: usize,
    /// Number of dispatched calls.
    operation_count: usize,
    /// Current approximate memory usage in bytes.
    current_memory: usize,
}

impl LimitedTracker {
    /// Creates a new LimitedTracker with the given limits.
    ///
    /// The start time is recorded when the tracker is created, so create
    /// it immediately before starting execution.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            start_time: Instant::now(),
            allocation_count: 0,
            operation_count: 0,
            current_memory: 0,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Returns the number of dispatched calls so far.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    /// Returns the elapsed time since tracker creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.allocation_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.allocation_count + 1,
            });
        }

        let size = get_size();
        if let Some(max) = self.limits.max_memory {
            let new_memory = self.current_memory + size;
            if new_memory > max {
                return Err(ResourceError::Memory {
                    limit: max,
                    used: new_memory,
                });
            }
        }

        self.allocation_count += 1;
        self.current_memory += size;
        Ok(())
    }

    fn on_free(&mut self, get_size: impl FnOnce() -> usize) {
        self.current_memory = self.current_memory.saturating_sub(get_size());
    }

    fn check_time(&mut self) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_operations {
            self.operation_count += 1;
            if self.operation_count > max {
                return Err(ResourceError::Operation {
                    limit: max,
                    count: self.operation_count,
                });
            }
        }

        if let Some(max) = self.limits.max_duration {
            let elapsed = self.start_time.elapsed();
            if elapsed > max {
                return Err(ResourceError::Time { limit: max, elapsed });
            }
        }
        Ok(())
    }

    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_recursion_depth {
            // current_depth is before entry, so new depth would be current_depth + 1
            if current_depth >= max {
                return Err(ResourceError::Recursion {
                    limit: max,
                    depth: current_depth + 1,
                });
            }
        }
        Ok(())
    }

    fn check_inheritance_depth(&self, depth: usize) -> Result<(), ResourceError> {
        let limit = self.limits.max_inheritance_depth.unwrap_or(MAX_INHERITANCE_DEPTH);
        if depth > limit {
            Err(ResourceError::Inheritance { limit, depth })
        } else {
            Ok(())
        }
    }

    fn allocation_count(&self) -> Option<usize> {
        Some(self.allocation_count)
    }

    fn current_memory_bytes(&self) -> Option<usize> {
        Some(self.current_memory)
    }
}
