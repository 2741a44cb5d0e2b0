use serde::{Deserialize, Serialize};

/// Maximum length of a computed MRO.
///
/// Guards against pathological hierarchies producing huge linearizations.
pub const DEFAULT_MAX_MRO_LENGTH: usize = 2600;

/// Maximum depth of any base class linearization fed into a C3 merge.
pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 1000;

/// Maximum nesting of native calls (descriptors, hooks, `__init__`).
///
/// A `__getattr__` hook that reads another missing attribute on `self` recurses
/// forever; this turns that into a `RecursionError`. Each hook level costs two
/// guarded calls (the bound method and the function it wraps).
///
/// Lower in debug mode to avoid stack overflow (debug builds use more stack
/// space per call frame).
#[cfg(debug_assertions)]
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 100;
#[cfg(not(debug_assertions))]
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 500;

/// Configurable limits for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_mro_length: usize,
    pub max_inheritance_depth: usize,
    pub max_recursion_depth: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_mro_length: DEFAULT_MAX_MRO_LENGTH,
            max_inheritance_depth: DEFAULT_MAX_INHERITANCE_DEPTH,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ResourceLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_mro_length(mut self, limit: usize) -> Self {
        self.max_mro_length = limit;
        self
    }

    #[must_use]
    pub fn max_inheritance_depth(mut self, limit: usize) -> Self {
        self.max_inheritance_depth = limit;
        self
    }

    #[must_use]
    pub fn max_recursion_depth(mut self, limit: usize) -> Self {
        self.max_recursion_depth = limit;
        self
    }
}
