use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

// Handle
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// The "no handle" sentinel. Never allocated.
    pub const NONE: Handle = Handle(0);

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Hosts that only speak doubles pass handles back as `f64`. Anything that
    /// is not a non-negative whole number maps to `NONE`.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value < 1.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
            return Self::NONE;
        }
        Handle(value as u64)
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64
    }
}

impl From<u64> for Handle {
    fn from(value: u64) -> Self {
        Handle(value)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly increasing handle source. Starts above `Handle::NONE` and never
/// hands out the same value twice.
pub struct HandleGenerator {
    next: AtomicU64,
}

impl Default for HandleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn generate(&self) -> Handle {
        Handle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
