//! Pool configuration.

use std::time::Duration;

/// Default cap on idle resources retained per key.
pub const DEFAULT_MAX_IDLE_PER_KEY: usize = 8;

/// How long a blocking borrow may wait for capacity.
///
/// Only consulted when [`PoolConfig::block_when_exhausted`] is set;
/// with blocking disabled an exhausted borrow always fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxWait {
    /// Do not wait: an exhausted borrow fails immediately.
    Immediate,
    /// Wait without bound until capacity frees up or the borrow is
    /// cancelled.
    Unbounded,
    /// Wait up to the given duration, measured against a monotonic
    /// clock from borrow entry.
    Bounded(Duration),
}

impl MaxWait {
    /// Interpret a signed-milliseconds wait value.
    ///
    /// Follows the convention used by older pool implementations:
    /// zero means fail fast, negative means wait without bound, and a
    /// positive value is a bounded wait in milliseconds.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            0 => Self::Immediate,
            m if m < 0 => Self::Unbounded,
            m => Self::Bounded(Duration::from_millis(m as u64)),
        }
    }
}

impl Default for MaxWait {
    fn default() -> Self {
        Self::Unbounded
    }
}

/// Configuration for a [`KeyedPool`](crate::KeyedPool).
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Whether an exhausted borrow waits for capacity or fails fast.
    pub block_when_exhausted: bool,

    /// Bound on a blocking borrow's wait.
    pub max_wait: MaxWait,

    /// Maximum idle resources retained per key; returns beyond this
    /// cap destroy the resource instead of pooling it.
    pub max_idle_per_key: usize,

    /// Maximum active (borrowed) resources per key. `None` means
    /// unbounded.
    pub max_total_per_key: Option<usize>,

    /// Maximum live resources (idle + active) across all keys. `None`
    /// means unbounded.
    pub max_total: Option<usize>,

    /// Whether idle resources are re-validated through the factory
    /// before reuse.
    pub test_on_borrow: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            block_when_exhausted: true,
            max_wait: MaxWait::default(),
            max_idle_per_key: DEFAULT_MAX_IDLE_PER_KEY,
            max_total_per_key: None,
            max_total: None,
            test_on_borrow: true,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable blocking when the pool is exhausted.
    #[must_use]
    pub fn block_when_exhausted(mut self, enabled: bool) -> Self {
        self.block_when_exhausted = enabled;
        self
    }

    /// Set the bound on a blocking borrow's wait.
    #[must_use]
    pub fn max_wait(mut self, max_wait: MaxWait) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the idle-resource cap per key.
    #[must_use]
    pub fn max_idle_per_key(mut self, count: usize) -> Self {
        self.max_idle_per_key = count;
        self
    }

    /// Set the active-resource cap per key, or `None` for unbounded.
    #[must_use]
    pub fn max_total_per_key(mut self, count: impl Into<Option<usize>>) -> Self {
        self.max_total_per_key = count.into();
        self
    }

    /// Set the global live-resource cap, or `None` for unbounded.
    #[must_use]
    pub fn max_total(mut self, count: impl Into<Option<usize>>) -> Self {
        self.max_total = count.into();
        self
    }

    /// Enable or disable idle-resource validation on borrow.
    #[must_use]
    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), crate::error::PoolError> {
        if self.max_total == Some(0) {
            return Err(crate::error::PoolError::Configuration(
                "max_total must be greater than 0 when set".into(),
            ));
        }
        if self.max_total_per_key == Some(0) {
            return Err(crate::error::PoolError::Configuration(
                "max_total_per_key must be greater than 0 when set".into(),
            ));
        }
        if self.max_wait == MaxWait::Bounded(Duration::ZERO) {
            return Err(crate::error::PoolError::Configuration(
                "bounded max_wait must be non-zero; use MaxWait::Immediate".into(),
            ));
        }
        Ok(())
    }
}
