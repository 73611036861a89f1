//! Runtime configuration.

/// What the hook engine does when a hook slot holds a record of a different
/// kind or type than the call site expects (usually a conditional hook call).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HookViolationPolicy {
    /// Log the violation with `log::error!` and replace the record.
    #[default]
    Log,
    /// Panic with the violation message.
    Panic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub hook_violation: HookViolationPolicy,
    /// Upper bound on ticks processed by a single `run_until_idle` call.
    pub max_drain_ticks: usize,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_DRAIN_TICKS: usize = 1024;

    pub fn strict() -> Self {
        Self {
            hook_violation: HookViolationPolicy::Panic,
            ..Self::default()
        }
    }

    pub fn with_max_drain_ticks(mut self, ticks: usize) -> Self {
        self.max_drain_ticks = ticks;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            hook_violation: HookViolationPolicy::Log,
            max_drain_ticks: Self::DEFAULT_MAX_DRAIN_TICKS,
        }
    }
}
