//! # Dispatch runtime configuration.
//!
//! [`Config`] is an explicit context object constructed once at application
//! start and passed by reference to the pieces that need it (currently the
//! [`Bus`](crate::Bus)). There is no process-wide mutable configuration.

/// Configuration for the action-dispatch runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the action bus ring buffer.
    ///
    /// Shared across all receivers; receivers that fall behind by more than
    /// this many actions observe a lag error and are resubscribed by the
    /// [`EpicSet`](crate::EpicSet) supervisor.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self { bus_capacity: 1024 }
    }
}
