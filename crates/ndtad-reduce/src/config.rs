use serde::{Deserialize, Serialize};

use crate::parallel::ExecutionStrategy;

/// Minimum number of output cells per task in axis and all-pairs reductions.
pub const DEFAULT_TAD_THRESHOLD: usize = 32;

/// Minimum number of element pairs per task in full reductions.
pub const DEFAULT_ELEMENT_THRESHOLD: usize = 8192;

/// Execution settings of a [`crate::Reduce3Executor`].
///
/// Missing fields take their default when deserializing, so partial documents are
/// accepted:
///
/// ```rust
/// use ndtad_reduce::{ExecutionStrategy, Reduce3Config};
///
/// let config: Reduce3Config = serde_json::from_str(r#"{"strategy": "Serial"}"#).unwrap();
/// assert_eq!(config.strategy, ExecutionStrategy::Serial);
/// assert_eq!(config.tad_threshold, 32);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reduce3Config {
    /// How work is spread across threads.
    pub strategy: ExecutionStrategy,
    /// Minimum output cells per task under [`ExecutionStrategy::Auto`].
    pub tad_threshold: usize,
    /// Minimum element pairs per task under [`ExecutionStrategy::Auto`].
    pub element_threshold: usize,
}

impl Default for Reduce3Config {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::Auto,
            tad_threshold: DEFAULT_TAD_THRESHOLD,
            element_threshold: DEFAULT_ELEMENT_THRESHOLD,
        }
    }
}

impl Reduce3Config {
    /// Returns the configuration with another execution strategy.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
