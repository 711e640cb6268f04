//! Configuration of traversal runs, checkers and the safety analysis.

use serde::{Deserialize, Serialize};

/// Resource limits and parallelism of a single traversal run.
///
/// # Examples
///
/// ```
/// use safety_rs::config::TraversalConfig;
///
/// let config = TraversalConfig {
///     state_capacity: 1 << 16,
///     cpu_count: 2,
///     ..TraversalConfig::default()
/// };
/// assert_eq!(config.transition_capacity, TraversalConfig::default().transition_capacity);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Maximum number of distinct states (default: 2^20)
    pub state_capacity: usize,
    /// Maximum number of stored transitions (default: 2^23)
    pub transition_capacity: usize,
    /// Number of worker threads (default: available parallelism)
    pub cpu_count: usize,
    /// Log a progress line every this many explored states; `0` disables progress reports (default: 0)
    pub progress_reports: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            state_capacity: 1 << 20,
            transition_capacity: 1 << 23,
            cpu_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            progress_reports: 0,
        }
    }
}

/// Numeric parameters of the probabilistic checkers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Number of Gauss–Seidel or value-iteration sweeps (default: 50)
    pub iterations: usize,
    /// Stop iterating early once no value changes by more than this (default: 1e-12)
    pub convergence: f64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            convergence: 1e-12,
        }
    }
}

/// How the faults of a checked set are activated.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum FaultActivationBehaviour {
    /// Activate the faults whenever possible.
    ForceOnly,
    /// Let the faults activate nondeterministically.
    #[default]
    Nondeterministic,
    /// Check with forced activation first; if that is safe, check again nondeterministically.
    ForceThenFallback,
}

/// Parameters of a deductive cause-consequence analysis.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyAnalysisConfig {
    pub traversal: TraversalConfig,
    pub fault_activation_behaviour: FaultActivationBehaviour,
    /// Largest fault-set cardinality to check; larger levels leave the result incomplete (default: unbounded)
    pub max_cardinality: Option<usize>,
}
