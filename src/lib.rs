//! # safety-rs: explicit-state safety analysis for fault models
//!
//! **`safety-rs`** explores the state space of an executable model, builds
//! transition structures from it and answers qualitative and quantitative
//! questions about them. On top of that it runs a *deductive cause-consequence
//! analysis* (DCCA) that finds the minimal sets of faults able to cause a hazard.
//!
//! ## Pipeline
//!
//! 1. A model implements [`ExecutableModel`][crate::model::ExecutableModel]: it
//!    serializes its state into a fixed-size byte vector and computes successor
//!    candidates for a given state. Faults and atomic propositions are declared
//!    by the model.
//! 2. [`traverse`][crate::traversal::traverse] explores every reachable state in
//!    parallel, deduplicating states in a fixed-capacity
//!    [`StateStorage`][crate::storage::StateStorage] and streaming transitions
//!    into [`TransitionAction`][crate::traversal::TransitionAction]s.
//! 3. The [`generator`] helpers turn a traversal into a [`StateGraph`][crate::graph::StateGraph],
//!    a [`Dtmc`][crate::ltmc::Dtmc] or an [`Mdp`][crate::ltmdp::Mdp].
//! 4. The [`checker`] module evaluates formulas on those structures, or checks
//!    invariants on the fly.
//! 5. [`dcca`] classifies fault sets as safe or critical with the invariant checker.
//!
//! ## Example
//!
//! ```no_run
//! # use safety_rs::model::ExecutableModel;
//! # fn run<M: ExecutableModel>(make_model: fn() -> M) {
//! use safety_rs::config::SafetyAnalysisConfig;
//! use safety_rs::dcca::SafetyAnalysis;
//! use safety_rs::formula::Formula;
//!
//! let mut analysis = SafetyAnalysis::new(SafetyAnalysisConfig::default());
//! let results = analysis
//!     .compute_minimal_critical_sets(&make_model, &Formula::atom("hazard"))
//!     .unwrap();
//! for set in &results.minimal_critical_sets {
//!     println!("{:?}", results.fault_names(*set));
//! }
//! # }
//! ```

pub mod bitset;
pub mod checker;
pub mod config;
pub mod counterexample;
pub mod dcca;
pub mod error;
pub mod fault_set;
pub mod formula;
pub mod generator;
pub mod graph;
pub mod ltmc;
pub mod ltmdp;
pub mod model;
pub mod sparse;
pub mod storage;
pub mod traversal;
pub mod types;
pub mod utils;
