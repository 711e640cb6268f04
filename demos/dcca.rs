use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::info;

use safety_rs::config::{FaultActivationBehaviour, SafetyAnalysisConfig, TraversalConfig};
use safety_rs::dcca::{MaximalSafeSetHeuristic, SafetyAnalysis};
use safety_rs::error::ModelError;
use safety_rs::formula::Formula;
use safety_rs::model::{Activation, CandidateTransition, ExecutableModel, Fault};

/// A pressure tank filled by a pump. The controller stops the pump once the
/// sensor reports a full tank or, as a fallback, once a timer expires. The
/// tank ruptures if it is filled beyond its capacity.
struct PressureTank {
    faults: Vec<Fault>,
    pressure: u8,
    elapsed: u8,
    pumping: bool,
    candidates: Vec<CandidateTransition>,
}

impl PressureTank {
    const FULL: u8 = 5;
    const TIMEOUT: u8 = 7;
    const RUPTURE: u8 = 8;

    const SENSOR_STUCK: usize = 0;
    const TIMER_FAILURE: usize = 1;
    const PUMP_STUCK: usize = 2;

    fn new() -> Self {
        Self {
            faults: vec![
                Fault::new("SensorStuck"),
                Fault::new("TimerFailure"),
                Fault::new("PumpStuck").with_activation(Activation::Suppressed),
            ],
            pressure: 0,
            elapsed: 0,
            pumping: true,
            candidates: Vec::new(),
        }
    }

    /// Whether fault `index` may be active in this step (both ways if nondeterministic).
    fn choices(&self, index: usize) -> &'static [bool] {
        match self.faults[index].activation {
            Activation::Forced => &[true],
            Activation::Suppressed => &[false],
            Activation::Nondeterministic => &[false, true],
        }
    }

    fn push(&mut self, pressure: u8, elapsed: u8, pumping: bool) {
        self.candidates
            .push(CandidateTransition::nondeterministic(vec![pressure, elapsed, pumping as u8]));
    }
}

impl ExecutableModel for PressureTank {
    fn state_vector_size(&self) -> usize {
        3
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.pressure;
        buffer[1] = self.elapsed;
        buffer[2] = self.pumping as u8;
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.pressure = buffer[0];
        self.elapsed = buffer[1];
        self.pumping = buffer[2] != 0;
    }

    fn execute_initial_step(&mut self) -> Result<(), ModelError> {
        self.push(0, 0, true);
        Ok(())
    }

    fn execute_step(&mut self) -> Result<(), ModelError> {
        if !self.pumping || self.pressure >= Self::RUPTURE {
            self.push(self.pressure, self.elapsed, self.pumping);
            return Ok(());
        }
        let pressure = self.pressure + 1;
        let elapsed = self.elapsed + 1;
        for &sensor_stuck in self.choices(Self::SENSOR_STUCK) {
            for &timer_failure in self.choices(Self::TIMER_FAILURE) {
                for &pump_stuck in self.choices(Self::PUMP_STUCK) {
                    let full = !sensor_stuck && pressure >= Self::FULL;
                    let timeout = !timer_failure && elapsed >= Self::TIMEOUT;
                    let pumping = pump_stuck || !(full || timeout);
                    self.push(pressure, elapsed, pumping);
                }
            }
        }
        Ok(())
    }

    fn candidate_transitions(&mut self) -> Vec<CandidateTransition> {
        std::mem::take(&mut self.candidates)
    }

    fn atomic_propositions(&self) -> Vec<String> {
        vec!["ruptured".to_string(), "pumping".to_string()]
    }

    fn evaluate_atomic_proposition(&self, index: usize) -> bool {
        match index {
            0 => self.pressure >= Self::RUPTURE,
            1 => self.pumping,
            _ => false,
        }
    }

    fn faults(&self) -> Vec<Fault> {
        self.faults.clone()
    }

    fn set_fault_activation(&mut self, fault: usize, activation: Activation) {
        self.faults[fault].activation = activation;
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Behaviour {
    Force,
    Nondeterministic,
    Fallback,
}

impl From<Behaviour> for FaultActivationBehaviour {
    fn from(behaviour: Behaviour) -> Self {
        match behaviour {
            Behaviour::Force => FaultActivationBehaviour::ForceOnly,
            Behaviour::Nondeterministic => FaultActivationBehaviour::Nondeterministic,
            Behaviour::Fallback => FaultActivationBehaviour::ForceThenFallback,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Largest fault-set cardinality to check.
    #[arg(long, value_name = "INT")]
    max_cardinality: Option<usize>,

    /// How the faults of a checked set are activated.
    #[arg(long, value_enum, default_value = "nondeterministic")]
    behaviour: Behaviour,

    /// State capacity (in bits, so the actual capacity is `2^size` states).
    #[arg(long, value_name = "INT", default_value = "16")]
    size: usize,

    /// Number of worker threads.
    #[arg(long, value_name = "INT")]
    cpus: Option<usize>,

    /// Enable the maximal safe set heuristic.
    #[arg(long)]
    heuristic: bool,

    /// Write the counterexamples of the minimal critical sets to this directory.
    #[arg(long, value_name = "DIR")]
    counterexamples: Option<PathBuf>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut traversal = TraversalConfig {
        state_capacity: 1 << args.size,
        transition_capacity: 1 << (args.size + 2),
        ..TraversalConfig::default()
    };
    if let Some(cpus) = args.cpus {
        traversal.cpu_count = cpus;
    }
    let config = SafetyAnalysisConfig {
        traversal,
        fault_activation_behaviour: args.behaviour.into(),
        max_cardinality: args.max_cardinality,
    };

    let mut analysis = SafetyAnalysis::new(config);
    if args.heuristic {
        analysis = analysis.with_heuristic(MaximalSafeSetHeuristic::new(&PressureTank::new().faults()));
    }

    let hazard = Formula::atom("ruptured");
    let results = analysis.compute_minimal_critical_sets(&PressureTank::new, &hazard)?;
    println!("{}", results);

    if let Some(dir) = &args.counterexamples {
        results.save_counterexamples(dir)?;
        info!("Counterexamples written to {}", dir.display());
    }

    Ok(())
}
