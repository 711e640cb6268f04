use clap::Parser;

use safety_rs::checker::{CtlChecker, DtmcChecker, InvariantChecker, MdpChecker};
use safety_rs::config::{CheckerConfig, TraversalConfig};
use safety_rs::error::ModelError;
use safety_rs::formula::Formula;
use safety_rs::generator::{generate_ltmc, generate_ltmdp, generate_state_graph, GeneratorOptions};
use safety_rs::model::{Activation, CandidateTransition, ExecutableModel, Fault};

/// A sender retransmitting a message over lossy channels until it is
/// delivered or the retry budget is used up. With more than one channel, the
/// sender picks one nondeterministically for every attempt.
struct LossyChannel {
    losses: Vec<f64>,
    retries: u8,
    faults: Vec<Fault>,
    attempt: u8,
    delivered: bool,
    candidates: Vec<CandidateTransition>,
}

impl LossyChannel {
    fn new(losses: &[f64], retries: u8) -> Self {
        Self {
            losses: losses.to_vec(),
            retries,
            faults: vec![Fault::new("ChannelDown")],
            attempt: 0,
            delivered: false,
            candidates: Vec::new(),
        }
    }

    fn is_failed(&self) -> bool {
        !self.delivered && self.attempt > self.retries
    }

    fn push(&mut self, attempt: u8, delivered: bool, probability: f64, distribution: u32) {
        if probability > 0.0 {
            self.candidates
                .push(CandidateTransition::new(vec![attempt, delivered as u8], probability).in_distribution(distribution));
        }
    }
}

impl ExecutableModel for LossyChannel {
    fn state_vector_size(&self) -> usize {
        2
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.attempt;
        buffer[1] = self.delivered as u8;
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.attempt = buffer[0];
        self.delivered = buffer[1] != 0;
    }

    fn execute_initial_step(&mut self) -> Result<(), ModelError> {
        self.push(0, false, 1.0, 0);
        Ok(())
    }

    fn execute_step(&mut self) -> Result<(), ModelError> {
        if self.delivered || self.is_failed() {
            self.push(self.attempt, self.delivered, 1.0, 0);
            return Ok(());
        }
        let down = self.faults[0].activation == Activation::Forced;
        let next = self.attempt + 1;
        for (channel, loss) in self.losses.clone().into_iter().enumerate() {
            let loss = if down { 1.0 } else { loss };
            self.push(next, true, 1.0 - loss, channel as u32);
            self.push(next, false, loss, channel as u32);
        }
        Ok(())
    }

    fn candidate_transitions(&mut self) -> Vec<CandidateTransition> {
        std::mem::take(&mut self.candidates)
    }

    fn atomic_propositions(&self) -> Vec<String> {
        vec!["delivered".to_string(), "failed".to_string()]
    }

    fn evaluate_atomic_proposition(&self, index: usize) -> bool {
        match index {
            0 => self.delivered,
            1 => self.is_failed(),
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

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Loss probability of each channel; more than one channel yields an MDP.
    #[arg(long = "loss", value_name = "FLOAT", default_values = ["0.1"])]
    losses: Vec<f64>,

    /// Number of retransmissions after the first attempt.
    #[arg(long, value_name = "INT", default_value = "3")]
    retries: u8,

    /// Step bound for the bounded reachability query.
    #[arg(long, value_name = "INT", default_value = "2")]
    steps: u32,

    /// Number of Gauss-Seidel or value-iteration sweeps.
    #[arg(long, value_name = "INT", default_value = "50")]
    iterations: usize,

    /// Number of worker threads.
    #[arg(long, value_name = "INT")]
    cpus: Option<usize>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut traversal = TraversalConfig::default();
    if let Some(cpus) = args.cpus {
        traversal.cpu_count = cpus;
    }
    let checker_config = CheckerConfig {
        iterations: args.iterations,
        ..CheckerConfig::default()
    };
    let factory = || LossyChannel::new(&args.losses, args.retries);
    let options = GeneratorOptions::default();

    let delivered = Formula::atom("delivered");
    let failed = Formula::atom("failed");
    let eventually = delivered.clone().finally();
    let bounded = delivered.clone().finally_within(args.steps);

    if args.losses.len() == 1 {
        let dtmc = generate_ltmc(&factory, &traversal, &options)?;
        let checker = DtmcChecker::with_config(&dtmc, checker_config);
        println!("P[{}] = {}", eventually, checker.probability_of(&eventually)?);
        println!("P[{}] = {}", bounded, checker.probability_of(&bounded)?);
    } else {
        let mdp = generate_ltmdp(&factory, &traversal, &options)?;
        let checker = MdpChecker::with_config(&mdp, checker_config);
        println!("P[{}] in {}", eventually, checker.calculate_probability_range(&eventually)?);
        println!("P[{}] in {}", bounded, checker.calculate_probability_range(&bounded)?);
    }

    let graph = generate_state_graph(&factory, &traversal, &options)?;
    let mut ctl = CtlChecker::new(&graph);
    for formula in [
        delivered.clone().or(failed.clone()).af(),
        failed.clone().implies(failed.clone().ag()).ag(),
        delivered.clone().ef(),
    ] {
        println!("{}: {}", formula, ctl.check(&formula)?);
    }

    let invariant = InvariantChecker::new(&factory, traversal.clone());
    let result = invariant.check(&failed.not(), Some(vec![Activation::Forced]))?;
    match result.counterexample {
        Some(counterexample) => println!(
            "With the channel down, delivery fails after {} states",
            counterexample.step_count()
        ),
        None => println!("Delivery never fails with the channel down"),
    }

    println!("Total time: {:.2?}", time_total.elapsed());
    Ok(())
}
