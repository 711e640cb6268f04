//! One-call helpers that traverse a model and build a transition structure.

use log::info;

use crate::config::TraversalConfig;
use crate::error::TraversalError;
use crate::formula::Formula;
use crate::graph::{StateGraph, StateGraphBuilder};
use crate::ltmc::{Dtmc, LtmcBuilder};
use crate::ltmdp::{LtmdpBuilder, Mdp};
use crate::model::{Activation, ExecutableModel};
use crate::traversal::{traverse, EarlyTerminationModifier, TraversalParameters};

/// Optional knobs shared by the generators.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Fault activations for the run; `None` keeps the model's own.
    pub activations: Option<Vec<Activation>>,
    /// Stop exploring beyond states satisfying this state formula.
    pub terminate_early: Option<Formula>,
}

fn parameters<'a, M: ExecutableModel>(
    model: &M,
    options: &GeneratorOptions,
) -> Result<TraversalParameters<'a>, TraversalError> {
    let mut params = TraversalParameters::new();
    if let Some(activations) = &options.activations {
        params = params.with_activations(activations.clone());
    }
    if let Some(condition) = &options.terminate_early {
        let modifier = EarlyTerminationModifier::compile(condition, &model.atomic_propositions())?;
        params = params.with_modifier(modifier);
    }
    Ok(params)
}

pub fn generate_state_graph<M, F>(
    factory: &F,
    config: &TraversalConfig,
    options: &GeneratorOptions,
) -> Result<StateGraph, TraversalError>
where
    M: ExecutableModel,
    F: Fn() -> M + Sync,
{
    let builder = StateGraphBuilder::new(config.state_capacity, config.transition_capacity);
    let params = parameters(&factory(), options)?.with_action(&builder);
    let state_space = traverse(factory, config, &params)?;
    drop(params);
    let graph = builder.finish(state_space.state_count(), state_space.proposition_names().to_vec());
    info!(
        "Generated state graph: {} states, {} transitions",
        graph.state_count(),
        graph.transition_count()
    );
    Ok(graph)
}

/// Traverses the model and converts the resulting LTMC into a [`Dtmc`].
pub fn generate_ltmc<M, F>(factory: &F, config: &TraversalConfig, options: &GeneratorOptions) -> Result<Dtmc, TraversalError>
where
    M: ExecutableModel,
    F: Fn() -> M + Sync,
{
    let builder = LtmcBuilder::new(config.state_capacity, config.transition_capacity);
    let params = parameters(&factory(), options)?.with_action(&builder);
    let state_space = traverse(factory, config, &params)?;
    drop(params);
    let ltmc = builder.finish(state_space.state_count(), state_space.proposition_names().to_vec());
    let dtmc = ltmc.to_dtmc();
    info!(
        "Generated DTMC: {} states, {} transitions",
        dtmc.state_count(),
        dtmc.transition_count()
    );
    Ok(dtmc)
}

/// Traverses the model and converts the resulting LTMDP into an [`Mdp`].
pub fn generate_ltmdp<M, F>(factory: &F, config: &TraversalConfig, options: &GeneratorOptions) -> Result<Mdp, TraversalError>
where
    M: ExecutableModel,
    F: Fn() -> M + Sync,
{
    let builder = LtmdpBuilder::new(config.state_capacity, config.transition_capacity);
    let params = parameters(&factory(), options)?.with_action(&builder);
    let state_space = traverse(factory, config, &params)?;
    drop(params);
    let ltmdp = builder.finish(state_space.state_count(), state_space.proposition_names().to_vec());
    let mdp = ltmdp.to_mdp();
    info!(
        "Generated MDP: {} states, {} distributions",
        mdp.state_count(),
        mdp.distribution_count()
    );
    Ok(mdp)
}
