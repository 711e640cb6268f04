use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Instant;

use log::{debug, info, trace};
use parking_lot::{Condvar, Mutex};

use crate::config::TraversalConfig;
use crate::error::{CapacityError, CapacityKind, ModelError, Origin, TraversalError};
use crate::model::{CandidateTransition, ExecutableModel};
use crate::storage::StateStorage;
use crate::traversal::{
    TraversalControl, TraversalParameters, TraversedStateSpace, Transition, HEADER_SIZE, NO_PARENT, REGULAR_STATE,
    STUTTERING_STATE,
};
use crate::types::{PropositionSet, StateIndex};

struct QueueState {
    pending: VecDeque<StateIndex>,
    /// Workers currently expanding a state.
    busy: usize,
    done: bool,
}

struct WorkQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl WorkQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                busy: 0,
                done: false,
            }),
            available: Condvar::new(),
        }
    }

    fn push_all(&self, states: &[StateIndex]) {
        if states.is_empty() {
            return;
        }
        let mut q = self.state.lock();
        q.pending.extend(states);
        self.available.notify_all();
    }

    /// Blocks until a state is available or the traversal is over.
    fn pop(&self, control: &TraversalControl) -> Option<StateIndex> {
        let mut q = self.state.lock();
        loop {
            if q.done || control.is_stopped() {
                return None;
            }
            if let Some(state) = q.pending.pop_front() {
                q.busy += 1;
                return Some(state);
            }
            if q.busy == 0 {
                q.done = true;
                self.available.notify_all();
                return None;
            }
            self.available.wait(&mut q);
        }
    }

    fn finish_one(&self) {
        let mut q = self.state.lock();
        q.busy -= 1;
        if q.busy == 0 && q.pending.is_empty() {
            self.available.notify_all();
        }
    }

    fn wake_all(&self) {
        let _q = self.state.lock();
        self.available.notify_all();
    }
}

struct Shared<'p, 'a> {
    config: &'p TraversalConfig,
    params: &'p TraversalParameters<'a>,
    storage: StateStorage,
    parents: Box<[AtomicU32]>,
    queue: WorkQueue,
    control: TraversalControl,
    transition_count: AtomicUsize,
    proposition_count: usize,
    error: Mutex<Option<TraversalError>>,
}

impl Shared<'_, '_> {
    fn fail(&self, error: TraversalError) {
        debug!("Aborting traversal: {}", error);
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.control.request_stop();
        self.queue.wake_all();
    }

    fn trace_to(&self, index: StateIndex) -> Vec<Box<[u8]>> {
        super::trace(&self.storage, |i| self.parents[i as usize].load(Ordering::Acquire), index)
    }
}

struct Worker<'s, 'p, 'a, M> {
    model: M,
    shared: &'s Shared<'p, 'a>,
    buffer: Vec<u8>,
    new_states: Vec<StateIndex>,
}

impl<'s, 'p, 'a, M: ExecutableModel> Worker<'s, 'p, 'a, M> {
    fn new(model: M, shared: &'s Shared<'p, 'a>) -> Self {
        Self {
            model,
            shared,
            buffer: vec![0; shared.storage.state_size()],
            new_states: Vec::new(),
        }
    }

    fn model_error(&self, origin: Option<StateIndex>, source: ModelError) -> TraversalError {
        TraversalError::Model {
            origin: Origin(origin),
            trace: origin.map(|s| self.shared.trace_to(s)).unwrap_or_default(),
            source,
        }
    }

    fn run(mut self) {
        let shared = self.shared;
        while let Some(state) = shared.queue.pop(&shared.control) {
            if let Err(e) = self.expand(state) {
                shared.fail(e);
            }
            shared.queue.finish_one();
            if shared.control.is_stopped() {
                shared.queue.wake_all();
            }
        }
    }

    fn expand_initial(&mut self) -> Result<(), TraversalError> {
        self.model.execute_initial_step().map_err(|e| self.model_error(None, e))?;
        let candidates = self.model.candidate_transitions();
        let transitions = self.commit(None, candidates)?;
        self.publish(None, &transitions)
    }

    fn expand(&mut self, source: StateIndex) -> Result<(), TraversalError> {
        let shared = self.shared;
        let state = shared.storage.get(source);
        let transitions = if state[0] == STUTTERING_STATE {
            vec![Transition {
                target: source,
                probability: 1.0,
                propositions: PropositionSet::empty(),
                distribution: 0,
            }]
        } else {
            self.model.deserialize(&state[HEADER_SIZE..]);
            self.model.execute_step().map_err(|e| self.model_error(Some(source), e))?;
            let candidates = self.model.candidate_transitions();
            self.commit(Some(source), candidates)?
        };
        trace!("Expanded state {} into {} transitions", source, transitions.len());
        self.publish(Some(source), &transitions)
    }

    /// Labels, modifies and deduplicates the candidates of one source.
    fn commit(
        &mut self,
        source: Option<StateIndex>,
        mut candidates: Vec<CandidateTransition>,
    ) -> Result<Vec<Transition>, TraversalError> {
        let shared = self.shared;
        let model_size = shared.storage.state_size() - HEADER_SIZE;

        for candidate in &mut candidates {
            if candidate.target.len() != model_size {
                let message = format!(
                    "candidate transition has {} bytes, expected {}",
                    candidate.target.len(),
                    model_size
                );
                return Err(self.model_error(source, ModelError::new(message)));
            }
            self.model.deserialize(&candidate.target);
            candidate.propositions = self.model.label(shared.proposition_count);
        }

        for modifier in &shared.params.modifiers {
            modifier.modify(&mut candidates);
        }

        let mut transitions = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter().filter(|c| c.is_valid) {
            if candidate.is_stuttering {
                self.buffer.fill(0);
                self.buffer[0] = STUTTERING_STATE;
            } else {
                self.buffer[0] = REGULAR_STATE;
                self.buffer[HEADER_SIZE..].copy_from_slice(&candidate.target);
            }

            let (target, is_new) = shared.storage.try_insert(&self.buffer)?;
            if is_new {
                shared.parents[target as usize].store(source.unwrap_or(NO_PARENT), Ordering::Release);
                self.new_states.push(target);
                let reports = shared.config.progress_reports;
                if reports > 0 && (target as usize + 1) % reports == 0 {
                    info!(
                        "Discovered {} states, {} transitions",
                        target as usize + 1,
                        shared.transition_count.load(Ordering::Relaxed)
                    );
                }
            }

            transitions.push(Transition {
                target,
                probability: candidate.probability,
                propositions: candidate.propositions,
                distribution: candidate.distribution,
            });
        }

        Ok(transitions)
    }

    /// Hands a batch to the actions, then schedules the newly found states.
    fn publish(&mut self, source: Option<StateIndex>, transitions: &[Transition]) -> Result<(), TraversalError> {
        let shared = self.shared;

        let total = shared.transition_count.fetch_add(transitions.len(), Ordering::AcqRel) + transitions.len();
        if total > shared.config.transition_capacity {
            return Err(CapacityError {
                kind: CapacityKind::Transitions,
                capacity: shared.config.transition_capacity,
            }
            .into());
        }

        for action in &shared.params.actions {
            action.process_transitions(&shared.control, source, transitions)?;
        }

        shared.queue.push_all(&self.new_states);
        self.new_states.clear();
        Ok(())
    }
}

/// Explores the full reachable state space of the models created by `factory`.
///
/// One model instance is created per worker thread and receives the fault
/// activations of `params`. The initial step runs on the calling thread; the
/// remaining states are expanded by `config.cpu_count` workers.
pub fn traverse<M, F>(
    factory: &F,
    config: &TraversalConfig,
    params: &TraversalParameters<'_>,
) -> Result<TraversedStateSpace, TraversalError>
where
    M: ExecutableModel,
    F: Fn() -> M + Sync,
{
    let start = Instant::now();

    let mut model = factory();
    if let Some(activations) = &params.activations {
        model.apply_activations(activations);
    }

    let propositions = model.atomic_propositions();
    if propositions.len() > PropositionSet::MAX_PROPOSITIONS {
        return Err(TraversalError::PropositionLimit {
            count: propositions.len(),
        });
    }

    let state_size = HEADER_SIZE + model.state_vector_size();
    let cpu_count = config.cpu_count.max(1);
    info!(
        "Traversing state space: {} bytes per state, {} propositions, {} workers",
        state_size,
        propositions.len(),
        cpu_count
    );

    let shared = Shared {
        config,
        params,
        storage: StateStorage::new(state_size, config.state_capacity),
        parents: (0..config.state_capacity).map(|_| AtomicU32::new(NO_PARENT)).collect(),
        queue: WorkQueue::new(),
        control: TraversalControl::new(),
        transition_count: AtomicUsize::new(0),
        proposition_count: propositions.len(),
        error: Mutex::new(None),
    };

    let mut main = Worker::new(model, &shared);
    main.expand_initial()?;

    std::thread::scope(|s| {
        for _ in 1..cpu_count {
            s.spawn(|| {
                let mut model = factory();
                if let Some(activations) = &params.activations {
                    model.apply_activations(activations);
                }
                Worker::new(model, &shared).run();
            });
        }
        main.run();
    });

    let Shared {
        storage,
        parents,
        control,
        transition_count,
        error,
        ..
    } = shared;

    if let Some(error) = error.into_inner() {
        return Err(error);
    }

    let state_space = TraversedStateSpace {
        parents: parents.iter().take(storage.len()).map(|p| p.load(Ordering::Acquire)).collect(),
        storage,
        transition_count: transition_count.into_inner(),
        stopped: control.is_stopped(),
        elapsed: start.elapsed(),
        propositions,
    };
    info!(
        "Traversal {}: {} states, {} transitions in {:.2?}",
        if state_space.stopped { "stopped" } else { "finished" },
        state_space.state_count(),
        state_space.transition_count,
        state_space.elapsed
    );
    Ok(state_space)
}
