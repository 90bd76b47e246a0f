use crate::{
    context::{Executor, Task, TaskHandle, TaskOutcome},
    error::{OverSketchError, OverSketchResult},
};
use oversketch_structs::{
    config::DispatchConfig,
    core::{Phase, PhaseReport, TaskLabel},
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tasks of one phase, labelled in submission order.
pub struct Batch {
    phase: Phase,
    first_index: usize,
    tasks: Vec<Task>,
}

impl Batch {
    pub fn new(phase: Phase) -> Self {
        Self::starting_at(phase, 0)
    }

    /// Labels start at `first_index`, so two batches of one phase get distinct labels.
    pub fn starting_at(phase: Phase, first_index: usize) -> Self {
        Self {
            phase,
            first_index,
            tasks: Vec::new(),
        }
    }

    pub fn push(&mut self, task: Task) -> TaskLabel {
        let label = TaskLabel {
            phase: self.phase,
            index: self.first_index + self.tasks.len(),
        };
        self.tasks.push(task);
        label
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

pub struct Submitted<H> {
    pub label: TaskLabel,
    pub handle: H,
}

pub struct Resolved {
    pub label: TaskLabel,
    pub outcome: TaskOutcome,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub phase: Phase,
    pub num_tasks: usize,
    pub required: usize,
    pub succeeded: Vec<TaskLabel>,
    pub failures: Vec<(TaskLabel, anyhow::Error)>,
    pub abandoned: Vec<TaskLabel>,
    pub elapsed: Duration,
}

impl DispatchOutcome {
    fn empty(phase: Phase) -> Self {
        Self {
            phase,
            num_tasks: 0,
            required: 0,
            succeeded: Vec::new(),
            failures: Vec::new(),
            abandoned: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn resolved(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    pub fn report(&self) -> PhaseReport {
        PhaseReport {
            phase: self.phase,
            num_tasks: self.num_tasks,
            required: self.required,
            succeeded: self.succeeded.len(),
            failed: self.failures.len(),
            abandoned: self.abandoned.len(),
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// Number of resolved tasks needed before a batch of `num_tasks` may proceed.
///
/// `ceil(fraction * num_tasks)`, at least one task for a non-empty batch and
/// never more than the batch.
pub fn required_count(fraction: f64, num_tasks: usize) -> usize {
    if num_tasks == 0 {
        return 0;
    }
    // absorbs float noise such as 0.95 * 20 = 19.000000000000004
    let exact = fraction * num_tasks as f64 - 1e-9;
    (exact.ceil().max(1.0) as usize).min(num_tasks)
}

/// Splits `pending` into handles that have resolved and those still running.
pub fn partition<H: TaskHandle>(pending: Vec<Submitted<H>>) -> (Vec<Resolved>, Vec<Submitted<H>>) {
    let mut resolved = Vec::new();
    let mut still_pending = Vec::with_capacity(pending.len());
    for mut submitted in pending {
        match submitted.handle.try_resolve() {
            Some(outcome) => resolved.push(Resolved {
                label: submitted.label,
                outcome,
            }),
            None => still_pending.push(submitted),
        }
    }
    (resolved, still_pending)
}

/// Waits one `interval`, then partitions.
pub async fn poll<H: TaskHandle>(
    pending: Vec<Submitted<H>>,
    interval: Duration,
) -> (Vec<Resolved>, Vec<Submitted<H>>) {
    tokio::time::sleep(interval).await;
    partition(pending)
}

/// Fans a batch out to an executor and returns once enough of it has resolved.
///
/// A task counts as resolved when it succeeded or failed. Tasks still running
/// when the threshold is met are abandoned, or cancelled if configured to.
pub struct Dispatcher<'a, E: Executor> {
    executor: &'a E,
    poll_interval: Duration,
    phase_timeout: Option<Duration>,
    cancel_stragglers: bool,
}

impl<'a, E: Executor> Dispatcher<'a, E> {
    pub fn new(executor: &'a E, config: &DispatchConfig) -> Self {
        Self {
            executor,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            phase_timeout: config.phase_timeout_ms.map(Duration::from_millis),
            cancel_stragglers: config.cancel_stragglers,
        }
    }

    pub async fn dispatch(
        &self,
        batch: Batch,
        required_fraction: f64,
    ) -> OverSketchResult<DispatchOutcome> {
        let phase = batch.phase;
        if batch.is_empty() {
            debug!("{} batch is empty, nothing to dispatch", phase);
            return Ok(DispatchOutcome::empty(phase));
        }

        let start = Instant::now();
        let num_tasks = batch.len();
        let required = required_count(required_fraction, num_tasks);
        let first_index = batch.first_index;
        let mut pending: Vec<Submitted<E::Handle>> = batch
            .tasks
            .into_iter()
            .enumerate()
            .map(|(i, task)| {
                let label = TaskLabel {
                    phase,
                    index: first_index + i,
                };
                Submitted {
                    label,
                    handle: self.executor.submit(label, task),
                }
            })
            .collect();
        info!(
            "{}: submitted {} tasks, waiting for {}",
            phase, num_tasks, required
        );

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        let mut resolved;
        (resolved, pending) = partition(pending);
        loop {
            for Resolved { label, outcome } in resolved {
                match outcome {
                    TaskOutcome::Succeeded => succeeded.push(label),
                    TaskOutcome::Failed(e) => {
                        warn!("{} failed: {:#}", label, e);
                        failures.push((label, e));
                    }
                }
            }
            if succeeded.len() + failures.len() >= required {
                break;
            }
            if let Some(timeout) = self.phase_timeout {
                if start.elapsed() >= timeout {
                    let resolved = succeeded.len() + failures.len();
                    for submitted in pending {
                        submitted.handle.cancel();
                    }
                    return Err(OverSketchError::PhaseTimedOut {
                        phase,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                        resolved,
                        required,
                    });
                }
            }
            (resolved, pending) = poll(pending, self.poll_interval).await;
        }

        let abandoned: Vec<TaskLabel> = pending.iter().map(|s| s.label).collect();
        if !abandoned.is_empty() {
            if self.cancel_stragglers {
                debug!("{}: cancelling {} stragglers", phase, abandoned.len());
                for submitted in pending {
                    submitted.handle.cancel();
                }
            } else {
                debug!("{}: abandoning {} stragglers", phase, abandoned.len());
            }
        }

        Ok(DispatchOutcome {
            phase,
            num_tasks,
            required,
            succeeded,
            failures,
            abandoned,
            elapsed: start.elapsed(),
        })
    }
}
