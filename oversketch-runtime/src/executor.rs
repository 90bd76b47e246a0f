use anyhow::anyhow;
use futures::FutureExt;
use oversketch_protocol::{Executor, Task, TaskHandle, TaskOutcome};
use oversketch_structs::core::{Phase, TaskLabel};
use oversketch_utils::derive_seed;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Tasks whose label index satisfies `index % n == n - 1`.
    EveryNth(usize),
    /// Each task independently with probability `rate`, decided from the seed and label.
    Random { rate: f64, seed: [u8; 32] },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Never resolves.
    Hang,
    /// Runs the task after a delay.
    Delay(Duration),
    /// Resolves immediately with an error without running the task.
    Fail,
}

/// Which tasks misbehave, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultPlan {
    pub selector: Selector,
    pub fault: Fault,
    pub phases: Vec<Phase>,
}

impl FaultPlan {
    pub fn new(selector: Selector, fault: Fault, phases: Vec<Phase>) -> Self {
        Self {
            selector,
            fault,
            phases,
        }
    }

    pub fn applies_to(&self, label: &TaskLabel) -> bool {
        if !self.phases.contains(&label.phase) {
            return false;
        }
        match &self.selector {
            Selector::EveryNth(0) => false,
            Selector::EveryNth(n) => label.index % n == n - 1,
            Selector::Random { rate, seed } => {
                let mut rng = StdRng::from_seed(derive_seed(seed, &label.to_string()));
                rng.gen_bool(rate.clamp(0.0, 1.0))
            }
        }
    }
}

/// Runs every task on the current tokio runtime.
#[derive(Debug, Default)]
pub struct LocalExecutor {
    faults: Option<FaultPlan>,
    submitted: AtomicUsize,
    faulted: AtomicUsize,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: FaultPlan) -> Self {
        Self {
            faults: Some(faults),
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn faulted(&self) -> usize {
        self.faulted.load(Ordering::Relaxed)
    }

    fn fault_for(&self, label: &TaskLabel) -> Option<Fault> {
        self.faults
            .as_ref()
            .filter(|plan| plan.applies_to(label))
            .map(|plan| plan.fault)
    }
}

impl Executor for LocalExecutor {
    type Handle = LocalHandle;

    fn submit(&self, label: TaskLabel, task: Task) -> LocalHandle {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let join = match self.fault_for(&label) {
            None => tokio::spawn(task),
            Some(fault) => {
                self.faulted.fetch_add(1, Ordering::Relaxed);
                debug!("{} injected fault {:?}", label, fault);
                match fault {
                    Fault::Hang => tokio::spawn(async move {
                        let _task = task;
                        futures::future::pending::<anyhow::Result<()>>().await
                    }),
                    Fault::Delay(delay) => tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        task.await
                    }),
                    Fault::Fail => tokio::spawn(async move {
                        drop(task);
                        Err(anyhow!("{} failed on a faulty worker", label))
                    }),
                }
            }
        };
        LocalHandle {
            label,
            join: Some(join),
        }
    }
}

pub struct LocalHandle {
    label: TaskLabel,
    join: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TaskHandle for LocalHandle {
    fn try_resolve(&mut self) -> Option<TaskOutcome> {
        let join = self.join.as_mut()?;
        if !join.is_finished() {
            return None;
        }
        let result = join.now_or_never()?;
        self.join = None;
        Some(match result {
            Ok(Ok(())) => TaskOutcome::Succeeded,
            Ok(Err(e)) => TaskOutcome::Failed(e),
            Err(e) => TaskOutcome::Failed(anyhow!("{} did not complete: {}", self.label, e)),
        })
    }

    fn cancel(self) {
        if let Some(join) = self.join {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(phase: Phase, index: usize) -> TaskLabel {
        TaskLabel { phase, index }
    }

    #[test]
    fn test_every_nth() {
        let plan = FaultPlan::new(Selector::EveryNth(4), Fault::Hang, vec![Phase::Computing]);
        let hit: Vec<usize> = (0..12)
            .filter(|&i| plan.applies_to(&label(Phase::Computing, i)))
            .collect();
        assert_eq!(hit, vec![3, 7, 11]);
        assert!(!plan.applies_to(&label(Phase::Sketching, 3)));

        let plan = FaultPlan::new(Selector::EveryNth(0), Fault::Hang, vec![Phase::Computing]);
        assert!(!plan.applies_to(&label(Phase::Computing, 0)));
    }

    #[test]
    fn test_random_selector_is_deterministic() {
        let plan = FaultPlan::new(
            Selector::Random {
                rate: 0.3,
                seed: [4u8; 32],
            },
            Fault::Fail,
            vec![Phase::Sketching],
        );
        let first: Vec<bool> = (0..200)
            .map(|i| plan.applies_to(&label(Phase::Sketching, i)))
            .collect();
        let second: Vec<bool> = (0..200)
            .map(|i| plan.applies_to(&label(Phase::Sketching, i)))
            .collect();
        assert_eq!(first, second);
        let hits = first.iter().filter(|&&x| x).count();
        assert!(hits > 20 && hits < 100, "hits: {}", hits);
    }
}
