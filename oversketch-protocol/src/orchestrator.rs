use crate::{
    context::{BlockStore, Executor},
    dispatcher::{Batch, DispatchOutcome, Dispatcher},
    error::{OverSketchError, OverSketchResult},
    multiplier::{multiply_task, MultiplyJob},
    reducer::reduce_task,
    sketch::SketchParameters,
    sketcher::{sketch_task, RowBlockSource},
};
use oversketch_structs::{
    config::OverSketchConfig,
    core::{Axis, BlockIndex, MatrixHandle, Phase, PhaseReport, RunReport},
};
use oversketch_utils::u8s_from_str;
use std::{fmt, sync::Arc};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolState {
    Init,
    Sketching,
    Computing,
    Reducing,
    Done,
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolState::Init => "init",
            ProtocolState::Sketching => "sketching",
            ProtocolState::Computing => "computing",
            ProtocolState::Reducing => "reducing",
            ProtocolState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Dimensions fixed by `Init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub m: usize,
    pub n: usize,
    pub l: usize,
    pub block_size: usize,
    pub sketch_dim: usize,
    pub num_groups: usize,
}

/// Checks every structural requirement on A (m x n), B (n x l) and `d`.
pub fn validate_inputs(
    a: &MatrixHandle,
    b: &MatrixHandle,
    config: &OverSketchConfig,
) -> OverSketchResult<Dimensions> {
    config
        .validate()
        .map_err(|e| OverSketchError::InvalidConfig(e.to_string()))?;

    let (m, n) = a.shape;
    let (n_b, l) = b.shape;
    let block_size = a.shard_shape.0;
    let d = config.sketch_dim;

    if m == 0 || n == 0 || l == 0 {
        return Err(OverSketchError::DimensionMismatch(format!(
            "Matrices must be non-empty, got A {:?} and B {:?}",
            a.shape, b.shape
        )));
    }
    if n != n_b {
        return Err(OverSketchError::DimensionMismatch(format!(
            "A has {} columns but B has {} rows",
            n, n_b
        )));
    }
    if block_size == 0 {
        return Err(OverSketchError::InvalidConfig(
            "Block size of A must be greater than 0".to_string(),
        ));
    }
    if b.shard_shape.1 != block_size {
        return Err(OverSketchError::DimensionMismatch(format!(
            "A row shard size ({}) must equal B column shard size ({})",
            block_size, b.shard_shape.1
        )));
    }
    if a.shard_shape.1 != n || b.shard_shape.0 != n {
        return Err(OverSketchError::DimensionMismatch(format!(
            "The contracted dimension must be unsharded, got A shards {:?} and B shards {:?}",
            a.shard_shape, b.shard_shape
        )));
    }
    for (name, value) in [("d", d), ("m", m), ("l", l)] {
        if value % block_size != 0 {
            return Err(OverSketchError::InvalidConfig(format!(
                "Block size {} must divide {} = {}",
                block_size, name, value
            )));
        }
    }

    Ok(Dimensions {
        m,
        n,
        l,
        block_size,
        sketch_dim: d,
        num_groups: d / block_size,
    })
}

/// Runs the three phases for one product and tracks which one it is in.
pub struct Orchestrator<'a, S: BlockStore, E: Executor> {
    store: Arc<S>,
    dispatcher: Dispatcher<'a, E>,
    config: &'a OverSketchConfig,
    state: ProtocolState,
    reports: Vec<PhaseReport>,
}

impl<'a, S: BlockStore, E: Executor> Orchestrator<'a, S, E> {
    pub fn new(store: Arc<S>, executor: &'a E, config: &'a OverSketchConfig) -> Self {
        Self {
            store,
            dispatcher: Dispatcher::new(executor, &config.dispatch),
            config,
            state: ProtocolState::Init,
            reports: Vec::new(),
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    fn advance(&mut self, next: ProtocolState) {
        debug!("protocol state {} -> {}", self.state, next);
        self.state = next;
    }

    pub async fn run(mut self, a: &MatrixHandle, b: &MatrixHandle) -> OverSketchResult<RunReport> {
        let dims = validate_inputs(a, b, self.config)?;
        let seed = self.config.seed().map(|s| u8s_from_str(s));
        let params = Arc::new(SketchParameters::generate(
            dims.n,
            dims.num_groups,
            dims.block_size,
            seed,
        )?);
        info!(
            "oversketch A {:?} x B {:?}: b={}, d={}, N={}, threshold={}, seed={}",
            a.shape,
            b.shape,
            dims.block_size,
            dims.sketch_dim,
            dims.num_groups,
            self.config.threshold,
            params.seed_hex()
        );

        self.advance(ProtocolState::Sketching);
        let (sketch_a, sketch_bt) = self.sketching(a, b, &dims, &params).await?;

        self.advance(ProtocolState::Computing);
        let partials = self.computing(&sketch_a, &sketch_bt, &dims).await?;

        self.advance(ProtocolState::Reducing);
        let result = self.reducing(&sketch_a, &sketch_bt, partials, &dims).await?;

        self.advance(ProtocolState::Done);
        Ok(RunReport {
            result,
            seed: params.seed_hex(),
            block_size: dims.block_size,
            num_groups: dims.num_groups,
            phases: self.reports,
        })
    }

    async fn sketching(
        &mut self,
        a: &MatrixHandle,
        b: &MatrixHandle,
        dims: &Dimensions,
        params: &Arc<SketchParameters>,
    ) -> OverSketchResult<(MatrixHandle, MatrixHandle)> {
        let bs = dims.block_size;
        let sketch_a = self
            .store
            .create_matrix(
                &format!("sketch_A_{}_{}", dims.m, dims.sketch_dim),
                (dims.m, dims.sketch_dim),
                (bs, bs),
            )
            .await?;
        let sketch_bt = self
            .store
            .create_matrix(
                &format!("sketch_B_{}_{}", dims.l, dims.sketch_dim),
                (dims.l, dims.sketch_dim),
                (bs, bs),
            )
            .await?;

        let batch_a = self.sketch_batch(RowBlockSource::new(a.clone()), &sketch_a, params, 0);
        let batch_b = self.sketch_batch(
            RowBlockSource::transposed(b.clone()),
            &sketch_bt,
            params,
            batch_a.len(),
        );
        let threshold = self.config.threshold;
        let (outcome_a, outcome_b) = futures::try_join!(
            self.dispatcher.dispatch(batch_a, threshold),
            self.dispatcher.dispatch(batch_b, threshold)
        )?;
        info!(
            "Sketching time: {:.3}s",
            outcome_a.elapsed.max(outcome_b.elapsed).as_secs_f64()
        );
        self.reports.push(merge_reports(&outcome_a, &outcome_b));
        Ok((sketch_a, sketch_bt))
    }

    fn sketch_batch(
        &self,
        source: RowBlockSource,
        dest: &MatrixHandle,
        params: &Arc<SketchParameters>,
        first_index: usize,
    ) -> Batch {
        let mut batch = Batch::starting_at(Phase::Sketching, first_index);
        for row_block in 0..source.num_row_blocks() {
            for group in 0..params.num_groups() {
                batch.push(Box::pin(sketch_task(
                    self.store.clone(),
                    source.clone(),
                    params.clone(),
                    dest.clone(),
                    row_block,
                    group,
                )));
            }
        }
        batch
    }

    async fn computing(
        &mut self,
        sketch_a: &MatrixHandle,
        sketch_bt: &MatrixHandle,
        dims: &Dimensions,
    ) -> OverSketchResult<Arc<Vec<MatrixHandle>>> {
        let bs = dims.block_size;
        let mut partials = Vec::with_capacity(dims.num_groups);
        for group in 0..dims.num_groups {
            partials.push(
                self.store
                    .create_matrix(
                        &format!("AxB_outer_{}_{}_{}", dims.m, dims.l, group),
                        (dims.m, dims.l),
                        (bs, bs),
                    )
                    .await?,
            );
        }
        let partials = Arc::new(partials);

        let mut batch = Batch::new(Phase::Computing);
        let cols = self.store.block_indices(sketch_bt, Axis::Rows);
        for BlockIndex { row, col: group } in sketch_a.block_idxs() {
            for &col in &cols {
                batch.push(Box::pin(multiply_task(
                    self.store.clone(),
                    sketch_a.clone(),
                    sketch_bt.clone(),
                    partials.clone(),
                    MultiplyJob { row, col, group },
                )));
            }
        }
        let outcome = self
            .dispatcher
            .dispatch(batch, self.config.threshold)
            .await?;
        info!("Computation time: {:.3}s", outcome.elapsed.as_secs_f64());
        self.reports.push(outcome.report());
        Ok(partials)
    }

    async fn reducing(
        &mut self,
        sketch_a: &MatrixHandle,
        sketch_bt: &MatrixHandle,
        partials: Arc<Vec<MatrixHandle>>,
        dims: &Dimensions,
    ) -> OverSketchResult<MatrixHandle> {
        let bs = dims.block_size;
        let output = self
            .store
            .create_matrix(
                &format!("AxB_{}_{}", dims.m, dims.l),
                (dims.m, dims.l),
                (bs, bs),
            )
            .await?;

        let mut batch = Batch::new(Phase::Reducing);
        let cols = self.store.block_indices(sketch_bt, Axis::Rows);
        for row in self.store.block_indices(sketch_a, Axis::Rows) {
            for &col in &cols {
                batch.push(Box::pin(reduce_task(
                    self.store.clone(),
                    partials.clone(),
                    output.clone(),
                    BlockIndex::new(row, col),
                )));
            }
        }
        let outcome = self.dispatcher.dispatch(batch, 1.0).await?;
        info!("Reduction time: {:.3}s", outcome.elapsed.as_secs_f64());
        self.reports.push(outcome.report());

        if let Some((label, e)) = outcome.failures.into_iter().next() {
            return Err(match e.downcast::<OverSketchError>() {
                Ok(e) => e,
                Err(e) => OverSketchError::PhaseFailed {
                    phase: Phase::Reducing,
                    reason: format!("{}: {:#}", label, e),
                },
            });
        }
        Ok(output)
    }
}

fn merge_reports(a: &DispatchOutcome, b: &DispatchOutcome) -> PhaseReport {
    let (a, b) = (a.report(), b.report());
    PhaseReport {
        phase: a.phase,
        num_tasks: a.num_tasks + b.num_tasks,
        required: a.required + b.required,
        succeeded: a.succeeded + b.succeeded,
        failed: a.failed + b.failed,
        abandoned: a.abandoned + b.abandoned,
        elapsed_ms: a.elapsed_ms.max(b.elapsed_ms),
    }
}

/// Approximates `A · B` with the sketch dimension and threshold in `config`.
pub async fn oversketch<S: BlockStore, E: Executor>(
    store: Arc<S>,
    executor: &E,
    a: &MatrixHandle,
    b: &MatrixHandle,
    config: &OverSketchConfig,
) -> OverSketchResult<RunReport> {
    Orchestrator::new(store, executor, config).run(a, b).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(d: usize) -> OverSketchConfig {
        OverSketchConfig::new(d)
    }

    #[test]
    fn test_validate_inputs() {
        let a = MatrixHandle::new("A", (2000, 10000), (1000, 10000));
        let b = MatrixHandle::new("B", (10000, 3000), (10000, 1000));
        let dims = validate_inputs(&a, &b, &config(4000)).unwrap();
        assert_eq!(dims.num_groups, 4);
        assert_eq!(dims.block_size, 1000);
        assert_eq!((dims.m, dims.n, dims.l), (2000, 10000, 3000));
    }

    #[test]
    fn test_validate_rejects_bad_dimensions() {
        let a = MatrixHandle::new("A", (2000, 10000), (1000, 10000));
        let b = MatrixHandle::new("B", (10000, 3000), (10000, 1000));
        // d not a multiple of b
        assert!(matches!(
            validate_inputs(&a, &b, &config(1500)),
            Err(OverSketchError::InvalidConfig(_))
        ));
        // m not a multiple of b
        let a_bad = MatrixHandle::new("A", (2500, 10000), (1000, 10000));
        assert!(validate_inputs(&a_bad, &b, &config(4000)).is_err());
        // l not a multiple of b
        let b_bad = MatrixHandle::new("B", (10000, 3500), (10000, 1000));
        assert!(validate_inputs(&a, &b_bad, &config(4000)).is_err());
        // contracted dimensions differ
        let b_bad = MatrixHandle::new("B", (9000, 3000), (9000, 1000));
        assert!(matches!(
            validate_inputs(&a, &b_bad, &config(4000)),
            Err(OverSketchError::DimensionMismatch(_))
        ));
        // block sizes differ
        let b_bad = MatrixHandle::new("B", (10000, 3000), (10000, 500));
        assert!(validate_inputs(&a, &b_bad, &config(4000)).is_err());
        // contracted dimension sharded
        let a_bad = MatrixHandle::new("A", (2000, 10000), (1000, 5000));
        assert!(validate_inputs(&a_bad, &b, &config(4000)).is_err());
        // bad threshold
        assert!(matches!(
            validate_inputs(&a, &b, &config(4000).with_threshold(0.0)),
            Err(OverSketchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_state_order() {
        assert!(ProtocolState::Init < ProtocolState::Sketching);
        assert!(ProtocolState::Reducing < ProtocolState::Done);
        assert_eq!(ProtocolState::Computing.to_string(), "computing");
    }
}
