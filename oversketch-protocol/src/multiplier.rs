use crate::{
    context::{Block, BlockStore, Result},
    error::{OverSketchError, OverSketchResult},
};
use oversketch_structs::core::{BlockIndex, MatrixHandle};
use std::sync::Arc;
use tracing::debug;

/// One computation task: output position `(row, col)` for sketch group `group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplyJob {
    pub row: usize,
    pub col: usize,
    pub group: usize,
}

/// `x · yᵗ`
pub fn multiply_blocks(x: &Block, y: &Block) -> OverSketchResult<Block> {
    if x.ncols() != y.ncols() {
        return Err(OverSketchError::DimensionMismatch(format!(
            "Cannot multiply {:?} by transpose of {:?}",
            x.dim(),
            y.dim()
        )));
    }
    Ok(x.dot(&y.t()))
}

/// Reads `sketch_a[row, group]` and `sketch_bt[col, group]` and writes their
/// product to `partials[group]` at `(row, col)`.
pub async fn multiply_task<S: BlockStore>(
    store: Arc<S>,
    sketch_a: MatrixHandle,
    sketch_bt: MatrixHandle,
    partials: Arc<Vec<MatrixHandle>>,
    job: MultiplyJob,
) -> Result<()> {
    let dest = partials.get(job.group).ok_or_else(|| {
        OverSketchError::DimensionMismatch(format!(
            "No partial matrix for group {} ({} groups)",
            job.group,
            partials.len()
        ))
    })?;
    let x = store
        .get_block(&sketch_a, BlockIndex::new(job.row, job.group))
        .await?;
    let y = store
        .get_block(&sketch_bt, BlockIndex::new(job.col, job.group))
        .await?;
    let product = multiply_blocks(&x, &y)?;
    store
        .put_block(dest, BlockIndex::new(job.row, job.col), product)
        .await?;
    debug!(
        "multiplied ({}, {}) for group {}",
        job.row, job.col, job.group
    );
    Ok(())
}
