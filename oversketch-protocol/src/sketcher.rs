use crate::{
    context::{Block, BlockStore, Result},
    error::{OverSketchError, OverSketchResult, StoreResult},
    sketch::SketchParameters,
};
use ndarray::{Array2, ArrayBase, Data, Ix2};
use oversketch_structs::core::{Axis, BlockIndex, MatrixHandle};
use std::sync::Arc;
use tracing::debug;

/// Row-blocks of a stored matrix, or of its transpose.
///
/// A is read as stored (row-blocks of shape `b x n`). Bᵗ is never written to
/// the store: its row-block `j` is the transpose of B's column-block `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBlockSource {
    handle: MatrixHandle,
    transposed: bool,
}

impl RowBlockSource {
    pub fn new(handle: MatrixHandle) -> Self {
        Self {
            handle,
            transposed: false,
        }
    }

    pub fn transposed(handle: MatrixHandle) -> Self {
        Self {
            handle,
            transposed: true,
        }
    }

    pub fn handle(&self) -> &MatrixHandle {
        &self.handle
    }

    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    pub fn shape(&self) -> (usize, usize) {
        let (rows, cols) = self.handle.shape;
        if self.transposed {
            (cols, rows)
        } else {
            (rows, cols)
        }
    }

    pub fn shard_shape(&self) -> (usize, usize) {
        let (rows, cols) = self.handle.shard_shape;
        if self.transposed {
            (cols, rows)
        } else {
            (rows, cols)
        }
    }

    pub fn num_row_blocks(&self) -> usize {
        if self.transposed {
            self.handle.num_blocks(Axis::Cols)
        } else {
            self.handle.num_blocks(Axis::Rows)
        }
    }

    pub async fn read<S: BlockStore>(&self, store: &S, row_block: usize) -> StoreResult<Block> {
        if self.transposed {
            let block = store
                .get_block(&self.handle, BlockIndex::new(0, row_block))
                .await?;
            Ok(block.reversed_axes())
        } else {
            store
                .get_block(&self.handle, BlockIndex::new(row_block, 0))
                .await
        }
    }
}

/// Accumulates `flip[g][k] * column_k` into output column `hash[g][k]`.
pub fn sketch_row_block<S>(
    block: &ArrayBase<S, Ix2>,
    params: &SketchParameters,
    group: usize,
) -> OverSketchResult<Block>
where
    S: Data<Elem = f64>,
{
    if group >= params.num_groups() {
        return Err(OverSketchError::DimensionMismatch(format!(
            "Sketch group {} out of range, only {} groups",
            group,
            params.num_groups()
        )));
    }
    if block.ncols() != params.contracted_dim() {
        return Err(OverSketchError::DimensionMismatch(format!(
            "Row-block has {} columns, sketch expects {}",
            block.ncols(),
            params.contracted_dim()
        )));
    }
    let hashes = params.hashes(group);
    let flips = params.flips(group);
    let mut sketch = Array2::<f64>::zeros((block.nrows(), params.block_size()));
    for (k, column) in block.columns().into_iter().enumerate() {
        sketch
            .column_mut(hashes[k])
            .scaled_add(flips[k] as f64, &column);
    }
    Ok(sketch)
}

/// Sketches one row-block for one group and writes it at `(row_block, group)`.
/// The block is fully computed before the single write.
pub async fn sketch_task<S: BlockStore>(
    store: Arc<S>,
    source: RowBlockSource,
    params: Arc<SketchParameters>,
    dest: MatrixHandle,
    row_block: usize,
    group: usize,
) -> Result<()> {
    let block = source.read(&*store, row_block).await?;
    let sketch = sketch_row_block(&block, &params, group)?;
    store
        .put_block(&dest, BlockIndex::new(row_block, group), sketch)
        .await?;
    debug!(
        "sketched row-block {} of '{}' (transposed: {}) for group {}",
        row_block,
        source.handle().name,
        source.is_transposed(),
        group
    );
    Ok(())
}
