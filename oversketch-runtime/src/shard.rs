use anyhow::{anyhow, Result};
use ndarray::{s, Array2, ArrayBase, Data, Ix2};
use oversketch_protocol::BlockStore;
use oversketch_structs::core::MatrixHandle;

/// Writes `matrix` to the store as blocks of `shard_shape`.
pub async fn shard_matrix<S, D>(
    store: &S,
    name: &str,
    matrix: &ArrayBase<D, Ix2>,
    shard_shape: (usize, usize),
) -> Result<MatrixHandle>
where
    S: BlockStore,
    D: Data<Elem = f64>,
{
    if shard_shape.0 == 0 || shard_shape.1 == 0 {
        return Err(anyhow!(
            "Shard shape must be positive, got {:?}",
            shard_shape
        ));
    }
    let handle = store.create_matrix(name, matrix.dim(), shard_shape).await?;
    for index in handle.block_idxs() {
        let (rows, cols) = handle.block_shape(index);
        let r0 = index.row * shard_shape.0;
        let c0 = index.col * shard_shape.1;
        let block = matrix.slice(s![r0..r0 + rows, c0..c0 + cols]).to_owned();
        store.put_block(&handle, index, block).await?;
    }
    Ok(handle)
}

/// Reads every block of `handle` back into one dense matrix.
pub async fn gather_matrix<S: BlockStore>(store: &S, handle: &MatrixHandle) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros(handle.shape);
    for index in handle.block_idxs() {
        let block = store.get_block(handle, index).await?;
        let r0 = index.row * handle.shard_shape.0;
        let c0 = index.col * handle.shard_shape.1;
        let (rows, cols) = handle.block_shape(index);
        if block.dim() != (rows, cols) {
            return Err(anyhow!(
                "Block {} of '{}' has shape {:?}, expected {:?}",
                index,
                handle.name,
                block.dim(),
                (rows, cols)
            ));
        }
        matrix
            .slice_mut(s![r0..r0 + rows, c0..c0 + cols])
            .assign(&block);
    }
    Ok(matrix)
}
