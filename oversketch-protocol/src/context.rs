pub use anyhow::Result;
use crate::error::StoreResult;
use futures::future::BoxFuture;
use ndarray::Array2;
use oversketch_structs::core::{Axis, BlockIndex, MatrixHandle, TaskLabel};
use std::future::Future;

pub type Block = Array2<f64>;

/// A unit of remote work. Its only output is the blocks it writes.
pub type Task = BoxFuture<'static, Result<()>>;

/// Sharded matrix storage addressed by (matrix, block index).
pub trait BlockStore: Send + Sync + 'static {
    fn create_matrix(
        &self,
        name: &str,
        shape: (usize, usize),
        shard_shape: (usize, usize),
    ) -> impl Future<Output = StoreResult<MatrixHandle>> + Send;

    fn get_block(
        &self,
        handle: &MatrixHandle,
        index: BlockIndex,
    ) -> impl Future<Output = StoreResult<Block>> + Send;

    fn put_block(
        &self,
        handle: &MatrixHandle,
        index: BlockIndex,
        block: Block,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn block_indices(&self, handle: &MatrixHandle, axis: Axis) -> Vec<usize> {
        handle.block_indices(axis)
    }
}

#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded,
    Failed(anyhow::Error),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }
}

pub trait TaskHandle: Send {
    /// Non-blocking. Returns `Some` exactly once, when the task has resolved.
    fn try_resolve(&mut self) -> Option<TaskOutcome>;

    /// Stops a task that has not resolved. Dropping a handle instead leaves the task running.
    fn cancel(self);
}

pub trait Executor: Send + Sync {
    type Handle: TaskHandle;

    fn submit(&self, label: TaskLabel, task: Task) -> Self::Handle;
}
