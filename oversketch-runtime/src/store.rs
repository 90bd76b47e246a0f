use oversketch_protocol::{Block, BlockStore, StoreError, StoreResult};
use oversketch_structs::core::{BlockIndex, MatrixHandle};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    matrices: HashMap<String, MatrixHandle>,
    blocks: HashMap<String, HashMap<BlockIndex, Block>>,
    unreadable: HashSet<String>,
}

/// Process-local block store. Clones share the same blocks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlockStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn handle(&self, name: &str) -> Option<MatrixHandle> {
        self.inner.read().await.matrices.get(name).cloned()
    }

    pub async fn contains_block(&self, name: &str, index: BlockIndex) -> bool {
        self.inner
            .read()
            .await
            .blocks
            .get(name)
            .is_some_and(|blocks| blocks.contains_key(&index))
    }

    pub async fn num_stored_blocks(&self, name: &str) -> usize {
        self.inner
            .read()
            .await
            .blocks
            .get(name)
            .map_or(0, |blocks| blocks.len())
    }

    pub async fn remove_block(&self, name: &str, index: BlockIndex) -> Option<Block> {
        self.inner
            .write()
            .await
            .blocks
            .get_mut(name)
            .and_then(|blocks| blocks.remove(&index))
    }

    /// Every read of `name` fails with `StoreError::Read` until `set_readable` is called.
    pub async fn set_unreadable(&self, name: &str) {
        self.inner.write().await.unreadable.insert(name.to_string());
    }

    pub async fn set_readable(&self, name: &str) {
        self.inner.write().await.unreadable.remove(name);
    }
}

impl BlockStore for InMemoryBlockStore {
    /// Re-creating an existing matrix drops its blocks.
    async fn create_matrix(
        &self,
        name: &str,
        shape: (usize, usize),
        shard_shape: (usize, usize),
    ) -> StoreResult<MatrixHandle> {
        let handle = MatrixHandle::new(name, shape, shard_shape);
        let mut inner = self.inner.write().await;
        inner.matrices.insert(name.to_string(), handle.clone());
        inner.blocks.insert(name.to_string(), HashMap::new());
        Ok(handle)
    }

    async fn get_block(&self, handle: &MatrixHandle, index: BlockIndex) -> StoreResult<Block> {
        let inner = self.inner.read().await;
        if !inner.matrices.contains_key(&handle.name) {
            return Err(StoreError::MatrixNotFound(handle.name.clone()));
        }
        if inner.unreadable.contains(&handle.name) {
            return Err(StoreError::Read {
                matrix: handle.name.clone(),
                index,
                reason: "matrix is marked unreadable".to_string(),
            });
        }
        inner
            .blocks
            .get(&handle.name)
            .and_then(|blocks| blocks.get(&index))
            .cloned()
            .ok_or_else(|| StoreError::BlockNotFound {
                matrix: handle.name.clone(),
                index,
            })
    }

    async fn put_block(
        &self,
        handle: &MatrixHandle,
        index: BlockIndex,
        block: Block,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .matrices
            .get(&handle.name)
            .ok_or_else(|| StoreError::MatrixNotFound(handle.name.clone()))?;
        if !stored.contains(index) {
            return Err(StoreError::Write {
                matrix: handle.name.clone(),
                index,
                reason: format!("index out of range for shape {:?}", stored.shape),
            });
        }
        let expected = stored.block_shape(index);
        if block.dim() != expected {
            return Err(StoreError::ShapeMismatch {
                matrix: handle.name.clone(),
                index,
                expected,
                actual: block.dim(),
            });
        }
        inner
            .blocks
            .entry(handle.name.clone())
            .or_default()
            .insert(index, block);
        Ok(())
    }
}
