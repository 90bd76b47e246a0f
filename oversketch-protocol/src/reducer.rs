use crate::{
    context::{Block, BlockStore, Result},
    error::{OverSketchError, OverSketchResult, StoreError},
};
use oversketch_structs::core::{BlockIndex, MatrixHandle};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of reading one group's partial contribution.
#[derive(Debug)]
pub enum PartialRead {
    Present(Block),
    /// The producing task never wrote the block (straggler or failed task).
    Absent,
    /// The block may exist but could not be read.
    Failed(StoreError),
}

pub async fn read_partial<S: BlockStore>(
    store: &S,
    handle: &MatrixHandle,
    index: BlockIndex,
) -> PartialRead {
    match store.get_block(handle, index).await {
        Ok(block) => PartialRead::Present(block),
        Err(e) if e.is_not_found() => PartialRead::Absent,
        Err(e) => PartialRead::Failed(e),
    }
}

/// Running sum over the partial contributions present for one output block.
#[derive(Debug, Default)]
pub struct PartialSum {
    sum: Option<Block>,
    present: usize,
    absent: usize,
    failed: usize,
}

impl PartialSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, read: PartialRead) -> OverSketchResult<()> {
        match read {
            PartialRead::Present(block) => {
                match self.sum.as_mut() {
                    None => self.sum = Some(block),
                    Some(sum) => {
                        if sum.dim() != block.dim() {
                            return Err(OverSketchError::DimensionMismatch(format!(
                                "Partial block has shape {:?}, expected {:?}",
                                block.dim(),
                                sum.dim()
                            )));
                        }
                        *sum += &block;
                    }
                }
                self.present += 1;
            }
            PartialRead::Absent => self.absent += 1,
            PartialRead::Failed(_) => self.failed += 1,
        }
        Ok(())
    }

    pub fn present(&self) -> usize {
        self.present
    }

    pub fn absent(&self) -> usize {
        self.absent
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// `sum / present`. With nothing present there is no estimate to give.
    pub fn finish(self, index: BlockIndex) -> OverSketchResult<Block> {
        match self.sum {
            Some(sum) if self.present > 0 => Ok(sum / self.present as f64),
            _ => Err(OverSketchError::TotalMiss {
                index,
                absent: self.absent,
                failed: self.failed,
            }),
        }
    }
}

/// Averages every readable partial contribution for output block `index`.
pub async fn reduce_block<S: BlockStore>(
    store: &S,
    partials: &[MatrixHandle],
    index: BlockIndex,
) -> OverSketchResult<Block> {
    let mut acc = PartialSum::new();
    for (group, handle) in partials.iter().enumerate() {
        let read = read_partial(store, handle, index).await;
        match &read {
            PartialRead::Present(_) => {}
            PartialRead::Absent => debug!("group {} has no partial for {}", group, index),
            PartialRead::Failed(e) => warn!("group {} partial for {} unreadable: {}", group, index, e),
        }
        acc.add(read)?;
    }
    if acc.present() < partials.len() {
        debug!(
            "reducing {} over {} of {} groups",
            index,
            acc.present(),
            partials.len()
        );
    }
    acc.finish(index)
}

pub async fn reduce_task<S: BlockStore>(
    store: Arc<S>,
    partials: Arc<Vec<MatrixHandle>>,
    output: MatrixHandle,
    index: BlockIndex,
) -> Result<()> {
    let block = reduce_block(&*store, &partials, index).await?;
    store.put_block(&output, index, block).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn not_found() -> StoreError {
        StoreError::BlockNotFound {
            matrix: "AxB_outer".to_string(),
            index: BlockIndex::new(0, 0),
        }
    }

    #[test]
    fn test_divides_by_present_count() {
        let mut acc = PartialSum::new();
        acc.add(PartialRead::Present(array![[2.0, 4.0]])).unwrap();
        acc.add(PartialRead::Absent).unwrap();
        acc.add(PartialRead::Present(array![[4.0, 8.0]])).unwrap();
        acc.add(PartialRead::Failed(StoreError::MatrixNotFound("x".to_string())))
            .unwrap();
        assert_eq!(acc.present(), 2);
        assert_eq!(acc.absent(), 1);
        assert_eq!(acc.failed(), 1);
        assert_eq!(
            acc.finish(BlockIndex::new(0, 0)).unwrap(),
            array![[3.0, 6.0]]
        );
    }

    #[test]
    fn test_total_miss() {
        let mut acc = PartialSum::new();
        acc.add(PartialRead::Absent).unwrap();
        acc.add(PartialRead::Failed(not_found())).unwrap();
        assert_eq!(
            acc.finish(BlockIndex::new(1, 2)),
            Err(OverSketchError::TotalMiss {
                index: BlockIndex::new(1, 2),
                absent: 1,
                failed: 1,
            })
        );
        assert!(matches!(
            PartialSum::new().finish(BlockIndex::new(0, 0)),
            Err(OverSketchError::TotalMiss { .. })
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut acc = PartialSum::new();
        acc.add(PartialRead::Present(array![[1.0, 2.0]])).unwrap();
        assert!(acc.add(PartialRead::Present(array![[1.0], [2.0]])).is_err());
    }
}
