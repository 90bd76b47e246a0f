use crate::serializable_struct_with_getters;
use serde::{Deserialize, Serialize};
use std::fmt;

serializable_struct_with_getters! {
    MatrixHandle {
        name: String,
        shape: (usize, usize),
        shard_shape: (usize, usize),
    }
}

serializable_struct_with_getters! {
    PhaseReport {
        phase: Phase,
        num_tasks: usize,
        required: usize,
        succeeded: usize,
        failed: usize,
        abandoned: usize,
        elapsed_ms: u64,
    }
}

serializable_struct_with_getters! {
    RunReport {
        result: MatrixHandle,
        seed: String,
        block_size: usize,
        num_groups: usize,
        phases: Vec<PhaseReport>,
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex {
    pub row: usize,
    pub col: usize,
}

impl BlockIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Rows,
    Cols,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Sketching,
    Computing,
    Reducing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Sketching => write!(f, "sketching"),
            Phase::Computing => write!(f, "computing"),
            Phase::Reducing => write!(f, "reducing"),
        }
    }
}

/// Identifies one task within a dispatched batch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskLabel {
    pub phase: Phase,
    pub index: usize,
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.phase, self.index)
    }
}

impl MatrixHandle {
    pub fn new(name: impl Into<String>, shape: (usize, usize), shard_shape: (usize, usize)) -> Self {
        Self {
            name: name.into(),
            shape,
            shard_shape,
        }
    }

    pub fn rows(&self) -> usize {
        self.shape.0
    }

    pub fn cols(&self) -> usize {
        self.shape.1
    }

    /// Number of blocks along `axis`, counting a trailing partial shard.
    pub fn num_blocks(&self, axis: Axis) -> usize {
        let (len, shard) = match axis {
            Axis::Rows => (self.shape.0, self.shard_shape.0),
            Axis::Cols => (self.shape.1, self.shard_shape.1),
        };
        if shard == 0 {
            0
        } else {
            (len + shard - 1) / shard
        }
    }

    pub fn block_indices(&self, axis: Axis) -> Vec<usize> {
        (0..self.num_blocks(axis)).collect()
    }

    /// Every block index in row-major order.
    pub fn block_idxs(&self) -> Vec<BlockIndex> {
        let cols = self.num_blocks(Axis::Cols);
        (0..self.num_blocks(Axis::Rows))
            .flat_map(|row| (0..cols).map(move |col| BlockIndex::new(row, col)))
            .collect()
    }

    pub fn contains(&self, index: BlockIndex) -> bool {
        index.row < self.num_blocks(Axis::Rows) && index.col < self.num_blocks(Axis::Cols)
    }

    /// Shape of the block at `index`; edge shards may be smaller than `shard_shape`.
    pub fn block_shape(&self, index: BlockIndex) -> (usize, usize) {
        let rows = self
            .shard_shape
            .0
            .min(self.shape.0.saturating_sub(index.row * self.shard_shape.0));
        let cols = self
            .shard_shape
            .1
            .min(self.shape.1.saturating_sub(index.col * self.shard_shape.1));
        (rows, cols)
    }
}
