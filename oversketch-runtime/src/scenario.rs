use crate::{
    shard::{gather_matrix, shard_matrix},
    store::InMemoryBlockStore,
};
use anyhow::Result;
use ndarray::Array2;
use oversketch_protocol::{oversketch, Executor};
use oversketch_structs::{config::OverSketchConfig, core::RunReport};
use oversketch_utils::{derive_seed, relative_frobenius_error, u8s_from_str};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{sync::Arc, time::Instant};
use tracing::info;

pub const DEFAULT_DATA_SEED: &str = "oversketch";

/// `0..rows*cols` laid out row-major.
pub fn range_matrix(rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(i, j)| (i * cols + j) as f64)
}

/// Entries drawn uniformly from `[0, 1)`.
pub fn uniform_matrix(rows: usize, cols: usize, seed: [u8; 32]) -> Array2<f64> {
    let mut rng = StdRng::from_seed(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>())
}

/// Shapes of `A (m x n)` and `B (n x l)`, sharded into `block_size` row/column blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub m: usize,
    pub n: usize,
    pub l: usize,
    pub block_size: usize,
    pub data_seed: String,
}

impl Scenario {
    pub fn new(m: usize, n: usize, l: usize, block_size: usize) -> Self {
        Self {
            m,
            n,
            l,
            block_size,
            data_seed: DEFAULT_DATA_SEED.to_string(),
        }
    }

    pub fn with_data_seed(mut self, data_seed: impl Into<String>) -> Self {
        self.data_seed = data_seed.into();
        self
    }

    pub fn matrices(&self) -> (Array2<f64>, Array2<f64>) {
        let seed = derive_seed(&u8s_from_str(&self.data_seed), "B");
        (
            range_matrix(self.m, self.n),
            uniform_matrix(self.n, self.l, seed),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub report: RunReport,
    pub relative_error: f64,
    pub elapsed_ms: u64,
}

/// Shards A and B into a fresh store, runs OverSketch on them and compares
/// the gathered result against the exact product.
pub async fn run_scenario<E: Executor>(
    executor: &E,
    scenario: &Scenario,
    config: &OverSketchConfig,
) -> Result<ScenarioOutcome> {
    let store = Arc::new(InMemoryBlockStore::new());
    let (a, b) = scenario.matrices();
    let bs = scenario.block_size;
    let a_handle = shard_matrix(
        &*store,
        &format!("oversketch_A_{}_{}_{}", scenario.m, scenario.n, bs),
        &a,
        (bs, scenario.n),
    )
    .await?;
    let b_handle = shard_matrix(
        &*store,
        &format!("oversketch_B_{}_{}_{}", scenario.n, scenario.l, bs),
        &b,
        (scenario.n, bs),
    )
    .await?;

    let start = Instant::now();
    let report = oversketch(store.clone(), executor, &a_handle, &b_handle, config).await?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let approx = gather_matrix(&*store, &report.result).await?;
    let exact = a.dot(&b);
    let relative_error = relative_frobenius_error(&exact, &approx)?;
    info!(
        "d={} N={} error={:.4} in {}ms",
        config.sketch_dim, report.num_groups, relative_error, elapsed_ms
    );
    Ok(ScenarioOutcome {
        report,
        relative_error,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_matrix() {
        let a = range_matrix(2, 3);
        assert_eq!(a, ndarray::array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]);
    }

    #[test]
    fn test_uniform_matrix() {
        let x = uniform_matrix(4, 5, [1u8; 32]);
        assert_eq!(x, uniform_matrix(4, 5, [1u8; 32]));
        assert_ne!(x, uniform_matrix(4, 5, [2u8; 32]));
        assert!(x.iter().all(|v| (0.0..1.0).contains(v)));
    }
}
