use crate::error::{OverSketchError, OverSketchResult};
use ndarray::{Array2, ArrayView1};
use rand::{rngs::StdRng, thread_rng, Rng, SeedableRng};

/// Count-Sketch parameters shared by the sketching of A and of Bᵗ.
///
/// Row `g` of `hashes` maps every column of the contracted dimension to an
/// output column in `[0, block_size)` for sketch group `g`; the same row of
/// `flips` holds the sign applied to that column.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchParameters {
    seed: [u8; 32],
    block_size: usize,
    hashes: Array2<usize>,
    flips: Array2<i8>,
}

impl SketchParameters {
    /// Same seed gives identical parameters. Without one, a fresh seed is drawn
    /// from the thread rng and kept so the run can be replayed.
    pub fn generate(
        contracted_dim: usize,
        num_groups: usize,
        block_size: usize,
        seed: Option<[u8; 32]>,
    ) -> OverSketchResult<Self> {
        if contracted_dim == 0 || num_groups == 0 || block_size == 0 {
            return Err(OverSketchError::InvalidConfig(format!(
                "Sketch needs non-zero dimensions, got contracted_dim={}, num_groups={}, block_size={}",
                contracted_dim, num_groups, block_size
            )));
        }
        let seed = seed.unwrap_or_else(|| thread_rng().gen());
        let mut rng = StdRng::from_seed(seed);

        let hashes =
            Array2::from_shape_fn((num_groups, contracted_dim), |_| rng.gen_range(0..block_size));
        let flips = Array2::from_shape_fn((num_groups, contracted_dim), |_| {
            if rng.gen_bool(0.5) {
                1i8
            } else {
                -1i8
            }
        });

        Ok(Self {
            seed,
            block_size,
            hashes,
            flips,
        })
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.seed)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_groups(&self) -> usize {
        self.hashes.nrows()
    }

    pub fn contracted_dim(&self) -> usize {
        self.hashes.ncols()
    }

    pub fn hashes(&self, group: usize) -> ArrayView1<usize> {
        self.hashes.row(group)
    }

    pub fn flips(&self, group: usize) -> ArrayView1<i8> {
        self.flips.row(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_parameters() {
        let a = SketchParameters::generate(100, 4, 8, Some([7u8; 32])).unwrap();
        let b = SketchParameters::generate(100, 4, 8, Some([7u8; 32])).unwrap();
        assert_eq!(a, b);

        let c = SketchParameters::generate(100, 4, 8, Some([8u8; 32])).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_unseeded_runs_differ() {
        let a = SketchParameters::generate(100, 4, 8, None).unwrap();
        let b = SketchParameters::generate(100, 4, 8, None).unwrap();
        assert_ne!(a.seed(), b.seed());
        let replay = SketchParameters::generate(100, 4, 8, Some(*a.seed())).unwrap();
        assert_eq!(a, replay);
    }

    #[test]
    fn test_ranges() {
        let params = SketchParameters::generate(500, 3, 16, Some([1u8; 32])).unwrap();
        assert_eq!(params.num_groups(), 3);
        assert_eq!(params.contracted_dim(), 500);
        assert_eq!(params.seed_hex().len(), 64);
        for g in 0..3 {
            assert!(params.hashes(g).iter().all(|&h| h < 16));
            assert!(params.flips(g).iter().all(|&s| s == 1 || s == -1));
            // both signs show up over 500 draws
            assert!(params.flips(g).iter().any(|&s| s == 1));
            assert!(params.flips(g).iter().any(|&s| s == -1));
        }
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(SketchParameters::generate(0, 1, 1, None).is_err());
        assert!(SketchParameters::generate(1, 0, 1, None).is_err());
        assert!(SketchParameters::generate(1, 1, 0, None).is_err());
    }
}
