use ndarray::{Array2, ArrayD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::ClassifierError;
use super::model::InferenceModel;
use super::preprocess::InputContract;

/// Seed used when none is configured.
pub const DEFAULT_FALLBACK_SEED: u64 = 0x6e65_7572_6f70_6174;

/// Randomly initialized linear layer over the flattened input.
///
/// Stands in for a network whose weights could not be loaded, so the service
/// stays structurally testable. Its predictions carry no medical meaning.
/// Weights are regenerated from the seed on every call, so any feature width
/// is accepted and nothing is stored or mutated between requests.
#[derive(Debug, Clone)]
pub struct FallbackModel {
    seed: u64,
    num_classes: usize,
    contract: InputContract,
}

impl FallbackModel {
    pub fn new(contract: InputContract, num_classes: usize, seed: u64) -> Self {
        Self {
            seed,
            num_classes,
            contract,
        }
    }

    fn class_rng(&self, class: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (class as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }
}

impl InferenceModel for FallbackModel {
    fn forward(&self, input: ArrayD<f32>) -> Result<Array2<f32>, ClassifierError> {
        let batch = input.shape().first().copied().unwrap_or(0);
        if batch == 0 {
            return Err(ClassifierError::InferenceError("Empty batch".into()));
        }
        let features = input.len() / batch;
        let flat = input
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((batch, features))
            .map_err(|e| ClassifierError::InferenceError(format!("Failed to flatten input: {}", e)))?;

        // Same bound as a freshly initialized dense layer.
        let bound = 1.0 / (features.max(1) as f32).sqrt();
        let mut scores = Array2::<f32>::zeros((batch, self.num_classes));
        for class in 0..self.num_classes {
            let mut rng = self.class_rng(class);
            for j in 0..features {
                let weight: f32 = rng.gen_range(-bound..bound);
                for row in 0..batch {
                    scores[[row, class]] += flat[[row, j]] * weight;
                }
            }
            let bias: f32 = rng.gen_range(-bound..bound);
            for row in 0..batch {
                scores[[row, class]] += bias;
            }
        }
        Ok(scores)
    }

    fn input_contract(&self) -> &InputContract {
        &self.contract
    }

    fn describe(&self) -> String {
        format!("untrained fallback network (seed {:#x})", self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn model() -> FallbackModel {
        FallbackModel::new(InputContract::new(vec![None, Some(1), None]), 5, 7)
    }

    #[test]
    fn test_scores_have_one_row_per_input() {
        let input = Array3::<f32>::from_shape_fn((4, 1, 12), |(i, _, j)| (i * j) as f32 / 10.0);
        let scores = model().forward(input.into_dyn()).unwrap();
        assert_eq!(scores.dim(), (4, 5));
    }

    #[test]
    fn test_forward_is_deterministic() {
        let input = Array3::<f32>::from_shape_fn((2, 1, 30), |(i, _, j)| (i + j) as f32).into_dyn();
        let first = model().forward(input.clone()).unwrap();
        let second = model().forward(input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rows_are_scored_independently() {
        let rows = Array3::<f32>::from_shape_fn((2, 1, 8), |(i, _, j)| (i * 3 + j) as f32);
        let both = model().forward(rows.clone().into_dyn()).unwrap();
        let second_alone = model()
            .forward(rows.slice(ndarray::s![1..2, .., ..]).to_owned().into_dyn())
            .unwrap();
        for c in 0..5 {
            assert!((both[[1, c]] - second_alone[[0, c]]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let input = Array3::<f32>::zeros((0, 1, 4)).into_dyn();
        assert!(model().forward(input).is_err());
    }
}
