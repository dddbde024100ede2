use ndarray::{array, Array2};
use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::error::RciError;
use crate::linalg;

pub const DEFAULT_CALIBRATION_REPETITIONS : u64 = 1000;

/// Estimates single-qubit confusion matrices by simulating repeated biased
/// readouts of prepared |0> and |1> states.
///
/// `p0` is the probability a true 0 reads as 1, `p1` the probability a true
/// 1 reads as 0. Calibration consumes RNG budget in place of hardware
/// execution budget; callers with a known inverse matrix skip it entirely.
#[derive(Debug, Clone)]
pub struct ReadoutCalibrator {
    flips_from_zero : Binomial,
    flips_from_one : Binomial,
    repetitions : u64,
}

impl ReadoutCalibrator {
    pub fn new(p0 : f64, p1 : f64, repetitions : u64) -> Result<ReadoutCalibrator, RciError> {
        if !(0.0..=1.0).contains(&p0) || !(0.0..=1.0).contains(&p1) {
            return Err(RciError::Configuration(format!(
                "flip probabilities must lie in [0, 1], got p0={p0}, p1={p1}"
            )));
        }
        if repetitions == 0 {
            return Err(RciError::Configuration(
                "calibration needs at least one repetition".to_string(),
            ));
        }

        let flips_from_zero = Binomial::new(repetitions, p0)
            .map_err(|error| RciError::Configuration(error.to_string()))?;
        let flips_from_one = Binomial::new(repetitions, p1)
            .map_err(|error| RciError::Configuration(error.to_string()))?;
        Ok(ReadoutCalibrator { flips_from_zero, flips_from_one, repetitions })
    }

    pub fn with_default_repetitions(p0 : f64, p1 : f64) -> Result<ReadoutCalibrator, RciError> {
        ReadoutCalibrator::new(p0, p1, DEFAULT_CALIBRATION_REPETITIONS)
    }

    /// Estimate an empirical 2x2 confusion matrix for every qubit
    /// independently.
    pub fn measure_confusion_matrix<R : Rng>(
        self : &Self,
        qubits : &[usize],
        rng : &mut R,
    ) -> TensoredConfusionMatrix {
        let factors = qubits
            .iter()
            .map(|_| {
                let observed_one_given_zero =
                    self.flips_from_zero.sample(rng) as f64 / self.repetitions as f64;
                let observed_zero_given_one =
                    self.flips_from_one.sample(rng) as f64 / self.repetitions as f64;
                confusion_factor(observed_one_given_zero, observed_zero_given_one)
            })
            .collect();
        TensoredConfusionMatrix::new(qubits.to_vec(), factors)
    }
}

/// Single-qubit confusion matrix from the two observed flip rates. Columns
/// are true states, rows are observed states, each column sums to 1.
fn confusion_factor(observed_one_given_zero : f64, observed_zero_given_one : f64) -> Array2<f64> {
    array![
        [1.0 - observed_one_given_zero, observed_zero_given_one],
        [observed_one_given_zero, 1.0 - observed_zero_given_one],
    ]
}

/// Per-qubit 2x2 confusion factors under the independent-error assumption.
///
/// The joint matrix is the Kronecker product of the factors in qubit order,
/// so the first qubit addresses the most significant bit of the basis-state
/// index.
#[derive(Debug, Clone)]
pub struct TensoredConfusionMatrix {
    qubits : Vec<usize>,
    factors : Vec<Array2<f64>>,
}

impl TensoredConfusionMatrix {
    pub fn new(qubits : Vec<usize>, factors : Vec<Array2<f64>>) -> TensoredConfusionMatrix {
        assert_eq!(qubits.len(), factors.len());
        assert!(factors.iter().all(|factor| factor.shape() == [2, 2]));
        TensoredConfusionMatrix { qubits, factors }
    }

    /// Exact confusion factors implied by the flip probabilities, with no
    /// sampling error.
    pub fn analytic(qubits : Vec<usize>, p0 : f64, p1 : f64) -> Result<TensoredConfusionMatrix, RciError> {
        if !(0.0..=1.0).contains(&p0) || !(0.0..=1.0).contains(&p1) {
            return Err(RciError::Configuration(format!(
                "flip probabilities must lie in [0, 1], got p0={p0}, p1={p1}"
            )));
        }
        let factors = qubits.iter().map(|_| confusion_factor(p0, p1)).collect();
        Ok(TensoredConfusionMatrix::new(qubits, factors))
    }

    pub fn qubits(self : &Self) -> &[usize] {
        &self.qubits
    }

    pub fn joint_matrix(self : &Self) -> Array2<f64> {
        linalg::tensor_product(&self.factors)
    }

    /// Inverse of the joint confusion matrix. A singular joint matrix fails
    /// with `SingularMatrix`; no pseudo-inverse is substituted.
    pub fn correction_matrix(self : &Self) -> Result<Array2<f64>, RciError> {
        linalg::invert(&self.joint_matrix())
    }
}
