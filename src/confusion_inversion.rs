use std::marker::PhantomData;

use enum_as_inner::EnumAsInner;
use ndarray::{Array2, ArrayView1};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::confusion_matrix::ReadoutCalibrator;
use crate::error::RciError;
use crate::executor::{Circuit, Executor};
use crate::measurement::{bits_to_index, index_to_bits, MeasurementResult};
use crate::observable::Observable;

/// Where the inverse confusion matrix comes from.
///
/// Resolved once at the start of a mitigated evaluation: a provided matrix
/// is used as-is (opaque, trusted apart from shape checks), otherwise the
/// matrix is computed from fresh calibration sampling on every call.
#[derive(Debug, Clone, EnumAsInner)]
pub enum InverseSource {
    Provided(Array2<f64>),
    FromCalibration { p0 : f64, p1 : f64 },
}

impl Default for InverseSource {
    fn default() -> InverseSource {
        InverseSource::FromCalibration { p0 : 0.01, p1 : 0.01 }
    }
}

impl InverseSource {
    /// Configuration checks that need no knowledge of the circuit. Run at
    /// wrap time so misconfiguration fails before anything executes.
    pub fn validate(self : &Self) -> Result<(), RciError> {
        match self {
            InverseSource::Provided(matrix) => {
                if matrix.nrows() != matrix.ncols() {
                    return Err(RciError::Configuration(format!(
                        "inverse confusion matrix must be square, got {}x{}",
                        matrix.nrows(),
                        matrix.ncols()
                    )));
                }
                Ok(())
            }
            InverseSource::FromCalibration { p0, p1 } => {
                if !(0.0..=1.0).contains(p0) || !(0.0..=1.0).contains(p1) {
                    return Err(RciError::Configuration(format!(
                        "flip probabilities must lie in [0, 1], got p0={p0}, p1={p1}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// The concrete matrix for an n-qubit circuit, calibrating if needed.
    /// A provided matrix of the wrong dimension fails here, before the
    /// executor runs.
    fn resolve<R : Rng>(self : &Self, qubits : &[usize], rng : &mut R) -> Result<Array2<f64>, RciError> {
        let dimension = 1usize << qubits.len();
        match self {
            InverseSource::Provided(matrix) => {
                if matrix.nrows() != dimension || matrix.ncols() != dimension {
                    return Err(RciError::DimensionMismatch {
                        rows : matrix.nrows(),
                        cols : matrix.ncols(),
                        expected : dimension,
                        qubits : qubits.len(),
                    });
                }
                Ok(matrix.clone())
            }
            InverseSource::FromCalibration { p0, p1 } => {
                info!(p0, p1, "no inverse confusion matrix provided, calibrating readout");
                let calibrator = ReadoutCalibrator::with_default_repetitions(*p0, *p1)?;
                calibrator.measure_confusion_matrix(qubits, rng).correction_matrix()
            }
        }
    }
}

/// Draw one basis-state index from a corrected probability vector.
///
/// Corrected vectors are generally improper: entries may be negative and
/// need not sum to 1. Policy: negative weights are clamped to zero and the
/// remainder is sampled as unnormalized weights. A vector with a non-finite
/// entry or no positive weight left after clamping cannot be sampled and
/// fails with `DegenerateDistribution`.
pub fn sample_basis_state<R : Rng>(weights : ArrayView1<f64>, rng : &mut R) -> Result<usize, RciError> {
    if weights.iter().any(|weight| !weight.is_finite()) {
        return Err(RciError::DegenerateDistribution);
    }

    let clamped : Vec<f64> = weights.iter().map(|weight| weight.max(0.0)).collect();
    let distribution = WeightedIndex::new(&clamped).map_err(|_| RciError::DegenerateDistribution)?;
    Ok(distribution.sample(rng))
}

/// Apply an inverse confusion matrix to every shot of a noisy measurement
/// result and resample corrected shots.
///
/// Each shot is lifted to the one-hot vector over the 2^n basis states
/// indexed by its bit pattern (first recorded qubit most significant); the
/// batch of shot vectors is corrected in one multiplication and each
/// corrected row is resampled into a bit vector over the input's qubit
/// ordering. Either every shot is corrected or the call fails with no
/// partial result.
pub fn correct_measurements<R : Rng>(
    noisy : &MeasurementResult,
    inverse_confusion_matrix : &Array2<f64>,
    rng : &mut R,
) -> Result<MeasurementResult, RciError> {
    let qubits = noisy.num_qubits();
    let dimension = 1usize << qubits;
    if inverse_confusion_matrix.nrows() != dimension || inverse_confusion_matrix.ncols() != dimension {
        return Err(RciError::DimensionMismatch {
            rows : inverse_confusion_matrix.nrows(),
            cols : inverse_confusion_matrix.ncols(),
            expected : dimension,
            qubits,
        });
    }

    let mut state_vectors = Array2::<f64>::zeros((noisy.num_shots(), dimension));
    for (row, shot) in noisy.shots().iter().enumerate() {
        state_vectors[[row, bits_to_index(shot)]] = 1.0;
    }

    // (M^-1 . V^T)^T, one corrected distribution per shot
    let adjusted_state_vectors = inverse_confusion_matrix.dot(&state_vectors.t()).reversed_axes();

    let mut corrected_shots = Vec::with_capacity(noisy.num_shots());
    for adjusted in adjusted_state_vectors.outer_iter() {
        let state = sample_basis_state(adjusted, rng)?;
        corrected_shots.push(index_to_bits(state, qubits));
    }

    MeasurementResult::new(corrected_shots, noisy.qubit_indices().to_vec())
}

/// Expectation value of `observable` on the raw, unmitigated measurement
/// result. The baseline the mitigated value is compared against.
pub fn execute<C : Circuit, E : Executor<C>>(
    circuit : &C,
    executor : &mut E,
    observable : &Observable,
) -> f64 {
    let results = executor.run(std::slice::from_ref(circuit));
    assert_eq!(results.len(), 1);
    observable.expectation(&results)
}

/// Readout-error-mitigated expectation value of `observable` on `circuit`.
///
/// Resolves the inverse source once up front, runs the circuit as a
/// single-element batch, corrects the noisy result and evaluates the
/// observable on the corrected one.
pub fn execute_with_rci<C : Circuit, E : Executor<C>, R : Rng>(
    circuit : &C,
    executor : &mut E,
    observable : &Observable,
    inverse : &InverseSource,
    rng : &mut R,
) -> Result<f64, RciError> {
    inverse.validate()?;

    let qubits = circuit.qubits();
    let inverse_confusion_matrix = inverse.resolve(&qubits, rng)?;

    let results = executor.run(std::slice::from_ref(circuit));
    assert_eq!(results.len(), 1);
    let corrected = correct_measurements(&results[0], &inverse_confusion_matrix, rng)?;

    Ok(observable.expectation(std::slice::from_ref(&corrected)))
}

/// An executor wrapped with readout confusion inversion: runs one circuit
/// and returns a mitigated scalar expectation instead of a raw measurement
/// result.
///
/// Carries the wrapped executor's description verbatim, so introspection
/// sees the original's metadata. Built by `mitigate_executor`.
#[derive(Debug, Clone)]
pub struct MitigatedExecutor<C, E> {
    executor : E,
    observable : Observable,
    inverse : InverseSource,
    description : String,
    rng : ChaCha8Rng,
    circuit_type : PhantomData<C>,
}

/// Wrap `executor` with readout confusion inversion.
///
/// The inverse source is validated here, at wrap time: a misconfigured
/// wrapper is never constructed, so misuse fails before any circuit runs.
pub fn mitigate_executor<C : Circuit, E : Executor<C>>(
    executor : E,
    observable : Observable,
    inverse : InverseSource,
) -> Result<MitigatedExecutor<C, E>, RciError> {
    inverse.validate()?;
    let description = executor.description().to_string();
    Ok(MitigatedExecutor {
        executor,
        observable,
        inverse,
        description,
        rng : ChaCha8Rng::from_entropy(),
        circuit_type : PhantomData,
    })
}

impl<C : Circuit, E : Executor<C>> MitigatedExecutor<C, E> {
    /// Fixed resampling and calibration randomness, for reproducible runs.
    pub fn with_seed(mut self : Self, seed : u64) -> MitigatedExecutor<C, E> {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn run(self : &mut Self, circuit : &C) -> Result<f64, RciError> {
        execute_with_rci(circuit, &mut self.executor, &self.observable, &self.inverse, &mut self.rng)
    }

    pub fn description(self : &Self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confusion_matrix::TensoredConfusionMatrix;
    use crate::observable::PauliZString;
    use ndarray::array;
    use quickcheck::quickcheck;

    const SHOTS : usize = 4096;

    #[derive(Debug, Clone)]
    struct BasicCircuit {
        qubits : Vec<usize>,
    }

    impl Circuit for BasicCircuit {
        fn qubits(self : &Self) -> Vec<usize> {
            self.qubits.clone()
        }
    }

    fn two_qubit_ones_circuit() -> BasicCircuit {
        BasicCircuit { qubits : vec![0, 1] }
    }

    /// Z0 + Z1, expectation -2 on the all-|1> state.
    fn z_sum_observable() -> Observable {
        Observable::new(vec![PauliZString::new(1.0, vec![0]), PauliZString::new(1.0, vec![1])])
    }

    /// Measures the all-|1> state exactly.
    fn noiseless_executor(circuit : &BasicCircuit) -> MeasurementResult {
        MeasurementResult::new(vec![vec![true; circuit.qubits.len()]; SHOTS], circuit.qubits()).unwrap()
    }

    /// Measures the all-|1> state through readout that flips every bit.
    fn full_flip_executor(circuit : &BasicCircuit) -> MeasurementResult {
        MeasurementResult::new(vec![vec![false; circuit.qubits.len()]; SHOTS], circuit.qubits()).unwrap()
    }

    /// Measures the all-|1> state through readout that flips each bit
    /// independently with probability `flip_probability`.
    fn partial_flip_executor(
        circuit : &BasicCircuit,
        flip_probability : f64,
        rng : &mut ChaCha8Rng,
    ) -> MeasurementResult {
        let shots = (0..SHOTS)
            .map(|_| {
                circuit.qubits.iter().map(|_| rng.gen::<f64>() >= flip_probability).collect()
            })
            .collect();
        MeasurementResult::new(shots, circuit.qubits()).unwrap()
    }

    fn bit_reversal_matrix() -> Array2<f64> {
        array![
            [0.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
        ]
    }

    #[test]
    fn identity_inverse_preserves_noiseless_expectation() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mitigated = execute_with_rci(
            &two_qubit_ones_circuit(),
            &mut noiseless_executor,
            &z_sum_observable(),
            &InverseSource::Provided(Array2::eye(4)),
            &mut rng,
        )
        .unwrap();
        let unmitigated = execute(&two_qubit_ones_circuit(), &mut noiseless_executor, &z_sum_observable());
        assert_eq!(mitigated, unmitigated);
        assert_eq!(mitigated, -2.0);
    }

    #[test]
    fn bit_reversal_inverse_undoes_full_flip() {
        let unmitigated = execute(&two_qubit_ones_circuit(), &mut full_flip_executor, &z_sum_observable());
        assert_eq!(unmitigated, 2.0);

        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mitigated = execute_with_rci(
            &two_qubit_ones_circuit(),
            &mut full_flip_executor,
            &z_sum_observable(),
            &InverseSource::Provided(bit_reversal_matrix()),
            &mut rng,
        )
        .unwrap();
        assert_eq!(mitigated, -2.0);
    }

    #[test]
    fn wrong_dimension_fails_before_the_executor_runs() {
        let mut untouched = |_circuit : &BasicCircuit| -> MeasurementResult {
            unreachable!("executor must not run before the dimension check")
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let result = execute_with_rci(
            &two_qubit_ones_circuit(),
            &mut untouched,
            &z_sum_observable(),
            &InverseSource::Provided(Array2::eye(2)),
            &mut rng,
        );
        assert_eq!(
            result,
            Err(RciError::DimensionMismatch { rows : 2, cols : 2, expected : 4, qubits : 2 })
        );
    }

    #[test]
    fn corrector_rechecks_dimension_against_the_result() {
        let noisy = MeasurementResult::new(vec![vec![true]], vec![0]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let result = correct_measurements(&noisy, &Array2::eye(4), &mut rng);
        assert!(matches!(result, Err(RciError::DimensionMismatch { .. })));
    }

    // Readout that flips each bit with probability 0.95, corrected with an
    // inverse calibrated for 0.8 flips. The inverse is neither the identity
    // nor the exact inverse of the noise, yet it pulls the expectation from
    // roughly +1.8 back below -1.5, so the improvement survives any
    // sampling noise.
    #[test]
    fn mismatched_inverse_still_improves_on_heavy_flip_noise() {
        let flip_probability = 0.95;
        let circuit = two_qubit_ones_circuit();
        let observable = z_sum_observable();
        let true_value = -2.0;

        let mut readout_rng = ChaCha8Rng::seed_from_u64(5);
        let mut noisy_executor =
            |circuit : &BasicCircuit| partial_flip_executor(circuit, flip_probability, &mut readout_rng);
        let unmitigated = execute(&circuit, &mut noisy_executor, &observable);
        assert!(unmitigated > 1.0);

        let inverse = TensoredConfusionMatrix::analytic(circuit.qubits(), 0.8, 0.8)
            .unwrap()
            .correction_matrix()
            .unwrap();

        let mut resampling_rng = ChaCha8Rng::seed_from_u64(6);
        let mitigated = execute_with_rci(
            &circuit,
            &mut noisy_executor,
            &observable,
            &InverseSource::Provided(inverse),
            &mut resampling_rng,
        )
        .unwrap();

        assert!(mitigated < -1.0);
        assert!((mitigated - true_value).abs() < (unmitigated - true_value).abs());
    }

    #[test]
    fn calibration_source_recovers_full_flip() {
        // p0 = p1 = 1 calibrates to exactly the bit-reversal correction
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mitigated = execute_with_rci(
            &two_qubit_ones_circuit(),
            &mut full_flip_executor,
            &z_sum_observable(),
            &InverseSource::FromCalibration { p0 : 1.0, p1 : 1.0 },
            &mut rng,
        )
        .unwrap();
        assert_eq!(mitigated, -2.0);
    }

    #[test]
    fn invalid_flip_probabilities_fail_validation() {
        let source = InverseSource::FromCalibration { p0 : 1.7, p1 : 0.0 };
        assert!(matches!(source.validate(), Err(RciError::Configuration(_))));
    }

    #[test]
    fn non_square_provided_matrix_fails_validation() {
        let source = InverseSource::Provided(Array2::zeros((4, 2)));
        assert!(matches!(source.validate(), Err(RciError::Configuration(_))));
    }

    #[test]
    fn default_source_calibrates_with_one_percent_flips() {
        let source = InverseSource::default();
        let (p0, p1) = source.as_from_calibration().unwrap();
        assert_eq!((*p0, *p1), (0.01, 0.01));
    }

    #[test]
    fn zero_inverse_matrix_degenerates() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let result = execute_with_rci(
            &two_qubit_ones_circuit(),
            &mut noiseless_executor,
            &z_sum_observable(),
            &InverseSource::Provided(Array2::zeros((4, 4))),
            &mut rng,
        );
        assert_eq!(result, Err(RciError::DegenerateDistribution));
    }

    #[test]
    fn non_finite_inverse_matrix_degenerates() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let result = execute_with_rci(
            &two_qubit_ones_circuit(),
            &mut noiseless_executor,
            &z_sum_observable(),
            &InverseSource::Provided(Array2::from_elem((4, 4), f64::NAN)),
            &mut rng,
        );
        assert_eq!(result, Err(RciError::DegenerateDistribution));
    }

    #[test]
    fn negative_weights_are_clamped_before_sampling() {
        let weights = ndarray::Array1::from(vec![-0.3, 0.0, -0.1, 0.7]);
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        for _ in 0..32 {
            assert_eq!(sample_basis_state(weights.view(), &mut rng).unwrap(), 3);
        }
    }

    #[test]
    fn all_negative_weights_degenerate() {
        let weights = ndarray::Array1::from(vec![-0.5, -0.5]);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        assert_eq!(sample_basis_state(weights.view(), &mut rng), Err(RciError::DegenerateDistribution));
    }

    #[test]
    fn mitigated_executor_preserves_description() {
        struct DocumentedExecutor;

        impl Executor<BasicCircuit> for DocumentedExecutor {
            fn run(self : &mut Self, circuits : &[BasicCircuit]) -> Vec<MeasurementResult> {
                circuits.iter().map(noiseless_executor).collect()
            }

            fn description(self : &Self) -> &str {
                "Samples bitstrings from the noiseless reference backend."
            }
        }

        let wrapped : MitigatedExecutor<BasicCircuit, DocumentedExecutor> =
            mitigate_executor(DocumentedExecutor, z_sum_observable(), InverseSource::Provided(Array2::eye(4)))
                .unwrap();
        assert_eq!(wrapped.description(), DocumentedExecutor.description());
    }

    #[test]
    fn mitigated_executor_returns_scalar_expectations() {
        let mut wrapped = mitigate_executor(
            full_flip_executor as fn(&BasicCircuit) -> MeasurementResult,
            z_sum_observable(),
            InverseSource::Provided(bit_reversal_matrix()),
        )
        .unwrap()
        .with_seed(12);
        assert_eq!(wrapped.run(&two_qubit_ones_circuit()).unwrap(), -2.0);
    }

    #[test]
    fn misconfigured_wrapper_is_never_constructed() {
        let result : Result<MitigatedExecutor<BasicCircuit, _>, RciError> = mitigate_executor(
            noiseless_executor as fn(&BasicCircuit) -> MeasurementResult,
            z_sum_observable(),
            InverseSource::FromCalibration { p0 : -0.2, p1 : 0.0 },
        );
        assert!(matches!(result, Err(RciError::Configuration(_))));
    }

    quickcheck! {
        fn identity_correction_returns_shots_unchanged(pattern : Vec<(bool, bool)>) -> bool {
            let shots : Vec<Vec<bool>> = pattern.iter().map(|(a, b)| vec![*a, *b]).collect();
            let noisy = MeasurementResult::new(shots, vec![0, 1]).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(13);
            let corrected = correct_measurements(&noisy, &Array2::eye(4), &mut rng).unwrap();
            corrected == noisy
        }
    }
}
