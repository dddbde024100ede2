use ndarray::Array2;
use numpy::{PyArray2, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::confusion_inversion;
use crate::confusion_matrix::{ReadoutCalibrator, DEFAULT_CALIBRATION_REPETITIONS};
use crate::error::RciError;
use crate::measurement::MeasurementResult;

impl From<RciError> for PyErr {
    fn from(error : RciError) -> PyErr {
        PyRuntimeError::new_err(error.to_string())
    }
}

fn seeded_rng(seed : Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Apply an inverse confusion matrix to a (shots x qubits) matrix of raw
/// measurement bits and return the corrected bits.
#[pyfunction]
#[pyo3(signature = (shots, qubit_indices, inverse_confusion_matrix, seed=None))]
fn correct_measurements<'py>(
    py : Python<'py>,
    shots : PyReadonlyArray2<'py, u8>,
    qubit_indices : Vec<usize>,
    inverse_confusion_matrix : PyReadonlyArray2<'py, f64>,
    seed : Option<u64>,
) -> PyResult<Bound<'py, PyArray2<u8>>> {
    // Unpack input
    let unpacked = shots
        .as_array()
        .outer_iter()
        .map(|shot| shot.iter().map(|bit| *bit > 0).collect())
        .collect();
    let noisy = MeasurementResult::new(unpacked, qubit_indices)?;

    // Compute
    let mut rng = seeded_rng(seed);
    let corrected = confusion_inversion::correct_measurements(
        &noisy,
        &inverse_confusion_matrix.as_array().to_owned(),
        &mut rng,
    )?;

    // Pack result
    let mut packed = Array2::<u8>::zeros((corrected.num_shots(), corrected.num_qubits()));
    for (row, shot) in corrected.shots().iter().enumerate() {
        for (column, bit) in shot.iter().enumerate() {
            packed[[row, column]] = *bit as u8;
        }
    }
    Ok(packed.to_pyarray_bound(py))
}

/// Calibrate readout with the given flip probabilities and return the
/// inverse of the joint confusion matrix.
#[pyfunction]
#[pyo3(signature = (qubits, p0, p1, repetitions=DEFAULT_CALIBRATION_REPETITIONS, seed=None))]
fn inverse_confusion_matrix<'py>(
    py : Python<'py>,
    qubits : Vec<usize>,
    p0 : f64,
    p1 : f64,
    repetitions : u64,
    seed : Option<u64>,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let calibrator = ReadoutCalibrator::new(p0, p1, repetitions)?;
    let mut rng = seeded_rng(seed);
    let correction = calibrator.measure_confusion_matrix(&qubits, &mut rng).correction_matrix()?;
    Ok(correction.to_pyarray_bound(py))
}

#[pymodule]
fn rci(m : &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(correct_measurements, m)?)?;
    m.add_function(wrap_pyfunction!(inverse_confusion_matrix, m)?)?;
    Ok(())
}
