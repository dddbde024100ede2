use crate::measurement::MeasurementResult;

/// A weighted Pauli-Z string: `coefficient` times Z on every listed qubit.
#[derive(Debug, Clone, PartialEq)]
pub struct PauliZString {
    pub coefficient : f64,
    pub qubits : Vec<usize>,
}

impl PauliZString {
    pub fn new(coefficient : f64, qubits : Vec<usize>) -> PauliZString {
        PauliZString { coefficient, qubits }
    }

    /// Eigenvalue of this string on a single shot, excluding the coefficient.
    ///
    /// Every qubit the string acts on must appear in `qubit_indices`.
    fn eigenvalue(self : &Self, shot : &[bool], qubit_indices : &[usize]) -> f64 {
        self.qubits
            .iter()
            .map(|qubit| {
                let position = qubit_indices
                    .iter()
                    .position(|measured| measured == qubit)
                    .expect("observable acts on a qubit absent from the measurement");
                if shot[position] { -1.0 } else { 1.0 }
            })
            .product()
    }
}

/// A sum of Pauli-Z strings evaluated against measured bitstrings.
#[derive(Debug, Clone, PartialEq)]
pub struct Observable {
    terms : Vec<PauliZString>,
}

impl Observable {
    pub fn new(terms : Vec<PauliZString>) -> Observable {
        Observable { terms }
    }

    /// Z on a single qubit.
    pub fn z(qubit : usize) -> Observable {
        Observable::new(vec![PauliZString::new(1.0, vec![qubit])])
    }

    pub fn terms(self : &Self) -> &[PauliZString] {
        &self.terms
    }

    /// Expectation value over a batch of measurement results: the mean over
    /// results of the shot-averaged eigenvalue of every term.
    pub fn expectation(self : &Self, results : &[MeasurementResult]) -> f64 {
        assert!(!results.is_empty());

        let total : f64 = results.iter().map(|result| self.expectation_from_result(result)).sum();
        total / results.len() as f64
    }

    fn expectation_from_result(self : &Self, result : &MeasurementResult) -> f64 {
        assert!(!result.is_empty());

        self.terms
            .iter()
            .map(|term| {
                let shot_sum : f64 = result
                    .shots()
                    .iter()
                    .map(|shot| term.eigenvalue(shot, result.qubit_indices()))
                    .sum();
                term.coefficient * shot_sum / result.num_shots() as f64
            })
            .sum()
    }
}
