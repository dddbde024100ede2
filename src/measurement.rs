use crate::error::RciError;

/// An ordered sequence of measurement shots over a fixed set of qubits.
///
/// Each shot is one bit per measured qubit. `qubit_indices` records which
/// qubit each bit position belongs to; corrected results reuse the ordering
/// of the noisy input they were derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementResult {
    shots : Vec<Vec<bool>>,
    qubit_indices : Vec<usize>,
}

impl MeasurementResult {
    /// Every shot must be as wide as the qubit index list.
    pub fn new(shots : Vec<Vec<bool>>, qubit_indices : Vec<usize>) -> Result<MeasurementResult, RciError> {
        if let Some(bad) = shots.iter().find(|shot| shot.len() != qubit_indices.len()) {
            return Err(RciError::Configuration(format!(
                "shot of width {} does not cover {} recorded qubit(s)",
                bad.len(),
                qubit_indices.len()
            )));
        }
        Ok(MeasurementResult { shots, qubit_indices })
    }

    pub fn shots(self : &Self) -> &[Vec<bool>] {
        &self.shots
    }

    pub fn qubit_indices(self : &Self) -> &[usize] {
        &self.qubit_indices
    }

    pub fn num_qubits(self : &Self) -> usize {
        self.qubit_indices.len()
    }

    pub fn num_shots(self : &Self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(self : &Self) -> bool {
        self.shots.is_empty()
    }
}

/// Basis-state index of a bit vector. The first bit is the most significant:
/// the shot [true, false] on qubits (0, 1) is state |10> with index 2.
///
/// The Kronecker ordering in `confusion_matrix` follows the same convention,
/// so indices computed here address the correct matrix rows and columns.
pub fn bits_to_index(bits : &[bool]) -> usize {
    bits.iter().fold(0, |index, bit| (index << 1) | *bit as usize)
}

/// Inverse of `bits_to_index` for a fixed bit width.
pub fn index_to_bits(index : usize, width : usize) -> Vec<bool> {
    (0..width).rev().map(|position| (index >> position) & 1 == 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{quickcheck, TestResult};

    #[test]
    fn rejects_ragged_shots() {
        let shots = vec![vec![false, true], vec![true]];
        assert!(MeasurementResult::new(shots, vec![0, 1]).is_err());
    }

    #[test]
    fn first_qubit_is_most_significant() {
        assert_eq!(bits_to_index(&[true, false]), 2);
        assert_eq!(bits_to_index(&[false, true]), 1);
        assert_eq!(index_to_bits(2, 2), vec![true, false]);
    }

    #[test]
    fn empty_result_is_empty() {
        let result = MeasurementResult::new(vec![], vec![0, 1]).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.num_qubits(), 2);
    }

    quickcheck! {
        fn index_roundtrips_through_bits(bits : Vec<bool>) -> TestResult {
            if bits.is_empty() || bits.len() > usize::BITS as usize - 1 {
                return TestResult::discard();
            }
            TestResult::from_bool(index_to_bits(bits_to_index(&bits), bits.len()) == bits)
        }
    }
}
