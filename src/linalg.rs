use ndarray::{s, Array2};

use crate::error::RciError;

/// Pivots at or below this magnitude are treated as zero during
/// elimination. A NaN pivot never compares above it, so degenerate input
/// is rejected the same way as a singular one.
const PIVOT_TOLERANCE : f64 = 1e-12;

/// Invert a square matrix by Gauss-Jordan elimination with partial
/// pivoting on the augmented system [A | I].
///
/// Fails with `SingularMatrix` when no usable pivot exists; no
/// pseudo-inverse is substituted.
pub fn invert(matrix : &Array2<f64>) -> Result<Array2<f64>, RciError> {
    assert_eq!(matrix.nrows(), matrix.ncols());
    let size = matrix.nrows();

    let mut augmented = Array2::<f64>::zeros((size, 2 * size));
    augmented.slice_mut(s![.., ..size]).assign(matrix);
    for row in 0..size {
        augmented[[row, size + row]] = 1.0;
    }

    for column in 0..size {
        let pivot_row = find_pivot(&augmented, column, size)?;
        if pivot_row != column {
            swap_rows(&mut augmented, pivot_row, column);
        }

        let pivot = augmented[[column, column]];
        for j in column..2 * size {
            augmented[[column, j]] /= pivot;
        }

        for row in 0..size {
            if row == column {
                continue;
            }
            let factor = augmented[[row, column]];
            if factor != 0.0 {
                for j in column..2 * size {
                    let pivot_row_value = augmented[[column, j]];
                    augmented[[row, j]] -= factor * pivot_row_value;
                }
            }
        }
    }

    Ok(augmented.slice(s![.., size..]).to_owned())
}

/// Largest-magnitude pivot in `column` on the unreduced rows.
fn find_pivot(augmented : &Array2<f64>, column : usize, size : usize) -> Result<usize, RciError> {
    let mut pivot_row = column;
    let mut pivot_magnitude = 0.0;
    for row in column..size {
        let magnitude = augmented[[row, column]].abs();
        if magnitude > pivot_magnitude {
            pivot_magnitude = magnitude;
            pivot_row = row;
        }
    }

    if pivot_magnitude > PIVOT_TOLERANCE {
        Ok(pivot_row)
    } else {
        Err(RciError::SingularMatrix)
    }
}

fn swap_rows(augmented : &mut Array2<f64>, a : usize, b : usize) {
    for j in 0..augmented.ncols() {
        augmented.swap([a, j], [b, j]);
    }
}

/// Kronecker product of the factors in order; the first factor addresses
/// the most significant bits of the joint index, matching the bit
/// convention in `measurement`.
pub fn tensor_product(factors : &[Array2<f64>]) -> Array2<f64> {
    factors
        .iter()
        .fold(Array2::<f64>::eye(1), |joint, factor| ndarray::linalg::kron(&joint, factor))
}
