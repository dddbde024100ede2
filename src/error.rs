use thiserror::Error;

/// Errors surfaced by the mitigation pipeline.
///
/// Every failure propagates to the immediate caller; there are no retries
/// and no partial corrections.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RciError {
    /// The mitigation was configured with unusable parameters. Raised when
    /// the calibrator or executor wrapper is constructed, before anything
    /// executes.
    #[error("invalid mitigation configuration: {0}")]
    Configuration(String),

    /// The supplied inverse confusion matrix does not act on the state
    /// space of the circuit being corrected.
    #[error(
        "inverse confusion matrix has shape {rows}x{cols}, \
         expected {expected}x{expected} for {qubits} qubit(s)"
    )]
    DimensionMismatch {
        rows : usize,
        cols : usize,
        expected : usize,
        qubits : usize,
    },

    /// Gauss-Jordan elimination found no usable pivot. The confusion matrix
    /// cannot be inverted; no pseudo-inverse is substituted.
    #[error("confusion matrix is singular and cannot be inverted")]
    SingularMatrix,

    /// A corrected probability vector has a non-finite entry or carries no
    /// positive weight, so no basis state can be drawn from it.
    #[error("corrected distribution has no finite positive weight to sample from")]
    DegenerateDistribution,
}
