pub use confusion_inversion::{
    correct_measurements, execute, execute_with_rci, mitigate_executor, sample_basis_state,
    InverseSource, MitigatedExecutor,
};
pub use confusion_matrix::{ReadoutCalibrator, TensoredConfusionMatrix};
pub use error::RciError;
pub use executor::{Circuit, Executor};
pub use measurement::MeasurementResult;
pub use observable::{Observable, PauliZString};

pub mod confusion_inversion;
pub mod confusion_matrix;
pub mod error;
pub mod executor;
pub mod linalg;
pub mod measurement;
pub mod observable;

#[cfg(feature = "python")]
mod bindings;
