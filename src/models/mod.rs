pub mod enums;
pub mod profile;
pub mod session;
pub mod summary;
pub mod turn;

pub use enums::*;
pub use profile::*;
pub use session::*;
pub use summary::*;
pub use turn::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Primary symptom is required")]
    EmptyPrimarySymptom,

    #[error("Intensity must be between 1 and 10, got {0}")]
    IntensityOutOfRange(i64),
}
