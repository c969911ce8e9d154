//! Étapes du pipeline: validation, réparation, reprojection, dédoublonnage

pub mod cleaner;
pub mod identity;
pub mod repair;
pub mod validator;

pub use cleaner::{CleaningResult, GeometryCleaner};
pub use validator::{GeometryReport, ValidationMetadata, ValidationResult, VectorValidator};
