//! Pluggable classification engines.
//!
//! The pipeline only depends on the [`Detector`] trait. [`rules::RuleDetector`] is the bundled,
//! configuration-driven implementation.

pub mod devices;
pub mod rules;

use crate::{error::DetectionError, headers::HeaderSet, result::ClassificationResult};

pub trait Detector {
    /// Classifies one header set. Fails on malformed input; never panics.
    fn detect(&self, headers: &HeaderSet) -> Result<ClassificationResult, DetectionError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, headers: &HeaderSet) -> Result<ClassificationResult, DetectionError> {
        (**self).detect(headers)
    }
}
