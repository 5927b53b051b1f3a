//! Business logic services.

pub mod analyzer;

pub use analyzer::{AnalyzerError, AnalyzerSettings, MechanicsAnalyzer, VideoSource};
