//! Gemini client for pitching mechanics analysis.
//!
//! This crate provides:
//! - A `generateContent` REST client with model fallback
//! - Inline and by-reference video parts
//! - The coaching prompt and the structured-reply retry

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod prompt;

pub use analysis::{analyze_pitching, PitchingAnalysis};
pub use client::{GeminiClient, Generation, VideoInput};
pub use config::GeminiConfig;
pub use error::{GeminiError, GeminiResult};
pub use prompt::{build_analysis_prompt, reinforce_prompt, VIDEO_INSTRUCTION};
