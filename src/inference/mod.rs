pub mod client;
pub mod parse;
pub mod prompt;
pub mod wire;

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::models::{AnalysisResult, EncodedImage};

pub use client::GeminiClient;
pub use parse::parse_analysis;

/// Counts the people visible in one image. One attempt per call, no retry.
#[async_trait]
pub trait PeopleCounter: Send + Sync {
    async fn analyze(&self, image: &EncodedImage) -> Result<AnalysisResult, AnalysisError>;
}
