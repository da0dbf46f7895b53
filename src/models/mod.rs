pub mod analysis;
pub mod frame;
pub mod encoded;

pub use analysis::{AnalysisResult, ConfidenceLevel};
pub use frame::{Frame, PixelFormat};
pub use encoded::EncodedImage;
