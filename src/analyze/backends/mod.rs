pub mod luma;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use luma::{LumaEmotionClassifier, LumaFaceDetector};
pub use stub::{StubEmotionClassifier, StubFaceDetector, StubStep};

#[cfg(feature = "backend-tract")]
pub use tract::TractEmotionClassifier;
