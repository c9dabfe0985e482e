mod annotate;
mod backend;
mod backends;
mod profiles;
mod result;

pub use annotate::{annotate, normalize_box};
pub use backend::Detector;
pub use backends::StubDetector;
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use profiles::{DetectorLoader, DetectorProfile, ModelLoader, ProfileCatalog};
pub use result::{non_max_suppression, Detection, Inference};
