use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::backend::Detector;
use crate::detect::backends::StubDetector;
use crate::error::ModelLoadError;

/// A selectable detector: human-readable label plus model resource.
///
/// Selecting a profile does not load it; loading happens on session start.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DetectorProfile {
    pub label: String,
    /// Model path or `stub://<name>`.
    pub resource: String,
    /// Class names indexed by class id. Missing names render as `class N`.
    #[serde(default)]
    pub classes: Vec<String>,
}

impl DetectorProfile {
    pub fn new(label: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            resource: resource.into(),
            classes: Vec::new(),
        }
    }

    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// Ordered list of detector profiles, in menu order.
#[derive(Clone, Debug, Default)]
pub struct ProfileCatalog {
    profiles: Vec<DetectorProfile>,
}

impl ProfileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a profile. Labels must be unique and non-empty.
    pub fn register(&mut self, profile: DetectorProfile) -> Result<()> {
        if profile.label.trim().is_empty() {
            return Err(anyhow!("detector profile label must not be empty"));
        }
        if profile.resource.trim().is_empty() {
            return Err(anyhow!(
                "detector profile '{}' has an empty resource",
                profile.label
            ));
        }
        if self.position(&profile.label).is_some() {
            return Err(anyhow!(
                "detector profile '{}' registered twice",
                profile.label
            ));
        }
        self.profiles.push(profile);
        Ok(())
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = DetectorProfile>) -> Result<Self> {
        let mut catalog = Self::new();
        for profile in profiles {
            catalog.register(profile)?;
        }
        Ok(catalog)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.label == label)
    }

    pub fn at(&self, index: usize) -> Option<&DetectorProfile> {
        self.profiles.get(index)
    }

    /// List labels in menu order.
    pub fn labels(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Turns a profile into a ready detector.
///
/// Loading is slow and may fail; the controller calls it on start and never
/// retries on its own.
pub trait DetectorLoader {
    fn load(&self, profile: &DetectorProfile) -> Result<Box<dyn Detector>, ModelLoadError>;
}

/// Default loader: `stub://` resources load the stub detector, `.onnx`
/// paths load the tract backend (feature: backend-tract).
#[derive(Clone, Debug)]
pub struct ModelLoader {
    /// Square model input size in pixels.
    pub input_size: u32,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { input_size: 640 }
    }
}

impl ModelLoader {
    fn load_detector(&self, profile: &DetectorProfile) -> Result<Box<dyn Detector>> {
        if let Some(name) = profile.resource.strip_prefix("stub://") {
            return Ok(Box::new(StubDetector::new(name, profile.classes.clone())));
        }

        let path = Path::new(&profile.resource);
        if !path.is_file() {
            return Err(anyhow!("model file {} does not exist", path.display()));
        }
        let is_onnx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
        if !is_onnx {
            return Err(anyhow!(
                "unsupported model format {} (expected an .onnx export)",
                path.display()
            ));
        }
        self.load_onnx(path, profile)
    }

    #[cfg(feature = "backend-tract")]
    fn load_onnx(&self, path: &Path, profile: &DetectorProfile) -> Result<Box<dyn Detector>> {
        let detector = crate::detect::backends::TractDetector::new(
            path,
            self.input_size,
            profile.classes.clone(),
        )?;
        Ok(Box::new(detector))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn load_onnx(&self, path: &Path, _profile: &DetectorProfile) -> Result<Box<dyn Detector>> {
        Err(anyhow!(
            "loading {} requires the backend-tract feature",
            path.display()
        ))
    }
}

impl DetectorLoader for ModelLoader {
    fn load(&self, profile: &DetectorProfile) -> Result<Box<dyn Detector>, ModelLoadError> {
        let wrap = |error: anyhow::Error| ModelLoadError {
            label: profile.label.clone(),
            resource: profile.resource.clone(),
            error,
        };
        let mut detector = self.load_detector(profile).map_err(wrap)?;
        detector.warm_up().map_err(wrap)?;
        log::info!(
            "loaded detector '{}' ({}) from {}",
            profile.label,
            detector.name(),
            profile.resource
        );
        Ok(detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keeps_menu_order_and_rejects_duplicates() -> Result<()> {
        let mut catalog = ProfileCatalog::new();
        catalog.register(DetectorProfile::new("Suits", "stub://suits"))?;
        catalog.register(DetectorProfile::new("Cards", "stub://cards"))?;
        assert_eq!(catalog.labels(), vec!["Suits", "Cards"]);
        assert_eq!(catalog.position("Cards"), Some(1));
        assert!(catalog
            .register(DetectorProfile::new("Suits", "other.onnx"))
            .is_err());
        assert!(catalog.register(DetectorProfile::new(" ", "x.onnx")).is_err());
        assert!(catalog.register(DetectorProfile::new("Empty", "")).is_err());
        Ok(())
    }

    #[test]
    fn loads_stub_profiles() {
        let loader = ModelLoader::default();
        let detector = loader
            .load(&DetectorProfile::new("Suits", "stub://suits"))
            .expect("stub profile loads");
        assert_eq!(detector.name(), "suits");
    }

    #[test]
    fn missing_model_is_a_load_error() {
        let loader = ModelLoader::default();
        let err = loader
            .load(&DetectorProfile::new(
                "Cards",
                "/nonexistent/runs/train/weights/best.onnx",
            ))
            .err()
            .expect("missing model must fail");
        assert_eq!(err.label, "Cards");
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn non_onnx_model_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let weights = dir.path().join("best.pt");
        std::fs::write(&weights, b"torch")?;
        let loader = ModelLoader::default();
        let profile = DetectorProfile::new("Torch", weights.to_string_lossy());
        assert!(loader.load(&profile).is_err());
        Ok(())
    }

    #[cfg(feature = "backend-tract")]
    #[test]
    fn onnx_profiles_reach_the_tract_backend() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let weights = dir.path().join("best.onnx");
        std::fs::write(&weights, b"not an onnx graph")?;
        let loader = ModelLoader::default();
        let profile = DetectorProfile::new("Cards", weights.to_string_lossy());

        let err = loader.load(&profile).err().expect("garbage weights must fail");
        let message = format!("{:#}", err.error);
        assert!(message.contains("failed to load ONNX model"), "{}", message);
        assert!(!message.contains("requires the backend-tract feature"));
        Ok(())
    }
}
