use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{DetectorProfile, ProfileCatalog};
use crate::session::{DEFAULT_CONFIDENCE_POSITION, MAX_CONFIDENCE_POSITION, MIN_CONFIDENCE_POSITION};

const DEFAULT_WEBCAM_INDEX: u32 = 0;
const DEFAULT_STREAM_URL: &str = "http://192.168.137.111:4747/video";
const DEFAULT_STYLESHEET: &str = "style.qss";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    profiles: Option<Vec<DetectorProfile>>,
    confidence: Option<u32>,
    webcam_index: Option<u32>,
    stream_url: Option<String>,
    stylesheet: Option<PathBuf>,
    icon: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profiles: Vec<DetectorProfile>,
    /// Initial confidence slider position (5..=90).
    pub confidence: u32,
    pub webcam_index: u32,
    pub stream_url: String,
    pub stylesheet: Option<PathBuf>,
    pub icon: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            confidence: DEFAULT_CONFIDENCE_POSITION,
            webcam_index: DEFAULT_WEBCAM_INDEX,
            stream_url: DEFAULT_STREAM_URL.to_string(),
            stylesheet: Some(PathBuf::from(DEFAULT_STYLESHEET)),
            icon: None,
        }
    }
}

impl AppConfig {
    /// Load from `SMARTCAM_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SMARTCAM_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file taking the place of
    /// `SMARTCAM_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            profiles: file.profiles.unwrap_or(defaults.profiles),
            confidence: file.confidence.unwrap_or(defaults.confidence),
            webcam_index: file.webcam_index.unwrap_or(defaults.webcam_index),
            stream_url: file.stream_url.unwrap_or(defaults.stream_url),
            stylesheet: file.stylesheet.or(defaults.stylesheet),
            icon: file.icon.or(defaults.icon),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SMARTCAM_STREAM_URL") {
            if !url.trim().is_empty() {
                self.stream_url = url;
            }
        }
        if let Ok(confidence) = std::env::var("SMARTCAM_CONFIDENCE") {
            self.confidence = confidence.trim().parse().map_err(|_| {
                anyhow!("SMARTCAM_CONFIDENCE must be an integer slider position (5-90)")
            })?;
        }
        if let Ok(index) = std::env::var("SMARTCAM_WEBCAM_INDEX") {
            self.webcam_index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("SMARTCAM_WEBCAM_INDEX must be a device index"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.profiles.is_empty() {
            return Err(anyhow!("at least one detector profile must be configured"));
        }
        ProfileCatalog::from_profiles(self.profiles.iter().cloned())?;
        if !(MIN_CONFIDENCE_POSITION..=MAX_CONFIDENCE_POSITION).contains(&self.confidence) {
            return Err(anyhow!(
                "confidence must be between {} and {}, got {}",
                MIN_CONFIDENCE_POSITION,
                MAX_CONFIDENCE_POSITION,
                self.confidence
            ));
        }
        if self.stream_url.trim().is_empty() {
            return Err(anyhow!("stream_url must not be empty"));
        }
        Ok(())
    }

    pub fn catalog(&self) -> Result<ProfileCatalog> {
        ProfileCatalog::from_profiles(self.profiles.iter().cloned())
    }

    /// Stylesheet contents, if the configured file exists. Best effort.
    pub fn load_stylesheet(&self) -> Option<String> {
        let path = self.stylesheet.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("stylesheet {} not found, skipping", path.display());
                None
            }
            Err(err) => {
                log::warn!("failed to read stylesheet {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Icon path, if the configured file exists. Best effort.
    pub fn icon_path(&self) -> Option<&Path> {
        let path = self.icon.as_deref()?;
        if path.is_file() {
            Some(path)
        } else {
            log::info!("icon {} not found, skipping", path.display());
            None
        }
    }
}

fn default_profiles() -> Vec<DetectorProfile> {
    vec![
        DetectorProfile::new(
            "Card suits (clubs, diamonds, hearts, spades)",
            "runs/train/model_suits/weights/best.onnx",
        )
        .with_classes(&["clubs", "diamonds", "hearts", "spades"]),
        DetectorProfile::new(
            "Playing cards (52 classes)",
            "runs/train/model_52_cards/weights/best.onnx",
        ),
    ]
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() -> Result<()> {
        let cfg = AppConfig::default();
        cfg.validate()?;
        assert_eq!(cfg.catalog()?.len(), 2);
        assert_eq!(cfg.confidence, 25);
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let cfg = AppConfig {
            confidence: 95,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_stylesheet_is_not_an_error() {
        let cfg = AppConfig {
            stylesheet: Some(PathBuf::from("/nonexistent/smartcam/style.qss")),
            icon: Some(PathBuf::from("/nonexistent/smartcam/icon.png")),
            ..AppConfig::default()
        };
        assert!(cfg.load_stylesheet().is_none());
        assert!(cfg.icon_path().is_none());
    }
}
