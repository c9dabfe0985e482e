use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use smartcam::AppConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SMARTCAM_CONFIG",
        "SMARTCAM_STREAM_URL",
        "SMARTCAM_CONFIDENCE",
        "SMARTCAM_WEBCAM_INDEX",
    ] {
        std::env::remove_var(key);
    }
}

fn temp_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load defaults");
    assert_eq!(cfg.confidence, 25);
    assert_eq!(cfg.webcam_index, 0);
    assert_eq!(cfg.stream_url, "http://192.168.137.111:4747/video");
    let catalog = cfg.catalog().expect("catalog");
    assert_eq!(catalog.len(), 2);
    assert!(catalog
        .at(0)
        .is_some_and(|p| p.resource.ends_with("model_suits/weights/best.onnx")));
}

#[test]
fn loads_toml_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = temp_config(
        ".toml",
        r#"
confidence = 40
webcam_index = 1
stream_url = "rtsp://10.0.0.7/table"

[[profiles]]
label = "Card suits"
resource = "stub://suits"
classes = ["clubs", "diamonds", "hearts", "spades"]

[[profiles]]
label = "Playing cards"
resource = "models/cards.onnx"
"#,
    );
    std::env::set_var("SMARTCAM_CONFIG", file.path());
    std::env::set_var("SMARTCAM_WEBCAM_INDEX", "2");

    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.confidence, 40);
    assert_eq!(cfg.webcam_index, 2);
    assert_eq!(cfg.stream_url, "rtsp://10.0.0.7/table");
    assert_eq!(cfg.profiles.len(), 2);
    assert_eq!(cfg.profiles[0].classes.len(), 4);
    assert!(cfg.profiles[1].classes.is_empty());

    clear_env();
}

#[test]
fn loads_json_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = temp_config(
        ".json",
        r#"{
            "profiles": [{ "label": "Suits", "resource": "stub://suits" }],
            "stylesheet": "themes/dark.qss"
        }"#,
    );
    std::env::set_var("SMARTCAM_STREAM_URL", "http://10.0.0.9:4747/video");

    let cfg = AppConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.profiles.len(), 1);
    assert_eq!(cfg.stream_url, "http://10.0.0.9:4747/video");
    assert_eq!(
        cfg.stylesheet.as_deref(),
        Some(std::path::Path::new("themes/dark.qss"))
    );
    assert!(cfg.load_stylesheet().is_none());

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SMARTCAM_CONFIDENCE", "0.5");
    assert!(AppConfig::load().is_err());

    std::env::set_var("SMARTCAM_CONFIDENCE", "95");
    assert!(AppConfig::load().is_err());
    clear_env();

    let duplicate = temp_config(
        ".json",
        r#"{
            "profiles": [
                { "label": "Suits", "resource": "stub://a" },
                { "label": "Suits", "resource": "stub://b" }
            ]
        }"#,
    );
    assert!(AppConfig::load_from(Some(duplicate.path())).is_err());

    let empty = temp_config(".toml", "profiles = []\n");
    assert!(AppConfig::load_from(Some(empty.path())).is_err());

    let missing = AppConfig::load_from(Some(std::path::Path::new("/nonexistent/smartcam.toml")));
    assert!(missing.is_err());
}

#[test]
fn stylesheet_is_best_effort() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let qss = temp_config(".qss", "QMainWindow { background: #101418; }");
    let cfg = AppConfig {
        stylesheet: Some(qss.path().to_path_buf()),
        ..AppConfig::default()
    };
    assert!(cfg
        .load_stylesheet()
        .is_some_and(|css| css.contains("QMainWindow")));
}

#[test]
fn icon_resolves_only_when_present() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let icon = temp_config(".png", "not really a png");
    let present = AppConfig {
        icon: Some(icon.path().to_path_buf()),
        ..AppConfig::default()
    };
    assert_eq!(present.icon_path(), Some(icon.path()));

    let missing = AppConfig {
        icon: Some("/nonexistent/icon.png".into()),
        ..AppConfig::default()
    };
    assert!(missing.icon_path().is_none());
    assert!(AppConfig::default().icon_path().is_none());
}
