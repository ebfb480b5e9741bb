use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use detect_client::config::{ClientConfig, ConfigOverrides};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DETECT_CONFIG",
        "DETECT_SERVER_URL",
        "DETECT_CONFIDENCE",
        "DETECT_DOWNLOAD_DIR",
        "DETECT_NOTIFICATION_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ClientConfig::load().expect("load config");
    assert_eq!(cfg.server_url, "http://127.0.0.1:5000");
    assert_eq!(cfg.confidence, 0.25);
    assert_eq!(cfg.download_dir, PathBuf::from("."));
    assert_eq!(cfg.notification_duration, Duration::from_millis(5000));
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "server": { "url": "http://detector.local:5000" },
        "processing": { "confidence": 0.4 },
        "download": { "dir": "/tmp/detections" },
        "notifications": { "duration_ms": 3000 }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("DETECT_CONFIG", file.path());
    std::env::set_var("DETECT_CONFIDENCE", "0.6");
    std::env::set_var("DETECT_NOTIFICATION_MS", "1500");

    let cfg = ClientConfig::load().expect("load config");
    assert_eq!(cfg.server_url, "http://detector.local:5000");
    assert_eq!(cfg.confidence, 0.6);
    assert_eq!(cfg.download_dir, PathBuf::from("/tmp/detections"));
    assert_eq!(cfg.notification_duration, Duration::from_millis(1500));

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
[server]
url = "stub://demo"

[processing]
confidence = 0.55
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("DETECT_CONFIG", file.path());
    std::env::set_var("DETECT_SERVER_URL", "https://detector.example:8443/api");

    let cfg = ClientConfig::load().expect("load config");
    assert_eq!(cfg.server_url, "https://detector.example:8443/api");
    assert_eq!(cfg.confidence, 0.55);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DETECT_CONFIDENCE", "1.5");
    assert!(ClientConfig::load().is_err());
    std::env::set_var("DETECT_CONFIDENCE", "high");
    assert!(ClientConfig::load().is_err());
    clear_env();

    std::env::set_var("DETECT_SERVER_URL", "ftp://detector.local");
    assert!(ClientConfig::load().is_err());
    clear_env();

    std::env::set_var("DETECT_NOTIFICATION_MS", "0");
    assert!(ClientConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "server": { "url": "http://x" }, "colour": "red" }"#)
        .expect("write config");
    std::env::set_var("DETECT_CONFIG", file.path());
    assert!(ClientConfig::load().is_err());

    clear_env();
}

#[test]
fn command_line_values_replace_invalid_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DETECT_SERVER_URL", "ftp://detector.local");
    std::env::set_var("DETECT_CONFIDENCE", "high");
    assert!(ClientConfig::load().is_err());

    let cfg = ClientConfig::load_with(&ConfigOverrides {
        server_url: Some("stub://demo".to_string()),
        confidence: Some(0.7),
    })
    .expect("overrides replace the env values");
    assert_eq!(cfg.server_url, "stub://demo");
    assert_eq!(cfg.confidence, 0.7);

    // An override that is itself invalid still fails.
    assert!(ClientConfig::load_with(&ConfigOverrides {
        server_url: Some("stub://demo".to_string()),
        confidence: Some(2.0),
    })
    .is_err());

    clear_env();
}
