//! Config file loading for node hosts.

use std::io::Write;

use tempfile::NamedTempFile;

use frameflow::capture::CaptureSource;
use frameflow::config::{KEY_FPS, KEY_WIDTH};
use frameflow::{FrameAcquisitionNode, HealthStatus, Node, NodeConfig};

#[test]
fn loads_config_from_json_file() {
    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "name": "camera-front",
        "source": "stub://clip?frames=40",
        "width": 320,
        "height": 240,
        "fps": 15
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    let config = NodeConfig::from_file(file.path()).expect("load config");
    assert_eq!(config.name(), "camera-front");
    assert_eq!(
        config.source(),
        CaptureSource::Stub("stub://clip?frames=40".to_string())
    );
    assert_eq!(config.get_u32(KEY_WIDTH), Some(320));
    assert_eq!(config.get_u32(KEY_FPS), Some(15));
}

#[test]
fn loaded_config_drives_a_node() {
    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{"name": "camera-rear", "source": "stub://cam", "width": 320, "height": 240}"#;
    file.write_all(json.as_bytes()).expect("write config");

    let config = NodeConfig::from_file(file.path()).expect("load config");
    let mut node = FrameAcquisitionNode::new(config);
    assert_eq!(node.name(), "camera-rear");

    node.setup().expect("setup");
    assert_eq!(node.metrics().health(), Some(HealthStatus::Healthy));
    node.teardown();
}

#[test]
fn missing_file_is_an_error() {
    let err = NodeConfig::from_file(std::path::Path::new("/no/such/config.json")).unwrap_err();
    assert!(err.to_string().contains("/no/such/config.json"));
}

#[test]
fn malformed_json_is_an_error() {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"not json").expect("write config");
    assert!(NodeConfig::from_file(file.path()).is_err());
}
