use std::ffi::OsString;
use std::fs;

use tempfile::TempDir;
use ortho_config::OrthoConfig;
use wharf_config::Config;

#[test]
fn malformed_config_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("wharf.toml");
    fs::write(&path, "port = not_a_number\n").expect("write malformed config");

    let args = vec![
        OsString::from("wharfd"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    assert!(
        !error.to_string().is_empty(),
        "expected a descriptive configuration error"
    );
}

#[test]
fn out_of_range_port_is_rejected() {
    let args = vec![
        OsString::from("wharfd"),
        OsString::from("--port"),
        OsString::from("70000"),
    ];

    assert!(Config::load_from_iter(args).is_err());
}
