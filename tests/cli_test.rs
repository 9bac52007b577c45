//! Exit status of the `atri` binary

use std::path::Path;
use std::process::{Command, Stdio};

fn atri(config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_atri"))
        .arg("--config")
        .arg(config)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn write_config(dir: &Path, disable_help_plugin: bool) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("plugins")).unwrap();
    std::fs::write(dir.join("plugins/ping.yaml"), "export: ping\n").unwrap();

    let config = dir.join("atri.yaml");
    std::fs::write(
        &config,
        format!(
            "base_dir: {}\nprefix: [\"/\"]\nadmin_id: [1]\ndisable_help_plugin: {}\ndisable_banner: true\nplugins:\n  - plugins/ping\n",
            dir.display(),
            disable_help_plugin
        ),
    )
    .unwrap();
    config
}

#[test]
fn test_stuck_plugin_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    // ping waits for help, which never loads
    let config = write_config(dir.path(), true);

    let output = atri(&config, &["run"]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_invalid_config_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("atri.yaml");
    std::fs::write(&config, "prefix: [\n").unwrap();

    let output = atri(&config, &["run"]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_resolved_plugins_run_until_input_closes() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), false);

    let output = atri(&config, &["run"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_version_prints_package_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = atri(&dir.path().join("missing.yaml"), &["version"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}
