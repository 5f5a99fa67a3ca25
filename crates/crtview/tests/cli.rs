use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn crtview(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crtview"))
        .args(args)
        .env("CRTVIEW_CONFIG_DIR", config_dir)
        .env_remove("CRTVIEW_PRESETS")
        .env("RUST_LOG", "off")
        .output()
        .expect("spawn crtview")
}

#[test]
fn lists_presets_from_explicit_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
version = 1
default = "amber"

[presets.amber]
phosphor = true
phosphor_latency = 0.5

[presets.green]
scanlines = true
"#,
    )
    .unwrap();

    let output = crtview(dir.path(), &["--presets", path.to_str().unwrap(), "--list-presets"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("amber (default)"), "{stdout}");
    assert!(stdout.contains("green"), "{stdout}");
    assert!(!stdout.contains("arcade"), "{stdout}");
}

#[test]
fn falls_back_to_builtin_presets() {
    let dir = tempdir().expect("tempdir");
    let output = crtview(dir.path(), &["--list-presets"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["neutral", "arcade (default)", "broadcast"] {
        assert!(stdout.contains(name), "missing {name} in {stdout}");
    }
}

#[test]
fn reads_presets_from_config_dir() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("presets.toml"),
        "version = 1\n\n[presets.homebrew]\nmask = true\n",
    )
    .unwrap();

    let output = crtview(dir.path(), &["--list-presets"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("homebrew"), "{stdout}");
}

#[test]
fn invalid_preset_file_fails() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "version = 7\n").unwrap();

    let output = crtview(dir.path(), &["--presets", path.to_str().unwrap(), "--list-presets"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load presets"), "{stderr}");
}

#[test]
fn rejects_zero_surface_size() {
    let dir = tempdir().expect("tempdir");
    let output = crtview(dir.path(), &["--size", "0x5", "--list-presets"]);
    assert!(!output.status.success());
}

#[test]
fn rejects_unknown_video_spec() {
    let dir = tempdir().expect("tempdir");
    let output = crtview(dir.path(), &["--spec", "hdtv", "--list-presets"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown video spec"), "{stderr}");
}
