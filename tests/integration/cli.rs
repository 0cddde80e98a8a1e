// End-to-end checks of the ffmerge binary that need no real ffmpeg

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const MISSING_TOOLS: &str = r#"
[tools]
ffmpeg = "/nonexistent/ffmpeg-for-tests"
ffprobe = "/nonexistent/ffprobe-for-tests"
"#;

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

fn ffmerge(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ffmerge"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn empty_directory_exits_with_invalid_input() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), MISSING_TOOLS);
    let videos = tmp.path().join("videos");
    fs::create_dir(&videos).unwrap();
    fs::write(videos.join("notes.txt"), b"not a video").unwrap();
    let out = tmp.path().join("out.mp4");

    let output = ffmerge(
        &config,
        &["merge", videos.to_str().unwrap(), "-o", out.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no matching inputs"));
    assert!(!out.exists());
}

#[test]
fn missing_ffmpeg_exits_with_invalid_input() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), MISSING_TOOLS);
    let input = tmp.path().join("a.mp4");
    fs::write(&input, b"video").unwrap();
    let out = tmp.path().join("out.mp4");

    let output = ffmerge(
        &config,
        &["merge", input.to_str().unwrap(), "-o", out.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("is not available"));
}

#[test]
fn existing_output_exits_before_running_anything() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), MISSING_TOOLS);
    let input = tmp.path().join("a.mp4");
    fs::write(&input, b"video").unwrap();
    let out = tmp.path().join("out.mp4");
    fs::write(&out, b"existing").unwrap();

    // An explicit encoder skips the probe, so the output check is reached
    let output = ffmerge(
        &config,
        &[
            "merge",
            input.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--encoder",
            "libx264",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("output already exists"));
    assert_eq!(fs::read(&out).unwrap(), b"existing");
}

#[test]
fn dry_run_prints_manifest_and_both_attempts() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), MISSING_TOOLS);
    for name in ["b.mp4", "a.mp4", "skip.txt"] {
        fs::write(tmp.path().join(name), b"video").unwrap();
    }
    let out = tmp.path().join("merged.mp4");

    let output = ffmerge(
        &config,
        &[
            "merge",
            tmp.path().to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--encoder",
            "libx264",
            "--audio",
            "transcode",
            "--dry-run",
        ],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ffconcat version 1.0"));
    let a = stdout.find("a.mp4'").unwrap();
    let b = stdout.find("b.mp4'").unwrap();
    assert!(a < b, "inputs are listed in sorted order");
    assert!(!stdout.contains("skip.txt"));
    assert!(stdout.contains("# primary"));
    assert!(stdout.contains("# retry"));
    assert!(stdout.contains("libx264"));
    assert!(!out.exists());
}

#[test]
fn broken_config_exits_with_invalid_input() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "[defaults\nthis is not toml");

    let output = ffmerge(&config, &["encoders"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to parse config file"));
}

#[test]
fn init_config_creates_a_loadable_default() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("nested").join("config.toml");

    let output = ffmerge(&config, &["init-config"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(config.exists());

    let contents = fs::read_to_string(&config).unwrap();
    let parsed: ffmerge::config::Config = toml::from_str(&contents).unwrap();
    assert_eq!(parsed.retry.quality_offset, 2);

    // Second run reports the existing file
    let output = ffmerge(&config, &["init-config"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Config loaded successfully"));
}
