//! End-to-end checks of the `artgen` binary that never reach a model:
//! every case here fails validation (or does no work) before the first
//! generation or embedding call.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn artgen_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_artgen"))
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[generation]
provider = "ollama"
url = "http://127.0.0.1:9"
timeout_secs = 2

[index]
backend = "sqlite"
path = "{}/data/index.sqlite"
{}
"#,
        root.display(),
        extra
    );

    let config_path = config_dir.join("artgen.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_artgen(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = artgen_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run artgen binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_completions_without_config() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, success) = run_artgen(&config, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("artgen"));
}

#[test]
fn test_generate_rejects_empty_topic() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, success) = run_artgen(&config, &["generate", "--topic", "  "]);
    assert!(!success);
    assert!(
        stderr.contains("scratch flow failed at validate"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_generate_rejects_length_below_minimum() {
    let (_tmp, config) = setup_test_env("[article]\nmin_length = 300\n");
    let (_, stderr, success) =
        run_artgen(&config, &["generate", "--topic", "Tides", "--length", "50"]);
    assert!(!success);
    assert!(stderr.contains("below the minimum of 300"), "stderr: {}", stderr);
}

#[test]
fn test_generate_requires_topic() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, success) = run_artgen(&config, &["generate"]);
    assert!(!success);
    assert!(stderr.contains("--topic is required"));
}

#[test]
fn test_variants_zero_count_prints_empty_json() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, success) = run_artgen(
        &config,
        &["variants", "--topic", "Tides", "--count", "0", "--json"],
    );
    assert!(success);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_variants_negative_count_is_not_an_error() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, success) =
        run_artgen(&config, &["variants", "--topic", "Tides", "--count", "-2"]);
    assert!(success);
    assert!(stdout.trim().is_empty());
}

#[test]
fn test_enhance_empty_article_file() {
    let (tmp, config) = setup_test_env("");
    let article = tmp.path().join("empty.txt");
    fs::write(&article, "   \n").unwrap();

    let (_, stderr, success) = run_artgen(
        &config,
        &["enhance", "--article", article.to_str().unwrap(), "--kind", "bogus"],
    );
    assert!(!success);
    assert!(
        stderr.contains("enhance flow failed at validate"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_research_invalid_chunk_config() {
    let (tmp, config) = setup_test_env("[chunking]\nchunk_size = 300\nchunk_overlap = 500\n");
    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "The moon pulls the oceans.").unwrap();

    let (_, stderr, success) = run_artgen(
        &config,
        &[
            "research",
            "--topic",
            "Tides",
            "--research",
            notes.to_str().unwrap(),
        ],
    );
    assert!(!success);
    assert!(stderr.contains("rag flow failed at chunk"), "stderr: {}", stderr);
}

#[test]
fn test_research_missing_file() {
    let (tmp, config) = setup_test_env("");
    let missing = tmp.path().join("missing.json");

    let (_, stderr, success) = run_artgen(
        &config,
        &[
            "research",
            "--topic",
            "Tides",
            "--research",
            missing.to_str().unwrap(),
        ],
    );
    assert!(!success);
    assert!(stderr.contains("Failed to read research file"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("artgen.toml");
    fs::write(&config, "[generation]\nprovider = \"carrier-pigeon\"\n").unwrap();

    let (_, stderr, success) = run_artgen(&config, &["generate", "--topic", "Tides"]);
    assert!(!success);
    assert!(stderr.contains("Unknown generation provider"), "stderr: {}", stderr);
}
