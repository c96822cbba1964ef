use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragmind_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ragmind"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // The default settings point at ./docs, relative to the working directory.
    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.",
    )
    .unwrap();

    let extra_dir = root.join("extra");
    fs::create_dir_all(&extra_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/ragmind.sqlite"

[settings]
path = "{root}/data/settings.json"

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ragmind.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ragmind(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragmind_binary();
    let workdir = config_path.parent().unwrap().parent().unwrap();
    let output = Command::new(&binary)
        .current_dir(workdir)
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragmind binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragmind(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/ragmind.sqlite").exists());
    assert!(tmp.path().join("data/settings.json").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ragmind(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_ragmind(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_init_writes_starter_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config").join("ragmind.toml");

    let (stdout, stderr, success) = run_ragmind(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Wrote starter configuration"));
    assert!(config_path.exists());
    // The starter config keeps its data under ./data.
    assert!(tmp.path().join("data/settings.json").exists());
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config").join("absent.toml");

    let (_, stderr, success) = run_ragmind(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("absent.toml"), "stderr: {}", stderr);
}

#[test]
fn test_paths_add_list_remove() {
    let (tmp, config_path) = setup_test_env();
    let extra = tmp.path().join("extra");
    let extra = extra.to_str().unwrap();

    let (stdout, _, success) = run_ragmind(&config_path, &["paths", "list"]);
    assert!(success);
    assert_eq!(stdout.trim(), "./docs");

    let (stdout, stderr, success) = run_ragmind(&config_path, &["paths", "add", extra]);
    assert!(success, "add failed: {}", stderr);
    assert!(stdout.contains("Added document path"));

    let (stdout, _, _) = run_ragmind(&config_path, &["paths", "list"]);
    let listed: Vec<&str> = stdout.lines().collect();
    assert_eq!(listed, vec!["./docs", extra]);

    let (_, stderr, success) = run_ragmind(&config_path, &["paths", "add", extra]);
    assert!(!success, "duplicate add should fail");
    assert!(stderr.contains("already configured"), "stderr: {}", stderr);

    let (_, stderr, success) = run_ragmind(&config_path, &["paths", "add", "/no/such/folder"]);
    assert!(!success, "nonexistent add should fail");
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);

    let (stdout, _, success) = run_ragmind(&config_path, &["paths", "remove", extra]);
    assert!(success);
    assert!(stdout.contains("Removed document path"));

    let (stdout, _, success) = run_ragmind(&config_path, &["paths", "remove", extra]);
    assert!(success);
    assert!(stdout.contains("not configured"));
}

#[test]
fn test_settings_prints_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragmind(&config_path, &["settings"]);
    assert!(success, "settings failed: {}", stderr);
    let settings: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(settings["n_results"], 5);
    assert_eq!(settings["chunk_size"], 1000);
    assert_eq!(settings["chunk_overlap"], 100);
    assert_eq!(settings["use_augmentation"], true);
}

#[test]
fn test_corrupt_settings_file_is_an_error() {
    let (tmp, config_path) = setup_test_env();
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    fs::write(tmp.path().join("data/settings.json"), "{ not json").unwrap();

    let (_, stderr, success) = run_ragmind(&config_path, &["settings"]);
    assert!(!success);
    assert!(stderr.contains("cannot parse"), "stderr: {}", stderr);
}

#[test]
fn test_stats_on_fresh_database() {
    let (_tmp, config_path) = setup_test_env();
    run_ragmind(&config_path, &["init"]);

    let (stdout, stderr, success) = run_ragmind(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("rag_collection"));
    assert!(stdout.contains("Chunks:      0"));
}

#[test]
fn test_reindex_without_paths_succeeds() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_ragmind(&config_path, &["paths", "remove", "./docs"]);
    assert!(success);

    let (stdout, stderr, success) = run_ragmind(&config_path, &["reindex"]);
    assert!(success, "reindex failed: {}", stderr);
    assert!(stdout.contains("documents processed: 0"));
    assert!(stdout.contains("chunks written:      0"));
}

#[test]
fn test_reindex_with_disabled_embeddings_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragmind(&config_path, &["reindex"]);
    assert!(!success, "reindex should fail without an embedding provider");
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_ask_empty_question_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragmind(&config_path, &["ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("question must not be empty"), "stderr: {}", stderr);
}

#[test]
fn test_ask_with_disabled_providers_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragmind(&config_path, &["ask", "What is Rust?"]);
    assert!(!success);
    assert!(stderr.contains("embedding"), "stderr: {}", stderr);
}

#[test]
fn test_search_zero_limit_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragmind(&config_path, &["search", "rust", "--limit", "0"]);
    assert!(!success);
    assert!(stderr.contains("limit must be > 0"), "stderr: {}", stderr);
}
