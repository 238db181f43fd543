use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("crag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let corpus_dir = root.join("corpus");
    fs::create_dir_all(corpus_dir.join("web")).unwrap();
    fs::write(
        corpus_dir.join("web").join("xss.md"),
        "# Cross-site scripting\n\nReflected XSS payloads often use script tags and event handlers.",
    )
    .unwrap();
    fs::write(
        corpus_dir.join("ssrf.txt"),
        "Server-side request forgery can reach cloud metadata endpoints on 169.254.169.254.",
    )
    .unwrap();
    fs::write(
        corpus_dir.join("sqli.yaml"),
        "technique: sql injection\npayloads:\n  - \"' OR 1=1 --\"\n  - \"UNION SELECT\"\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[corpus]
root = '{root}/corpus'

[db]
path = '{root}/index/crag.sqlite'

[embedding]
provider = "hash"
dims = 256

[generation]
provider = "disabled"

[[sources]]
name = "web"
dir = "web"
url = "https://example.com/web-notes"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("crag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_crag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = crag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_crag(&config_path, &["init"]);
    assert!(success, "second init failed");
}

#[test]
fn test_index_then_reindex_skips_unchanged() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crag(&config_path, &["index", "--progress", "off"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files processed: 3"), "{}", stdout);

    let (stdout, _, success) = run_crag(&config_path, &["index", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("files processed: 0"), "{}", stdout);
    assert!(stdout.contains("unchanged: 3"), "{}", stdout);
}

#[test]
fn test_index_replaces_edited_and_prunes_deleted() {
    let (tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["index", "--progress", "off"]);

    let corpus = tmp.path().join("corpus");
    fs::write(corpus.join("ssrf.txt"), "Edited: DNS rebinding defeats naive SSRF allow-lists.").unwrap();
    fs::remove_file(corpus.join("sqli.yaml")).unwrap();

    let (stdout, _, success) =
        run_crag(&config_path, &["index", "--prune", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("files processed: 1"), "{}", stdout);
    assert!(stdout.contains("removed: 1"), "{}", stdout);

    let (stdout, _, success) = run_crag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:   2"), "{}", stdout);
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_crag(&config_path, &["index", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("files found: 3"), "{}", stdout);
    assert!(!tmp.path().join("index").join("crag.sqlite").exists());
}

#[test]
fn test_search_ranks_matching_document_first() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["index", "--progress", "off"]);

    let (stdout, stderr, success) =
        run_crag(&config_path, &["search", "server-side request forgery metadata", "--limit", "2"]);
    assert!(success, "search failed: {}", stderr);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. ["), "{}", stdout);
    assert!(first.contains("ssrf.txt"), "{}", stdout);
    assert!(!stdout.contains("3. ["));
}

#[test]
fn test_ask_without_generator_returns_snippets() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["index", "--progress", "off"]);

    let (stdout, stderr, success) =
        run_crag(&config_path, &["ask", "reflected cross-site scripting payloads", "--k", "1"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("answer generation disabled"), "{}", stdout);
    assert!(stdout.contains("Source 1: xss.md"), "{}", stdout);
}

#[test]
fn test_ask_on_empty_index_reports_no_information() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);

    let (stdout, _, success) = run_crag(&config_path, &["ask", "anything at all"]);
    assert!(success);
    assert!(stdout.contains("No relevant information found"), "{}", stdout);
}

#[test]
fn test_sources_record_and_list() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_crag(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("never"), "{}", stdout);

    let (stdout, stderr, success) = run_crag(&config_path, &["sources", "record", "web"]);
    assert!(success, "record failed: {}", stderr);
    assert!(stdout.contains("recorded web: 1 files"), "{}", stdout);
    assert!(tmp.path().join("corpus").join("update_metadata.json").exists());

    let (stdout, _, success) = run_crag(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("total files: 1"), "{}", stdout);

    // The metadata file sits in the corpus root but is never indexed.
    let (stdout, _, _) = run_crag(&config_path, &["index", "--dry-run"]);
    assert!(stdout.contains("files found: 3"), "{}", stdout);

    let (_, _, success) = run_crag(&config_path, &["sources", "record", "nope"]);
    assert!(!success);
}

#[test]
fn test_disabled_embedding_refuses_to_index() {
    let (_tmp, config_path) = setup_test_env();
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("provider = \"hash\"", "provider = \"disabled\"");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_crag(&config_path, &["index", "--progress", "off"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "{}", stderr);
}

#[test]
fn test_invalid_chunking_config_is_fatal() {
    let (_tmp, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[chunking]\nchunk_size = 100\noverlap = 150\n");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_crag(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("overlap"), "{}", stderr);
}
