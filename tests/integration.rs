use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn askdocs_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_askdocs"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    setup_test_env_with("")
}

/// Temp workspace with `config/`, `data/` and `files/`, using the offline
/// hash embedder and echo generator. `extra` is appended to the config.
fn setup_test_env_with(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("notes")).unwrap();
    fs::write(
        files_dir.join("paris.md"),
        "# France\n\nParis is the capital of France. It has a population of 2 million.",
    )
    .unwrap();
    fs::write(
        files_dir.join("rust.txt"),
        "Cargo builds Rust crates.\n\nIt resolves dependencies from crates.io.",
    )
    .unwrap();
    fs::write(
        files_dir.join("notes/ops.md"),
        "Kubernetes schedules containers onto nodes.",
    )
    .unwrap();
    fs::write(files_dir.join("notes/ignored.rs"), "fn main() {}").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/askdocs.sqlite"

[embedding]
provider = "hash"
dims = 128

[generation]
provider = "echo"

[server]
bind = "127.0.0.1:0"
{extra}"#,
        root = root.display(),
        extra = extra.replace("{root}", &root.display().to_string()),
    );

    let config_path = config_dir.join("askdocs.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

fn run_askdocs(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = askdocs_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run askdocs binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn ingest_files(config_path: &Path) -> String {
    let files = files_dir(config_path);
    let (stdout, stderr, success) =
        run_askdocs(config_path, &["ingest", files.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_askdocs(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/askdocs.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_askdocs(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_askdocs(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env_with("\n[retrieval]\nk = 0\n");

    let (_, stderr, success) = run_askdocs(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("retrieval.k"));
}

#[test]
fn test_ingest_directory_reports_each_document() {
    let (_tmp, config_path) = setup_test_env();

    let stdout = ingest_files(&config_path);
    assert!(stdout.contains("indexed  paris.md"));
    assert!(stdout.contains("indexed  rust.txt"));
    assert!(stdout.contains("indexed  notes/ops.md"));
    assert!(!stdout.contains("ignored.rs"));
    assert!(stdout.contains("Ingested 3 of 3 documents"));
}

#[test]
fn test_ask_answers_from_the_closest_document() {
    let (_tmp, config_path) = setup_test_env();
    ingest_files(&config_path);

    let (stdout, stderr, success) = run_askdocs(
        &config_path,
        &["ask", "What is the capital of France?", "--json"],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);

    let turn: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(turn["question"], "What is the capital of France?");
    assert_eq!(turn["answer"]["status"], "generated");
    assert!(turn["answer"]["text"].as_str().unwrap().contains("Paris"));

    let retrieval = turn["retrieval"].as_array().unwrap();
    assert!(!retrieval.is_empty() && retrieval.len() <= 3);
    assert_eq!(retrieval[0]["document_name"], "paris.md");
    assert!(retrieval[0]["source_url"]
        .as_str()
        .unwrap()
        .starts_with("file://"));
}

#[test]
fn test_ask_prints_source_citation() {
    let (_tmp, config_path) = setup_test_env();
    ingest_files(&config_path);

    let (stdout, _, success) = run_askdocs(&config_path, &["ask", "capital of France"]);
    assert!(success);
    assert!(stdout.contains("Paris is the capital of France."));
    assert!(stdout.contains("Source: paris.md (file://"));
}

#[test]
fn test_ask_without_corpus_says_so() {
    let (_tmp, config_path) = setup_test_env();
    run_askdocs(&config_path, &["init"]);

    let (stdout, stderr, success) = run_askdocs(&config_path, &["ask", "anything?"]);
    assert!(success, "ask failed: stderr={}", stderr);
    assert!(stdout.contains("No answer found."));
    assert!(stdout.contains("No relevant information found."));
}

#[test]
fn test_ask_is_deterministic() {
    let (_tmp, config_path) = setup_test_env();
    ingest_files(&config_path);

    let args = ["ask", "How does cargo resolve dependencies?", "--json"];
    let (first, _, _) = run_askdocs(&config_path, &args);
    let (second, _, _) = run_askdocs(&config_path, &args);
    assert_eq!(first, second);
}

#[test]
fn test_documents_lists_corpus() {
    let (_tmp, config_path) = setup_test_env();
    ingest_files(&config_path);

    let (stdout, _, success) = run_askdocs(&config_path, &["documents", "--json"]);
    assert!(success);
    let docs: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let names: Vec<&str> = docs
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["notes/ops.md", "paris.md", "rust.txt"]);

    let (stdout, _, success) = run_askdocs(&config_path, &["documents"]);
    assert!(success);
    assert!(stdout.contains("3 documents, 3 chunks."));
}

#[test]
fn test_second_ingest_replaces_corpus() {
    let (_tmp, config_path) = setup_test_env();
    ingest_files(&config_path);

    let only = files_dir(&config_path).join("rust.txt");
    let (stdout, stderr, success) =
        run_askdocs(&config_path, &["ingest", only.to_str().unwrap()]);
    assert!(success, "ingest failed: stderr={}", stderr);
    assert!(stdout.contains("Ingested 1 of 1 documents"));

    let (stdout, _, _) = run_askdocs(&config_path, &["documents", "--json"]);
    let docs: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(docs.as_array().unwrap().len(), 1);
    assert_eq!(docs[0]["name"], "rust.txt");

    let (stdout, _, _) = run_askdocs(&config_path, &["ask", "capital of France", "--json"]);
    let turn: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    for entry in turn["retrieval"].as_array().unwrap() {
        assert_eq!(entry["document_name"], "rust.txt");
    }
}

#[test]
fn test_ingest_with_only_unreadable_files_fails() {
    let (tmp, config_path) = setup_test_env();
    let broken = tmp.path().join("broken.pdf");
    fs::write(&broken, b"this is not a pdf").unwrap();

    let (stdout, _, success) = run_askdocs(&config_path, &["ingest", broken.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.contains("skipped  broken.pdf  [extract]"));
    assert!(stdout.contains("Ingested 0 of 1 documents"));
}

#[test]
fn test_ingest_missing_path_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) =
        run_askdocs(&config_path, &["ingest", "/definitely/not/a/real/path"]);
    assert!(!success);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_ingest_requires_input() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_askdocs(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("Nothing to ingest"));
}

#[test]
fn test_local_blob_storage_keeps_originals_of_live_corpus() {
    let (tmp, config_path) =
        setup_test_env_with("\n[storage]\nprovider = \"local\"\npath = \"{root}/blobs\"\n");
    let blobs = tmp.path().join("blobs");

    let paris = files_dir(&config_path).join("paris.md");
    let (stdout, stderr, success) =
        run_askdocs(&config_path, &["ingest", paris.to_str().unwrap()]);
    assert!(success, "ingest failed: stderr={}", stderr);
    assert!(stdout.contains("_docs/paris.md"));

    let stored: Vec<PathBuf> = walk_files(&blobs);
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with("paris.md"));

    let rust = files_dir(&config_path).join("rust.txt");
    let (_, _, success) = run_askdocs(&config_path, &["ingest", rust.to_str().unwrap()]);
    assert!(success);

    let stored = walk_files(&blobs);
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with("rust.txt"));
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(walk_files(&path));
        } else {
            out.push(path);
        }
    }
    out
}

/// Single-page PDF showing `text` in Helvetica, with a correct xref table.
fn pdf_with_text(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

#[test]
fn test_pdf_text_is_indexed_and_cited() {
    let (tmp, config_path) = setup_test_env();
    let pdf = tmp.path().join("handbook.pdf");
    fs::write(&pdf, pdf_with_text("Refunds are issued within 30 days")).unwrap();

    let (stdout, stderr, success) = run_askdocs(&config_path, &["ingest", pdf.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("indexed  handbook.pdf"));

    let (stdout, _, success) = run_askdocs(&config_path, &["ask", "When are refunds issued?"]);
    assert!(success);
    assert!(stdout.contains("Refunds are issued within 30 days"));
    assert!(stdout.contains("Source: handbook.pdf"));
}
