use assert_cmd::Command;
use std::path::Path;

const CATALOG: &str = r#"{
  "books": [
    {"id": 1, "title": "Dune", "author": "Frank Herbert", "year": 1965, "isbn": "", "description": "", "isAvailable": true, "reader": null, "dueDate": null},
    {"id": 2, "title": "Emma", "author": "Jane Austen", "year": 1815, "isbn": "", "description": "", "isAvailable": false, "reader": "Bob", "dueDate": "2000-01-01"}
  ]
}"#;

fn libris(config_dir: &Path, data_file: &Path) -> Command {
    let mut cmd = Command::cargo_bin("libris").unwrap();
    cmd.env("LIBRIS_CONFIG_DIR", config_dir)
        .env("LIBRIS_ENV", "local")
        .env("LIBRIS__STORAGE__DATA_FILE", data_file)
        .env_remove("RUST_LOG");
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn books_list_prints_one_line_per_book() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("books.json");
    std::fs::write(&data, CATALOG).unwrap();

    let out = stdout(libris(dir.path(), &data).args(["books", "list"]));
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Dune (1965) by Frank Herbert [available]"));
    assert!(lines[1].contains("lent to Bob until 2000-01-01"));
}

#[test]
fn books_list_applies_filters() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("books.json");
    std::fs::write(&data, CATALOG).unwrap();

    let out = stdout(libris(dir.path(), &data).args(["books", "list", "--overdue"]));
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("Emma"));

    let out = stdout(libris(dir.path(), &data).args(["books", "list", "--search", "DUNE"]));
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("Dune"));
}

#[test]
fn books_show_missing_id_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("books.json");
    std::fs::write(&data, CATALOG).unwrap();

    let out = stdout(libris(dir.path(), &data).args(["books", "show", "2"]));
    assert!(out.contains("\"reader\": \"Bob\""));

    libris(dir.path(), &data)
        .args(["books", "show", "9"])
        .assert()
        .failure();
}

#[test]
fn missing_data_file_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("absent.json");

    let out = stdout(libris(dir.path(), &data).args(["books", "list"]));
    assert!(out.is_empty());
    assert!(!data.exists());
}

#[test]
fn config_reflects_environment_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("books.json");

    let out = stdout(
        libris(dir.path(), &data)
            .env("LIBRIS__SERVER__PORT", "4321")
            .arg("config"),
    );
    let settings: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(settings["server"]["port"], 4321);
    assert_eq!(settings["environment"], "local");
    assert_eq!(settings["storage"]["data_file"], data.to_str().unwrap());
}

#[test]
fn corrupt_data_file_is_reported_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("books.json");
    std::fs::write(&data, "{ not json").unwrap();

    let output = libris(dir.path(), &data)
        .args(["books", "list"])
        .assert()
        .success()
        .get_output()
        .clone();

    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("data file is corrupt"), "{stderr}");
    assert_eq!(std::fs::read_to_string(&data).unwrap(), "{ not json");
}

#[test]
fn books_without_year_list_as_undated() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("books.json");
    std::fs::write(
        &data,
        r#"{"books":[{"id":4,"title":"Beowulf","author":"Unknown","year":null,"isAvailable":true,"reader":null,"dueDate":null}]}"#,
    )
    .unwrap();

    let out = stdout(libris(dir.path(), &data).args(["books", "list"]));
    assert!(out.contains("Beowulf (n.d.) by Unknown"), "{out}");
}
