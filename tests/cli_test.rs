//! Integration tests for the mysql-import binary.

mod common;

use common::{importtest_dump, write_dump};
use mysql_import::parser::split_str;
use std::process::Command;
use tempfile::TempDir;

fn mysql_import() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mysql-import"));
    cmd.env_remove("MYSQL_PWD");
    cmd
}

fn count(db_path: &std::path::Path, sql: &str) -> i64 {
    let conn = duckdb::Connection::open(db_path).unwrap();
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

// =============================================================================
// import
// =============================================================================

#[test]
fn test_import_into_duckdb() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path(), "importtest.sql", importtest_dump());
    let db = dir.path().join("out.duckdb");

    let output = mysql_import()
        .args(["import", dump.to_str().unwrap(), "--duckdb", db.to_str().unwrap()])
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "Should succeed: {}", stderr);
    assert!(stdout.contains("Import completed successfully"));
    assert!(stdout.contains("Statements executed: 979"));
    assert_eq!(count(&db, "SELECT COUNT(*) FROM importtest"), 978);
}

#[test]
fn test_import_json_output() {
    let dir = TempDir::new().unwrap();
    write_dump(dir.path(), "dumps/a.sql", "CREATE TABLE a (id INTEGER);\n");
    write_dump(dir.path(), "dumps/b.sql", "INSERT INTO a VALUES (1);\nINSERT INTO a VALUES (2);\n");
    let db = dir.path().join("out.duckdb");

    let output = mysql_import()
        .args([
            "import",
            dir.path().join("dumps").to_str().unwrap(),
            "--duckdb",
            db.to_str().unwrap(),
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["statistics"]["files"], 2);
    assert_eq!(json["statistics"]["statements"], 3);
    assert_eq!(json["encoding"], "utf8");
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f["status"] == "ok"));
    assert!(files[0]["file"].as_str().unwrap().ends_with("a.sql"));
}

#[test]
fn test_import_glob_pattern() {
    let dir = TempDir::new().unwrap();
    write_dump(dir.path(), "1_schema.sql", "CREATE TABLE g (id INTEGER);\n");
    write_dump(dir.path(), "2_data.sql", "INSERT INTO g VALUES (1);\n");
    let db = dir.path().join("out.duckdb");

    let output = mysql_import()
        .args([
            "import",
            &dir.path().join("*.sql").to_string_lossy(),
            "--duckdb",
            db.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "Should succeed: {}", stderr);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM g"), 1);
}

#[test]
fn test_import_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = mysql_import()
        .args([
            "import",
            dir.path().join("missing.sql").to_str().unwrap(),
            "--duckdb",
            dir.path().join("out.duckdb").to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.sql"), "stderr: {}", stderr);
}

#[test]
fn test_import_failing_statement_reports_file() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path(), "bad.sql", "INSERT INTO nowhere VALUES (1);\n");
    let db = dir.path().join("out.duckdb");

    let output = mysql_import()
        .args(["import", dump.to_str().unwrap(), "--duckdb", db.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("✗"));
    assert!(stderr.contains("import failed"));
    assert!(stderr.contains("INSERT INTO nowhere"));
}

#[test]
fn test_import_json_output_records_failure() {
    let dir = TempDir::new().unwrap();
    write_dump(dir.path(), "dumps/1_ok.sql", "CREATE TABLE a (id INTEGER);\n");
    write_dump(dir.path(), "dumps/2_bad.sql", "INSERT INTO nowhere VALUES (1);\n");
    let db = dir.path().join("out.duckdb");

    let output = mysql_import()
        .args([
            "import",
            dir.path().join("dumps").to_str().unwrap(),
            "--duckdb",
            db.to_str().unwrap(),
            "--json",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["status"], "ok");
    assert_eq!(files[1]["status"], "failed");
    assert!(files[1]["error"].as_str().unwrap().contains("INSERT INTO nowhere"));
    assert!(json["error"].as_str().unwrap().contains("INSERT INTO nowhere"));
    assert!(json.get("statistics").is_none());
}

#[test]
fn test_import_rejects_unknown_encoding() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path(), "a.sql", "SELECT 1;\n");

    let output = mysql_import()
        .args([
            "import",
            dump.to_str().unwrap(),
            "--duckdb",
            dir.path().join("out.duckdb").to_str().unwrap(),
            "--encoding",
            "klingon",
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported encoding"));
}

#[test]
fn test_import_with_config_file() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(
        dir.path(),
        "latin1.sql",
        b"CREATE TABLE t (s VARCHAR(10));\nINSERT INTO t VALUES ('caf\xe9');\n".as_slice(),
    );
    let config = write_dump(dir.path(), "import.yaml", "encoding: latin1\n");
    let db = dir.path().join("out.duckdb");

    let output = mysql_import()
        .args([
            "import",
            dump.to_str().unwrap(),
            "--duckdb",
            db.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "Should succeed: {}", stderr);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM t WHERE s = 'café'"), 1);
}

// =============================================================================
// statements
// =============================================================================

#[test]
fn test_statements_dry_run() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(
        dir.path(),
        "routine.sql",
        "-- header\nCREATE TABLE t (id INT);\n\
         DELIMITER ;;\nCREATE TRIGGER trg BEFORE INSERT ON t FOR EACH ROW BEGIN SET NEW.id = 1; END;;\nDELIMITER ;\n\
         INSERT INTO t VALUES (1);\n",
    );

    let output = mysql_import()
        .args(["statements", dump.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CREATE TABLE t (id INT);\n"));
    assert!(stdout.contains("DELIMITER $$\nCREATE TRIGGER trg"));
    assert!(stdout.contains("END$$\nDELIMITER ;\n"));
    assert!(stdout.contains("INSERT INTO t VALUES (1);\n"));
    assert!(!stdout.contains("-- header"));
}

fn statements_output(dump: &std::path::Path) -> String {
    let output = mysql_import()
        .args(["statements", dump.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

fn statement_texts(sql: &str) -> Vec<String> {
    split_str(sql).unwrap().into_iter().map(|s| s.text).collect()
}

#[test]
fn test_statements_output_reimports_with_trailing_comments() {
    let dir = TempDir::new().unwrap();
    let sql = "SELECT 1 -- note\n;\nSELECT 2 # why\n;\n\
               DELIMITER $$\nBEGIN SELECT 3; END -- tail\n$$\nDELIMITER ;\n";
    let dump = write_dump(dir.path(), "comments.sql", sql);

    let stdout = statements_output(&dump);
    assert!(stdout.contains("SELECT 1;\n"));
    assert_eq!(statement_texts(&stdout), statement_texts(sql));
    assert_eq!(statement_texts(&stdout).len(), 3);
}

#[test]
fn test_statements_picks_delimiter_absent_from_body() {
    let dir = TempDir::new().unwrap();
    let sql = "DELIMITER ;;\n\
               CREATE PROCEDURE p() BEGIN SELECT '$$'; SELECT 1; END;;\n\
               DELIMITER ;\nSELECT 2;\n";
    let dump = write_dump(dir.path(), "dollars.sql", sql);

    let stdout = statements_output(&dump);
    assert!(stdout.contains("DELIMITER //\nCREATE PROCEDURE p()"));
    assert!(stdout.contains("END//\nDELIMITER ;\n"));
    assert_eq!(statement_texts(&stdout), statement_texts(sql));
}

#[test]
fn test_statements_json() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path(), "a.sql", "SELECT 'a;b';\nSELECT 2;\n");

    let output = mysql_import()
        .args(["statements", dump.to_str().unwrap(), "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let statements = json.as_array().unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0]["text"], "SELECT 'a;b'");
    assert_eq!(statements[0]["start_offset"], 0);
    assert_eq!(statements[1]["text"], "SELECT 2");
}

#[test]
fn test_statements_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path(), "bad.sql", "SELECT 1;\nSELECT 'open\n");

    let output = mysql_import()
        .args(["statements", dump.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("parse error"));
}

// =============================================================================
// completions
// =============================================================================

#[test]
fn test_completions_bash() {
    let output = mysql_import().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("mysql-import"));
}
