//! Live MySQL tests. Run with `cargo test -- --ignored` against a scratch
//! server configured through `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`
//! and `DB_DATABASE`.

mod common;

use common::{importtest_dump, write_dump};
use mysql_import::{ConnectionSettings, ImportError, Importer, MySqlConnector};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Row};
use std::env;
use tempfile::TempDir;

fn settings() -> ConnectionSettings {
    let mut settings = ConnectionSettings::default();
    if let Ok(host) = env::var("DB_HOST") {
        settings.host = host;
    }
    if let Some(port) = env::var("DB_PORT").ok().and_then(|p| p.parse().ok()) {
        settings.port = port;
    }
    if let Ok(user) = env::var("DB_USER") {
        settings.user = user;
    }
    settings.password = env::var("DB_PASSWORD").ok();
    settings
}

fn database() -> String {
    env::var("DB_DATABASE").unwrap_or_else(|_| "mysql_import_test".to_string())
}

async fn admin() -> MySqlConnection {
    let s = settings();
    let mut options = MySqlConnectOptions::new()
        .host(&s.host)
        .port(s.port)
        .username(&s.user);
    if let Some(password) = &s.password {
        options = options.password(password);
    }
    MySqlConnection::connect_with(&options).await.unwrap()
}

async fn recreate_database(name: &str) {
    let mut conn = admin().await;
    sqlx::raw_sql(&format!("DROP DATABASE IF EXISTS `{name}`"))
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::raw_sql(&format!("CREATE DATABASE `{name}`"))
        .execute(&mut conn)
        .await
        .unwrap();
}

async fn scalar(sql: &str) -> i64 {
    let mut conn = admin().await;
    sqlx::raw_sql(&format!("USE `{}`", database()))
        .execute(&mut conn)
        .await
        .unwrap();
    let row = sqlx::query(sql).fetch_one(&mut conn).await.unwrap();
    row.try_get::<i64, _>(0).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_import_978_rows() {
    let db = database();
    recreate_database(&db).await;
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path(), "importtest.sql", importtest_dump());

    let mut importer = Importer::mysql(settings());
    importer.use_database(&db).await.unwrap();
    importer.import(&[&dump]).await.unwrap();
    importer.disconnect(false).await.unwrap();

    assert_eq!(scalar("SELECT COUNT(*) FROM importtest").await, 978);
    assert_eq!(
        scalar("SELECT COUNT(*) FROM importtest WHERE description LIKE '%;%'").await,
        6
    );
}

#[tokio::test]
#[ignore]
async fn test_stored_function_with_delimiter() {
    let db = database();
    recreate_database(&db).await;
    let dir = TempDir::new().unwrap();
    let dump = write_dump(
        dir.path(),
        "routine.sql",
        "DROP FUNCTION IF EXISTS `testfunc`;\n\
         DELIMITER ;;\n\
         CREATE FUNCTION `testfunc`(s CHAR(20)) RETURNS char(50) CHARSET latin1\n\
             DETERMINISTIC\n\
         BEGIN\n  DECLARE x CHAR(50);\n  SET x = CONCAT('Hello, ', s, '!');\n  RETURN x;\nEND ;;\n\
         DELIMITER ;\n",
    );

    let mut importer = Importer::mysql(settings());
    importer.use_database(&db).await.unwrap();
    importer.import(&[&dump]).await.unwrap();
    importer.disconnect(false).await.unwrap();

    let routines = scalar(&format!(
        "SELECT COUNT(*) FROM information_schema.ROUTINES \
         WHERE ROUTINE_SCHEMA = '{db}' AND ROUTINE_TYPE = 'FUNCTION' AND ROUTINE_NAME = 'testfunc'"
    ))
    .await;
    assert_eq!(routines, 1);
}

#[tokio::test]
#[ignore]
async fn test_use_unknown_database() {
    let mut importer = Importer::new(MySqlConnector, settings());
    importer.connect().await.unwrap();
    assert!(matches!(
        importer.use_database("mysql_import_no_such_db").await,
        Err(ImportError::Connection(_))
    ));
    importer.disconnect(true).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_bad_credentials() {
    let mut s = settings();
    s.password = Some("definitely-not-the-password".to_string());
    let mut importer = Importer::mysql(s);
    assert!(matches!(
        importer.connect().await,
        Err(ImportError::Connection(_))
    ));
}
