//! File-backed SQLite executor tests.

#![cfg(feature = "sqlite")]

mod common;

use std::time::Duration;

use folio_selector::backends::sqlite::{SqliteExecutor, SqliteExecutorConfig};
use folio_selector::CompilerConfig;
use folio_selector::types::Predicate;

use common::*;

#[test]
fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("site.db");

    let first = {
        let site = Site::build(SqliteExecutor::open(&path).unwrap(), CompilerConfig::default());
        assert!(!site.executor.is_memory());
        site.add(PageSpec::new("about", BASIC))
    };

    let executor = SqliteExecutor::open(&path).unwrap();
    executor.verify_schema(&fixture_registry()).unwrap();

    let config = SqliteExecutorConfig {
        max_connections: 2,
        busy_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    let reopened = SqliteExecutor::with_config(&path, config).unwrap();
    let site = Site::build_existing(reopened, CompilerConfig::default());
    assert_eq!(site.ids(&[Predicate::eq("path", "/about/")]), vec![first]);
}

#[test]
fn test_pool_connections_share_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let site = Site::build(
        SqliteExecutor::open(dir.path().join("pool.db")).unwrap(),
        CompilerConfig::default(),
    );
    let ids = site.add_many("post", ARTICLE, 5);

    // hold one connection while compiling on another
    let _held = site.executor.connection().unwrap();
    assert_eq!(site.ids(&[Predicate::eq("template", "article")]), ids);
}
