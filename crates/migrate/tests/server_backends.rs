//! Migration runs against live PostgreSQL and MySQL servers
//!
//! Skipped unless `DBSHIFT_TEST_POSTGRES_URL` / `DBSHIFT_TEST_MYSQL_URL` name
//! a server URL. Each test works in its own throwaway database.

use dbshift_migrate::backends::BackendKind;
use dbshift_migrate::{with_lock, MigrateConfig, MigrateError, Migrator};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

fn server_url(var: &str) -> Option<Url> {
    std::env::var(var).ok().and_then(|raw| Url::parse(&raw).ok())
}

fn scratch_database(server: &Url, name: &str) -> Url {
    let mut url = server.clone();
    url.set_path(&format!("/dbshift_test_{}_{}", name, std::process::id()));
    url
}

fn write_migrations(dir: &TempDir) {
    let migrations = dir.path().join("migrations");
    fs::create_dir_all(&migrations).unwrap();
    fs::write(
        migrations.join("20200101000000_users.sql"),
        "-- migrate:up\ncreate table users (id integer primary key, name varchar(50));\n\
         insert into users (id, name) values (1, 'alice');\n\
         -- migrate:down\ndrop table users;\n",
    )
    .unwrap();
    fs::write(
        migrations.join("20200102000000_posts.sql"),
        "-- migrate:up\ncreate table posts (id integer primary key);\n\
         -- migrate:down\ndrop table posts;\n",
    )
    .unwrap();
}

async fn exercise(server: Url, name: &str, kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    write_migrations(&dir);

    let config = MigrateConfig::new(scratch_database(&server, name))
        .with_migrations_dir(dir.path().join("migrations"))
        .with_lock_timeout(Duration::from_secs(10));
    let migrator = Migrator::new(config.clone()).unwrap();
    assert_eq!(migrator.backend().kind(), kind);

    migrator.drop_database().await.unwrap();
    let result = migrator.up().await.unwrap();
    assert_eq!(result.applied_count(), 2);

    let again = migrator.migrate().await.unwrap();
    assert_eq!(again.skipped_count, 2);

    let other = Migrator::new(config.with_project("other")).unwrap();
    let err = other.migrate().await.unwrap_err();
    assert!(err.is_sql(), "tables already exist for the second project: {err}");

    let rolled_back = migrator.rollback().await.unwrap();
    assert_eq!(rolled_back.version, "20200102000000");

    let status = migrator.status().await.unwrap();
    assert!(status[0].applied);
    assert!(!status[1].applied);

    migrator.drop_database().await.unwrap();
    assert!(!migrator.backend().database_exists(&migrator.config().database_url).await.unwrap());
}

#[tokio::test]
async fn test_postgres_round_trip() {
    let Some(server) = server_url("DBSHIFT_TEST_POSTGRES_URL") else {
        return;
    };
    exercise(server, "pg", BackendKind::PostgreSQL).await;
}

#[tokio::test]
async fn test_mysql_round_trip() {
    let Some(server) = server_url("DBSHIFT_TEST_MYSQL_URL") else {
        return;
    };
    exercise(server, "my", BackendKind::MySQL).await;
}

#[tokio::test]
async fn test_postgres_lock_times_out_while_held_elsewhere() {
    let Some(server) = server_url("DBSHIFT_TEST_POSTGRES_URL") else {
        return;
    };
    let dir = TempDir::new().unwrap();
    let config = MigrateConfig::new(scratch_database(&server, "lock"))
        .with_migrations_dir(dir.path());
    let migrator = Migrator::new(config).unwrap();
    migrator.ensure_database().await.unwrap();

    let backend = migrator.backend();
    let pool = backend.open(&migrator.config().database_url).await.unwrap();
    let holder = backend.acquire_lock(&pool).await.unwrap();

    let ran = AtomicBool::new(false);
    let err = with_lock(backend, &pool, Duration::from_secs(1), || async {
        ran.store(true, Ordering::SeqCst);
        Ok(())
    })
    .await
    .unwrap_err();
    assert!(matches!(err, MigrateError::LockTimeout { .. }));
    assert!(!ran.load(Ordering::SeqCst));

    backend.release_lock(holder).await.unwrap();

    // Once released, the lock is available again
    with_lock(backend, &pool, Duration::from_secs(5), || async { Ok(()) })
        .await
        .unwrap();

    pool.close().await;
    migrator.drop_database().await.unwrap();
}
