//! End-to-end migration runs against SQLite files in a temporary directory

use dbshift_migrate::{MigrateConfig, MigrateError, Migrator};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("migrations")).unwrap();
        Self { dir }
    }

    fn db_path(&self) -> PathBuf {
        self.dir.path().join("app.sqlite3")
    }

    fn migrations_dir(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    fn config(&self) -> MigrateConfig {
        let url = Url::parse(&format!("sqlite:///{}", self.db_path().display())).unwrap();
        MigrateConfig::new(url).with_migrations_dir(self.migrations_dir())
    }

    fn migrator(&self) -> Migrator {
        Migrator::new(self.config()).unwrap()
    }

    fn project(&self, project: &str) -> Migrator {
        Migrator::new(self.config().with_project(project)).unwrap()
    }

    fn write(&self, filename: &str, up: &str, down: &str) {
        write_migration(&self.migrations_dir(), filename, up, down);
    }

    async fn inspect(&self) -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&format!("sqlite://{}", self.db_path().display()))
            .await
            .unwrap()
    }
}

fn write_migration(dir: &Path, filename: &str, up: &str, down: &str) {
    let body = format!("-- migrate:up\n{}\n-- migrate:down\n{}\n", up, down);
    fs::write(dir.join(filename), body).unwrap();
}

async fn ledger(pool: &SqlitePool, project: &str) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "select version from schema_migrations where project = ? order by version",
    )
    .bind(project)
    .fetch_all(pool)
    .await
    .unwrap()
}

async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
    sqlx::query("select 1 from sqlite_master where type = 'table' and name = ?")
        .bind(table)
        .fetch_optional(pool)
        .await
        .unwrap()
        .is_some()
}

#[tokio::test]
async fn test_migrate_applies_in_version_order() {
    let fx = Fixture::new();
    fx.write("003_posts.sql", "create table posts (id integer, user_id integer references users(id));", "drop table posts;");
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");
    fx.write(
        "002_seed.sql",
        "insert into users (id) values (1);\ninsert into users (id) values (2);",
        "delete from users;",
    );

    let result = fx.migrator().migrate().await.unwrap();
    assert_eq!(
        result.applied_migrations,
        vec!["001_users.sql", "002_seed.sql", "003_posts.sql"]
    );
    assert_eq!(result.skipped_count, 0);

    let pool = fx.inspect().await;
    assert_eq!(ledger(&pool, "default").await, vec!["001", "002", "003"]);
    assert!(table_exists(&pool, "posts").await);
    let users: i64 = sqlx::query_scalar("select count(*) from users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 2);
}

#[tokio::test]
async fn test_second_migrate_is_a_noop() {
    let fx = Fixture::new();
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");
    fx.write("002_seed.sql", "insert into users (id) values (1);", "delete from users;");

    fx.migrator().migrate().await.unwrap();
    let again = fx.migrator().migrate().await.unwrap();

    assert!(again.applied_migrations.is_empty());
    assert_eq!(again.skipped_count, 2);

    // The seed would duplicate its row if it ran twice
    let pool = fx.inspect().await;
    let users: i64 = sqlx::query_scalar("select count(*) from users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 1);
    assert_eq!(ledger(&pool, "default").await, vec!["001", "002"]);
}

#[tokio::test]
async fn test_new_files_apply_on_later_run() {
    let fx = Fixture::new();
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");
    fx.migrator().migrate().await.unwrap();

    fx.write("002_posts.sql", "create table posts (id integer);", "drop table posts;");
    let result = fx.migrator().migrate().await.unwrap();
    assert_eq!(result.applied_migrations, vec!["002_posts.sql"]);
    assert_eq!(result.skipped_count, 1);
}

#[tokio::test]
async fn test_rollback_restores_previous_state() {
    let fx = Fixture::new();
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");
    fx.write("002_posts.sql", "create table posts (id integer);", "drop table posts;");
    fx.migrator().migrate().await.unwrap();

    let rolled_back = fx.migrator().rollback().await.unwrap();
    assert_eq!(rolled_back.version, "002");
    assert_eq!(rolled_back.filename, "002_posts.sql");

    {
        let pool = fx.inspect().await;
        assert_eq!(ledger(&pool, "default").await, vec!["001"]);
        assert!(!table_exists(&pool, "posts").await);
        assert!(table_exists(&pool, "users").await);
        pool.close().await;
    }

    // Apply and revert again: same end state each time
    for _ in 0..2 {
        fx.migrator().migrate().await.unwrap();
        fx.migrator().rollback().await.unwrap();
    }

    let pool = fx.inspect().await;
    assert_eq!(ledger(&pool, "default").await, vec!["001"]);
    assert!(!table_exists(&pool, "posts").await);
}

#[tokio::test]
async fn test_rollback_with_nothing_applied() {
    let fx = Fixture::new();
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");

    let err = fx.migrator().rollback().await.unwrap_err();
    assert!(matches!(err, MigrateError::NothingToRollback));
    assert_eq!(err.to_string(), "can't rollback: no migrations have been applied");
}

#[tokio::test]
async fn test_rollback_with_missing_file() {
    let fx = Fixture::new();
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");
    fx.migrator().migrate().await.unwrap();
    fs::remove_file(fx.migrations_dir().join("001_users.sql")).unwrap();

    let err = fx.migrator().rollback().await.unwrap_err();
    assert!(matches!(err, MigrateError::NotFound { .. }));

    let pool = fx.inspect().await;
    assert_eq!(ledger(&pool, "default").await, vec!["001"]);
}

#[tokio::test]
async fn test_failing_migration_leaves_no_ledger_row() {
    let fx = Fixture::new();
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");
    fx.write(
        "002_broken.sql",
        "create table half (id integer);\ninsert into no_such_table values (1);",
        "drop table half;",
    );
    fx.write("003_never.sql", "create table never (id integer);", "drop table never;");

    let err = fx.migrator().migrate().await.unwrap_err();
    assert!(err.is_sql());

    let pool = fx.inspect().await;
    assert_eq!(ledger(&pool, "default").await, vec!["001"]);
    assert!(table_exists(&pool, "users").await);
    assert!(!table_exists(&pool, "half").await);
    assert!(!table_exists(&pool, "never").await);
}

#[tokio::test]
async fn test_projects_keep_separate_ledgers() {
    let fx = Fixture::new();
    fx.write("001_shared.sql", "create table if not exists shared (id integer);", "drop table if exists shared;");

    let first = fx.project("billing").migrate().await.unwrap();
    let second = fx.project("reports").migrate().await.unwrap();
    assert_eq!(first.applied_migrations, vec!["001_shared.sql"]);
    assert_eq!(second.applied_migrations, vec!["001_shared.sql"]);

    {
        let pool = fx.inspect().await;
        assert_eq!(ledger(&pool, "billing").await, vec!["001"]);
        assert_eq!(ledger(&pool, "reports").await, vec!["001"]);
        assert!(ledger(&pool, "default").await.is_empty());
        pool.close().await;
    }

    fx.project("billing").rollback().await.unwrap();

    let pool = fx.inspect().await;
    assert!(ledger(&pool, "billing").await.is_empty());
    assert_eq!(ledger(&pool, "reports").await, vec!["001"]);
}

#[tokio::test]
async fn test_empty_directory_reports_no_migrations() {
    let fx = Fixture::new();
    let err = fx.migrator().migrate().await.unwrap_err();
    match err {
        MigrateError::NoMigrationsFound { dir } => assert_eq!(dir, fx.migrations_dir()),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fx.db_path().exists());
}

#[tokio::test]
async fn test_empty_sections_apply_cleanly() {
    let fx = Fixture::new();
    fs::write(
        fx.migrations_dir().join("001_placeholder.sql"),
        dbshift_migrate::migrations::MIGRATION_TEMPLATE,
    )
    .unwrap();

    fx.migrator().migrate().await.unwrap();
    fx.migrator().rollback().await.unwrap();

    let pool = fx.inspect().await;
    assert!(ledger(&pool, "default").await.is_empty());
}

#[tokio::test]
async fn test_up_creates_database_file() {
    let fx = Fixture::new();
    fx.write("001_users.sql", "create table users (id integer primary key);", "drop table users;");
    assert!(!fx.db_path().exists());

    let result = fx.migrator().up().await.unwrap();
    assert_eq!(result.applied_count(), 1);
    assert!(fx.db_path().exists());

    fx.migrator().drop_database().await.unwrap();
    assert!(!fx.db_path().exists());
}
