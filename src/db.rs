use log::{info, warn};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement};
use std::fs;
use std::path::Path;

use crate::config::AppConfig;

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config.database_url();
    ensure_sqlite_path(&url);
    let db = Database::connect(&url).await?;
    init_schema(&db).await?;
    info!("metadata store ready at {}", redact(&url));
    Ok(db)
}

fn ensure_sqlite_path(url: &str) {
    let Some(path) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return;
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return;
    }
    if let Some(parent) = Path::new(path).parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("creating sqlite directory {} failed: {}", parent.display(), e);
        }
    }
}

/// Runs the backend's DDL. Every statement is `IF NOT EXISTS`, so repeated
/// startups are no-ops.
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    for stmt in split_sql(schema_for(backend)?) {
        db.execute(Statement::from_string(backend, stmt)).await?;
    }
    Ok(())
}

fn schema_for(backend: DbBackend) -> Result<&'static str, DbErr> {
    match backend {
        DbBackend::Sqlite => Ok(include_str!("../schema-sqlite.sql")),
        DbBackend::MySql => Ok(include_str!("../schema-mysql.sql")),
        other => Err(DbErr::Custom(format!("unsupported database backend: {:?}", other))),
    }
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// In-memory SQLite pinned to one connection so every query sees the same database.
#[cfg(test)]
pub async fn connect_memory() -> DatabaseConnection {
    let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.expect("connect sqlite memory");
    init_schema(&db).await.expect("bootstrap schema");
    db
}
