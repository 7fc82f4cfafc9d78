use std::path::Path;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::instrument;

/// Applies every pending migration found in `migrations_dir` to the database.
///
/// Applied versions are tracked by sqlx in the database itself, so running this on every start
/// only does work when new migration files have appeared.
#[instrument(skip(database_url, migrations_dir), fields(dir = %migrations_dir.as_ref().display()))]
pub async fn run_migrations(
    database_url: &str,
    migrations_dir: impl AsRef<Path>,
) -> DbResult<()> {
    let migrator = Migrator::new(migrations_dir.as_ref()).await?;
    tracing::info!(available = migrator.iter().count(), "resolved migrations");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;

    let res = migrator.run(&pool).await;
    pool.close().await;

    match res {
        Ok(()) => {
            tracing::info!("migrations up to date");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = ?e, "migration failure");
            Err(e.into())
        }
    }
}

pub type DbResult<T> = core::result::Result<T, DbErr>;

#[derive(Debug, Error)]
pub enum DbErr {
    #[error("sqlx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] MigrateError),
}
