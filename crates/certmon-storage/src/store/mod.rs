use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;

use crate::error::{Result, StorageError};

pub mod certificate;

/// Database access layer for certificates (`certmon.db`).
///
/// All methods are `async fn`, backed by SeaORM. The certificate queries live
/// in [`certificate`] and implement [`crate::CertificateRepository`].
pub struct CertStore {
    pub(crate) db: DatabaseConnection,
}

impl CertStore {
    /// Connects to the database and brings the schema up to date.
    ///
    /// - `db_url`: full connection URL supplied by the server config, e.g.
    ///   `sqlite:///data/certmon.db?mode=rwc`.
    /// - `data_dir`: local data directory; created if missing so the SQLite
    ///   file can be opened.
    pub async fn new(db_url: &str, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            StorageError::Other(format!(
                "failed to create data dir '{}': {e}",
                data_dir.display()
            ))
        })?;
        let db = Database::connect(db_url).await?;

        // WAL only applies to SQLite
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        tracing::info!(db_url = %db_url, "Initialized cert store (SeaORM)");
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Round-trips the connection; used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await?;
        Ok(())
    }
}
