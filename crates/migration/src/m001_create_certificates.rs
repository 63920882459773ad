use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_create_certificates"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

// expiration_date / created_at / updated_at are RFC 3339 text in UTC, so
// lexical order matches chronological order.
const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    domain_name TEXT NOT NULL UNIQUE,
    sans TEXT,
    issuer TEXT NOT NULL,
    expiration_date TEXT NOT NULL,
    owner TEXT NOT NULL,
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'Normal',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_certificates_status ON certificates(status);
CREATE INDEX IF NOT EXISTS idx_certificates_owner ON certificates(owner);
CREATE INDEX IF NOT EXISTS idx_certificates_expiration_date ON certificates(expiration_date);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS certificates;
";
