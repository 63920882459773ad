//! Persistence layer for tracked certificates.
//!
//! [`CertificateRepository`] is the contract the status refresh job and the
//! application service depend on. The default implementation
//! ([`store::CertStore`]) uses SeaORM over SQLite and runs schema migrations on
//! startup.

pub mod entities;
pub mod error;
pub mod store;


use async_trait::async_trait;
use certmon_common::status::CertStatus;
use certmon_common::types::{Certificate, NewCertificate, Page};
use chrono::NaiveDate;

pub use error::{Result, StorageError};
pub use store::CertStore;

/// Storage contract for certificates.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the store is accessed from the REST handlers and the scheduler
/// concurrently. List queries return rows ordered by expiration date
/// ascending (soonest-expiring first).
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Inserts a new certificate, assigning its id and timestamps. Fails with
    /// [`StorageError::DuplicateDomain`] when the domain name is taken.
    async fn insert(&self, new: &NewCertificate) -> Result<Certificate>;

    /// Rewrites the mutable fields of an existing certificate (everything but
    /// the domain name) and refreshes `updated_at`.
    async fn update(&self, certificate: &Certificate) -> Result<Certificate>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Certificate>>;

    async fn find_by_domain_name(&self, domain_name: &str) -> Result<Option<Certificate>>;

    async fn exists_by_domain_name(&self, domain_name: &str) -> Result<bool>;

    /// Returns the 1-based `page` of all certificates, `size` rows per page.
    async fn find_page(&self, page: u64, size: u64) -> Result<Page<Certificate>>;

    async fn find_by_status(&self, status: CertStatus) -> Result<Vec<Certificate>>;

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<Certificate>>;

    /// Certificates whose expiration date falls within
    /// `[as_of, as_of + days]` and that are not already marked expired.
    async fn find_expiring_soon(&self, as_of: NaiveDate, days: u32) -> Result<Vec<Certificate>>;

    /// Certificates whose expiration date is strictly before `as_of` and that
    /// are not already marked expired.
    async fn find_expired(&self, as_of: NaiveDate) -> Result<Vec<Certificate>>;

    /// Sets `status` (and `updated_at`) on exactly the given ids. Returns the
    /// number of rows affected; an empty id set is a no-op returning 0.
    async fn bulk_update_status(&self, ids: &[i64], status: CertStatus) -> Result<u64>;

    async fn count_by_status(&self, status: CertStatus) -> Result<u64>;

    /// Deletes a certificate. Fails with [`StorageError::NotFound`] if the id
    /// does not exist.
    async fn delete_by_id(&self, id: i64) -> Result<()>;
}
