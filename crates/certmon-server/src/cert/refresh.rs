//! Bulk status refresh.
//!
//! Stored statuses go stale as time passes. The refresh job moves them
//! forward in two phases: date-expired rows become `Expired`, then `Normal`
//! rows inside the lookahead window become `ExpiringSoon`. A row is never
//! moved back to `Normal`; only a certificate update does that.

use certmon_common::status::CertStatus;
use certmon_common::types::CertStatusStatistics;
use certmon_storage::{CertificateRepository, Result};
use chrono::NaiveDate;
use std::sync::Arc;

pub struct StatusRefreshJob {
    repo: Arc<dyn CertificateRepository>,
}

impl StatusRefreshJob {
    pub fn new(repo: Arc<dyn CertificateRepository>) -> Self {
        Self { repo }
    }

    /// Recomputes stale statuses as of `as_of`. Returns the number of rows
    /// changed. Running it twice for the same date changes nothing the
    /// second time.
    pub async fn refresh_all(&self, as_of: NaiveDate, threshold_days: u32) -> Result<u64> {
        let expired_ids: Vec<i64> = self
            .repo
            .find_expired(as_of)
            .await?
            .into_iter()
            .filter(|c| c.status != CertStatus::Expired)
            .map(|c| c.id)
            .collect();
        let expired = self
            .repo
            .bulk_update_status(&expired_ids, CertStatus::Expired)
            .await?;

        let expiring_ids: Vec<i64> = self
            .repo
            .find_expiring_soon(as_of, threshold_days)
            .await?
            .into_iter()
            .filter(|c| c.status == CertStatus::Normal)
            .map(|c| c.id)
            .collect();
        let expiring_soon = self
            .repo
            .bulk_update_status(&expiring_ids, CertStatus::ExpiringSoon)
            .await?;

        let changed = expired + expiring_soon;
        tracing::info!(
            as_of = %as_of,
            threshold_days,
            expired,
            expiring_soon,
            changed,
            "Certificate status refresh finished"
        );
        Ok(changed)
    }

    pub async fn statistics(&self) -> Result<CertStatusStatistics> {
        let normal = self.repo.count_by_status(CertStatus::Normal).await?;
        let expiring_soon = self.repo.count_by_status(CertStatus::ExpiringSoon).await?;
        let expired = self.repo.count_by_status(CertStatus::Expired).await?;
        Ok(CertStatusStatistics::new(normal, expiring_soon, expired))
    }
}

/// In-memory repository for exercising job and scheduler error paths.
/// Records every call and fails the one named in `fail_on`.
#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use certmon_common::status::CertStatus;
    use certmon_common::types::{Certificate, NewCertificate, Page};
    use certmon_storage::{CertificateRepository, Result, StorageError};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    pub struct RecordingRepo {
        fail_on: Option<&'static str>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingRepo {
        pub fn healthy() -> Self {
            Self {
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_on(method: &'static str) -> Self {
            Self {
                fail_on: Some(method),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, method: &'static str) -> Result<()> {
            self.calls.lock().unwrap().push(method);
            if self.fail_on == Some(method) {
                return Err(StorageError::Other(format!("{method} unavailable")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CertificateRepository for RecordingRepo {
        async fn insert(&self, _new: &NewCertificate) -> Result<Certificate> {
            self.record("insert")?;
            Err(StorageError::Other("insert not supported".to_string()))
        }

        async fn update(&self, _certificate: &Certificate) -> Result<Certificate> {
            self.record("update")?;
            Err(StorageError::Other("update not supported".to_string()))
        }

        async fn find_by_id(&self, _id: i64) -> Result<Option<Certificate>> {
            self.record("find_by_id")?;
            Ok(None)
        }

        async fn find_by_domain_name(&self, _domain_name: &str) -> Result<Option<Certificate>> {
            self.record("find_by_domain_name")?;
            Ok(None)
        }

        async fn exists_by_domain_name(&self, _domain_name: &str) -> Result<bool> {
            self.record("exists_by_domain_name")?;
            Ok(false)
        }

        async fn find_page(&self, page: u64, size: u64) -> Result<Page<Certificate>> {
            self.record("find_page")?;
            Ok(Page {
                items: Vec::new(),
                total: 0,
                page,
                size,
                pages: 0,
            })
        }

        async fn find_by_status(&self, _status: CertStatus) -> Result<Vec<Certificate>> {
            self.record("find_by_status")?;
            Ok(Vec::new())
        }

        async fn find_by_owner(&self, _owner: &str) -> Result<Vec<Certificate>> {
            self.record("find_by_owner")?;
            Ok(Vec::new())
        }

        async fn find_expiring_soon(
            &self,
            _as_of: NaiveDate,
            _days: u32,
        ) -> Result<Vec<Certificate>> {
            self.record("find_expiring_soon")?;
            Ok(Vec::new())
        }

        async fn find_expired(&self, _as_of: NaiveDate) -> Result<Vec<Certificate>> {
            self.record("find_expired")?;
            Ok(Vec::new())
        }

        async fn bulk_update_status(&self, ids: &[i64], _status: CertStatus) -> Result<u64> {
            self.record("bulk_update_status")?;
            Ok(ids.len() as u64)
        }

        async fn count_by_status(&self, _status: CertStatus) -> Result<u64> {
            self.record("count_by_status")?;
            Ok(0)
        }

        async fn delete_by_id(&self, _id: i64) -> Result<()> {
            self.record("delete_by_id")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certmon_common::status::classify;
    use certmon_common::types::NewCertificate;
    use certmon_storage::CertStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<CertStore>,
        job: StatusRefreshJob,
    }

    async fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}/certmon.db?mode=rwc", dir.path().display());
        let store = Arc::new(CertStore::new(&url, dir.path()).await.unwrap());
        let job = StatusRefreshJob::new(store.clone());
        Fixture {
            _dir: dir,
            store,
            job,
        }
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap() + Duration::days(offset)
    }

    fn at(offset: i64) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day(offset).and_hms_opt(18, 30, 0).unwrap())
    }

    async fn seed(store: &CertStore, domain: &str, expires_in: i64, status: CertStatus) -> i64 {
        store
            .insert(&NewCertificate {
                domain_name: domain.to_string(),
                sans: None,
                issuer: "Test CA".to_string(),
                expiration_date: at(expires_in),
                owner: "ops".to_string(),
                notes: None,
                status,
            })
            .await
            .unwrap()
            .id
    }

    async fn status_of(store: &CertStore, id: i64) -> CertStatus {
        store.find_by_id(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn empty_store_changes_nothing() {
        let f = setup().await;
        assert_eq!(f.job.refresh_all(day(0), 30).await.unwrap(), 0);
        assert_eq!(f.job.statistics().await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn refresh_moves_stale_rows_forward() {
        let f = setup().await;
        let a = seed(&f.store, "a.com", -1, CertStatus::Normal).await;
        let b = seed(&f.store, "b.com", -1, CertStatus::ExpiringSoon).await;
        let c = seed(&f.store, "c.com", 10, CertStatus::Normal).await;
        let d = seed(&f.store, "d.com", 90, CertStatus::Normal).await;
        let e = seed(&f.store, "e.com", -5, CertStatus::Expired).await;

        let changed = f.job.refresh_all(day(0), 30).await.unwrap();
        assert_eq!(changed, 3);

        assert_eq!(status_of(&f.store, a).await, CertStatus::Expired);
        assert_eq!(status_of(&f.store, b).await, CertStatus::Expired);
        assert_eq!(status_of(&f.store, c).await, CertStatus::ExpiringSoon);
        assert_eq!(status_of(&f.store, d).await, CertStatus::Normal);
        assert_eq!(status_of(&f.store, e).await, CertStatus::Expired);

        let stats = f.job.statistics().await.unwrap();
        assert_eq!(stats, CertStatusStatistics::new(1, 1, 3));
        assert!(stats.has_warnings());
    }

    #[tokio::test]
    async fn refresh_is_idempotent_for_same_date() {
        let f = setup().await;
        seed(&f.store, "a.com", -3, CertStatus::Normal).await;
        seed(&f.store, "b.com", 0, CertStatus::Normal).await;
        seed(&f.store, "c.com", 30, CertStatus::Normal).await;
        seed(&f.store, "d.com", 31, CertStatus::Normal).await;

        assert_eq!(f.job.refresh_all(day(0), 30).await.unwrap(), 3);
        assert_eq!(f.job.refresh_all(day(0), 30).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn window_boundaries_match_classifier() {
        let f = setup().await;
        let mut ids = Vec::new();
        for offset in [-2, -1, 0, 1, 29, 30, 31, 60] {
            let id = seed(&f.store, &format!("d{offset}.com"), offset, CertStatus::Normal).await;
            ids.push((id, offset));
        }

        f.job.refresh_all(day(0), 30).await.unwrap();

        for (id, offset) in ids {
            let expected = classify(Some(at(offset)), day(0), 30);
            assert_eq!(status_of(&f.store, id).await, expected, "offset {offset}");
        }
    }

    #[tokio::test]
    async fn refresh_never_reverts_to_normal() {
        let f = setup().await;
        // Stale: far from expiry but marked expiring soon.
        let id = seed(&f.store, "far.com", 200, CertStatus::ExpiringSoon).await;

        assert_eq!(f.job.refresh_all(day(0), 30).await.unwrap(), 0);
        assert_eq!(status_of(&f.store, id).await, CertStatus::ExpiringSoon);
    }

    #[tokio::test]
    async fn statuses_only_advance_as_days_pass() {
        let f = setup().await;
        let id = seed(&f.store, "m.com", 20, CertStatus::Normal).await;

        let rank = |s: CertStatus| match s {
            CertStatus::Normal => 0,
            CertStatus::ExpiringSoon => 1,
            CertStatus::Expired => 2,
        };
        let mut last = rank(CertStatus::Normal);
        for offset in [-15, -10, 0, 5, 20, 21, 40] {
            f.job.refresh_all(day(offset), 30).await.unwrap();
            let now = rank(status_of(&f.store, id).await);
            assert!(now >= last, "status went backwards at offset {offset}");
            last = now;
        }
        assert_eq!(last, rank(CertStatus::Expired));
    }

    #[tokio::test]
    async fn failed_expired_lookup_aborts_before_any_write() {
        let repo = Arc::new(testing::RecordingRepo::failing_on("find_expired"));
        let job = StatusRefreshJob::new(repo.clone());

        let err = job.refresh_all(day(0), 30).await.unwrap_err();
        assert!(matches!(err, certmon_storage::StorageError::Other(_)));
        assert_eq!(repo.calls(), vec!["find_expired"]);
    }

    #[tokio::test]
    async fn failed_first_write_skips_expiring_phase() {
        let repo = Arc::new(testing::RecordingRepo::failing_on("bulk_update_status"));
        let job = StatusRefreshJob::new(repo.clone());

        assert!(job.refresh_all(day(0), 30).await.is_err());
        assert_eq!(repo.calls(), vec!["find_expired", "bulk_update_status"]);
    }

    #[tokio::test]
    async fn statistics_propagate_store_failure() {
        let repo = Arc::new(testing::RecordingRepo::failing_on("count_by_status"));
        let job = StatusRefreshJob::new(repo);
        assert!(job.statistics().await.is_err());
    }
}
