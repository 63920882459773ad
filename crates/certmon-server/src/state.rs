use crate::cert::refresh::StatusRefreshJob;
use crate::cert::service::CertificateService;
use crate::config::ServerConfig;
use certmon_storage::{CertStore, CertificateRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cert_store: Arc<CertStore>,
    pub certificates: Arc<CertificateService>,
    pub refresh_job: Arc<StatusRefreshJob>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(cert_store: Arc<CertStore>, config: ServerConfig) -> Self {
        let repo: Arc<dyn CertificateRepository> = cert_store.clone();
        Self {
            certificates: Arc::new(CertificateService::new(
                repo.clone(),
                config.status.expiring_soon_days,
            )),
            refresh_job: Arc::new(StatusRefreshJob::new(repo)),
            cert_store,
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }
}
