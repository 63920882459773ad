use certmon_common::status::{classify, CertStatus};
use certmon_common::types::{
    Certificate, CreateCertificateRequest, NewCertificate, Page, UpdateCertificateRequest,
};
use certmon_storage::{CertificateRepository, StorageError};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Certificate for domain '{0}' already exists")]
    DuplicateDomain(String),

    #[error("Certificate '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateDomain(domain) => ServiceError::DuplicateDomain(domain),
            StorageError::NotFound { id, .. } => ServiceError::NotFound(id),
            other => ServiceError::Storage(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(validation_message(&errors))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Flattens field errors into `field: message; field: message`, sorted by
/// field name.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{field}: {msg}"),
                None => format!("{field}: invalid value ({})", e.code),
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}

/// The current UTC calendar date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Certificate CRUD and queries. Status is recomputed on every write.
pub struct CertificateService {
    repo: Arc<dyn CertificateRepository>,
    expiring_soon_days: u32,
}

impl CertificateService {
    pub fn new(repo: Arc<dyn CertificateRepository>, expiring_soon_days: u32) -> Self {
        Self {
            repo,
            expiring_soon_days,
        }
    }

    pub fn expiring_soon_days(&self) -> u32 {
        self.expiring_soon_days
    }

    pub async fn create(&self, req: CreateCertificateRequest) -> ServiceResult<Certificate> {
        req.validate()?;

        if self.repo.exists_by_domain_name(&req.domain_name).await? {
            return Err(ServiceError::DuplicateDomain(req.domain_name));
        }

        let status = classify(Some(req.expiration_date), today(), self.expiring_soon_days);
        let new = NewCertificate {
            domain_name: req.domain_name,
            sans: req.sans,
            issuer: req.issuer,
            expiration_date: req.expiration_date,
            owner: req.owner,
            notes: req.notes,
            status,
        };
        // The unique index still guards against a concurrent insert.
        let cert = self.repo.insert(&new).await?;
        tracing::info!(
            id = cert.id,
            domain = %cert.domain_name,
            status = %cert.status,
            "Certificate created"
        );
        Ok(cert)
    }

    pub async fn update(
        &self,
        id: i64,
        req: UpdateCertificateRequest,
    ) -> ServiceResult<Certificate> {
        req.validate()?;

        let mut cert = self.get(id).await?;
        cert.sans = req.sans;
        cert.issuer = req.issuer;
        cert.expiration_date = req.expiration_date;
        cert.owner = req.owner;
        cert.notes = req.notes;
        cert.status = cert.classify(today(), self.expiring_soon_days);

        let updated = self.repo.update(&cert).await?;
        tracing::info!(id, status = %updated.status, "Certificate updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.repo.delete_by_id(id).await?;
        tracing::info!(id, "Certificate deleted");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Certificate> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_domain(&self, domain_name: &str) -> ServiceResult<Certificate> {
        self.repo
            .find_by_domain_name(domain_name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(domain_name.to_string()))
    }

    pub async fn list(&self, page: u64, size: u64) -> ServiceResult<Page<Certificate>> {
        Ok(self.repo.find_page(page, size).await?)
    }

    pub async fn list_by_status(&self, status: CertStatus) -> ServiceResult<Vec<Certificate>> {
        Ok(self.repo.find_by_status(status).await?)
    }

    pub async fn list_by_owner(&self, owner: &str) -> ServiceResult<Vec<Certificate>> {
        Ok(self.repo.find_by_owner(owner).await?)
    }

    /// Not-yet-expired certificates expiring within `days` days of today.
    pub async fn list_expiring_soon(&self, days: u32) -> ServiceResult<Vec<Certificate>> {
        Ok(self.repo.find_expiring_soon(today(), days).await?)
    }

    /// Certificates marked expired plus those past their date that the
    /// refresh job has not marked yet.
    pub async fn list_expired(&self) -> ServiceResult<Vec<Certificate>> {
        let mut certs = self.repo.find_by_status(CertStatus::Expired).await?;
        certs.extend(self.repo.find_expired(today()).await?);
        certs.sort_by(|a, b| {
            a.expiration_date
                .cmp(&b.expiration_date)
                .then(a.id.cmp(&b.id))
        });
        Ok(certs)
    }
}
