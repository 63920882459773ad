use async_trait::async_trait;
use certmon_common::status::CertStatus;
use certmon_common::types::{Certificate, NewCertificate, Page};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, SqlErr,
};

use crate::entities::certificate::{self, Column as CertCol, Entity as CertEntity};
use crate::error::{Result, StorageError};
use crate::store::CertStore;
use crate::CertificateRepository;

fn model_to_certificate(m: certificate::Model) -> Result<Certificate> {
    let status = m
        .status
        .parse::<CertStatus>()
        .map_err(|_| StorageError::InvalidStatus {
            id: m.id,
            value: m.status.clone(),
        })?;
    Ok(Certificate {
        id: m.id,
        domain_name: m.domain_name,
        sans: m.sans,
        issuer: m.issuer,
        expiration_date: m.expiration_date.with_timezone(&Utc),
        owner: m.owner,
        notes: m.notes,
        status,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn models_to_certificates(models: Vec<certificate::Model>) -> Result<Vec<Certificate>> {
    models.into_iter().map(model_to_certificate).collect()
}

/// Midnight UTC at the start of `date`, in the column's representation.
fn day_start(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}

fn utc_now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

fn map_insert_error(err: DbErr, domain_name: &str) -> StorageError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            StorageError::DuplicateDomain(domain_name.to_string())
        }
        _ => StorageError::Db(err),
    }
}

impl CertStore {
    fn ordered(select: Select<CertEntity>) -> Select<CertEntity> {
        select
            .order_by_asc(CertCol::ExpirationDate)
            .order_by_asc(CertCol::Id)
    }

    async fn fetch_all(&self, select: Select<CertEntity>) -> Result<Vec<Certificate>> {
        let rows = Self::ordered(select).all(self.db()).await?;
        models_to_certificates(rows)
    }
}

#[async_trait]
impl CertificateRepository for CertStore {
    async fn insert(&self, new: &NewCertificate) -> Result<Certificate> {
        let now = utc_now();
        let am = certificate::ActiveModel {
            id: NotSet,
            domain_name: Set(new.domain_name.clone()),
            sans: Set(new.sans.clone()),
            issuer: Set(new.issuer.clone()),
            expiration_date: Set(new.expiration_date.fixed_offset()),
            owner: Set(new.owner.clone()),
            notes: Set(new.notes.clone()),
            status: Set(new.status.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am
            .insert(self.db())
            .await
            .map_err(|e| map_insert_error(e, &new.domain_name))?;
        tracing::debug!(id = model.id, domain = %model.domain_name, "Certificate inserted");
        model_to_certificate(model)
    }

    async fn update(&self, cert: &Certificate) -> Result<Certificate> {
        let model = CertEntity::find_by_id(cert.id)
            .one(self.db())
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "certificate",
                id: cert.id.to_string(),
            })?;
        let mut am: certificate::ActiveModel = model.into();
        am.sans = Set(cert.sans.clone());
        am.issuer = Set(cert.issuer.clone());
        am.expiration_date = Set(cert.expiration_date.fixed_offset());
        am.owner = Set(cert.owner.clone());
        am.notes = Set(cert.notes.clone());
        am.status = Set(cert.status.as_str().to_string());
        am.updated_at = Set(utc_now());
        let updated = am.update(self.db()).await?;
        model_to_certificate(updated)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Certificate>> {
        let model = CertEntity::find_by_id(id).one(self.db()).await?;
        model.map(model_to_certificate).transpose()
    }

    async fn find_by_domain_name(&self, domain_name: &str) -> Result<Option<Certificate>> {
        let model = CertEntity::find()
            .filter(CertCol::DomainName.eq(domain_name))
            .one(self.db())
            .await?;
        model.map(model_to_certificate).transpose()
    }

    async fn exists_by_domain_name(&self, domain_name: &str) -> Result<bool> {
        let count = CertEntity::find()
            .filter(CertCol::DomainName.eq(domain_name))
            .count(self.db())
            .await?;
        Ok(count > 0)
    }

    async fn find_page(&self, page: u64, size: u64) -> Result<Page<Certificate>> {
        let page = page.max(1);
        let size = size.max(1);
        let paginator = Self::ordered(CertEntity::find()).paginate(self.db(), size);
        let totals = paginator.num_items_and_pages().await?;
        let rows = paginator.fetch_page(page - 1).await?;
        Ok(Page {
            items: models_to_certificates(rows)?,
            total: totals.number_of_items,
            page,
            size,
            pages: totals.number_of_pages,
        })
    }

    async fn find_by_status(&self, status: CertStatus) -> Result<Vec<Certificate>> {
        self.fetch_all(CertEntity::find().filter(CertCol::Status.eq(status.as_str())))
            .await
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<Certificate>> {
        self.fetch_all(CertEntity::find().filter(CertCol::Owner.eq(owner)))
            .await
    }

    async fn find_expiring_soon(&self, as_of: NaiveDate, days: u32) -> Result<Vec<Certificate>> {
        let mut select = CertEntity::find()
            .filter(CertCol::ExpirationDate.gte(day_start(as_of)))
            .filter(CertCol::Status.ne(CertStatus::Expired.as_str()));
        // Exclusive upper bound: the day after the last day of the window.
        if let Some(end) = as_of.checked_add_days(Days::new(u64::from(days) + 1)) {
            select = select.filter(CertCol::ExpirationDate.lt(day_start(end)));
        }
        self.fetch_all(select).await
    }

    async fn find_expired(&self, as_of: NaiveDate) -> Result<Vec<Certificate>> {
        self.fetch_all(
            CertEntity::find()
                .filter(CertCol::ExpirationDate.lt(day_start(as_of)))
                .filter(CertCol::Status.ne(CertStatus::Expired.as_str())),
        )
        .await
    }

    async fn bulk_update_status(&self, ids: &[i64], status: CertStatus) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let res = CertEntity::update_many()
            .col_expr(CertCol::Status, Expr::value(status.as_str()))
            .col_expr(CertCol::UpdatedAt, Expr::value(utc_now()))
            .filter(CertCol::Id.is_in(ids.iter().copied()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    async fn count_by_status(&self, status: CertStatus) -> Result<u64> {
        Ok(CertEntity::find()
            .filter(CertCol::Status.eq(status.as_str()))
            .count(self.db())
            .await?)
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        let res = CertEntity::delete_by_id(id).exec(self.db()).await?;
        if res.rows_affected == 0 {
            return Err(StorageError::NotFound {
                entity: "certificate",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
