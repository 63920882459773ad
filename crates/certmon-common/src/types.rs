use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::status::{self, CertStatus};

/// 证书记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Certificate {
    /// 证书 ID（由存储层分配）
    pub id: i64,
    /// 关联域名（唯一）
    pub domain_name: String,
    /// 备用名称（Subject Alternative Names）
    pub sans: Option<String>,
    /// 证书颁发机构
    pub issuer: String,
    /// 证书到期时间
    pub expiration_date: DateTime<Utc>,
    /// 证书负责人
    pub owner: String,
    /// 备注信息
    pub notes: Option<String>,
    /// 证书状态（按到期时间计算后缓存）
    pub status: CertStatus,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
}

impl Certificate {
    /// Recomputes the status from the expiration date as of `as_of`.
    pub fn classify(&self, as_of: NaiveDate, threshold_days: u32) -> CertStatus {
        status::classify(Some(self.expiration_date), as_of, threshold_days)
    }

    pub fn days_until_expiration(&self, as_of: NaiveDate) -> i64 {
        status::days_until(Some(self.expiration_date), as_of).unwrap_or_default()
    }
}

/// A certificate that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub domain_name: String,
    pub sans: Option<String>,
    pub issuer: String,
    pub expiration_date: DateTime<Utc>,
    pub owner: String,
    pub notes: Option<String>,
    pub status: CertStatus,
}

/// 创建证书请求
#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateCertificateRequest {
    /// 关联域名（必填，如 example.com）
    #[validate(
        length(min = 1, max = 255, message = "domain_name must be 1-255 characters"),
        custom(function = "not_blank", message = "domain_name must not be blank")
    )]
    #[schema(example = "example.com")]
    pub domain_name: String,
    /// 备用名称（可选，逗号分隔）
    #[validate(length(max = 2000, message = "sans must be at most 2000 characters"))]
    #[schema(example = "*.example.com,api.example.com")]
    pub sans: Option<String>,
    /// 证书颁发机构（必填）
    #[validate(
        length(min = 1, max = 255, message = "issuer must be 1-255 characters"),
        custom(function = "not_blank", message = "issuer must not be blank")
    )]
    #[schema(example = "Let's Encrypt")]
    pub issuer: String,
    /// 证书到期时间（必填，RFC 3339 或 `yyyy-MM-dd HH:mm:ss`，UTC）
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    #[schema(value_type = String, example = "2026-12-31 23:59:59")]
    pub expiration_date: DateTime<Utc>,
    /// 证书负责人（必填）
    #[validate(
        length(min = 1, max = 255, message = "owner must be 1-255 characters"),
        custom(function = "not_blank", message = "owner must not be blank")
    )]
    #[schema(example = "ops-team")]
    pub owner: String,
    /// 备注信息（可选）
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// 更新证书请求（域名不可修改）
#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateCertificateRequest {
    /// 备用名称（可选）
    #[validate(length(max = 2000, message = "sans must be at most 2000 characters"))]
    pub sans: Option<String>,
    /// 证书颁发机构（必填）
    #[validate(
        length(min = 1, max = 255, message = "issuer must be 1-255 characters"),
        custom(function = "not_blank", message = "issuer must not be blank")
    )]
    pub issuer: String,
    /// 证书到期时间（必填）
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    #[schema(value_type = String, example = "2026-12-31 23:59:59")]
    pub expiration_date: DateTime<Utc>,
    /// 证书负责人（必填）
    #[validate(
        length(min = 1, max = 255, message = "owner must be 1-255 characters"),
        custom(function = "not_blank", message = "owner must not be blank")
    )]
    pub owner: String,
    /// 备注信息（可选）
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// 证书状态统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CertStatusStatistics {
    /// 正常证书数量
    pub normal_count: u64,
    /// 即将过期证书数量
    pub expiring_soon_count: u64,
    /// 已过期证书数量
    pub expired_count: u64,
    /// 总数
    pub total_count: u64,
}

impl CertStatusStatistics {
    pub fn new(normal_count: u64, expiring_soon_count: u64, expired_count: u64) -> Self {
        Self {
            normal_count,
            expiring_soon_count,
            expired_count,
            total_count: normal_count + expiring_soon_count + expired_count,
        }
    }

    pub fn has_warnings(&self) -> bool {
        self.expiring_soon_count > 0 || self.expired_count > 0
    }
}

/// One page of an ordered listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based page number.
    pub page: u64,
    pub size: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
            pages: self.pages,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses an RFC 3339 timestamp, or a `yyyy-MM-dd HH:mm:ss` timestamp taken
/// as UTC.
///
/// # Examples
///
/// ```
/// use certmon_common::types::parse_datetime;
///
/// let a = parse_datetime("2026-12-31 23:59:59").unwrap();
/// let b = parse_datetime("2026-12-31T23:59:59Z").unwrap();
/// assert_eq!(a, b);
/// assert!(parse_datetime("31/12/2026").is_none());
/// ```
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, LOCAL_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_flexible_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_datetime(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid datetime '{raw}', expected RFC 3339 or yyyy-MM-dd HH:mm:ss"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn create_request_accepts_both_datetime_formats() {
        let body = serde_json::json!({
            "domain_name": "example.com",
            "issuer": "Let's Encrypt",
            "expiration_date": "2026-12-31 23:59:59",
            "owner": "ops"
        });
        let req: CreateCertificateRequest = serde_json::from_value(body).unwrap();
        assert_eq!(
            req.expiration_date,
            Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap()
        );
        assert!(req.sans.is_none());

        let body = serde_json::json!({
            "domain_name": "example.com",
            "issuer": "Let's Encrypt",
            "expiration_date": "2026-12-31T23:59:59+08:00",
            "owner": "ops"
        });
        let req: CreateCertificateRequest = serde_json::from_value(body).unwrap();
        assert_eq!(
            req.expiration_date,
            Utc.with_ymd_and_hms(2026, 12, 31, 15, 59, 59).unwrap()
        );
    }

    #[test]
    fn create_request_rejects_bad_datetime() {
        let body = serde_json::json!({
            "domain_name": "example.com",
            "issuer": "x",
            "expiration_date": "tomorrow",
            "owner": "ops"
        });
        assert!(serde_json::from_value::<CreateCertificateRequest>(body).is_err());
    }

    #[test]
    fn validation_flags_blank_and_oversized_fields() {
        let req = CreateCertificateRequest {
            domain_name: "   ".to_string(),
            sans: Some("a".repeat(2001)),
            issuer: "CA".to_string(),
            expiration_date: Utc::now(),
            owner: String::new(),
            notes: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("domain_name"));
        assert!(fields.contains_key("sans"));
        assert!(fields.contains_key("owner"));
        assert!(!fields.contains_key("issuer"));
    }

    #[test]
    fn statistics_total_is_sum() {
        let stats = CertStatusStatistics::new(3, 2, 1);
        assert_eq!(stats.total_count, 6);
        assert!(stats.has_warnings());
        assert!(!CertStatusStatistics::new(4, 0, 0).has_warnings());
    }

    #[test]
    fn certificate_days_until_expiration() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 8, 0, 0).unwrap();
        let cert = Certificate {
            id: 1,
            domain_name: "example.com".to_string(),
            sans: None,
            issuer: "CA".to_string(),
            expiration_date: Utc.with_ymd_and_hms(2026, 6, 20, 1, 0, 0).unwrap(),
            owner: "ops".to_string(),
            notes: None,
            status: CertStatus::Normal,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(cert.days_until_expiration(now.date_naive()), 5);
        for offset in [-3i64, 0, 5, 9] {
            let as_of = now.date_naive() + chrono::Duration::days(offset);
            assert_eq!(
                Some(cert.days_until_expiration(as_of)),
                status::days_until(Some(cert.expiration_date), as_of)
            );
        }
        assert_eq!(cert.classify(now.date_naive(), 30), CertStatus::ExpiringSoon);
        assert_eq!(cert.classify(now.date_naive(), 4), CertStatus::Normal);
    }
}
