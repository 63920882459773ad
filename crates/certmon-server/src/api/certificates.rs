use crate::api::pagination::{deserialize_optional_u64, PaginationParams};
use crate::api::{
    error_response, json_body, service_error_response, success_empty_response,
    success_paginated_response, success_response, ApiError, PaginatedData,
};
use crate::cert::service::today;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use certmon_common::status::CertStatus;
use certmon_common::types::{
    CertStatusStatistics, Certificate, CreateCertificateRequest, UpdateCertificateRequest,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// 证书信息
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CertificateResponse {
    /// 证书 ID
    pub id: i64,
    /// 关联域名
    pub domain_name: String,
    /// 备用名称
    pub sans: Option<String>,
    /// 证书颁发机构
    pub issuer: String,
    /// 证书到期时间（UTC）
    pub expiration_date: DateTime<Utc>,
    /// 证书负责人
    pub owner: String,
    /// 备注
    pub notes: Option<String>,
    /// 证书状态
    pub status: CertStatus,
    /// 状态描述
    pub status_description: String,
    /// 距离到期的天数（已过期为负数）
    pub days_until_expiration: i64,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl CertificateResponse {
    fn from_certificate(cert: Certificate, as_of: NaiveDate) -> Self {
        Self {
            days_until_expiration: cert.days_until_expiration(as_of),
            status_description: cert.status.description().to_string(),
            id: cert.id,
            domain_name: cert.domain_name,
            sans: cert.sans,
            issuer: cert.issuer,
            expiration_date: cert.expiration_date,
            owner: cert.owner,
            notes: cert.notes,
            status: cert.status,
            created_at: cert.created_at,
            updated_at: cert.updated_at,
        }
    }
}

fn to_responses(certs: Vec<Certificate>) -> Vec<CertificateResponse> {
    let as_of = today();
    certs
        .into_iter()
        .map(|c| CertificateResponse::from_certificate(c, as_of))
        .collect()
}

fn parse_id(trace_id: &str, raw: &str) -> Result<i64, Response> {
    raw.trim().parse::<i64>().map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            trace_id,
            &format!("Invalid certificate id '{raw}'"),
        )
    })
}

/// 即将过期查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ExpiringQuery {
    /// 查询未来多少天内到期（默认取配置 status.expiring_soon_days）
    #[param(required = false, value_type = Option<u32>)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    days: Option<u64>,
}

/// 手动刷新结果
#[derive(Debug, Serialize, ToSchema)]
struct RefreshResult {
    /// 本次更新状态的证书数量
    updated_count: u64,
}

/// 创建证书。状态根据到期时间自动计算。
#[utoipa::path(
    post,
    path = "/v1/certificates",
    tag = "Certificates",
    request_body = CreateCertificateRequest,
    responses(
        (status = 201, description = "证书已创建", body = CertificateResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 409, description = "域名已存在", body = ApiError),
        (status = 500, description = "服务器错误", body = ApiError)
    )
)]
async fn create_certificate(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    body: Result<Json<CreateCertificateRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(&trace_id, body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.certificates.create(req).await {
        Ok(cert) => success_response(
            StatusCode::CREATED,
            &trace_id,
            CertificateResponse::from_certificate(cert, today()),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 获取证书详情（按 ID）。
#[utoipa::path(
    get,
    path = "/v1/certificates/{id}",
    tag = "Certificates",
    params(("id" = i64, Path, description = "证书 ID")),
    responses(
        (status = 200, description = "证书详情", body = CertificateResponse),
        (status = 404, description = "证书不存在", body = ApiError)
    )
)]
async fn get_certificate(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&trace_id, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.certificates.get(id).await {
        Ok(cert) => success_response(
            StatusCode::OK,
            &trace_id,
            CertificateResponse::from_certificate(cert, today()),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 获取证书详情（按域名）。
#[utoipa::path(
    get,
    path = "/v1/certificates/domain/{domain_name}",
    tag = "Certificates",
    params(("domain_name" = String, Path, description = "域名")),
    responses(
        (status = 200, description = "证书详情", body = CertificateResponse),
        (status = 404, description = "证书不存在", body = ApiError)
    )
)]
async fn get_certificate_by_domain(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(domain_name): Path<String>,
) -> Response {
    match state.certificates.get_by_domain(&domain_name).await {
        Ok(cert) => success_response(
            StatusCode::OK,
            &trace_id,
            CertificateResponse::from_certificate(cert, today()),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 分页查询证书列表。
/// 默认排序：到期时间升序；默认分页：`page=1&size=10`。
#[utoipa::path(
    get,
    path = "/v1/certificates",
    tag = "Certificates",
    params(PaginationParams),
    responses(
        (status = 200, description = "证书分页列表", body = PaginatedData<CertificateResponse>)
    )
)]
async fn list_certificates(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    match state
        .certificates
        .list(pagination.page(), pagination.size())
        .await
    {
        Ok(page) => {
            let as_of = today();
            let page = page.map(|c| CertificateResponse::from_certificate(c, as_of));
            success_paginated_response(StatusCode::OK, &trace_id, page)
        }
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 按状态查询证书。状态取值：`Normal` / `ExpiringSoon` / `Expired`
/// （也接受 `NORMAL` / `EXPIRING_SOON` / `EXPIRED`）。
#[utoipa::path(
    get,
    path = "/v1/certificates/status/{status}",
    tag = "Certificates",
    params(("status" = String, Path, description = "证书状态")),
    responses(
        (status = 200, description = "证书列表", body = Vec<CertificateResponse>),
        (status = 400, description = "无效状态", body = ApiError)
    )
)]
async fn list_by_status(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Response {
    let status = match status.parse::<CertStatus>() {
        Ok(s) => s,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, &msg),
    };
    match state.certificates.list_by_status(status).await {
        Ok(certs) => success_response(StatusCode::OK, &trace_id, to_responses(certs)),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 按负责人查询证书。
#[utoipa::path(
    get,
    path = "/v1/certificates/owner/{owner}",
    tag = "Certificates",
    params(("owner" = String, Path, description = "负责人")),
    responses(
        (status = 200, description = "证书列表", body = Vec<CertificateResponse>)
    )
)]
async fn list_by_owner(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Response {
    match state.certificates.list_by_owner(&owner).await {
        Ok(certs) => success_response(StatusCode::OK, &trace_id, to_responses(certs)),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 查询即将过期的证书（今天起 `days` 天内到期，且尚未标记为已过期）。
#[utoipa::path(
    get,
    path = "/v1/certificates/expiring",
    tag = "Certificates",
    params(ExpiringQuery),
    responses(
        (status = 200, description = "证书列表", body = Vec<CertificateResponse>),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn list_expiring(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<ExpiringQuery>,
) -> Response {
    let days = match query.days {
        None => state.certificates.expiring_soon_days(),
        Some(d) => match u32::try_from(d) {
            Ok(d) => d,
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, &trace_id, "days is too large")
            }
        },
    };
    match state.certificates.list_expiring_soon(days).await {
        Ok(certs) => success_response(StatusCode::OK, &trace_id, to_responses(certs)),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 查询已过期的证书。
#[utoipa::path(
    get,
    path = "/v1/certificates/expired",
    tag = "Certificates",
    responses(
        (status = 200, description = "证书列表", body = Vec<CertificateResponse>)
    )
)]
async fn list_expired(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    match state.certificates.list_expired().await {
        Ok(certs) => success_response(StatusCode::OK, &trace_id, to_responses(certs)),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 更新证书（域名不可修改），状态重新计算。
#[utoipa::path(
    put,
    path = "/v1/certificates/{id}",
    tag = "Certificates",
    params(("id" = i64, Path, description = "证书 ID")),
    request_body = UpdateCertificateRequest,
    responses(
        (status = 200, description = "证书已更新", body = CertificateResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "证书不存在", body = ApiError)
    )
)]
async fn update_certificate(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateCertificateRequest>, JsonRejection>,
) -> Response {
    let id = match parse_id(&trace_id, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = match json_body(&trace_id, body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.certificates.update(id, req).await {
        Ok(cert) => success_response(
            StatusCode::OK,
            &trace_id,
            CertificateResponse::from_certificate(cert, today()),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 删除证书。
#[utoipa::path(
    delete,
    path = "/v1/certificates/{id}",
    tag = "Certificates",
    params(("id" = i64, Path, description = "证书 ID")),
    responses(
        (status = 200, description = "证书已删除"),
        (status = 404, description = "证书不存在", body = ApiError)
    )
)]
async fn delete_certificate(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&trace_id, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.certificates.delete(id).await {
        Ok(()) => success_empty_response(StatusCode::OK, &trace_id, "deleted"),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 获取证书状态统计。
#[utoipa::path(
    get,
    path = "/v1/certificates/statistics",
    tag = "Certificates",
    responses(
        (status = 200, description = "状态统计", body = CertStatusStatistics)
    )
)]
async fn certificate_statistics(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    match state.refresh_job.statistics().await {
        Ok(stats) => success_response(StatusCode::OK, &trace_id, stats),
        Err(e) => service_error_response(&trace_id, e.into()),
    }
}

/// 立即刷新所有证书状态（与每日定时任务相同）。
#[utoipa::path(
    post,
    path = "/v1/certificates/update-status",
    tag = "Certificates",
    responses(
        (status = 200, description = "刷新完成", body = RefreshResult),
        (status = 500, description = "服务器错误", body = ApiError)
    )
)]
async fn refresh_statuses(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let threshold = state.config.status.expiring_soon_days;
    match state.refresh_job.refresh_all(today(), threshold).await {
        Ok(updated_count) => success_response(
            StatusCode::OK,
            &trace_id,
            RefreshResult { updated_count },
        ),
        Err(e) => service_error_response(&trace_id, e.into()),
    }
}

pub fn certificates_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_certificates, create_certificate))
        .routes(routes!(get_certificate, update_certificate, delete_certificate))
        .routes(routes!(get_certificate_by_domain))
        .routes(routes!(list_by_status))
        .routes(routes!(list_by_owner))
        .routes(routes!(list_expiring))
        .routes(routes!(list_expired))
        .routes(routes!(certificate_statistics))
        .routes(routes!(refresh_statuses))
}
