pub mod certificates;
pub mod pagination;

use crate::cert::service::ServiceError;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use certmon_common::types::Page;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// API 错误响应
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// 状态码（与 HTTP 状态一致，如 400/404/409/500）
    pub code: u16,
    /// 错误信息
    pub message: String,
    /// 始终为 null
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    /// 响应时间（Unix 毫秒）
    pub timestamp: i64,
    /// 链路追踪 ID
    pub trace_id: String,
}

/// API 统一响应包裹
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 状态码（成功时为 200）
    pub code: u16,
    /// 提示信息（成功时为 success）
    pub message: String,
    /// 业务数据
    pub data: Option<T>,
    /// 响应时间（Unix 毫秒）
    pub timestamp: i64,
    /// 链路追踪 ID
    pub trace_id: String,
}

/// 分页数据结构
#[derive(Serialize, ToSchema)]
pub struct PaginatedData<T>
where
    T: Serialize,
{
    /// 当前页数据
    pub items: Vec<T>,
    /// 总条数
    pub total: u64,
    /// 当前页码（从 1 开始）
    pub page: u64,
    /// 每页条数
    pub size: u64,
    /// 总页数
    pub pages: u64,
}

fn envelope<T: Serialize>(code: u16, message: &str, trace_id: &str, data: Option<T>) -> ApiResponse<T> {
    ApiResponse {
        code,
        message: message.to_string(),
        data,
        timestamp: Utc::now().timestamp_millis(),
        trace_id: trace_id.to_string(),
    }
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (status, Json(envelope(200, "success", trace_id, Some(data)))).into_response()
}

pub fn success_empty_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (status, Json(envelope::<Value>(200, msg, trace_id, None))).into_response()
}

pub fn success_paginated_response<T>(status: StatusCode, trace_id: &str, page: Page<T>) -> Response
where
    T: Serialize,
{
    success_response(
        status,
        trace_id,
        PaginatedData {
            items: page.items,
            total: page.total,
            page: page.page,
            size: page.size,
            pages: page.pages,
        },
    )
}

pub fn error_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(envelope::<Value>(status.as_u16(), msg, trace_id, None)),
    )
        .into_response()
}

/// Maps a service failure to its envelope. Storage details are logged and
/// replaced by a generic message.
pub fn service_error_response(trace_id: &str, err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, trace_id, &msg),
        ServiceError::NotFound(_) => {
            error_response(StatusCode::NOT_FOUND, trace_id, &err.to_string())
        }
        ServiceError::DuplicateDomain(_) => {
            error_response(StatusCode::CONFLICT, trace_id, &err.to_string())
        }
        ServiceError::Storage(e) => {
            tracing::error!(trace_id = %trace_id, error = %e, "Storage failure");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "Internal server error",
            )
        }
    }
}

/// Unwraps a JSON body, turning a malformed or incomplete body into a 400.
pub fn json_body<T>(trace_id: &str, body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match body {
        Ok(Json(v)) => Ok(v),
        Err(rejection) => Err(error_response(
            StatusCode::BAD_REQUEST,
            trace_id,
            &rejection.body_text(),
        )),
    }
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// 服务版本号
    version: String,
    /// 运行时长（秒）
    uptime_secs: i64,
    /// 存储状态（ok / error）
    storage_status: String,
}

/// 获取服务健康状态。
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "服务健康状态", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let storage_status = match state.cert_store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            "error"
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            storage_status: storage_status.to_string(),
        },
    )
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .merge(certificates::certificates_routes())
}
