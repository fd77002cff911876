//! API 响应包裹。

use axum::{Json, http::StatusCode};
use serde::Serialize;

use super::error::ApiError;

/// 通用 API 成功/失败包裹结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiEnvelope<T>
where
    T: Serialize,
{
    pub(crate) ok: bool,
    pub(crate) code: String,
    pub(crate) message: String,
    pub(crate) suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<T>,
}

/// 接口返回类型。
pub(crate) type ApiReply<T> = (StatusCode, Json<ApiEnvelope<T>>);

/// 构造成功响应。
pub(crate) fn ok_response<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    suggestion: impl Into<String>,
    data: Option<T>,
) -> ApiReply<T> {
    (
        status,
        Json(ApiEnvelope {
            ok: true,
            code: "OK".to_string(),
            message: message.into(),
            suggestion: suggestion.into(),
            data,
        }),
    )
}

/// 成功时带 data 返回 200，失败时转换错误。
pub(crate) fn reply<T: Serialize>(
    result: Result<T, ApiError>,
    message: &str,
    suggestion: &str,
) -> ApiReply<T> {
    match result {
        Ok(data) => ok_response(StatusCode::OK, message, suggestion, Some(data)),
        Err(err) => err.into_response(),
    }
}
