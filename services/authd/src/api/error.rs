//! API 错误定义与响应转换。

use axum::{Json, http::StatusCode};
use serde::Serialize;

use super::response::ApiEnvelope;
use crate::codes::store::CodeRejection;

/// 接口错误。
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) code: &'static str,
    pub(crate) message: String,
    pub(crate) suggestion: &'static str,
}

impl ApiError {
    /// 构造统一 API 错误。
    pub(crate) fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        suggestion: &'static str,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            suggestion,
        }
    }

    /// 转换为统一响应体（失败时不带 data）。
    pub(crate) fn into_response<T: Serialize>(self) -> (StatusCode, Json<ApiEnvelope<T>>) {
        (
            self.status,
            Json(ApiEnvelope {
                ok: false,
                code: self.code.to_string(),
                message: self.message,
                suggestion: self.suggestion.to_string(),
                data: None,
            }),
        )
    }
}

/// 验证码校验失败映射为接口错误。
pub(crate) fn code_rejection_to_api(err: CodeRejection, status: StatusCode) -> ApiError {
    match err {
        CodeRejection::NotFound => ApiError::new(
            status,
            "CODE_NOT_FOUND",
            "验证码不存在或已过期",
            "请重新获取验证码",
        ),
        CodeRejection::Expired => ApiError::new(
            status,
            "CODE_EXPIRED",
            "验证码已过期",
            "请重新获取验证码",
        ),
        CodeRejection::AlreadyUsed => ApiError::new(
            status,
            "CODE_ALREADY_USED",
            "验证码已使用",
            "请重新获取验证码",
        ),
        CodeRejection::Mismatch => ApiError::new(
            status,
            "CODE_MISMATCH",
            "验证码错误",
            "请核对后重新输入",
        ),
    }
}

/// 注册表落盘失败。
pub(crate) fn persist_error(err: String) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        format!("保存授权数据失败: {err}"),
        "请稍后重试",
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::code_rejection_to_api;
    use crate::codes::store::CodeRejection;

    #[test]
    fn every_rejection_maps_to_distinct_code() {
        let codes = [
            CodeRejection::NotFound,
            CodeRejection::Expired,
            CodeRejection::AlreadyUsed,
            CodeRejection::Mismatch,
        ]
        .map(|err| code_rejection_to_api(err, StatusCode::BAD_REQUEST).code);
        assert_eq!(
            codes,
            ["CODE_NOT_FOUND", "CODE_EXPIRED", "CODE_ALREADY_USED", "CODE_MISMATCH"]
        );
    }

    #[test]
    fn rejection_keeps_caller_status() {
        let err = code_rejection_to_api(CodeRejection::Expired, StatusCode::UNAUTHORIZED);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        let (status, body) = err.into_response::<()>();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.0.ok);
        assert_eq!(body.0.message, "验证码已过期");
    }
}
