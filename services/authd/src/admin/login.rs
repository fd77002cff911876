//! 管理员验证码签发与登录校验。

use axum::http::StatusCode;
use tracing::{info, warn};

use crate::{
    api::{
        client_ip::ClientMeta,
        error::{ApiError, code_rejection_to_api},
        types::{AdminCodeData, AdminLoginData, AdminLoginRequest},
    },
    codes::admin::ADMIN_CODE_TTL_MS,
    state::{AppState, missing_field},
};

impl AppState {
    /// 签发管理员验证码。
    ///
    /// 验证码直接随响应返回，由调用方通过其他渠道转交管理员。
    pub(crate) fn issue_admin_code(&self, meta: &ClientMeta) -> AdminCodeData {
        let code = self.admin_codes.generate();
        info!(client_ip = %meta.ip, "admin login code issued");
        AdminCodeData {
            code,
            expires_in_ms: ADMIN_CODE_TTL_MS,
        }
    }

    /// 管理员验证码登录。
    pub(crate) fn admin_login(
        &self,
        req: &AdminLoginRequest,
        meta: &ClientMeta,
    ) -> Result<AdminLoginData, ApiError> {
        if req.code.trim().is_empty() {
            return Err(missing_field("验证码不能为空"));
        }
        match self.admin_codes.verify(&req.code) {
            Ok(()) => {
                info!(client_ip = %meta.ip, "admin logged in");
                Ok(AdminLoginData {
                    role: "admin",
                    login_at: dc_shared_protocol::now_rfc3339_nanos(),
                })
            }
            Err(err) => {
                warn!(client_ip = %meta.ip, reason = ?err, "admin login rejected");
                Err(code_rejection_to_api(err, StatusCode::UNAUTHORIZED))
            }
        }
    }
}
