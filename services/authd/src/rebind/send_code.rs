//! 发送换绑邮箱验证码。

use axum::http::StatusCode;
use tracing::{info, warn};

use crate::{
    api::{
        client_ip::ClientMeta,
        error::ApiError,
        types::{RebindSendCodeData, RebindSendCodeRequest},
    },
    codes::rebind::RebindPayload,
    mail::{RebindMail, email_for_qq, mask_email},
    state::{AppState, missing_field},
};

impl AppState {
    /// 校验旧设备后向其绑定 QQ 邮箱发送 6 位验证码。
    pub(crate) async fn send_rebind_code(
        &self,
        req: &RebindSendCodeRequest,
        meta: &ClientMeta,
    ) -> Result<RebindSendCodeData, ApiError> {
        let old_code = req.old_device_code.trim();
        let new_code = req.new_device_code.trim();
        if old_code.is_empty() || new_code.is_empty() {
            return Err(missing_field("设备码不能为空"));
        }

        let mut registry = self.registry.write().await;
        let old = self.check_rebind_pair(
            &mut registry,
            meta,
            old_code,
            new_code,
            req.signature.trim(),
        )?;

        let Some(qq_number) = old
            .qq_number
            .as_deref()
            .map(str::trim)
            .filter(|qq| !qq.is_empty())
        else {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "QQ_NOT_BOUND",
                "该设备未绑定QQ号，无法进行邮箱验证",
                "请联系管理员绑定QQ号",
            ));
        };

        let email = email_for_qq(qq_number);
        let masked_email = mask_email(&email);
        let code = self.rebind_codes.generate(RebindPayload {
            old_device_code: old_code.to_string(),
            new_device_code: new_code.to_string(),
            device_name: old.device_name.clone(),
            qq_number: Some(qq_number.to_string()),
            email: email.clone(),
            masked_email: masked_email.clone(),
        });

        let mail = RebindMail {
            to: email,
            masked_to: masked_email.clone(),
            code,
            old_device_code: old_code.to_string(),
            new_device_code: new_code.to_string(),
            client_ip: meta.ip.clone(),
            system_name: registry.settings.system_name.clone(),
        };
        if let Err(err) = self.mailer.send_rebind_code(&mail) {
            warn!("send rebind code mail failed: {err}");
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "MAIL_SEND_FAILED",
                "邮件发送失败",
                "请稍后重试",
            ));
        }

        self.log_verification(
            &mut registry,
            meta,
            old_code,
            true,
            Some(format!("邮箱验证码已发送到 {masked_email}")),
        );
        info!(old_device = old_code, new_device = new_code, "rebind code issued");

        Ok(RebindSendCodeData {
            device_name: old.device_name,
            qq_number: Some(qq_number.to_string()),
            masked_email,
        })
    }
}
