//! 确认换绑：校验邮箱验证码后把授权转移到新设备码。

use axum::http::StatusCode;
use dc_shared_protocol::now_rfc3339_nanos;
use tracing::{info, warn};

use crate::{
    api::{
        client_ip::ClientMeta,
        error::{ApiError, code_rejection_to_api},
        types::{RebindConfirmData, RebindConfirmRequest, RebindRecord},
    },
    registry::ops::NewDevice,
    state::{AppState, missing_field},
};

/// 换绑历史中的原因字段。
const REBIND_REASON: &str = "邮箱验证换绑";

impl AppState {
    /// 校验邮箱验证码并完成换绑。
    pub(crate) async fn confirm_rebind(
        &self,
        req: &RebindConfirmRequest,
        meta: &ClientMeta,
    ) -> Result<RebindConfirmData, ApiError> {
        let old_code = req.old_device_code.trim();
        let new_code = req.new_device_code.trim();
        let email_code = req.email_code.trim();
        let mut registry = self.registry.write().await;

        if old_code.is_empty() || new_code.is_empty() || email_code.is_empty() {
            return Err(self.reject(
                &mut registry,
                meta,
                old_code,
                missing_field("设备码和邮箱验证码不能为空"),
            ));
        }

        let payload = match self.rebind_codes.verify(old_code, new_code, email_code) {
            Ok(payload) => payload,
            Err(err) => {
                return Err(self.reject(
                    &mut registry,
                    meta,
                    old_code,
                    code_rejection_to_api(err, StatusCode::BAD_REQUEST),
                ));
            }
        };

        let old = self.check_rebind_pair(
            &mut registry,
            meta,
            old_code,
            new_code,
            req.signature.trim(),
        )?;

        let key = self.resolve_key(&registry, None);
        let mut new_record = NewDevice {
            device_code: new_code.to_string(),
            device_name: old.device_name.clone(),
            qq_number: old.qq_number.clone(),
            expires_at: old.expires_at,
            authorized_by: old.authorized_by.clone(),
        }
        .into_record(&key.key);
        new_record.is_permanent = old.is_permanent;

        let history = RebindRecord {
            old_device_code: old_code.to_string(),
            new_device_code: new_code.to_string(),
            reason: REBIND_REASON.to_string(),
            ip_address: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            created_at: now_rfc3339_nanos(),
        };

        // 先在副本上完成转移并落盘，成功后再替换内存注册表。
        let mut next = registry.clone();
        let applied = next
            .transfer_device(new_record, history)
            .map_err(|err| {
                ApiError::new(
                    StatusCode::CONFLICT,
                    "REBIND_CONFLICT",
                    err,
                    "请刷新后重试",
                )
            })
            .and_then(|()| self.persist(&next));
        if let Err(err) = applied {
            let masked_email = payload.masked_email.clone();
            self.rebind_codes.restore(email_code, payload);
            warn!(
                old_device = old_code,
                new_device = new_code,
                masked_email = %masked_email,
                "rebind not applied: {}",
                err.message
            );
            return Err(self.reject(&mut registry, meta, old_code, err));
        }
        *registry = next;

        self.log_verification(
            &mut registry,
            meta,
            old_code,
            true,
            Some(format!("设备码换绑成功，新设备码：{new_code}")),
        );
        info!(
            old_device = old_code,
            new_device = new_code,
            masked_email = %payload.masked_email,
            "device rebound"
        );

        Ok(RebindConfirmData {
            old_device_code: old_code.to_string(),
            new_device_code: new_code.to_string(),
            device_name: old.device_name,
            qq_number: old.qq_number,
            is_permanent: old.is_permanent,
            expires_at: old.expires_at,
            authorized_by: old.authorized_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use dc_shared_protocol::{compute_window, sign};

    use crate::{
        api::{
            client_ip::ClientMeta,
            types::{RebindConfirmRequest, RebindSendCodeRequest, SystemSettings},
        },
        registry::{ops::NewDevice, store::temp_registry_path},
        state::{
            AppState,
            test_support::{RecordingMailer, TEST_NOW_MS, test_state},
        },
    };

    const KEY: &str = "rebind-secret";

    async fn state_with_device(tag: &str, mailer: Arc<RecordingMailer>) -> AppState {
        let settings = SystemSettings {
            secret_key: Some(KEY.to_string()),
            ..SystemSettings::default()
        };
        let (state, _clock) = test_state(tag, settings, mailer);
        let record = NewDevice {
            device_code: "OLD".to_string(),
            device_name: Some("office pc".to_string()),
            qq_number: Some("123456789".to_string()),
            expires_at: Some(TEST_NOW_MS + 86_400_000),
            authorized_by: "admin".to_string(),
        }
        .into_record(KEY);
        state
            .registry
            .write()
            .await
            .add_device(record)
            .expect("register old device");
        state
    }

    fn old_signature() -> String {
        sign("OLD", compute_window(TEST_NOW_MS), KEY)
    }

    fn send_req(new: &str) -> RebindSendCodeRequest {
        RebindSendCodeRequest {
            old_device_code: "OLD".to_string(),
            new_device_code: new.to_string(),
            signature: old_signature(),
        }
    }

    fn confirm_req(new: &str, code: &str) -> RebindConfirmRequest {
        RebindConfirmRequest {
            old_device_code: "OLD".to_string(),
            new_device_code: new.to_string(),
            email_code: code.to_string(),
            signature: old_signature(),
        }
    }

    #[tokio::test]
    async fn full_rebind_flow_moves_authorization() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with_device("rebind-flow", mailer.clone()).await;
        let meta = ClientMeta::local();

        let sent = state
            .send_rebind_code(&send_req("NEW"), &meta)
            .await
            .expect("send code");
        assert_eq!(sent.masked_email, "12***9@qq.com");
        assert_eq!(sent.device_name.as_deref(), Some("office pc"));
        let code = mailer.last_code().expect("mail recorded");
        assert_eq!(code.len(), 6);

        let done = state
            .confirm_rebind(&confirm_req("NEW", &code), &meta)
            .await
            .expect("confirm");
        assert_eq!(done.new_device_code, "NEW");
        assert!(!done.is_permanent);

        let registry = state.registry.read().await;
        assert!(registry.device("OLD").is_none());
        let new = registry.device("NEW").expect("new device");
        assert_eq!(new.qq_number.as_deref(), Some("123456789"));
        assert_eq!(new.verify_count, 0);
        assert_eq!(registry.rebind_history.len(), 1);
        assert_eq!(state.rebind_codes.len(), 0);
    }

    #[tokio::test]
    async fn wrong_code_keeps_pending_code() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with_device("rebind-wrong", mailer.clone()).await;
        let meta = ClientMeta::local();
        state
            .send_rebind_code(&send_req("NEW"), &meta)
            .await
            .expect("send code");
        let code = mailer.last_code().expect("mail recorded");
        let wrong = if code == "111111" { "222222" } else { "111111" };

        let err = state
            .confirm_rebind(&confirm_req("NEW", wrong), &meta)
            .await
            .expect_err("wrong code");
        assert_eq!(err.code, "CODE_MISMATCH");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        assert!(
            state
                .confirm_rebind(&confirm_req("NEW", &code), &meta)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn confirm_without_code_reports_not_found() {
        let state = state_with_device("rebind-none", Arc::new(RecordingMailer::default())).await;
        let err = state
            .confirm_rebind(&confirm_req("NEW", "123456"), &ClientMeta::local())
            .await
            .expect_err("no pending code");
        assert_eq!(err.code, "CODE_NOT_FOUND");
    }

    #[tokio::test]
    async fn send_code_rejects_bad_signature_and_taken_target() {
        let state = state_with_device("rebind-checks", Arc::new(RecordingMailer::default())).await;
        let meta = ClientMeta::local();

        let mut bad = send_req("NEW");
        bad.signature = sign("OLD", compute_window(TEST_NOW_MS), "other-key");
        let err = state
            .send_rebind_code(&bad, &meta)
            .await
            .expect_err("bad signature");
        assert_eq!(err.code, "SIGNATURE_INVALID");

        let err = state
            .send_rebind_code(&send_req("OLD"), &meta)
            .await
            .expect_err("target taken");
        assert_eq!(err.code, "DEVICE_EXISTS");

        let mut unknown = send_req("NEW");
        unknown.old_device_code = "GHOST".to_string();
        let err = state
            .send_rebind_code(&unknown, &meta)
            .await
            .expect_err("unknown old device");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(state.rebind_codes.len(), 0);
    }

    #[tokio::test]
    async fn mail_failure_is_reported() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        });
        let state = state_with_device("rebind-mail", mailer).await;
        let err = state
            .send_rebind_code(&send_req("NEW"), &ClientMeta::local())
            .await
            .expect_err("mail failure");
        assert_eq!(err.code, "MAIL_SEND_FAILED");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn device_without_qq_cannot_request_code() {
        let state = state_with_device("rebind-noqq", Arc::new(RecordingMailer::default())).await;
        if let Some(device) = state.registry.write().await.devices.get_mut("OLD") {
            device.qq_number = None;
        }
        let err = state
            .send_rebind_code(&send_req("NEW"), &ClientMeta::local())
            .await
            .expect_err("no qq");
        assert_eq!(err.code, "QQ_NOT_BOUND");
    }

    #[tokio::test]
    async fn failed_persist_leaves_registry_and_code_untouched() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut state = state_with_device("rebind-readonly", mailer.clone()).await;
        let blocker = temp_registry_path("rebind-blocker");
        std::fs::create_dir_all(blocker.parent().expect("parent")).expect("mkdir");
        std::fs::write(&blocker, b"not a directory").expect("write blocker");
        state.registry_path = Arc::new(blocker.join("registry.json"));
        let meta = ClientMeta::local();

        state
            .send_rebind_code(&send_req("NEW"), &meta)
            .await
            .expect("send code");
        let code = mailer.last_code().expect("mail recorded");

        let err = state
            .confirm_rebind(&confirm_req("NEW", &code), &meta)
            .await
            .expect_err("persist must fail");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        {
            let registry = state.registry.read().await;
            assert!(registry.device("OLD").is_some());
            assert!(registry.device("NEW").is_none());
            assert!(registry.rebind_history.is_empty());
        }
        assert_eq!(state.rebind_codes.len(), 1);

        state.registry_path = Arc::new(temp_registry_path("rebind-writable"));
        let done = state
            .confirm_rebind(&confirm_req("NEW", &code), &meta)
            .await
            .expect("retry with same code");
        assert_eq!(done.new_device_code, "NEW");
    }
}
