//! 设备授权校验：免授权模式自动登记，否则按白名单/黑名单/签名/有效期依次校验。

use axum::http::StatusCode;
use dc_shared_protocol::{DeviceVerifyRequest, verify_at};
use tracing::{debug, info};

use crate::{
    api::{
        client_ip::ClientMeta,
        error::ApiError,
        types::{AUTO_AUTHORIZED_BY, DeviceRecord, DeviceVerifyData, Registry},
    },
    registry::ops::NewDevice,
    state::{AppState, missing_field},
};

impl AppState {
    /// 校验设备码与当前时间窗签名。
    pub(crate) async fn verify_device(
        &self,
        req: &DeviceVerifyRequest,
        meta: &ClientMeta,
    ) -> Result<DeviceVerifyData, ApiError> {
        let device_code = req.device_code.trim();
        let signature = req.signature.trim();
        let mut registry = self.registry.write().await;

        if device_code.is_empty() || signature.is_empty() {
            return Err(self.reject(
                &mut registry,
                meta,
                device_code,
                missing_field("设备码和签名不能为空"),
            ));
        }

        if registry.settings.free_auth_mode {
            let key = self.resolve_key(&registry, None);
            let record = NewDevice {
                device_code: device_code.to_string(),
                authorized_by: AUTO_AUTHORIZED_BY.to_string(),
                ..NewDevice::default()
            }
            .into_record(&key.key);
            // 已登记的设备插入失败即沿用原记录。
            if registry.add_device(record).is_ok() {
                info!(device_code, "auto-registered device in free auth mode");
            }
        } else {
            let Some(record) = registry.device(device_code) else {
                return Err(self.reject(
                    &mut registry,
                    meta,
                    device_code,
                    ApiError::new(
                        StatusCode::FORBIDDEN,
                        "DEVICE_NOT_AUTHORIZED",
                        "当前为非免授权模式，设备未授权",
                        "请联系管理员进行设备授权",
                    ),
                ));
            };
            let record = record.clone();
            if let Err(err) = self.check_device_usable(&registry, &record, signature) {
                return Err(self.reject(&mut registry, meta, device_code, err));
            }
        }

        let Some(record) = registry.device(device_code).cloned() else {
            return Err(self.reject(
                &mut registry,
                meta,
                device_code,
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "设备记录丢失",
                    "请稍后重试",
                ),
            ));
        };
        if record.is_blacklisted {
            return Err(self.reject(&mut registry, meta, device_code, blacklisted(&record, "")));
        }

        registry.record_verification(device_code);
        self.log_verification(&mut registry, meta, device_code, true, None);
        debug!(device_code, "device verified");

        Ok(DeviceVerifyData {
            device_code: record.device_code,
            device_name: record.device_name,
            is_permanent: record.is_permanent,
            expires_at: record.expires_at,
            authorized_by: record.authorized_by,
        })
    }

    /// 授权记录可用性：未拉黑、签名有效、未过期。
    pub(crate) fn check_device_usable(
        &self,
        registry: &Registry,
        record: &DeviceRecord,
        signature: &str,
    ) -> Result<(), ApiError> {
        if record.is_blacklisted {
            return Err(blacklisted(record, ""));
        }
        let key = self.resolve_key(registry, None);
        let now = self.now_ms();
        if !verify_at(&record.device_code, signature, &key.key, now) {
            debug!(
                device_code = %record.device_code,
                key_source = key.source.as_str(),
                "device signature mismatch"
            );
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "SIGNATURE_INVALID",
                "设备码签名验证失败",
                "请校准设备时间后重试",
            ));
        }
        if record.is_expired(now) {
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "DEVICE_EXPIRED",
                "设备授权已过期",
                "请联系管理员续期",
            ));
        }
        Ok(())
    }
}

/// 拉黑错误；`action` 追加在提示语中（如“，无法换绑”）。
pub(crate) fn blacklisted(record: &DeviceRecord, action: &str) -> ApiError {
    let reason = record.blacklist_reason.as_deref().unwrap_or("未提供原因");
    ApiError::new(
        StatusCode::FORBIDDEN,
        "DEVICE_BLACKLISTED",
        format!("设备已被拉黑{action}：{reason}"),
        "请联系管理员",
    )
}
