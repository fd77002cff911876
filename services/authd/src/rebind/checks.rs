//! 换绑前置校验：旧设备存在、未拉黑、签名有效、未过期，新设备码未占用。

use axum::http::StatusCode;

use crate::{
    api::{
        client_ip::ClientMeta,
        error::ApiError,
        types::{DeviceRecord, Registry},
    },
    device::verify::blacklisted,
    state::AppState,
};

impl AppState {
    /// 校验换绑双方，返回旧设备记录；失败时写入校验日志（新设备码占用除外）。
    pub(crate) fn check_rebind_pair(
        &self,
        registry: &mut Registry,
        meta: &ClientMeta,
        old_device_code: &str,
        new_device_code: &str,
        signature: &str,
    ) -> Result<DeviceRecord, ApiError> {
        let Some(old) = registry.device(old_device_code).cloned() else {
            return Err(self.reject(
                registry,
                meta,
                old_device_code,
                ApiError::new(
                    StatusCode::NOT_FOUND,
                    "DEVICE_NOT_FOUND",
                    "旧设备码不存在或无效",
                    "请核对旧设备码",
                ),
            ));
        };
        if old.is_blacklisted {
            return Err(self.reject(
                registry,
                meta,
                old_device_code,
                blacklisted(&old, "，无法换绑"),
            ));
        }
        if let Err(err) = self.check_device_usable(registry, &old, signature) {
            return Err(self.reject(registry, meta, old_device_code, err));
        }
        if registry.device(new_device_code).is_some() {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "DEVICE_EXISTS",
                "新设备码已存在",
                "请选择其他设备码",
            ));
        }
        Ok(old)
    }
}
