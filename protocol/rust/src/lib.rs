// 文件职责：
// 1) 定义设备端与授权服务共用的签名算法（10 秒时间窗 SHA-256 签名）。
// 2) 定义设备校验接口的请求结构，保证两端字段一致。
// 3) 提供毫秒时间戳、设备码生成等跨端一致的基础函数。

pub mod signature;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use signature::{
    PERMANENT_TOKEN, SIGNATURE_WINDOW_MS, compute_window, constant_time_eq, sha256_hex, sign,
    sign_current, sign_record, verify, verify_at,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceVerifyRequest {
    // 设备码。
    #[serde(default)]
    pub device_code: String,
    // 当前时间窗签名（小写 hex）。
    #[serde(default)]
    pub signature: String,
}

impl DeviceVerifyRequest {
    /// 以当前时间窗为设备码签名并构造请求。
    pub fn signed(device_code: impl Into<String>, key: &str) -> Self {
        let device_code = device_code.into();
        let signature = sign_current(&device_code, key);
        Self {
            device_code,
            signature,
        }
    }
}

/// 当前 unix 毫秒。
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// 生成纳秒精度 UTC 时间戳（RFC3339）。
pub fn now_rfc3339_nanos() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

/// 毫秒时间戳转 RFC3339（非法值返回 None）。
pub fn ms_to_rfc3339(ms: u64) -> Option<String> {
    let ms = i64::try_from(ms).ok()?;
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

/// 生成随机设备码（32 位大写 hex）。
pub fn generate_device_code() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}
