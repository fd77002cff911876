//! API 请求/响应类型与持久化注册表类型。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 管理员登录请求。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminLoginRequest {
    #[serde(default)]
    pub(crate) code: String,
}

/// 管理员验证码签发返回。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminCodeData {
    pub(crate) code: String,
    pub(crate) expires_in_ms: u64,
}

/// 管理员登录返回。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminLoginData {
    pub(crate) role: &'static str,
    pub(crate) login_at: String,
}

/// 设备校验返回。
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceVerifyData {
    pub(crate) device_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) device_name: Option<String>,
    pub(crate) is_permanent: bool,
    pub(crate) expires_at: Option<u64>,
    pub(crate) authorized_by: String,
}

/// 发送换绑验证码请求。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RebindSendCodeRequest {
    #[serde(default)]
    pub(crate) old_device_code: String,
    #[serde(default)]
    pub(crate) new_device_code: String,
    #[serde(default)]
    pub(crate) signature: String,
}

/// 发送换绑验证码返回。
#[derive(Debug, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RebindSendCodeData {
    pub(crate) device_name: Option<String>,
    pub(crate) qq_number: Option<String>,
    pub(crate) masked_email: String,
}

/// 确认换绑请求。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RebindConfirmRequest {
    #[serde(default)]
    pub(crate) old_device_code: String,
    #[serde(default)]
    pub(crate) new_device_code: String,
    #[serde(default)]
    pub(crate) email_code: String,
    #[serde(default)]
    pub(crate) signature: String,
}

/// 确认换绑返回。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RebindConfirmData {
    pub(crate) old_device_code: String,
    pub(crate) new_device_code: String,
    pub(crate) device_name: Option<String>,
    pub(crate) qq_number: Option<String>,
    pub(crate) is_permanent: bool,
    pub(crate) expires_at: Option<u64>,
    pub(crate) authorized_by: String,
}

/// 持久化注册表（设备授权、系统设置、日志）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Registry {
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) settings: SystemSettings,
    #[serde(default)]
    pub(crate) devices: BTreeMap<String, DeviceRecord>,
    #[serde(default)]
    pub(crate) rebind_history: Vec<RebindRecord>,
    #[serde(default)]
    pub(crate) verification_logs: Vec<VerificationLog>,
}

impl Registry {
    pub(crate) fn new(settings: SystemSettings) -> Self {
        Self {
            version: 1,
            settings,
            devices: BTreeMap::new(),
            rebind_history: Vec::new(),
            verification_logs: Vec::new(),
        }
    }
}

/// 系统设置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SystemSettings {
    /// 持久化签名密钥；为空时沿密钥链回退。
    #[serde(default)]
    pub(crate) secret_key: Option<String>,
    /// 免授权模式：未知设备自动登记为永久授权。
    #[serde(default)]
    pub(crate) free_auth_mode: bool,
    #[serde(default = "default_system_name")]
    pub(crate) system_name: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            free_auth_mode: false,
            system_name: default_system_name(),
        }
    }
}

fn default_system_name() -> String {
    "设备码换绑系统".to_string()
}

/// 设备授权记录。
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceRecord {
    pub(crate) device_code: String,
    #[serde(default)]
    pub(crate) device_name: Option<String>,
    #[serde(default)]
    pub(crate) qq_number: Option<String>,
    pub(crate) is_permanent: bool,
    #[serde(default)]
    pub(crate) is_blacklisted: bool,
    #[serde(default)]
    pub(crate) blacklist_reason: Option<String>,
    pub(crate) signature: String,
    pub(crate) authorized_by: String,
    #[serde(default)]
    pub(crate) verify_count: u64,
    #[serde(default)]
    pub(crate) last_verified_at: Option<String>,
    /// 授权过期时间（unix 毫秒）；永久授权为 None。
    #[serde(default)]
    pub(crate) expires_at: Option<u64>,
    pub(crate) created_at: String,
}

impl DeviceRecord {
    /// 非永久授权且已超过过期时间。
    pub(crate) fn is_expired(&self, now_ms: u64) -> bool {
        !self.is_permanent && self.expires_at.is_some_and(|exp| exp <= now_ms)
    }
}

/// 换绑历史。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RebindRecord {
    pub(crate) old_device_code: String,
    pub(crate) new_device_code: String,
    pub(crate) reason: String,
    pub(crate) ip_address: String,
    pub(crate) user_agent: String,
    pub(crate) created_at: String,
}

/// 设备校验日志。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerificationLog {
    pub(crate) device_code: String,
    pub(crate) ip_address: String,
    pub(crate) user_agent: String,
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) message: Option<String>,
    pub(crate) created_at: String,
}

/// 校验日志保留条数。
pub(crate) const MAX_VERIFICATION_LOGS: usize = 1000;
/// 免授权模式自动登记设备的授权来源。
pub(crate) const AUTO_AUTHORIZED_BY: &str = "system_auto";
