//! 配置模块职责：
//! 1. 读取授权服务运行所需的环境变量，并提供默认值。
//! 2. 解析注册表路径、监听地址、日志相关配置。

use std::path::PathBuf;

/// 默认监听地址。
pub(crate) const DEFAULT_ADDR: &str = "0.0.0.0:18090";
/// 监听地址环境变量。
const ADDR_ENV: &str = "DC_ADDR";
/// 注册表路径环境变量。
const REGISTRY_PATH_ENV: &str = "DC_REGISTRY_PATH";
/// 签名密钥环境变量。
pub(crate) const SECRET_KEY_ENV: &str = "DC_SECRET_KEY";
/// 新建注册表时的免授权模式初值。
const FREE_AUTH_MODE_ENV: &str = "DC_FREE_AUTH_MODE";

/// 服务运行时配置。
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// HTTP 监听地址。
    pub(crate) addr: String,
    /// 注册表文件路径。
    pub(crate) registry_path: PathBuf,
    /// 环境变量提供的签名密钥（密钥链第三优先级）。
    pub(crate) env_secret_key: Option<String>,
    /// 新建注册表时写入的免授权模式。
    pub(crate) free_auth_mode_seed: bool,
}

impl Config {
    /// 从环境变量读取配置。
    pub(crate) fn from_env() -> Self {
        Self {
            addr: env_non_empty(ADDR_ENV).unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            registry_path: registry_path(),
            env_secret_key: env_non_empty(SECRET_KEY_ENV),
            free_auth_mode_seed: env_non_empty(FREE_AUTH_MODE_ENV)
                .map(|raw| parse_bool(&raw))
                .unwrap_or(false),
        }
    }
}

/// 注册表路径：优先环境变量，回退 `~/.config/devicebind/authd/registry.json`。
pub(crate) fn registry_path() -> PathBuf {
    if let Some(path) = env_non_empty(REGISTRY_PATH_ENV) {
        return PathBuf::from(path);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("devicebind")
        .join("authd")
        .join("registry.json")
}

/// 读取非空环境变量（去除首尾空白）。
pub(crate) fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 解析布尔开关：`1/true/yes/on` 视为开启。
pub(crate) fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
