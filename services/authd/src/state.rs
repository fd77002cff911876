//! 服务共享状态：注册表句柄、两类验证码存储与投递通道。

use std::{path::PathBuf, sync::Arc};

use axum::http::StatusCode;
use dc_shared_protocol::now_rfc3339_nanos;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{
    api::{
        client_ip::ClientMeta,
        error::{ApiError, persist_error},
        types::{Registry, SystemSettings, VerificationLog},
    },
    auth::secret::{ResolvedKey, key_chain, resolve_secret_key},
    codes::{
        admin::AdminCodes,
        rebind::RebindCodes,
        store::{Clock, SystemClock},
    },
    config::Config,
    mail::{LogMailer, Mailer},
    registry::store::{load_registry, persist_registry},
};

/// 服务共享状态。
#[derive(Clone)]
pub(crate) struct AppState {
    /// 设备注册表（持久化）。
    pub(crate) registry: Arc<RwLock<Registry>>,
    /// 注册表文件路径。
    pub(crate) registry_path: Arc<PathBuf>,
    /// 环境变量提供的签名密钥。
    pub(crate) env_secret_key: Option<Arc<str>>,
    /// 管理员登录验证码（内存）。
    pub(crate) admin_codes: AdminCodes,
    /// 换绑邮箱验证码（内存）。
    pub(crate) rebind_codes: RebindCodes,
    /// 换绑验证码投递通道。
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl AppState {
    /// 按配置装配状态；注册表损坏时拒绝启动。
    pub(crate) fn from_config(config: &Config) -> anyhow::Result<Self> {
        let seed = SystemSettings {
            free_auth_mode: config.free_auth_mode_seed,
            ..SystemSettings::default()
        };
        let registry = load_registry(&config.registry_path, seed).map_err(anyhow::Error::msg)?;
        Ok(Self::assemble(
            registry,
            config.registry_path.clone(),
            config.env_secret_key.clone(),
            Arc::new(SystemClock),
            Arc::new(LogMailer),
        ))
    }

    pub(crate) fn assemble(
        registry: Registry,
        registry_path: PathBuf,
        env_secret_key: Option<String>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            registry_path: Arc::new(registry_path),
            env_secret_key: env_secret_key.map(Arc::from),
            admin_codes: AdminCodes::new(clock.clone()),
            rebind_codes: RebindCodes::new(clock.clone()),
            mailer,
            clock,
        }
    }

    /// 当前毫秒时间。
    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// 按密钥链解析签名密钥；每次签名/校验前调用一次。
    pub(crate) fn resolve_key(&self, registry: &Registry, explicit: Option<&str>) -> ResolvedKey {
        resolve_secret_key(&key_chain(
            explicit,
            registry.settings.secret_key.as_deref(),
            self.env_secret_key.as_deref(),
        ))
    }

    /// 落盘注册表。
    pub(crate) fn persist(&self, registry: &Registry) -> Result<(), ApiError> {
        persist_registry(&self.registry_path, registry).map_err(persist_error)
    }

    /// 追加一条校验日志并落盘；落盘失败仅告警，不影响主流程结果。
    pub(crate) fn log_verification(
        &self,
        registry: &mut Registry,
        meta: &ClientMeta,
        device_code: &str,
        success: bool,
        message: Option<String>,
    ) {
        registry.push_log(VerificationLog {
            device_code: if device_code.is_empty() {
                "empty".to_string()
            } else {
                device_code.to_string()
            },
            ip_address: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            success,
            message,
            created_at: now_rfc3339_nanos(),
        });
        if let Err(err) = persist_registry(&self.registry_path, registry) {
            warn!("persist verification log failed: {err}");
        }
    }

    /// 记录失败日志并返回对应接口错误。
    pub(crate) fn reject(
        &self,
        registry: &mut Registry,
        meta: &ClientMeta,
        device_code: &str,
        err: ApiError,
    ) -> ApiError {
        self.log_verification(registry, meta, device_code, false, Some(err.message.clone()));
        err
    }
}

/// 缺少必填字段。
pub(crate) fn missing_field(message: &'static str) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "MISSING_FIELDS",
        message,
        "请补全后重试",
    )
}
