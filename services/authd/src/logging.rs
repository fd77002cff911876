//! 日志系统模块职责：
//! 1. 初始化 stdout + 文件双通道 tracing 日志。
//! 2. 运行日志按天滚动写入日志目录。
//! 3. 定期删除超过保留天数的历史日志文件。

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// 默认日志目录（相对当前工作目录）。
const DEFAULT_LOG_DIR: &str = "logs";
/// 日志保留天数默认值。
const DEFAULT_RETENTION_DAYS: i64 = 14;
/// 清理任务轮询周期。
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);
/// 文件日志级别环境变量（独立于 `RUST_LOG`）。
const FILE_LOG_LEVEL_ENV: &str = "DC_FILE_LOG_LEVEL";
/// stdout 默认日志过滤。
const DEFAULT_STDOUT_FILTER: &str = "info";

/// 日志运行时守卫，防止 non-blocking writer 提前析构。
pub(crate) struct LogRuntime {
    _stdout_guard: WorkerGuard,
    _file_guard: WorkerGuard,
    _pruner: JoinHandle<()>,
}

/// 初始化日志系统，并启动历史日志清理任务。
pub(crate) fn init(service_name: &str) -> Result<LogRuntime> {
    let log_dir = resolve_log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("create log dir: {}", log_dir.display()))?;

    let retention_days = retention_days();
    let prefix = format!("{service_name}.log");
    prune_old_logs(&log_dir, &prefix, retention_days)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, &prefix);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(stdout_writer)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(resolve_stdout_env_filter());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(resolve_file_level_filter());

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pruner = spawn_prune_task(log_dir, prefix, retention_days);
    Ok(LogRuntime {
        _stdout_guard: stdout_guard,
        _file_guard: file_guard,
        _pruner: pruner,
    })
}

/// 仅输出到 stderr 的简单日志（CLI 子命令使用）。
pub(crate) fn init_cli() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init();
}

/// stdout 过滤：优先 `RUST_LOG`，回退默认级别。
fn resolve_stdout_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_STDOUT_FILTER))
}

/// 文件日志级别；默认 `debug`。
fn resolve_file_level_filter() -> LevelFilter {
    std::env::var(FILE_LOG_LEVEL_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::DEBUG)
}

fn spawn_prune_task(log_dir: PathBuf, prefix: String, retention_days: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = prune_old_logs(&log_dir, &prefix, retention_days) {
                warn!("prune logs failed: {err}");
            }
        }
    })
}

/// 日志目录：`DC_LOG_DIR`，相对路径基于当前工作目录。
fn resolve_log_dir() -> PathBuf {
    let raw = std::env::var("DC_LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(path),
        Err(_) => PathBuf::from(DEFAULT_LOG_DIR),
    }
}

fn retention_days() -> i64 {
    std::env::var("DC_LOG_RETENTION_DAYS")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|days| *days > 0)
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

/// 删除早于保留期的 `<prefix>.<YYYY-MM-DD>` 日志文件，返回删除数量。
fn prune_old_logs(log_dir: &Path, prefix: &str, retention_days: i64) -> Result<usize> {
    let today = Local::now().date_naive();
    let mut removed = 0;
    for entry in
        fs::read_dir(log_dir).with_context(|| format!("read log dir: {}", log_dir.display()))?
    {
        let path = entry
            .with_context(|| format!("read entry under {}", log_dir.display()))?
            .path();
        let Some(day) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| extract_day(name, prefix))
        else {
            continue;
        };
        if (today - day).num_days() > retention_days && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        info!(removed, "pruned expired log files");
    }
    Ok(removed)
}

/// 从 `<prefix>.<YYYY-MM-DD>` 中提取日期。
fn extract_day(file_name: &str, prefix: &str) -> Option<NaiveDate> {
    let day = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
