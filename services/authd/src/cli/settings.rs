//! `settings`、`logs`、`history` 子命令：查看/修改系统设置，查看校验日志与换绑历史。
//!
//! 直接读写注册表文件；服务运行中修改需重启服务后生效。

use anyhow::{anyhow, bail};
use dc_shared_protocol::sha256_hex;

use super::{Flags, cli_key, open_registry};
use crate::{config::Config, registry::store::persist_registry};

/// `logs` / `history` 默认显示条数。
pub(super) const DEFAULT_LIST_LIMIT: usize = 50;
/// 密钥指纹长度（hex 字符）。
const KEY_FINGERPRINT_LEN: usize = 12;

#[derive(Debug, PartialEq, Eq)]
pub(super) enum SettingsCommand {
    Show,
    SetKey(String),
    ClearKey,
    FreeAuth(bool),
    SetName(String),
}

pub(super) fn parse_settings(action: &str, positional: &[String]) -> anyhow::Result<SettingsCommand> {
    match (action, positional) {
        ("show", []) => Ok(SettingsCommand::Show),
        ("set-key", [key]) if !key.trim().is_empty() => Ok(SettingsCommand::SetKey(key.clone())),
        ("clear-key", []) => Ok(SettingsCommand::ClearKey),
        ("free-auth", [switch]) => match switch.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Ok(SettingsCommand::FreeAuth(true)),
            "off" | "false" | "0" => Ok(SettingsCommand::FreeAuth(false)),
            other => Err(anyhow!("free-auth expects on|off, got `{other}`")),
        },
        ("name", [_, ..]) => Ok(SettingsCommand::SetName(positional.join(" "))),
        _ => Err(anyhow!(
            "usage: dc-authd settings <show|set-key K|clear-key|free-auth on|off|name N>"
        )),
    }
}

/// 解析 `--limit`，缺省为 [`DEFAULT_LIST_LIMIT`]。
pub(super) fn parse_limit(positional: &[String], flags: &Flags, usage: &str) -> anyhow::Result<usize> {
    if !positional.is_empty() {
        bail!("usage: {usage}");
    }
    match flags.number("--limit")? {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(0) => bail!("--limit must be greater than 0"),
        Some(limit) => Ok(usize::try_from(limit).unwrap_or(usize::MAX)),
    }
}

/// 密钥指纹：不回显密钥本身。
fn key_fingerprint(key: &str) -> String {
    sha256_hex(key).chars().take(KEY_FINGERPRINT_LEN).collect()
}

pub(super) fn run_settings(action: SettingsCommand) -> anyhow::Result<()> {
    let config = Config::from_env();
    let mut registry = open_registry(&config)?;

    match action {
        SettingsCommand::Show => {
            let key = cli_key(&config, &registry, None);
            println!("system-name: {}", registry.settings.system_name);
            println!("free-auth-mode: {}", registry.settings.free_auth_mode);
            println!("key-source: {}", key.source.as_str());
            println!("key-fingerprint: {}", key_fingerprint(&key.key));
            return Ok(());
        }
        SettingsCommand::SetKey(key) => {
            registry.set_secret_key(Some(&key));
            println!("secret key updated (fingerprint {})", key_fingerprint(key.trim()));
            eprintln!("signatures issued under the previous key are no longer accepted");
        }
        SettingsCommand::ClearKey => {
            registry.set_secret_key(None);
            let key = cli_key(&config, &registry, None);
            println!("secret key cleared; now using {}", key.source.as_str());
        }
        SettingsCommand::FreeAuth(enabled) => {
            registry.set_free_auth_mode(enabled);
            println!("free-auth-mode: {enabled}");
        }
        SettingsCommand::SetName(name) => {
            registry.settings.system_name = name.trim().to_string();
            println!("system-name: {}", registry.settings.system_name);
        }
    }

    persist_registry(&config.registry_path, &registry).map_err(anyhow::Error::msg)?;
    eprintln!("restart dc-authd if it is running to apply the change");
    Ok(())
}

pub(super) fn run_logs(limit: usize) -> anyhow::Result<()> {
    let registry = open_registry(&Config::from_env())?;
    for log in registry.recent_logs(limit) {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            log.created_at,
            if log.success { "ok" } else { "fail" },
            log.device_code,
            log.ip_address,
            log.message.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub(super) fn run_history(limit: usize) -> anyhow::Result<()> {
    let registry = open_registry(&Config::from_env())?;
    for record in registry.recent_history(limit) {
        println!(
            "{}\t{} -> {}\t{}\t{}",
            record.created_at,
            record.old_device_code,
            record.new_device_code,
            record.reason,
            record.ip_address
        );
    }
    Ok(())
}
