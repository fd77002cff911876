//! authd CLI 分发：`run`、`sign`、`verify-signature`、`gen-device-code`、`device`、`settings`、
//! `logs`、`history`、`doctor`、`version`。

mod settings;

use anyhow::{Context, anyhow, bail};
use dc_shared_protocol::{
    compute_window, generate_device_code, ms_to_rfc3339, now_ms, sign, verify_at,
};
use serde_json::json;
use settings::{SettingsCommand, parse_limit, parse_settings, run_history, run_logs, run_settings};

use crate::{
    api::types::{Registry, SystemSettings},
    auth::secret::{ResolvedKey, key_chain, resolve_secret_key},
    config::Config,
    registry::{
        ops::NewDevice,
        store::{load_registry, persist_registry},
    },
};

/// CLI 分发结果。
pub(crate) enum CliDispatch {
    /// 继续进入授权服务主循环。
    Run,
    /// 命令已处理完成，主程序应退出。
    Exit,
}

/// 一天的毫秒数。
const DAY_MS: u64 = 86_400_000;
/// 命令行登记设备时的授权人。
const CLI_AUTHORIZED_BY: &str = "cli";

/// 解析后的子命令。
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run,
    Help,
    Version,
    Sign {
        device_code: String,
        key: Option<String>,
        at_ms: Option<u64>,
    },
    VerifySignature {
        device_code: String,
        signature: String,
        key: Option<String>,
        at_ms: Option<u64>,
    },
    GenDeviceCode,
    Device(DeviceCommand),
    Settings(SettingsCommand),
    Logs { limit: usize },
    History { limit: usize },
    Doctor(DoctorFormat),
}

#[derive(Debug, PartialEq, Eq)]
enum DeviceCommand {
    List,
    Add {
        device_code: String,
        name: Option<String>,
        qq_number: Option<String>,
        /// `None` 表示永久授权。
        days: Option<u64>,
    },
    Remove(String),
    Blacklist { device_code: String, reason: String },
    Unblacklist(String),
}

/// `doctor` 输出格式。
#[derive(Debug, PartialEq, Eq)]
enum DoctorFormat {
    Text,
    Json,
}

/// 解析并执行 authd CLI。
pub(crate) fn dispatch(args: &[String]) -> anyhow::Result<CliDispatch> {
    match parse(args)? {
        Command::Run => Ok(CliDispatch::Run),
        command => {
            crate::logging::init_cli();
            execute(command)?;
            Ok(CliDispatch::Exit)
        }
    }
}

fn parse(args: &[String]) -> anyhow::Result<Command> {
    let Some(cmd) = args.first().map(|raw| raw.trim()) else {
        return Ok(Command::Run);
    };
    let rest = &args[1..];

    match cmd {
        "" | "run" => Ok(Command::Run),
        "-h" | "--help" | "help" => Ok(Command::Help),
        "version" | "--version" => Ok(Command::Version),
        "gen-device-code" => Ok(Command::GenDeviceCode),
        "sign" => {
            let (positional, flags) = split_flags(rest)?;
            let [device_code] = positional.as_slice() else {
                bail!("usage: dc-authd sign <device-code> [--key K] [--at MS]");
            };
            Ok(Command::Sign {
                device_code: device_code.clone(),
                key: flags.value("--key"),
                at_ms: flags.number("--at")?,
            })
        }
        "verify-signature" => {
            let (positional, flags) = split_flags(rest)?;
            let [device_code, signature] = positional.as_slice() else {
                bail!(
                    "usage: dc-authd verify-signature <device-code> <signature> [--key K] [--at MS]"
                );
            };
            Ok(Command::VerifySignature {
                device_code: device_code.clone(),
                signature: signature.clone(),
                key: flags.value("--key"),
                at_ms: flags.number("--at")?,
            })
        }
        "device" => parse_device(rest).map(Command::Device),
        "settings" => {
            let action = rest.first().map(String::as_str).unwrap_or("");
            let (positional, _) = split_flags(&rest[rest.len().min(1)..])?;
            parse_settings(action, &positional).map(Command::Settings)
        }
        "logs" => {
            let (positional, flags) = split_flags(rest)?;
            let limit = parse_limit(&positional, &flags, "dc-authd logs [--limit N]")?;
            Ok(Command::Logs { limit })
        }
        "history" => {
            let (positional, flags) = split_flags(rest)?;
            let limit = parse_limit(&positional, &flags, "dc-authd history [--limit N]")?;
            Ok(Command::History { limit })
        }
        "doctor" => parse_doctor_format(rest).map(Command::Doctor),
        other => Err(anyhow!(
            "unknown command: {other}; run `dc-authd --help` for usage"
        )),
    }
}

fn parse_device(args: &[String]) -> anyhow::Result<DeviceCommand> {
    let action = args.first().map(String::as_str).unwrap_or("");
    let (positional, flags) = split_flags(&args[args.len().min(1)..])?;
    match (action, positional.as_slice()) {
        ("list", []) => Ok(DeviceCommand::List),
        ("add", [device_code]) => {
            let days = flags.number("--days")?;
            if days == Some(0) {
                bail!("--days must be greater than 0");
            }
            if days.is_some() && flags.has("--permanent") {
                bail!("--days conflicts with --permanent");
            }
            Ok(DeviceCommand::Add {
                device_code: device_code.clone(),
                name: flags.value("--name"),
                qq_number: flags.value("--qq"),
                days,
            })
        }
        ("remove", [device_code]) => Ok(DeviceCommand::Remove(device_code.clone())),
        ("blacklist", [device_code, reason @ ..]) => Ok(DeviceCommand::Blacklist {
            device_code: device_code.clone(),
            reason: reason.join(" "),
        }),
        ("unblacklist", [device_code]) => Ok(DeviceCommand::Unblacklist(device_code.clone())),
        _ => Err(anyhow!(
            "usage: dc-authd device <list|add|remove|blacklist|unblacklist> ..."
        )),
    }
}

/// 解析 doctor 的 `--format` 参数。
fn parse_doctor_format(args: &[String]) -> anyhow::Result<DoctorFormat> {
    if args.is_empty() {
        return Ok(DoctorFormat::Text);
    }
    if args.len() == 2 && args[0] == "--format" {
        return match args[1].as_str() {
            "text" => Ok(DoctorFormat::Text),
            "json" => Ok(DoctorFormat::Json),
            other => Err(anyhow!("unsupported doctor format: {other}")),
        };
    }
    Err(anyhow!("usage: dc-authd doctor [--format text|json]"))
}

/// 命令行中的 `--flag value` / `--switch`。
#[derive(Default)]
struct Flags(Vec<(String, Option<String>)>);

impl Flags {
    fn value(&self, name: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(flag, _)| flag == name)
            .and_then(|(_, value)| value.clone())
    }

    fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(flag, _)| flag == name)
    }

    fn number(&self, name: &str) -> anyhow::Result<Option<u64>> {
        self.value(name)
            .map(|raw| {
                raw.parse::<u64>()
                    .with_context(|| format!("{name} expects a number, got `{raw}`"))
            })
            .transpose()
    }
}

/// 取值型参数。
const VALUE_FLAGS: &[&str] = &["--key", "--at", "--name", "--qq", "--days", "--limit"];
/// 开关型参数。
const SWITCH_FLAGS: &[&str] = &["--permanent"];

fn split_flags(args: &[String]) -> anyhow::Result<(Vec<String>, Flags)> {
    let mut positional = Vec::new();
    let mut flags = Flags::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("missing value for {arg}"))?;
            flags.0.push((arg.clone(), Some(value.clone())));
        } else if SWITCH_FLAGS.contains(&arg.as_str()) {
            flags.0.push((arg.clone(), None));
        } else if arg.starts_with("--") {
            bail!("unknown flag: {arg}");
        } else {
            positional.push(arg.clone());
        }
    }
    Ok((positional, flags))
}

fn execute(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run => Ok(()),
        Command::Help => {
            print_root_help();
            Ok(())
        }
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::GenDeviceCode => {
            println!("{}", generate_device_code());
            Ok(())
        }
        Command::Sign {
            device_code,
            key,
            at_ms,
        } => {
            let config = Config::from_env();
            let registry = open_registry(&config)?;
            let key = cli_key(&config, &registry, key.as_deref());
            let window = compute_window(at_ms.unwrap_or_else(now_ms));
            println!("{}", sign(&device_code, window, &key.key));
            eprintln!("window={window} key-source={}", key.source.as_str());
            Ok(())
        }
        Command::VerifySignature {
            device_code,
            signature,
            key,
            at_ms,
        } => {
            let config = Config::from_env();
            let registry = open_registry(&config)?;
            let key = cli_key(&config, &registry, key.as_deref());
            if verify_at(
                &device_code,
                &signature,
                &key.key,
                at_ms.unwrap_or_else(now_ms),
            ) {
                println!("valid");
                Ok(())
            } else {
                bail!("signature invalid for {device_code} (key-source={})", key.source.as_str())
            }
        }
        Command::Device(action) => run_device(action),
        Command::Settings(action) => run_settings(action),
        Command::Logs { limit } => run_logs(limit),
        Command::History { limit } => run_history(limit),
        Command::Doctor(format) => run_doctor(format),
    }
}

fn open_registry(config: &Config) -> anyhow::Result<Registry> {
    let seed = SystemSettings {
        free_auth_mode: config.free_auth_mode_seed,
        ..SystemSettings::default()
    };
    load_registry(&config.registry_path, seed).map_err(anyhow::Error::msg)
}

fn cli_key(config: &Config, registry: &Registry, explicit: Option<&str>) -> ResolvedKey {
    resolve_secret_key(&key_chain(
        explicit,
        registry.settings.secret_key.as_deref(),
        config.env_secret_key.as_deref(),
    ))
}

/// 执行 device 子命令，变更后写回注册表。
fn run_device(action: DeviceCommand) -> anyhow::Result<()> {
    let config = Config::from_env();
    let mut registry = open_registry(&config)?;

    match action {
        DeviceCommand::List => {
            let now = now_ms();
            for device in registry.devices.values() {
                let expiry = match device.expires_at {
                    _ if device.is_permanent => "permanent".to_string(),
                    Some(ms) => ms_to_rfc3339(ms).unwrap_or_else(|| ms.to_string()),
                    None => "-".to_string(),
                };
                let mut flags = Vec::new();
                if device.is_blacklisted {
                    flags.push("blacklisted");
                }
                if device.is_expired(now) {
                    flags.push("expired");
                }
                println!(
                    "{}\t{}\t{}\tverified={}\t{}",
                    device.device_code,
                    device.device_name.as_deref().unwrap_or("-"),
                    expiry,
                    device.verify_count,
                    flags.join(",")
                );
            }
            return Ok(());
        }
        DeviceCommand::Add {
            device_code,
            name,
            qq_number,
            days,
        } => {
            let key = cli_key(&config, &registry, None);
            let record = NewDevice {
                device_code: device_code.clone(),
                device_name: name,
                qq_number,
                expires_at: days.map(|days| now_ms().saturating_add(days.saturating_mul(DAY_MS))),
                authorized_by: CLI_AUTHORIZED_BY.to_string(),
            }
            .into_record(&key.key);
            registry.add_device(record).map_err(anyhow::Error::msg)?;
            println!("added {device_code}");
        }
        DeviceCommand::Remove(device_code) => {
            if registry.remove_device(&device_code).is_none() {
                bail!("device not found: {device_code}");
            }
            println!("removed {device_code}");
        }
        DeviceCommand::Blacklist {
            device_code,
            reason,
        } => {
            registry.blacklist(&device_code, &reason).map_err(anyhow::Error::msg)?;
            println!("blacklisted {device_code}");
        }
        DeviceCommand::Unblacklist(device_code) => {
            registry.unblacklist(&device_code).map_err(anyhow::Error::msg)?;
            println!("unblacklisted {device_code}");
        }
    }

    persist_registry(&config.registry_path, &registry).map_err(anyhow::Error::msg)
}

/// 打印 doctor 信息；注册表无法读取时返回错误。
fn run_doctor(format: DoctorFormat) -> anyhow::Result<()> {
    let config = Config::from_env();
    let registry_exists = config.registry_path.exists();
    let registry = open_registry(&config)?;
    let key = cli_key(&config, &registry, None);
    let blacklisted = registry
        .devices
        .values()
        .filter(|device| device.is_blacklisted)
        .count();

    match format {
        DoctorFormat::Text => {
            println!("addr: {}", config.addr);
            println!("registry-path: {}", config.registry_path.display());
            println!("registry-exists: {}", if registry_exists { "yes" } else { "no" });
            println!("devices: {}", registry.devices.len());
            println!("blacklisted: {blacklisted}");
            println!("free-auth-mode: {}", registry.settings.free_auth_mode);
            println!("key-source: {}", key.source.as_str());
        }
        DoctorFormat::Json => {
            let payload = json!({
                "addr": config.addr,
                "registryPath": config.registry_path.display().to_string(),
                "registryExists": registry_exists,
                "devices": registry.devices.len(),
                "blacklisted": blacklisted,
                "freeAuthMode": registry.settings.free_auth_mode,
                "keySource": key.source.as_str(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }
    Ok(())
}

fn print_root_help() {
    println!("dc-authd {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  dc-authd [run]");
    println!("  dc-authd sign <device-code> [--key K] [--at MS]");
    println!("  dc-authd verify-signature <device-code> <signature> [--key K] [--at MS]");
    println!("  dc-authd gen-device-code");
    println!("  dc-authd device list");
    println!("  dc-authd device add <device-code> [--name N] [--qq Q] [--days D | --permanent]");
    println!("  dc-authd device remove <device-code>");
    println!("  dc-authd device blacklist <device-code> [reason...]");
    println!("  dc-authd device unblacklist <device-code>");
    println!("  dc-authd settings show");
    println!("  dc-authd settings set-key <key> | clear-key");
    println!("  dc-authd settings free-auth <on|off>");
    println!("  dc-authd settings name <system-name...>");
    println!("  dc-authd logs [--limit N]");
    println!("  dc-authd history [--limit N]");
    println!("  dc-authd doctor [--format text|json]");
    println!("  dc-authd version");
}
