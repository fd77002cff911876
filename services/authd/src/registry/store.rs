//! 注册表文件读写。

use std::{fs, path::Path};

use crate::api::types::{Registry, SystemSettings};

/// 加载注册表；文件不存在时返回带初始设置的新注册表。
pub(crate) fn load_registry(path: &Path, seed: SystemSettings) -> Result<Registry, String> {
    if !path.exists() {
        return Ok(Registry::new(seed));
    }
    let raw = fs::read(path).map_err(|err| format!("read registry failed: {err}"))?;
    serde_json::from_slice(&raw).map_err(|err| format!("decode registry failed: {err}"))
}

/// 持久化注册表（先写临时文件再替换）。
pub(crate) fn persist_registry(path: &Path, registry: &Registry) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| format!("create registry dir failed: {err}"))?;
    }
    let encoded = serde_json::to_vec_pretty(registry)
        .map_err(|err| format!("encode registry failed: {err}"))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, encoded).map_err(|err| format!("write registry failed: {err}"))?;
    fs::rename(&tmp, path).map_err(|err| format!("replace registry failed: {err}"))
}

#[cfg(test)]
pub(crate) fn temp_registry_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("dc-authd-{tag}-{}", uuid::Uuid::new_v4().simple()))
        .join("registry.json")
}
