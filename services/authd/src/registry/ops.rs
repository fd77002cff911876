//! 注册表内存操作（不负责落盘）。

use dc_shared_protocol::{now_rfc3339_nanos, sign_record};

use crate::api::types::{
    DeviceRecord, MAX_VERIFICATION_LOGS, RebindRecord, Registry, VerificationLog,
};

fn device_exists(device_code: &str) -> String {
    format!("device already registered: {device_code}")
}

fn device_not_found(device_code: &str) -> String {
    format!("device not found: {device_code}")
}

/// 新设备授权参数。
#[derive(Debug, Clone, Default)]
pub(crate) struct NewDevice {
    pub(crate) device_code: String,
    pub(crate) device_name: Option<String>,
    pub(crate) qq_number: Option<String>,
    /// 过期时间（unix 毫秒）；None 表示永久。
    pub(crate) expires_at: Option<u64>,
    pub(crate) authorized_by: String,
}

impl NewDevice {
    /// 生成带记录签名的授权记录。
    pub(crate) fn into_record(self, secret_key: &str) -> DeviceRecord {
        let signature = sign_record(&self.device_code, self.expires_at, secret_key);
        DeviceRecord {
            signature,
            is_permanent: self.expires_at.is_none(),
            device_code: self.device_code,
            device_name: self.device_name,
            qq_number: self.qq_number,
            is_blacklisted: false,
            blacklist_reason: None,
            authorized_by: self.authorized_by,
            verify_count: 0,
            last_verified_at: None,
            expires_at: self.expires_at,
            created_at: now_rfc3339_nanos(),
        }
    }
}

impl Registry {
    pub(crate) fn device(&self, device_code: &str) -> Option<&DeviceRecord> {
        self.devices.get(device_code)
    }

    /// 新增设备；设备码已存在时拒绝。
    pub(crate) fn add_device(&mut self, record: DeviceRecord) -> Result<(), String> {
        if self.devices.contains_key(&record.device_code) {
            return Err(device_exists(&record.device_code));
        }
        self.devices.insert(record.device_code.clone(), record);
        Ok(())
    }

    pub(crate) fn remove_device(&mut self, device_code: &str) -> Option<DeviceRecord> {
        self.devices.remove(device_code)
    }

    /// 拉黑设备。
    pub(crate) fn blacklist(&mut self, device_code: &str, reason: &str) -> Result<(), String> {
        let device = self
            .devices
            .get_mut(device_code)
            .ok_or_else(|| device_not_found(device_code))?;
        device.is_blacklisted = true;
        let reason = reason.trim();
        device.blacklist_reason = (!reason.is_empty()).then(|| reason.to_string());
        Ok(())
    }

    /// 解除拉黑。
    pub(crate) fn unblacklist(&mut self, device_code: &str) -> Result<(), String> {
        let device = self
            .devices
            .get_mut(device_code)
            .ok_or_else(|| device_not_found(device_code))?;
        device.is_blacklisted = false;
        device.blacklist_reason = None;
        Ok(())
    }

    /// 更新校验统计。
    pub(crate) fn record_verification(&mut self, device_code: &str) {
        if let Some(device) = self.devices.get_mut(device_code) {
            device.verify_count = device.verify_count.saturating_add(1);
            device.last_verified_at = Some(now_rfc3339_nanos());
        }
    }

    /// 追加校验日志，仅保留最近 [`MAX_VERIFICATION_LOGS`] 条。
    pub(crate) fn push_log(&mut self, log: VerificationLog) {
        self.verification_logs.push(log);
        let overflow = self
            .verification_logs
            .len()
            .saturating_sub(MAX_VERIFICATION_LOGS);
        if overflow > 0 {
            self.verification_logs.drain(..overflow);
        }
    }

    /// 把旧设备授权转移到新设备码并记录换绑历史。
    pub(crate) fn transfer_device(
        &mut self,
        new_record: DeviceRecord,
        history: RebindRecord,
    ) -> Result<(), String> {
        if !self.devices.contains_key(&history.old_device_code) {
            return Err(device_not_found(&history.old_device_code));
        }
        self.add_device(new_record)?;
        self.devices.remove(&history.old_device_code);
        self.rebind_history.push(history);
        Ok(())
    }

    /// 更新持久化签名密钥；`None` 或空白表示清除，回退到环境变量/默认密钥。
    pub(crate) fn set_secret_key(&mut self, key: Option<&str>) {
        self.settings.secret_key = key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
    }

    pub(crate) fn set_free_auth_mode(&mut self, enabled: bool) {
        self.settings.free_auth_mode = enabled;
    }

    /// 最近的校验日志，新的在前。
    pub(crate) fn recent_logs(&self, limit: usize) -> impl Iterator<Item = &VerificationLog> {
        self.verification_logs.iter().rev().take(limit)
    }

    /// 最近的换绑历史，新的在前。
    pub(crate) fn recent_history(&self, limit: usize) -> impl Iterator<Item = &RebindRecord> {
        self.rebind_history.iter().rev().take(limit)
    }
}
