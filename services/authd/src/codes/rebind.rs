//! 换绑邮箱验证码：6 位数字，以 (旧设备码, 新设备码) 为 key，成功即删除。

use std::sync::Arc;

use rand::{Rng, rngs::OsRng};
use serde::Serialize;

use super::store::{Clock, CodeRejection, CodeStore, ConsumePolicy, InMemoryCodeStore};

/// 换绑验证码有效期（毫秒）。
pub(crate) const REBIND_CODE_TTL_MS: u64 = 10 * 60 * 1000;

/// 生成 6 位换绑验证码（系统 CSPRNG）。
pub(crate) fn generate_rebind_code() -> String {
    OsRng.gen_range(100_000..=999_999).to_string()
}

/// 换绑验证码 key。
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) struct RebindKey {
    pub(crate) old_device_code: String,
    pub(crate) new_device_code: String,
}

impl RebindKey {
    pub(crate) fn new(old_device_code: &str, new_device_code: &str) -> Self {
        Self {
            old_device_code: old_device_code.to_string(),
            new_device_code: new_device_code.to_string(),
        }
    }
}

/// 随验证码保存的换绑上下文。
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RebindPayload {
    pub(crate) old_device_code: String,
    pub(crate) new_device_code: String,
    pub(crate) device_name: Option<String>,
    pub(crate) qq_number: Option<String>,
    pub(crate) email: String,
    pub(crate) masked_email: String,
}

/// 换绑验证码集合。
#[derive(Clone)]
pub(crate) struct RebindCodes {
    store: Arc<dyn CodeStore<RebindKey, RebindPayload>>,
}

impl RebindCodes {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(InMemoryCodeStore::new(ConsumePolicy::Delete, clock)),
        }
    }

    /// 生成并保存换绑验证码，覆盖同一设备码对的旧验证码。
    pub(crate) fn generate(&self, payload: RebindPayload) -> String {
        let code = generate_rebind_code();
        let key = RebindKey::new(&payload.old_device_code, &payload.new_device_code);
        self.store
            .store(key, code.clone(), payload, REBIND_CODE_TTL_MS);
        code
    }

    /// 换绑未能落地时放回已消费的验证码，便于用户原码重试。
    pub(crate) fn restore(&self, code: &str, payload: RebindPayload) {
        let key = RebindKey::new(&payload.old_device_code, &payload.new_device_code);
        self.store
            .store(key, code.to_string(), payload, REBIND_CODE_TTL_MS);
    }

    /// 校验换绑验证码，成功返回生成时的上下文。
    pub(crate) fn verify(
        &self,
        old_device_code: &str,
        new_device_code: &str,
        input: &str,
    ) -> Result<RebindPayload, CodeRejection> {
        self.store.verify_and_consume(
            &RebindKey::new(old_device_code, new_device_code),
            input.trim(),
        )
    }

    pub(crate) fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    pub(crate) fn len(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{REBIND_CODE_TTL_MS, RebindCodes, RebindPayload, generate_rebind_code};
    use crate::codes::store::{CodeRejection, test_clock::ManualClock};

    fn payload(old: &str, new: &str) -> RebindPayload {
        RebindPayload {
            old_device_code: old.to_string(),
            new_device_code: new.to_string(),
            device_name: Some("office pc".to_string()),
            qq_number: Some("10001".to_string()),
            email: "10001@qq.com".to_string(),
            masked_email: "10***1@qq.com".to_string(),
        }
    }

    fn wrong_code(code: &str) -> String {
        if code == "123456" {
            "654321".to_string()
        } else {
            "123456".to_string()
        }
    }

    #[test]
    fn rebind_codes_are_six_digits() {
        for _ in 0..500 {
            let code = generate_rebind_code();
            let value = code.parse::<u32>().expect("numeric code");
            assert_eq!(code.len(), 6);
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn wrong_guess_does_not_lock_out_correct_code() {
        let codes = RebindCodes::new(Arc::new(ManualClock::at(0)));
        let code = codes.generate(payload("A", "B"));

        assert_eq!(
            codes.verify("A", "B", &wrong_code(&code)),
            Err(CodeRejection::Mismatch)
        );
        assert_eq!(codes.verify("A", "B", &code), Ok(payload("A", "B")));
        assert_eq!(codes.verify("A", "B", &code), Err(CodeRejection::NotFound));
    }

    #[test]
    fn code_is_bound_to_device_pair() {
        let codes = RebindCodes::new(Arc::new(ManualClock::at(0)));
        let code = codes.generate(payload("A", "B"));

        assert_eq!(codes.verify("A", "C", &code), Err(CodeRejection::NotFound));
        assert_eq!(codes.verify("B", "A", &code), Err(CodeRejection::NotFound));
        assert!(codes.verify("A", "B", &code).is_ok());
    }

    #[test]
    fn expired_rebind_code_is_removed() {
        let clock = Arc::new(ManualClock::at(0));
        let codes = RebindCodes::new(clock.clone());
        let code = codes.generate(payload("A", "B"));

        clock.set(REBIND_CODE_TTL_MS + 1);
        assert_eq!(codes.verify("A", "B", &code), Err(CodeRejection::Expired));
        assert_eq!(codes.len(), 0);
    }

    #[test]
    fn regenerate_replaces_previous_code() {
        let clock = Arc::new(ManualClock::at(0));
        let codes = RebindCodes::new(clock.clone());
        codes.generate(payload("A", "B"));
        codes.generate(payload("A", "D"));
        clock.advance(1_000);
        let latest = codes.generate(payload("A", "B"));

        assert_eq!(codes.len(), 2);
        assert!(codes.verify("A", "B", &latest).is_ok());

        clock.set(REBIND_CODE_TTL_MS + 1);
        assert_eq!(codes.sweep_expired(), 1);
        assert_eq!(codes.len(), 0);
    }
}
