//! 管理员登录验证码：4 位数字，以验证码本身为 key，成功后短暂保留为“已使用”。

use std::sync::Arc;

use rand::{Rng, rngs::OsRng};

use super::store::{Clock, CodeRejection, CodeStore, ConsumePolicy, InMemoryCodeStore};

/// 管理员验证码有效期（毫秒）。
pub(crate) const ADMIN_CODE_TTL_MS: u64 = 10 * 60 * 1000;
/// 消费后保留为“已使用”的宽限期（毫秒）。
pub(crate) const ADMIN_CODE_GRACE_MS: u64 = 1_000;

/// 生成 4 位管理员验证码（系统 CSPRNG）。
pub(crate) fn generate_admin_code() -> String {
    OsRng.gen_range(1000..=9999).to_string()
}

/// 管理员验证码集合。
#[derive(Clone)]
pub(crate) struct AdminCodes {
    store: Arc<dyn CodeStore<String, ()>>,
}

impl AdminCodes {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Arc::new(InMemoryCodeStore::new(
            ConsumePolicy::MarkUsed {
                grace_ms: ADMIN_CODE_GRACE_MS,
            },
            clock,
        )))
    }

    pub(crate) fn with_store(store: Arc<dyn CodeStore<String, ()>>) -> Self {
        Self { store }
    }

    /// 生成并保存新验证码；先顺带清理过期条目。
    pub(crate) fn generate(&self) -> String {
        self.store.sweep_expired();
        let code = generate_admin_code();
        self.store
            .store(code.clone(), code.clone(), (), ADMIN_CODE_TTL_MS);
        code
    }

    /// 校验并消费管理员验证码。
    pub(crate) fn verify(&self, input: &str) -> Result<(), CodeRejection> {
        let input = input.trim();
        self.store.verify_and_consume(&input.to_string(), input)
    }

    pub(crate) fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    pub(crate) fn len(&self) -> usize {
        self.store.len()
    }
}
