//! 一次性验证码存储：按 key 覆盖写入、单次消费、惰性 + 定时过期清理。

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard},
};

use dc_shared_protocol::constant_time_eq;

/// 时间源（毫秒）。
pub(crate) trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// 系统时钟。
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        dc_shared_protocol::now_ms()
    }
}

/// 验证码校验失败原因（机器可读，文案由调用方映射）。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum CodeRejection {
    /// 不存在（或已被清理）。
    NotFound,
    /// 已过期，条目已删除。
    Expired,
    /// 已消费且仍在宽限期内。
    AlreadyUsed,
    /// 输入不匹配，条目保留。
    Mismatch,
}

/// 校验成功后的处理方式。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum ConsumePolicy {
    /// 标记已用，宽限期后删除。
    MarkUsed { grace_ms: u64 },
    /// 立即删除。
    Delete,
}

/// 验证码存储接口，便于替换为外部存储。
pub(crate) trait CodeStore<K, P>: Send + Sync {
    /// 覆盖写入 key 对应的验证码。
    fn store(&self, key: K, code: String, payload: P, ttl_ms: u64);

    /// 校验并消费验证码，成功时返回写入时的 payload。
    fn verify_and_consume(&self, key: &K, candidate: &str) -> Result<P, CodeRejection>;

    /// 清理过期条目，返回清理数量。
    fn sweep_expired(&self) -> usize;

    /// 当前条目数。
    fn len(&self) -> usize;
}

struct CodeEntry<P> {
    code: String,
    expires_at: u64,
    consumed_at: Option<u64>,
    payload: P,
}

impl<P> CodeEntry<P> {
    fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }

    fn grace_elapsed(&self, policy: ConsumePolicy, now: u64) -> bool {
        match (self.consumed_at, policy) {
            (Some(at), ConsumePolicy::MarkUsed { grace_ms }) => now >= at.saturating_add(grace_ms),
            (Some(_), ConsumePolicy::Delete) => true,
            (None, _) => false,
        }
    }
}

/// 进程内验证码存储；所有读改写都在同一把锁内完成。
pub(crate) struct InMemoryCodeStore<K, P> {
    entries: Mutex<HashMap<K, CodeEntry<P>>>,
    policy: ConsumePolicy,
    clock: Arc<dyn Clock>,
}

impl<K, P> InMemoryCodeStore<K, P>
where
    K: Eq + Hash,
{
    pub(crate) fn new(policy: ConsumePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
            clock,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, CodeEntry<P>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, P> CodeStore<K, P> for InMemoryCodeStore<K, P>
where
    K: Eq + Hash + Clone + Send,
    P: Clone + Send,
{
    fn store(&self, key: K, code: String, payload: P, ttl_ms: u64) {
        let now = self.clock.now_ms();
        self.entries().insert(
            key,
            CodeEntry {
                code,
                expires_at: now.saturating_add(ttl_ms),
                consumed_at: None,
                payload,
            },
        );
    }

    fn verify_and_consume(&self, key: &K, candidate: &str) -> Result<P, CodeRejection> {
        let now = self.clock.now_ms();
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return Err(CodeRejection::NotFound);
        };

        if entry.is_expired(now) {
            entries.remove(key);
            return Err(CodeRejection::Expired);
        }
        if entry.consumed_at.is_some() {
            if entry.grace_elapsed(self.policy, now) {
                entries.remove(key);
                return Err(CodeRejection::NotFound);
            }
            return Err(CodeRejection::AlreadyUsed);
        }
        if !constant_time_eq(candidate, &entry.code) {
            return Err(CodeRejection::Mismatch);
        }

        match self.policy {
            ConsumePolicy::MarkUsed { .. } => {
                entry.consumed_at = Some(now);
                Ok(entry.payload.clone())
            }
            ConsumePolicy::Delete => entries
                .remove(key)
                .map(|entry| entry.payload)
                .ok_or(CodeRejection::NotFound),
        }
    }

    fn sweep_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let policy = self.policy;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now) && !entry.grace_elapsed(policy, now));
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CodeRejection, CodeStore, ConsumePolicy, InMemoryCodeStore, test_clock::ManualClock};

    const TTL: u64 = 600_000;

    fn store_with(policy: ConsumePolicy) -> (Arc<ManualClock>, InMemoryCodeStore<String, u32>) {
        let clock = Arc::new(ManualClock::at(0));
        let store = InMemoryCodeStore::new(policy, clock.clone());
        (clock, store)
    }

    #[test]
    fn code_is_valid_until_ttl_boundary() {
        let (clock, store) = store_with(ConsumePolicy::Delete);
        store.store("K".to_string(), "1234".to_string(), 7, TTL);
        clock.set(599_999);
        assert_eq!(store.verify_and_consume(&"K".to_string(), "1234"), Ok(7));

        clock.set(0);
        store.store("K".to_string(), "1234".to_string(), 7, TTL);
        clock.set(600_001);
        assert_eq!(
            store.verify_and_consume(&"K".to_string(), "1234"),
            Err(CodeRejection::Expired)
        );
        assert_eq!(store.len(), 0);
        assert_eq!(
            store.verify_and_consume(&"K".to_string(), "1234"),
            Err(CodeRejection::NotFound)
        );
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let (clock, store) = store_with(ConsumePolicy::Delete);
        store.store("K".to_string(), "1234".to_string(), 1, TTL);
        clock.set(TTL);
        assert_eq!(store.verify_and_consume(&"K".to_string(), "1234"), Ok(1));
    }

    #[test]
    fn mismatch_keeps_entry_for_retry() {
        let (_clock, store) = store_with(ConsumePolicy::Delete);
        store.store("K".to_string(), "123456".to_string(), 1, TTL);
        assert_eq!(
            store.verify_and_consume(&"K".to_string(), "654321"),
            Err(CodeRejection::Mismatch)
        );
        assert_eq!(
            store.verify_and_consume(&"K".to_string(), "12345"),
            Err(CodeRejection::Mismatch)
        );
        assert_eq!(store.verify_and_consume(&"K".to_string(), "123456"), Ok(1));
        assert_eq!(
            store.verify_and_consume(&"K".to_string(), "123456"),
            Err(CodeRejection::NotFound)
        );
    }

    #[test]
    fn store_overwrites_previous_entry_for_key() {
        let (clock, store) = store_with(ConsumePolicy::Delete);
        store.store("K".to_string(), "111111".to_string(), 1, TTL);
        clock.advance(500_000);
        store.store("K".to_string(), "222222".to_string(), 2, TTL);
        assert_eq!(store.len(), 1);

        clock.advance(200_000);
        assert_eq!(
            store.verify_and_consume(&"K".to_string(), "111111"),
            Err(CodeRejection::Mismatch)
        );
        assert_eq!(store.verify_and_consume(&"K".to_string(), "222222"), Ok(2));
    }

    #[test]
    fn mark_used_reports_already_used_within_grace() {
        let (clock, store) = store_with(ConsumePolicy::MarkUsed { grace_ms: 1_000 });
        store.store("1234".to_string(), "1234".to_string(), 0, TTL);
        assert_eq!(store.verify_and_consume(&"1234".to_string(), "1234"), Ok(0));

        clock.advance(999);
        assert_eq!(
            store.verify_and_consume(&"1234".to_string(), "1234"),
            Err(CodeRejection::AlreadyUsed)
        );

        clock.advance(1);
        assert_eq!(
            store.verify_and_consume(&"1234".to_string(), "1234"),
            Err(CodeRejection::NotFound)
        );
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn sweep_removes_expired_and_spent_entries() {
        let (clock, store) = store_with(ConsumePolicy::MarkUsed { grace_ms: 1_000 });
        store.store("a".to_string(), "1111".to_string(), 0, 1_000);
        store.store("b".to_string(), "2222".to_string(), 0, TTL);
        store.store("c".to_string(), "3333".to_string(), 0, TTL);
        assert_eq!(store.verify_and_consume(&"c".to_string(), "3333"), Ok(0));
        assert_eq!(store.sweep_expired(), 0);

        clock.set(1_001);
        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.verify_and_consume(&"b".to_string(), "2222"), Ok(0));
    }

    #[test]
    fn concurrent_verifies_consume_at_most_once() {
        let clock = Arc::new(ManualClock::at(0));
        let store = Arc::new(InMemoryCodeStore::<String, u32>::new(
            ConsumePolicy::Delete,
            clock,
        ));
        store.store("K".to_string(), "123456".to_string(), 9, TTL);

        let handles = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.verify_and_consume(&"K".to_string(), "123456"))
            })
            .collect::<Vec<_>>();
        let successes = handles
            .into_iter()
            .map(|handle| handle.join().expect("join verifier"))
            .filter(Result::is_ok)
            .count();
        assert_eq!(successes, 1);
    }
}
