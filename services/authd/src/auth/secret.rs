//! 签名密钥解析：显式参数 → 持久化设置 → 环境变量 → 进程默认值。

/// 进程默认密钥（生产环境必须覆盖）。
pub(crate) const DEFAULT_SECRET_KEY: &str = "your-super-secret-key-change-this-in-production";

/// 密钥来源。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum KeySource {
    Explicit,
    Settings,
    Environment,
    Default,
}

impl KeySource {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Settings => "settings",
            Self::Environment => "environment",
            Self::Default => "default",
        }
    }
}

/// 解析结果。
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ResolvedKey {
    pub(crate) key: String,
    pub(crate) source: KeySource,
}

/// 候选密钥，按调用方给出的顺序尝试。
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyCandidate<'a> {
    pub(crate) source: KeySource,
    pub(crate) value: Option<&'a str>,
}

impl<'a> KeyCandidate<'a> {
    pub(crate) fn new(source: KeySource, value: Option<&'a str>) -> Self {
        Self { source, value }
    }
}

/// 标准密钥链。
pub(crate) fn key_chain<'a>(
    explicit: Option<&'a str>,
    settings: Option<&'a str>,
    environment: Option<&'a str>,
) -> [KeyCandidate<'a>; 3] {
    [
        KeyCandidate::new(KeySource::Explicit, explicit),
        KeyCandidate::new(KeySource::Settings, settings),
        KeyCandidate::new(KeySource::Environment, environment),
    ]
}

/// 返回第一个非空候选；全部为空时回退默认密钥。
pub(crate) fn resolve_secret_key(candidates: &[KeyCandidate<'_>]) -> ResolvedKey {
    candidates
        .iter()
        .find_map(|candidate| {
            let value = candidate.value?.trim();
            (!value.is_empty()).then(|| ResolvedKey {
                key: value.to_string(),
                source: candidate.source,
            })
        })
        .unwrap_or_else(|| ResolvedKey {
            key: DEFAULT_SECRET_KEY.to_string(),
            source: KeySource::Default,
        })
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_SECRET_KEY, KeySource, key_chain, resolve_secret_key};

    #[test]
    fn explicit_key_wins() {
        let resolved = resolve_secret_key(&key_chain(Some("k1"), Some("k2"), Some("k3")));
        assert_eq!(resolved.key, "k1");
        assert_eq!(resolved.source, KeySource::Explicit);
    }

    #[test]
    fn blank_candidates_are_skipped_in_order() {
        let resolved = resolve_secret_key(&key_chain(Some("  "), None, Some(" env-key ")));
        assert_eq!(resolved.key, "env-key");
        assert_eq!(resolved.source, KeySource::Environment);

        let resolved = resolve_secret_key(&key_chain(None, Some("db-key"), Some("env-key")));
        assert_eq!(resolved.source, KeySource::Settings);
    }

    #[test]
    fn empty_chain_falls_back_to_default() {
        let resolved = resolve_secret_key(&key_chain(None, Some(""), None));
        assert_eq!(resolved.key, DEFAULT_SECRET_KEY);
        assert_eq!(resolved.source, KeySource::Default);
        assert_eq!(resolved.source.as_str(), "default");
    }
}
