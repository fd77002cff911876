//! 客户端 IP 与 UA 解析（反向代理头优先）。

use std::net::IpAddr;

use axum::http::{HeaderMap, header::USER_AGENT};

/// 按优先级尝试的代理头。
const FORWARD_HEADERS: [&str; 3] = ["x-real-ip", "x-client-ip", "cf-connecting-ip"];

/// 请求来源元数据。
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ClientMeta {
    pub(crate) ip: String,
    pub(crate) user_agent: String,
}

impl ClientMeta {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("unknown")
            .to_string();
        Self {
            ip: client_ip(headers),
            user_agent,
        }
    }

    #[cfg(test)]
    pub(crate) fn local() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            user_agent: "test".to_string(),
        }
    }
}

/// 解析客户端 IP：`x-forwarded-for` 首项 > `x-real-ip` > `x-client-ip` > `cf-connecting-ip`。
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    if let Some(first) = header("x-forwarded-for").and_then(|raw| raw.split(',').next())
        && let Some(ip) = parse_ip(first)
    {
        return ip;
    }

    FORWARD_HEADERS
        .iter()
        .filter_map(|name| header(*name).and_then(parse_ip))
        .next()
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_ip(raw: &str) -> Option<String> {
    raw.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{ClientMeta, client_ip};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_first_entry_wins() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&map), "203.0.113.7");
    }

    #[test]
    fn invalid_values_fall_through_to_next_header() {
        let map = headers(&[
            ("x-forwarded-for", "unknown"),
            ("x-real-ip", "not-an-ip"),
            ("cf-connecting-ip", "2001:db8::1"),
        ]);
        assert_eq!(client_ip(&map), "2001:db8::1");
    }

    #[test]
    fn missing_headers_yield_unknown() {
        let meta = ClientMeta::from_headers(&HeaderMap::new());
        assert_eq!(meta.ip, "unknown");
        assert_eq!(meta.user_agent, "unknown");
    }
}
