//! HTTP 接口公共部分：错误、响应包裹、请求/持久化类型与客户端 IP 解析。

pub(crate) mod client_ip;
pub(crate) mod error;
pub(crate) mod response;
pub(crate) mod types;
