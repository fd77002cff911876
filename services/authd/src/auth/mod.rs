//! 鉴权模块：签名密钥解析。

pub(crate) mod secret;
