//! 设备授权校验接口。

mod http;
pub(crate) mod verify;

pub(crate) use http::device_verify_handler;
