//! 设备注册表：授权记录、系统设置与日志的持久化读写。

pub(crate) mod ops;
pub(crate) mod store;
