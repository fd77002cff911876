//! 一次性验证码：通用存储、管理员登录码、换绑邮箱码与定时清理。

pub(crate) mod admin;
pub(crate) mod rebind;
pub(crate) mod store;
pub(crate) mod sweeper;
