//! 管理员验证码登录。

mod http;
mod login;

pub(crate) use http::{admin_code_handler, admin_login_handler};
