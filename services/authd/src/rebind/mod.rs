//! 设备码换绑：邮箱验证码签发与确认。

mod checks;
mod confirm;
mod http;
mod send_code;

pub(crate) use http::{rebind_confirm_handler, rebind_send_code_handler};
