//! 管理员 HTTP 路由处理函数。

use axum::{Json, extract::State, http::HeaderMap};

use crate::{
    api::{
        client_ip::ClientMeta,
        response::{ApiReply, reply},
        types::{AdminCodeData, AdminLoginData, AdminLoginRequest},
    },
    state::AppState,
};

/// 签发管理员验证码接口。
pub(crate) async fn admin_code_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiReply<AdminCodeData> {
    let meta = ClientMeta::from_headers(&headers);
    reply(
        Ok(state.issue_admin_code(&meta)),
        "验证码已生成",
        "请在10分钟内使用",
    )
}

/// 管理员验证码登录接口。
pub(crate) async fn admin_login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdminLoginRequest>,
) -> ApiReply<AdminLoginData> {
    let meta = ClientMeta::from_headers(&headers);
    reply(state.admin_login(&req, &meta), "登录成功", "")
}
