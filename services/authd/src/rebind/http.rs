//! 换绑 HTTP 路由处理函数。

use axum::{Json, extract::State, http::HeaderMap};

use crate::{
    api::{
        client_ip::ClientMeta,
        response::{ApiReply, reply},
        types::{
            RebindConfirmData, RebindConfirmRequest, RebindSendCodeData, RebindSendCodeRequest,
        },
    },
    state::AppState,
};

/// 发送换绑验证码接口。
pub(crate) async fn rebind_send_code_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RebindSendCodeRequest>,
) -> ApiReply<RebindSendCodeData> {
    let meta = ClientMeta::from_headers(&headers);
    let result = state.send_rebind_code(&req, &meta).await;
    let message = match &result {
        Ok(data) => format!("验证码已发送到 {}", data.masked_email),
        Err(_) => String::new(),
    };
    reply(result, &message, "请在10分钟内输入邮箱验证码")
}

/// 确认换绑接口。
pub(crate) async fn rebind_confirm_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RebindConfirmRequest>,
) -> ApiReply<RebindConfirmData> {
    let meta = ClientMeta::from_headers(&headers);
    reply(
        state.confirm_rebind(&req, &meta).await,
        "设备码换绑成功",
        "请在新设备上使用新设备码",
    )
}
