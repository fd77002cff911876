//! 设备校验 HTTP 路由处理函数。

use axum::{Json, extract::State, http::HeaderMap};
use dc_shared_protocol::DeviceVerifyRequest;

use crate::{
    api::{
        client_ip::ClientMeta,
        response::{ApiReply, reply},
        types::DeviceVerifyData,
    },
    state::AppState,
};

/// 设备定期校验接口：设备码 + 当前时间窗签名。
pub(crate) async fn device_verify_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeviceVerifyRequest>,
) -> ApiReply<DeviceVerifyData> {
    let meta = ClientMeta::from_headers(&headers);
    reply(
        state.verify_device(&req, &meta).await,
        "授权验证成功",
        "设备可以继续使用",
    )
}
