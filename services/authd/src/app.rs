//! 授权服务装配：路由、CORS、验证码清理任务与监听。

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::{
    admin::{admin_code_handler, admin_login_handler},
    codes::sweeper::spawn_sweepers,
    config::Config,
    device::device_verify_handler,
    rebind::{rebind_confirm_handler, rebind_send_code_handler},
    state::AppState,
};

/// 服务入口：启动 HTTP 路由与后台清理。
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let _sweepers = spawn_sweepers(state.admin_codes.clone(), state.rebind_codes.clone());

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(
        registry = %config.registry_path.display(),
        "dc-authd listening on {}", config.addr
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// 构造路由表。
pub(crate) fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/device/verify", post(device_verify_handler))
        .route("/v1/admin/code", post(admin_code_handler))
        .route("/v1/admin/login", post(admin_login_handler))
        .route("/v1/rebind/send-code", post(rebind_send_code_handler))
        .route("/v1/rebind/confirm", post(rebind_confirm_handler))
        .layer(cors)
        .with_state(state)
}

/// 健康检查接口。
async fn healthz() -> &'static str {
    "ok"
}
