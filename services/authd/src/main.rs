//! 设备码授权服务二进制入口：分发 CLI 或启动 HTTP 服务。

mod admin;
mod api;
mod app;
mod auth;
mod cli;
mod codes;
mod config;
mod device;
mod logging;
mod mail;
mod rebind;
mod registry;
mod state;

#[tokio::main]
/// 启动授权服务。
async fn main() -> anyhow::Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<String>>();
    match cli::dispatch(&args)? {
        cli::CliDispatch::Run => {}
        cli::CliDispatch::Exit => return Ok(()),
    }

    let _log_runtime = logging::init("authd")?;
    app::run(config::Config::from_env()).await
}
