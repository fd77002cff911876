//! 验证码定时清理任务。

use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info};

use super::{admin::AdminCodes, rebind::RebindCodes};

/// 管理员验证码清理周期。
pub(crate) const ADMIN_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60);
/// 换绑验证码清理周期。
pub(crate) const REBIND_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// 清理任务句柄；析构时终止后台任务。
pub(crate) struct SweeperHandles {
    admin: JoinHandle<()>,
    rebind: JoinHandle<()>,
}

impl Drop for SweeperHandles {
    fn drop(&mut self) {
        self.admin.abort();
        self.rebind.abort();
    }
}

/// 启动两类验证码的定时清理。
pub(crate) fn spawn_sweepers(admin: AdminCodes, rebind: RebindCodes) -> SweeperHandles {
    SweeperHandles {
        admin: spawn_sweep_task("admin", ADMIN_SWEEP_INTERVAL, move || {
            admin.sweep_expired()
        }),
        rebind: spawn_sweep_task("rebind", REBIND_SWEEP_INTERVAL, move || {
            rebind.sweep_expired()
        }),
    }
}

fn spawn_sweep_task<F>(kind: &'static str, period: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // 第一次 tick 立即返回，跳过。
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sweep();
            if removed > 0 {
                info!(kind, removed, "swept expired verification codes");
            } else {
                debug!(kind, "no expired verification codes");
            }
        }
    })
}
