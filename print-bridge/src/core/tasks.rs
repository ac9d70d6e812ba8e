//! 后台任务管理
//!
//! | 类型 | 任务 |
//! |------|------|
//! | [`TaskKind::Worker`] | 打印编排器 |
//! | [`TaskKind::Listener`] | 秤读数转发 |
//! | [`TaskKind::Periodic`] | 秤监控、秤配置刷新、日志清理 |

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Worker,
    Listener,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Worker => "worker",
            TaskKind::Listener => "listener",
            TaskKind::Periodic => "periodic",
        })
    }
}

struct Supervised {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// 后台任务管理器
///
/// 所有任务共享一个取消令牌，收到取消后应在一个周期内退出。
/// panic 会被捕获并记录，不会影响其他任务。
pub struct BackgroundTasks {
    tasks: Vec<Supervised>,
    token: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// 使用外部令牌 (例如父令牌的子令牌)
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            tasks: Vec::new(),
            token,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 启动并登记一个任务
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if token.is_cancelled() => debug!(task = name, %kind, "Task stopped"),
                Ok(()) => warn!(task = name, %kind, "Task exited before shutdown"),
                Err(panic) => error!(
                    task = name,
                    %kind,
                    panic = %panic_message(panic.as_ref()),
                    "Task panicked"
                ),
            }
        });
        debug!(task = name, %kind, "Task spawned");
        self.tasks.push(Supervised { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn count(&self, kind: TaskKind) -> usize {
        self.tasks.iter().filter(|t| t.kind == kind).count()
    }

    pub fn log_summary(&self) {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name).collect();
        info!(
            total = self.tasks.len(),
            workers = self.count(TaskKind::Worker),
            listeners = self.count(TaskKind::Listener),
            periodic = self.count(TaskKind::Periodic),
            tasks = ?names,
            "Background tasks running"
        );
    }

    /// 已提前结束的任务 (正常运行期间应为空)
    pub fn finished(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|t| t.handle.is_finished())
            .map(|t| t.name)
            .collect()
    }

    /// 取消所有任务并等待；超过 `grace` 的任务被 abort
    pub async fn shutdown(self, grace: Duration) {
        info!(count = self.tasks.len(), "Stopping background tasks");
        self.token.cancel();

        let deadline = tokio::time::Instant::now() + grace;
        for task in self.tasks {
            let abort = task.handle.abort_handle();
            match tokio::time::timeout_at(deadline, task.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = task.name, error = %e, "Task join failed"),
                Err(_) => {
                    warn!(task = task.name, "Task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }
        info!("Background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_shutdown_cancels_tasks() {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();

        tasks.spawn("scale_monitor", TaskKind::Periodic, async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(tasks.count(TaskKind::Periodic), 1);
        assert!(tasks.finished().is_empty());

        tasks.shutdown(Duration::from_secs(1)).await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("boom", TaskKind::Worker, async {
            panic!("boom");
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tasks.finished(), vec!["boom"]);
        tasks.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("stuck", TaskKind::Listener, std::future::pending());
        tasks.shutdown(Duration::from_millis(50)).await;
    }
}
