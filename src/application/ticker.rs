use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running tick task. Dropping it without calling
/// [`TickerHandle::shutdown`] aborts the task.
pub struct TickerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<u64>>,
}

impl TickerHandle {
    /// Stops the ticker and returns how many ticks ran.
    pub async fn shutdown(mut self) -> u64 {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => 0,
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Calls `on_tick` every `period`, starting immediately. The callback gets the
/// 1-based tick number and must not block; late ticks are skipped rather than
/// bunched up.
pub fn spawn_ticker<F>(period: Duration, mut on_tick: F) -> TickerHandle
where
    F: FnMut(u64) + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0u64;
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = interval.tick() => {
                    ticks += 1;
                    on_tick(ticks);
                }
            }
        }
        tracing::debug!(ticks, "ticker stopped");
        ticks
    });

    TickerHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}
