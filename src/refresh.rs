use std::time::Duration;

use sqlx::postgres::{PgListener, PgPool};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Changed {
    Tick,
    /// A notification arrived on the listen channel. Carries no diff.
    Notified,
}

/// A cancellable stream of [`Changed`] signals. Dropping it stops the
/// producers.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Changed>,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    /// Next signal, or `None` once every producer has stopped.
    pub async fn next(&mut self) -> Option<Changed> {
        self.rx.recv().await
    }

    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

const SIGNAL_BUFFER: usize = 16;

fn spawn_ticker(tx: mpsc::Sender<Changed>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            interval.tick().await;
            // A full buffer already guarantees a pending refresh.
            if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(Changed::Tick) {
                break;
            }
        }
    })
}

fn spawn_listener(tx: mpsc::Sender<Changed>, pool: PgPool, channel: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut listener = match PgListener::connect_with(&pool).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, "could not open change listener; polling only");
                return;
            }
        };
        if let Err(err) = listener.listen(&channel).await {
            warn!(error = %err, channel = %channel, "LISTEN failed; polling only");
            return;
        }
        info!(channel = %channel, "listening for table changes");

        loop {
            match listener.recv().await {
                Ok(notification) => {
                    debug!(channel = notification.channel(), "change notification");
                    if let Err(mpsc::error::TrySendError::Closed(_)) =
                        tx.try_send(Changed::Notified)
                    {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "change listener dropped; polling only");
                    break;
                }
            }
        }
    })
}

/// Poll every `period`, and also forward notifications from `channel`
/// when a pool and channel are given.
pub fn subscribe(period: Duration, listen: Option<(PgPool, String)>) -> Subscription {
    let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
    let mut tasks = vec![spawn_ticker(tx.clone(), period)];
    if let Some((pool, channel)) = listen {
        tasks.push(spawn_listener(tx, pool, channel));
    }
    Subscription { rx, tasks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let mut subscription = subscribe(Duration::from_secs(5), None);
        assert_eq!(subscription.next().await, Some(Changed::Tick));
        assert_eq!(subscription.next().await, Some(Changed::Tick));

        subscription.cancel();
        let mut drained = 0;
        while subscription.next().await.is_some() {
            drained += 1;
            assert!(drained <= SIGNAL_BUFFER);
        }
    }
}
