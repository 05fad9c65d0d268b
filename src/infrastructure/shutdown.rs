use tokio::sync::watch;

/// Process-wide stop flag. Any clone may trigger it; every listener observes it once.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    /// Stores the flag even while no listener is subscribed, so a signal that
    /// arrives during startup is still seen by the server once it subscribes.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl ShutdownListener {
    /// Resolves immediately when shutdown was already triggered.
    pub async fn notified(mut self) {
        if *self.receiver.borrow() {
            return;
        }
        let _ = self.receiver.changed().await;
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "app", signal = "SIGINT", "shutdown requested");
            ctrlc.trigger();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown;
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                tracing::info!(target: "app", signal = "SIGTERM", "shutdown requested");
                term.trigger();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn listeners_wake_on_trigger() {
        let (shutdown, listener) = Shutdown::new();
        let late = shutdown.subscribe();
        let waiter = tokio::spawn(listener.notified());

        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), late.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn trigger_without_live_listeners_is_not_lost() {
        let (shutdown, initial) = Shutdown::new();
        drop(initial);
        assert!(!shutdown.is_triggered());

        shutdown.trigger();

        assert!(shutdown.is_triggered());
        tokio::time::timeout(Duration::from_millis(300), shutdown.subscribe().notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn listener_created_after_trigger_returns_at_once() {
        let (shutdown, _) = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), shutdown.subscribe().notified())
            .await
            .unwrap();
    }
}
