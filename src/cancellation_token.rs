use std::sync::{atomic, Arc};

use tracing::info;

/// A cooperative stop signal shared between the main task and the board
/// loop. Cancellation is only observed between cycles, so a signalled stop
/// lets the current cycle finish and publish before the process exits.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    is_cancelled: Arc<atomic::AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(atomic::Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.is_cancelled.store(true, atomic::Ordering::SeqCst);
    }

    /// Spawns a task that cancels this token when Ctrl-C is received.
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.clone();

        tokio::task::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, will stop after the current cycle.");
                token.cancel();
            }
        });
    }
}
