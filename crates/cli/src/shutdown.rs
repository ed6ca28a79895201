use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wires Ctrl-C to the execution's cancellation token so a run stops at
/// the next document boundary.
pub struct ShutdownCoordinator {
    cancel: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(cancel: CancellationToken) -> Self {
        ShutdownCoordinator { cancel }
    }

    pub fn register_handlers(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, cancelling at the next document boundary");
                cancel.cancel();
            }
        });
    }
}
