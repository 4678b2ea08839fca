// Server loop module
// Accepts connections until the shutdown future resolves, then drains

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::handler::AppState;
use crate::logger;

/// Run the accept loop on `listener` until `shutdown` completes
///
/// In-flight connections get `performance.shutdown_grace` seconds to finish
/// after the listener is closed.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let graceful = GracefulShutdown::new();
    let active = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active, &graceful);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }
            () = &mut shutdown => break,
        }
    }

    drop(listener);
    logger::log_shutdown_started(active.load(Ordering::SeqCst) as u64);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    tokio::select! {
        () = graceful.shutdown() => logger::log_shutdown_complete(),
        () = tokio::time::sleep(grace) => {
            logger::log_warning(&format!(
                "Shutdown grace period of {}s elapsed with {} connection(s) still open",
                grace.as_secs(),
                active.load(Ordering::SeqCst)
            ));
        }
    }
    Ok(())
}
