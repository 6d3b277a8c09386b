//! Serving runtime: owns the loopback HTTP listener and its lifecycle.
//!
//! State machine: `Stopped -> Starting -> Running -> Stopping -> Stopped`.
//! Transitions are serialized by a single async mutex, so concurrent
//! `start`/`stop` calls queue behind each other instead of racing.
//!
//! The listener runs on a dedicated tokio task spawned by [`ServingRuntime::start`].
//! [`ServingRuntime::stop`] signals graceful shutdown and joins that task; if
//! in-flight connections do not drain within [`SHUTDOWN_GRACE`] the task is
//! aborted. Dropping a running runtime aborts the task.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::ServeError;
use crate::routes::{self, Site};

// ---

/// Upper bound on how long `stop` waits for connections to drain.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running { port: u16 },
    Stopping,
}

/// Result of a `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A listener was bound on this port.
    Started(u16),
    /// A listener was already bound; nothing changed.
    AlreadyRunning(u16),
}

impl StartOutcome {
    pub fn port(self) -> u16 {
        // ---
        match self {
            StartOutcome::Started(port) | StartOutcome::AlreadyRunning(port) => port,
        }
    }
}

/// The bound listener's task and its shutdown trigger.
struct Running {
    // ---
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

pub struct ServingRuntime {
    // ---
    host: IpAddr,
    port_start: u16,
    port_end: u16,
    site: Site,
    lifecycle: Mutex<Option<Running>>,
    state: watch::Sender<ServerState>,
}

impl ServingRuntime {
    /// Create a stopped runtime that will probe `port_start..=port_end` on `host`.
    ///
    /// A range of `0..=0` lets the OS pick a free port.
    pub fn new(host: IpAddr, port_start: u16, port_end: u16, site: Site) -> Self {
        // ---
        let (state, _) = watch::channel(ServerState::Stopped);
        Self {
            host,
            port_start,
            port_end,
            site,
            lifecycle: Mutex::new(None),
            state,
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Receive every lifecycle transition.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.lock().await.as_ref().map(|r| r.addr)
    }

    /// URL of the artifact while running.
    pub async fn artifact_url(&self) -> Option<String> {
        // ---
        self.local_addr()
            .await
            .map(|addr| format!("http://{}/{}", addr, self.site.artifact_file()))
    }

    /// Bind the first free port in range and start serving.
    ///
    /// Returns once the listener is bound, so an immediate fetch succeeds.
    /// Calling `start` while running is a no-op reporting the current port.
    pub async fn start(&self) -> Result<StartOutcome, ServeError> {
        // ---
        let mut slot = self.lifecycle.lock().await;

        if let Some(running) = slot.as_ref() {
            tracing::info!("Server already running on {}", running.addr);
            return Ok(StartOutcome::AlreadyRunning(running.addr.port()));
        }

        self.state.send_replace(ServerState::Starting);

        let bound = bind_first_free(self.host, self.port_start, self.port_end)
            .await
            .and_then(|listener| Ok((listener.local_addr()?, listener)));
        let (addr, listener) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                self.state.send_replace(ServerState::Stopped);
                return Err(e);
            }
        };

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = routes::router(self.site.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(
            "Serving {} at http://{}/",
            self.site.root().display(),
            addr
        );
        *slot = Some(Running {
            addr,
            shutdown,
            task,
        });
        self.state
            .send_replace(ServerState::Running { port: addr.port() });
        Ok(StartOutcome::Started(addr.port()))
    }

    /// Stop serving and release the port.
    ///
    /// Returns the released port, or `None` when the runtime was already
    /// stopped (a no-op). Cancelling the returned future aborts the server
    /// task and still leaves the runtime `Stopped`.
    pub async fn stop(&self) -> Option<u16> {
        // ---
        let mut slot = self.lifecycle.lock().await;

        let Some(running) = slot.take() else {
            tracing::debug!("Stop requested while stopped; nothing to do");
            return None;
        };

        self.state.send_replace(ServerState::Stopping);
        tracing::info!("Stopping server on {}", running.addr);

        let _ = running.shutdown.send(());
        let mut stopping = Stopping {
            state: &self.state,
            task: running.task,
        };
        let joined = match tokio::time::timeout(SHUTDOWN_GRACE, &mut stopping.task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(
                    "Connections did not drain within {:?}; aborting server task",
                    SHUTDOWN_GRACE
                );
                stopping.task.abort();
                (&mut stopping.task).await
            }
        };

        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Server exited with error: {}", e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!("Server task failed: {}", e),
        }

        drop(stopping);
        tracing::info!("Server stopped, port {} released", running.addr.port());
        Some(running.addr.port())
    }
}

/// An in-progress `stop`. Dropping it, whether `stop` finished or its future
/// was cancelled, aborts the server task and publishes `Stopped`.
struct Stopping<'a> {
    // ---
    state: &'a watch::Sender<ServerState>,
    task: JoinHandle<io::Result<()>>,
}

impl Drop for Stopping<'_> {
    fn drop(&mut self) {
        self.task.abort();
        self.state.send_replace(ServerState::Stopped);
    }
}

impl Drop for ServingRuntime {
    fn drop(&mut self) {
        // ---
        if let Some(running) = self.lifecycle.get_mut().take() {
            let _ = running.shutdown.send(());
            running.task.abort();
        }
    }
}

/// Probe `start..=end` in order and keep the first listener that binds.
async fn bind_first_free(host: IpAddr, start: u16, end: u16) -> Result<TcpListener, ServeError> {
    // ---
    if start > end {
        return Err(ServeError::InvalidPortRange { start, end });
    }

    for port in start..=end {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!("Port {} in use, trying next", port);
            }
            Err(e) => {
                tracing::warn!("Cannot bind {}:{}: {}", host, port, e);
            }
        }
    }

    Err(ServeError::NoAvailablePort { start, end })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn localhost() -> IpAddr {
        IpAddr::from([127, 0, 0, 1])
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        // ---
        let err = bind_first_free(localhost(), 9001, 9000).await.unwrap_err();
        assert!(matches!(err, ServeError::InvalidPortRange { start: 9001, end: 9000 }));
    }

    #[tokio::test]
    async fn skips_taken_port() {
        // ---
        let taken = std::net::TcpListener::bind((localhost(), 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_first_free(localhost(), port, port).await.unwrap_err();
        assert!(matches!(err, ServeError::NoAvailablePort { .. }));
    }

    #[tokio::test]
    async fn failed_start_returns_to_stopped() {
        // ---
        let taken = std::net::TcpListener::bind((localhost(), 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();

        let site = Site::new(dir.path(), "map.html");
        let runtime = ServingRuntime::new(localhost(), port, port, site);
        assert!(runtime.start().await.is_err());
        assert_eq!(runtime.state(), ServerState::Stopped);
        assert_eq!(runtime.stop().await, None);
    }

    #[tokio::test]
    async fn cancelled_stop_still_settles() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let runtime = ServingRuntime::new(localhost(), 0, 0, Site::new(dir.path(), "map.html"));
        runtime.start().await.unwrap();

        // Polled once, then dropped while joining the server task.
        let cancelled = tokio::time::timeout(Duration::ZERO, runtime.stop()).await;
        assert!(cancelled.is_err());
        assert_eq!(runtime.state(), ServerState::Stopped);
        assert_eq!(runtime.stop().await, None);

        let restarted = runtime.start().await.unwrap();
        assert_eq!(runtime.state(), ServerState::Running { port: restarted.port() });
        runtime.stop().await;
    }
}
