//! The client facade: owns the transport, the engine and the background
//! tasks, with an explicit open/close lifecycle.

use crate::browser::{BrowserHandle, ServiceListener};
use crate::engine::Engine;
use crate::transport::MulticastTransport;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeroscout_core::{DiscoveryConfig, DiscoveryError, Result};

/// Datagrams buffered between the receive tasks and the engine driver.
const PACKET_CHANNEL_CAPACITY: usize = 1024;

/// Handle to an open discovery client.
///
/// There is no ambient singleton: the whole client lives behind this value
/// with a documented `open`/`close` lifecycle. `close` is idempotent and
/// also runs from `Drop` as a last resort, so every exit path of a caller
/// releases the socket.
pub struct Zeroconf {
    engine: Arc<Engine>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Zeroconf {
    /// Binds the multicast transport and starts the receive and driver
    /// tasks. Failure to bind any socket is fatal.
    pub async fn open(config: DiscoveryConfig) -> Result<Self> {
        config.validate().map_err(DiscoveryError::InvalidConfig)?;

        let transport = MulticastTransport::bind(config.ip_version, config.recv_buffer_size)?;

        let (query_tx, query_rx) = mpsc::unbounded_channel();
        let (packet_tx, mut packet_rx) = mpsc::channel::<Bytes>(PACKET_CHANNEL_CAPACITY);

        let ip_version = config.ip_version;
        let sweep_interval = config.sweep_interval();
        let engine = Engine::new(config, query_tx);

        let mut tasks = transport.spawn_receivers(packet_tx);
        tasks.push(transport.spawn_sender(query_rx));

        // Driver task: serializes decode, cache mutation and browser
        // dispatch, and owns the periodic sweep/re-query tick.
        let driver = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweep_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    maybe_packet = packet_rx.recv() => match maybe_packet {
                        Some(datagram) => driver.handle_datagram(&datagram, Instant::now()),
                        None => {
                            debug!("packet channel closed, driver ending");
                            break;
                        }
                    },
                    _ = tick.tick() => driver.tick(Instant::now()),
                }
            }
        }));

        info!(?ip_version, "discovery client opened");
        Ok(Self {
            engine,
            tasks: Mutex::new(tasks),
            closed: AtomicBool::new(false),
        })
    }

    /// Starts browsing `service_type`, delivering events to `listener`.
    /// The browser is running on return; an initial query has been queued.
    pub fn browse(
        &self,
        service_type: &str,
        listener: Arc<dyn ServiceListener>,
    ) -> Result<BrowserHandle> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Closed);
        }
        self.engine.browse(service_type, listener)
    }

    /// One-shot enumeration of every advertised service type. Returns the
    /// deduplicated names observed within `timeout` — an empty set when
    /// the network stays silent, never a hang.
    pub async fn enumerate_types(&self, timeout: Duration) -> Result<HashSet<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Closed);
        }
        Ok(self.engine.collect_types(timeout).await)
    }

    /// Default-deadline variant of [`enumerate_types`](Self::enumerate_types).
    pub async fn enumerate_types_default(&self) -> Result<HashSet<String>> {
        let timeout = self.engine.config().query_timeout();
        self.enumerate_types(timeout).await
    }

    /// Stops all browsers, the receive loop and the sender, and releases
    /// the sockets. Safe to call more than once; later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.stop_all_browsers();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("discovery client closed");
    }
}

impl Drop for Zeroconf {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            warn!("discovery client dropped without close");
            self.close();
        }
    }
}
