//! Multicast transport: socket setup, receive loops, outbound sender.
//!
//! One socket per IP family, each with a dedicated receive task that only
//! blocks on socket I/O and forwards raw datagrams to the engine driver.
//! Outbound packets go through an unbounded queue drained by a sender
//! task, so callers of `send` never block on the network.

use bytes::Bytes;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{Sender, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use zeroscout_core::{DiscoveryError, IpVersion, Result};

/// mDNS UDP port (RFC 6762).
pub const MDNS_PORT: u16 = 5353;

/// IPv4 mDNS multicast group.
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// IPv6 mDNS multicast group.
pub const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// Receive buffer; a legitimate mDNS packet fits comfortably.
const RECV_BUFFER_LEN: usize = 4096;

/// A bound multicast socket plus the group address it sends to.
struct GroupSocket {
    socket: Arc<UdpSocket>,
    group: SocketAddr,
}

/// Owns the mDNS sockets for the configured IP families.
pub struct MulticastTransport {
    sockets: Vec<GroupSocket>,
}

impl MulticastTransport {
    /// Binds per the configured IP version. `All` binds each family
    /// best-effort (an IPv6-less host still works); `V4Only`/`V6Only` are
    /// strict. No socket at all is a fatal bind error.
    pub fn bind(ip_version: IpVersion, recv_buffer_size: usize) -> Result<Self> {
        let mut sockets = Vec::new();
        let mut last_err: Option<io::Error> = None;

        if matches!(ip_version, IpVersion::V4Only | IpVersion::All) {
            match bind_v4(recv_buffer_size) {
                Ok(socket) => sockets.push(GroupSocket {
                    socket: Arc::new(socket),
                    group: SocketAddr::new(IpAddr::V4(MDNS_GROUP_V4), MDNS_PORT),
                }),
                Err(e) => {
                    if ip_version == IpVersion::V4Only {
                        return Err(DiscoveryError::Bind(e));
                    }
                    warn!(error = %e, "could not bind IPv4 mDNS socket");
                    last_err = Some(e);
                }
            }
        }

        if matches!(ip_version, IpVersion::V6Only | IpVersion::All) {
            match bind_v6(recv_buffer_size) {
                Ok(socket) => sockets.push(GroupSocket {
                    socket: Arc::new(socket),
                    group: SocketAddr::new(IpAddr::V6(MDNS_GROUP_V6), MDNS_PORT),
                }),
                Err(e) => {
                    if ip_version == IpVersion::V6Only {
                        return Err(DiscoveryError::Bind(e));
                    }
                    warn!(error = %e, "could not bind IPv6 mDNS socket");
                    last_err = Some(e);
                }
            }
        }

        if sockets.is_empty() {
            return Err(DiscoveryError::Bind(last_err.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no multicast interface")
            })));
        }

        Ok(Self { sockets })
    }

    /// Spawns one receive loop per socket, forwarding datagrams into `tx`.
    /// Each loop ends when the channel closes.
    pub fn spawn_receivers(&self, tx: Sender<Bytes>) -> Vec<JoinHandle<()>> {
        self.sockets
            .iter()
            .map(|gs| {
                let socket = Arc::clone(&gs.socket);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut buffer = vec![0u8; RECV_BUFFER_LEN];
                    loop {
                        match socket.recv_from(&mut buffer).await {
                            Ok((len, source)) => {
                                if len >= buffer.len() {
                                    warn!(%source, "dropping oversized packet");
                                    continue;
                                }
                                trace!(%source, len, "received packet");
                                if tx.send(Bytes::copy_from_slice(&buffer[..len])).await.is_err() {
                                    debug!("packet channel closed, receive loop ending");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "error receiving mDNS packet");
                            }
                        }
                    }
                })
            })
            .collect()
    }

    /// Spawns the sender task draining `rx` to every bound group.
    pub fn spawn_sender(&self, mut rx: UnboundedReceiver<Vec<u8>>) -> JoinHandle<()> {
        let sockets: Vec<(Arc<UdpSocket>, SocketAddr)> = self
            .sockets
            .iter()
            .map(|gs| (Arc::clone(&gs.socket), gs.group))
            .collect();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                for (socket, group) in &sockets {
                    if let Err(e) = socket.send_to(&payload, group).await {
                        warn!(error = %e, %group, "failed to send query");
                    }
                }
            }
            debug!("query channel closed, sender task ending");
        })
    }
}

fn bind_v4(recv_buffer_size: usize) -> io::Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;
    configure(&socket, recv_buffer_size)?;
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), MDNS_PORT);
    socket.bind(&addr.into())?;

    let socket: std::net::UdpSocket = socket.into();
    socket.join_multicast_v4(&MDNS_GROUP_V4, &Ipv4Addr::UNSPECIFIED)?;
    UdpSocket::from_std(socket)
}

fn bind_v6(recv_buffer_size: usize) -> io::Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV6,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;
    socket.set_only_v6(true)?;
    configure(&socket, recv_buffer_size)?;
    let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), MDNS_PORT);
    socket.bind(&addr.into())?;

    let socket: std::net::UdpSocket = socket.into();
    socket.join_multicast_v6(&MDNS_GROUP_V6, 0)?;
    UdpSocket::from_std(socket)
}

fn configure(socket: &socket2::Socket, recv_buffer_size: usize) -> io::Result<()> {
    socket.set_reuse_address(true)?;
    #[cfg(not(windows))]
    let _ = socket.set_reuse_port(true);
    // Buffer size is best-effort, like the rest of the socket tuning.
    let _ = socket.set_recv_buffer_size(recv_buffer_size);
    socket.set_nonblocking(true)?;
    Ok(())
}
