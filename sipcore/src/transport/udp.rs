//! UDP transport: the only transport kind actually wired to a socket. TCP/
//! TLS/WS are out of scope (spec non-goal) but the [`super::Transport`]
//! trait stays generic enough to host them later.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::message::{Source, TransportKind};
use crate::parser::parse_message;

use super::Transport;

struct Inner {
    sock: UdpSocket,
    local_addr: SocketAddr,
}

/// A UDP-bound [`Transport`]. Inbound datagrams are parsed and pushed onto
/// an `mpsc` channel the endpoint's receive loop drains — mirroring the
/// teacher's `recv_from` task plus transport-message channel.
#[derive(Clone)]
pub struct UdpTransport(Arc<Inner>);

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let sock = UdpSocket::bind(addr).await?;
        let local_addr = sock.local_addr()?;
        Ok(UdpTransport(Arc::new(Inner { sock, local_addr })))
    }

    /// Spawns the receive loop, sending each successfully parsed message
    /// (tagged with its [`Source`]) to `tx`. Unparsable datagrams are
    /// logged and dropped per spec §7 ("parse errors never crash the
    /// stack").
    pub fn spawn_recv_loop(&self, tx: mpsc::Sender<(crate::message::SipMsg, Source)>) {
        let transport = self.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 65536];
            loop {
                let (len, remote) = match transport.0.sock.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(e) => {
                        log::warn!("udp recv_from error: {e}");
                        continue;
                    }
                };
                let source = Source { local: transport.0.local_addr, remote, transport: TransportKind::Udp };
                match parse_message(&buf[..len]) {
                    Ok(mut msg) => {
                        *msg_source_slot(&mut msg) = Some(source);
                        if tx.send((msg, source)).await.is_err() {
                            log::debug!("udp transport receive loop shutting down: channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("dropping unparsable datagram from {remote}: {e}");
                    }
                }
            }
        });
    }
}

fn msg_source_slot(msg: &mut crate::message::SipMsg) -> &mut Option<Source> {
    match msg {
        crate::message::SipMsg::Request(r) => &mut r.source,
        crate::message::SipMsg::Response(r) => &mut r.source,
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, buf: &[u8], dest: SocketAddr) -> Result<usize> {
        Ok(self.0.sock.send_to(buf, dest).await?)
    }

    fn local_addr(&self) -> SocketAddr {
        self.0.local_addr
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }
}
