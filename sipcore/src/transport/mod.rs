//! The transport abstraction consumed by the transaction engine: datagram
//! framing, symmetric response routing (RFC 3261 §18.2.2) and the
//! `received`/`rport` NAT hints (RFC 3261 §18.2.1, RFC 3581).

pub mod mock;
pub mod udp;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Source, TransportKind};

/// Contract a concrete transport implements. Only [`udp::UdpTransport`] is
/// wired up end-to-end; TCP/TLS/WS specifics are out of scope, but the
/// trait is kept generic so one could be added without touching the
/// transaction engine.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends raw bytes to `dest`; returns once handed to the OS, without
    /// waiting for any reply. Failures surface to the owning transaction
    /// asynchronously via its failure timer, not via this call's `Result`
    /// beyond the immediate send error.
    async fn send(&self, buf: &[u8], dest: SocketAddr) -> Result<usize>;

    /// The local socket address bound to this transport.
    fn local_addr(&self) -> SocketAddr;

    fn kind(&self) -> TransportKind;

    fn is_reliable(&self) -> bool {
        self.kind().is_reliable()
    }
}

/// A fully parsed inbound message plus the [`Source`] metadata the
/// transport layer attaches before dispatch.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub msg: crate::message::SipMsg,
}

/// Applies the RFC 3261 §18.2.1 / RFC 3581 NAT hints to a request's top
/// `Via` in place, using the socket address the datagram actually arrived
/// from. Idempotent: re-applying with the same `remote` is a no-op change
/// (spec §8 round-trip law).
pub fn apply_nat_hints(msg: &mut crate::message::SipMsg, remote: SocketAddr) {
    let Some(via) = msg.headers_mut().top_via_mut() else { return };

    let sent_by_matches = via
        .sent_by
        .ip_addr()
        .map(|ip| ip == remote.ip())
        .unwrap_or(false);
    if !sent_by_matches {
        via.set_received(remote.ip());
    }
    if via.has_rport() {
        via.set_rport(remote.port());
    }
}

/// Resolves the address a response to `msg` (received from `source`)
/// should be sent to, per RFC 3261 §18.2.2: prefer `received`/`rport` when
/// present, otherwise the Via `sent-by`, falling back to the socket the
/// request physically arrived from.
pub fn response_destination(msg: &crate::message::SipMsg, source: Source) -> SocketAddr {
    let Some(via) = msg.headers().top_via() else {
        return source.remote;
    };
    let ip = via.received().unwrap_or(source.remote.ip());
    let port = via.rport().or(via.sent_by.port).unwrap_or(source.remote.port());
    SocketAddr::new(ip, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{Header, Via};
    use crate::message::{Request, SipMethod, Uri};

    fn sample_request_with_via(via: Via) -> crate::message::SipMsg {
        let mut req = Request::new(SipMethod::Invite, Uri::default());
        req.headers.push(Header::Via(via));
        crate::message::SipMsg::Request(req)
    }

    #[test]
    fn nat_hints_set_received_and_rport() {
        let via = Via::parse("SIP/2.0/UDP host.example.com;branch=z9hG4bKabc;rport").unwrap();
        let mut msg = sample_request_with_via(via);

        let remote: SocketAddr = "192.0.2.7:55555".parse().unwrap();
        apply_nat_hints(&mut msg, remote);

        let via = msg.headers().top_via().unwrap();
        assert_eq!(via.received(), Some(remote.ip()));
        assert_eq!(via.rport(), Some(55555));
    }

    #[test]
    fn nat_hints_are_idempotent() {
        let via = Via::parse("SIP/2.0/UDP 192.0.2.7:55555;branch=z9hG4bKabc;rport").unwrap();
        let mut msg = sample_request_with_via(via);
        let remote: SocketAddr = "192.0.2.7:55555".parse().unwrap();

        apply_nat_hints(&mut msg, remote);
        let once = msg.headers().top_via().cloned();
        apply_nat_hints(&mut msg, remote);
        let twice = msg.headers().top_via().cloned();
        assert_eq!(once, twice);
    }
}
