//! An in-memory [`Transport`] for tests, recording every datagram "sent"
//! instead of touching a socket. Mirrors the teacher's `transport::udp::mock`.

use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::TransportKind;

use super::Transport;

pub struct MockTransport {
    local_addr: SocketAddr,
    pub sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
}

impl MockTransport {
    pub fn new(local_addr: SocketAddr) -> Self {
        MockTransport { local_addr, sent: Mutex::new(Vec::new()) }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("lock poisoned").len()
    }

    pub fn last_sent(&self) -> Option<(Vec<u8>, SocketAddr)> {
        self.sent.lock().expect("lock poisoned").last().cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, buf: &[u8], dest: SocketAddr) -> Result<usize> {
        self.sent.lock().expect("lock poisoned").push((buf.to_vec(), dest));
        Ok(buf.len())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }
}
