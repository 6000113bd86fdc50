//! RFC 3261 §17.2.1: the INVITE server transaction. A 100 Trying is sent
//! synchronously on creation (Proceeding is the entry state, not Trying);
//! owns timers G (response retransmission on unreliable transports), H
//! (wait for ACK) and I (drain time after ACK).

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::message::{Request, Response, StatusCode, StatusLine};
use crate::transport::Transport;

use super::{Inner, State, Transaction, TransactionEvent, TransactionKey, TransactionLayer, T1, T2, T4};

impl Transaction {
    /// Builds the transaction and immediately fires the mandatory 100
    /// Trying (RFC 3261 §17.2.1: "the request is passed to the TU, and a
    /// 100 (Trying) is passed back"). Returns the transaction; the 100 has
    /// already been written to the transport by the time this returns.
    pub async fn new_server_invite(
        request: Request,
        dest: SocketAddr,
        transport: Arc<dyn Transport>,
        layer: TransactionLayer,
        owner_tx: tokio::sync::mpsc::Sender<TransactionEvent>,
    ) -> Option<Transaction> {
        let key = TransactionKey::for_server(&request)?;
        let mut trying = Response::new(StatusLine::from_code(StatusCode::TRYING));
        trying.headers = request.headers.clone();
        trying.headers.retain(|h| !matches!(h, crate::headers::Header::ContentLength(_)));
        let tsx = Transaction(Arc::new(Inner {
            kind: super::Kind::InviteServer,
            key,
            state: Mutex::new(State::Proceeding),
            generation: AtomicU64::new(0),
            request: Mutex::new(request),
            last_response: Mutex::new(Some(trying.clone())),
            dest,
            transport,
            t1: T1,
            t2: T2,
            t4: T4,
            owner_tx,
            layer,
        }));
        let bytes = trying.to_string().into_bytes();
        let _ = tsx.transport_send(&bytes).await;
        Some(tsx)
    }

    /// Sends a response chosen by the TU through this transaction. For a
    /// provisional, stays in `Proceeding`. For a final, moves to
    /// `Completed` (non-2xx, retransmitted until ACK) or terminates right
    /// away (2xx: the dialog layer owns retransmitting the 2xx, this
    /// transaction's job ends once it is handed off, per RFC 3261 §13.3.1.4).
    pub(crate) async fn respond_invite_server(&self, resp: Response) -> crate::error::Result<()> {
        let code = resp.code();
        self.set_last_response(resp.clone());
        let bytes = resp.to_string().into_bytes();
        self.transport_send(&bytes).await?;
        if code.is_provisional() {
            self.advance_generation();
            self.set_state(State::Proceeding);
        } else if code.is_success() {
            self.advance_generation();
            self.terminate().await;
        } else {
            self.advance_generation();
            self.set_state(State::Completed);
            self.arm_timer_h();
            if !self.0.transport.is_reliable() {
                self.schedule_retransmit_invite_server(self.0.t1);
            }
        }
        Ok(())
    }

    fn schedule_retransmit_invite_server(&self, next: Duration) {
        self.schedule_once(next, move |tsx| async move {
            if tsx.state() != State::Completed {
                return;
            }
            if let Some(resp) = tsx.last_response() {
                let bytes = resp.to_string().into_bytes();
                let _ = tsx.transport_send(&bytes).await;
            }
            let capped = (next * 2).min(tsx.0.t2);
            tsx.schedule_retransmit_invite_server(capped);
        });
    }

    fn arm_timer_h(&self) {
        self.schedule_once(self.0.t1 * 64, |tsx| async move {
            if tsx.state() == State::Completed {
                tsx.notify(TransactionEvent::Timeout).await;
                tsx.terminate().await;
            }
        });
    }

    /// An ACK for the final response this transaction sent arrived.
    /// 2xx ACKs belong to the dialog layer and never reach here (the
    /// INVITE server transaction terminates on sending the 2xx); only
    /// ACKs to non-2xx finals are transaction-layer events.
    pub async fn on_ack(&self, ack: Request) {
        if self.state() != State::Completed {
            return;
        }
        self.advance_generation();
        self.set_state(State::Confirmed);
        self.notify(TransactionEvent::AckReceived(ack)).await;
        let i = if self.0.transport.is_reliable() { Duration::ZERO } else { self.0.t4 };
        self.schedule_once(i, |tsx| async move {
            if tsx.state() == State::Confirmed {
                tsx.terminate().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{Header, Via};
    use crate::message::{Host, HostPort, SipMethod, TransportKind, Uri};

    async fn sample() -> (Transaction, Arc<crate::transport::mock::MockTransport>) {
        let mut req = Request::new(SipMethod::Invite, Uri::default());
        let mut via = Via::new(
            TransportKind::Udp,
            HostPort::new(Host::IpAddr("192.0.2.1".parse().unwrap()), Some(5060)),
        );
        via.set_branch("z9hG4bK-test-srv-invite");
        req.headers.push(Header::Via(via));
        let transport = Arc::new(crate::transport::mock::MockTransport::new("192.0.2.9:5060".parse().unwrap()));
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let tsx = Transaction::new_server_invite(
            req,
            "192.0.2.1:5060".parse().unwrap(),
            transport.clone(),
            TransactionLayer::new(),
            tx,
        )
        .await
        .expect("sample server invite transaction");
        (tsx, transport)
    }

    #[tokio::test]
    async fn creation_sends_100_trying() {
        let (tsx, transport) = sample().await;
        assert_eq!(tsx.state(), State::Proceeding);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn non_2xx_final_then_ack_reaches_confirmed() {
        let (tsx, _transport) = sample().await;
        let resp = Response::new(StatusLine::from_code(StatusCode::BUSY_HERE));
        tsx.respond_invite_server(resp).await.unwrap();
        assert_eq!(tsx.state(), State::Completed);

        let ack = Request::new(SipMethod::Ack, crate::message::Uri::default());
        tsx.on_ack(ack).await;
        assert_eq!(tsx.state(), State::Confirmed);
    }

    #[tokio::test]
    async fn success_final_terminates_immediately() {
        let (tsx, _transport) = sample().await;
        let resp = Response::new(StatusLine::from_code(StatusCode::OK));
        tsx.respond_invite_server(resp).await.unwrap();
        assert_eq!(tsx.state(), State::Terminated);
    }
}
