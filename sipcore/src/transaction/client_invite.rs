//! RFC 3261 §17.1.1: the INVITE client transaction. Owns timers A (UDP
//! retransmission, doubling up to T2), B (overall timeout) and D (wait for
//! response retransmissions to die out after a non-2xx final).

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::headers::{CSeq, Header};
use crate::message::{Request, Response, SipMethod};
use crate::transport::Transport;

use super::{Inner, State, Transaction, TransactionEvent, TransactionKey, TransactionLayer, T1, T2, T4};

/// Builds the ACK for a non-2xx final (RFC 3261 §17.1.1.3): same Call-ID,
/// From, top Via (same branch — this is not a new transaction) and CSeq
/// number as the original INVITE, but method ACK and the To from the final
/// response (carrying whatever tag the UAS assigned).
fn build_non_2xx_ack(request: &Request, resp: &Response) -> Request {
    let mut ack = Request::new(SipMethod::Ack, request.uri().clone());
    if let Some(via) = request.headers.top_via() {
        ack.headers.push(Header::Via(via.clone()));
    }
    if let Some(max_forwards) = request.headers.max_forwards() {
        ack.headers.push(Header::MaxForwards(*max_forwards));
    }
    if let Some(from) = request.headers.from() {
        ack.headers.push(Header::From(from.clone()));
    }
    let to = resp.headers.to().or_else(|| request.headers.to());
    if let Some(to) = to {
        ack.headers.push(Header::To(to.clone()));
    }
    if let Some(call_id) = request.headers.call_id() {
        ack.headers.push(Header::CallId(call_id.clone()));
    }
    let seq = request.headers.cseq().map(|c| c.seq).unwrap_or(1);
    ack.headers.push(Header::CSeq(CSeq::new(seq, SipMethod::Ack)));
    for route in request.headers.routes() {
        ack.headers.push(Header::Route(route.clone()));
    }
    ack
}

impl Transaction {
    /// Creates and arms an INVITE client transaction. The initial INVITE is
    /// assumed already sent by the caller (so the first retransmission
    /// timer fire is the first *re*-send) — mirrors the teacher's
    /// `new_tsx_uac` taking an already-serialized request.
    pub fn new_client_invite(
        request: Request,
        dest: SocketAddr,
        transport: Arc<dyn Transport>,
        layer: TransactionLayer,
        owner_tx: tokio::sync::mpsc::Sender<TransactionEvent>,
    ) -> Option<Transaction> {
        let key = TransactionKey::for_client(&request)?;
        let tsx = Transaction(Arc::new(Inner {
            kind: super::Kind::InviteClient,
            key,
            state: Mutex::new(State::Calling),
            generation: AtomicU64::new(0),
            request: Mutex::new(request),
            last_response: Mutex::new(None),
            dest,
            transport,
            t1: T1,
            t2: T2,
            t4: T4,
            owner_tx,
            layer,
        }));
        tsx.arm_initial_timers_invite_client();
        Some(tsx)
    }

    fn arm_initial_timers_invite_client(&self) {
        // Timer B: give up after 64*T1 if nothing at all comes back.
        self.schedule_once(self.0.t1 * 64, |tsx| async move {
            if tsx.state() == State::Calling {
                tsx.notify(TransactionEvent::Timeout).await;
                tsx.terminate().await;
            }
        });
        if !self.0.transport.is_reliable() {
            self.schedule_retransmit_invite_client(self.0.t1);
        }
    }

    fn schedule_retransmit_invite_client(&self, next: Duration) {
        self.schedule_once(next, move |tsx| async move {
            if tsx.state() != State::Calling {
                return;
            }
            let bytes = tsx.request().to_string().into_bytes();
            let _ = tsx.transport_send(&bytes).await;
            let capped = (next * 2).min(tsx.0.t2);
            tsx.schedule_retransmit_invite_client(capped);
        });
    }

    /// Feeds a response received for this transaction through the INVITE
    /// client FSM (RFC 3261 Figure 5). Returns `true` if the response
    /// should be forwarded to the transaction user.
    pub async fn on_client_invite_response(&self, resp: Response) -> bool {
        let code = resp.code();
        match self.state() {
            State::Calling | State::Proceeding => {
                self.set_last_response(resp.clone());
                if code.is_provisional() {
                    self.advance_generation();
                    self.set_state(State::Proceeding);
                    self.notify(TransactionEvent::Provisional(resp)).await;
                    true
                } else if code.is_success() {
                    // 2xx ends the transaction immediately; the dialog/TU
                    // layer owns retransmitting ACK for 2xx, not us.
                    self.advance_generation();
                    self.notify(TransactionEvent::Final(resp)).await;
                    self.terminate().await;
                    true
                } else {
                    self.advance_generation();
                    self.set_state(State::Completed);
                    self.arm_timer_d();
                    let ack = build_non_2xx_ack(&self.request(), &resp);
                    let _ = self.transport_send(ack.to_string().as_bytes()).await;
                    self.notify(TransactionEvent::Final(resp)).await;
                    true
                }
            }
            // Retransmitted non-2xx final: already reported to the TU once,
            // but RFC 3261 §17.1.1.3 requires the ACK to be retransmitted
            // for every retransmitted final too.
            State::Completed => {
                let ack = build_non_2xx_ack(&self.request(), &resp);
                let _ = self.transport_send(ack.to_string().as_bytes()).await;
                false
            }
            _ => false,
        }
    }

    fn arm_timer_d(&self) {
        let d = if self.0.transport.is_reliable() {
            Duration::ZERO
        } else {
            Duration::from_secs(32)
        };
        self.schedule_once(d, |tsx| async move {
            if tsx.state() == State::Completed {
                tsx.terminate().await;
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::headers::{Header, Via};
    use crate::message::{Host, HostPort, SipMethod, StatusCode, StatusLine, TransportKind, Uri};

    fn local_host_port(port: u16) -> HostPort {
        HostPort::new(Host::IpAddr("127.0.0.1".parse().unwrap()), Some(port))
    }

    pub(crate) fn sample(layer: TransactionLayer) -> Transaction {
        let mut req = Request::new(SipMethod::Invite, Uri::default());
        let mut via = Via::new(TransportKind::Udp, local_host_port(5060));
        via.set_branch("z9hG4bK-test-invite");
        req.headers.push(Header::Via(via));
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        Transaction::new_client_invite(
            req,
            "127.0.0.1:5060".parse().unwrap(),
            Arc::new(crate::transport::mock::MockTransport::new("127.0.0.1:5061".parse().unwrap())),
            layer,
            tx,
        )
        .expect("sample invite transaction")
    }

    #[tokio::test]
    async fn provisional_response_moves_to_proceeding() {
        let layer = TransactionLayer::new();
        let tsx = sample(layer);
        let resp = Response::new(StatusLine::from_code(StatusCode::RINGING));
        assert!(tsx.on_client_invite_response(resp).await);
        assert_eq!(tsx.state(), State::Proceeding);
    }

    #[tokio::test]
    async fn non_2xx_final_moves_to_completed() {
        let layer = TransactionLayer::new();
        let tsx = sample(layer);
        let resp = Response::new(StatusLine::from_code(StatusCode::BUSY_HERE));
        assert!(tsx.on_client_invite_response(resp).await);
        assert_eq!(tsx.state(), State::Completed);
    }

    #[tokio::test]
    async fn success_final_terminates_transaction() {
        let layer = TransactionLayer::new();
        let tsx = sample(layer.clone());
        layer.insert(tsx.clone());
        let resp = Response::new(StatusLine::from_code(StatusCode::OK));
        assert!(tsx.on_client_invite_response(resp).await);
        assert_eq!(tsx.state(), State::Terminated);
        assert!(layer.find(tsx.key()).is_none());
    }
}
