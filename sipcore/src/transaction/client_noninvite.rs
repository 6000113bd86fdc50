//! RFC 3261 §17.1.2: the non-INVITE client transaction. Owns timers E
//! (retransmission, doubling up to T2 then holding), F (overall timeout)
//! and K (drain time after a final response on unreliable transports).

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::message::{Request, Response};
use crate::transport::Transport;

use super::{Inner, State, Transaction, TransactionEvent, TransactionKey, TransactionLayer, T1, T2, T4};

impl Transaction {
    pub fn new_client_noninvite(
        request: Request,
        dest: SocketAddr,
        transport: Arc<dyn Transport>,
        layer: TransactionLayer,
        owner_tx: tokio::sync::mpsc::Sender<TransactionEvent>,
    ) -> Option<Transaction> {
        let key = TransactionKey::for_client(&request)?;
        let tsx = Transaction(Arc::new(Inner {
            kind: super::Kind::NonInviteClient,
            key,
            state: Mutex::new(State::Trying),
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
        tsx.arm_initial_timers_noninvite_client();
        Some(tsx)
    }

    fn arm_initial_timers_noninvite_client(&self) {
        // Timer F: 64*T1 overall timeout.
        self.schedule_once(self.0.t1 * 64, |tsx| async move {
            if matches!(tsx.state(), State::Trying | State::Proceeding) {
                tsx.notify(TransactionEvent::Timeout).await;
                tsx.terminate().await;
            }
        });
        if !self.0.transport.is_reliable() {
            self.schedule_retransmit_noninvite_client(self.0.t1);
        }
    }

    fn schedule_retransmit_noninvite_client(&self, next: Duration) {
        self.schedule_once(next, move |tsx| async move {
            if !matches!(tsx.state(), State::Trying | State::Proceeding) {
                return;
            }
            let bytes = tsx.request().to_string().into_bytes();
            let _ = tsx.transport_send(&bytes).await;
            let capped = (next * 2).min(tsx.0.t2);
            tsx.schedule_retransmit_noninvite_client(capped);
        });
    }

    /// RFC 3261 Figure 6. Returns `true` if the response should be
    /// forwarded to the transaction user.
    pub async fn on_client_noninvite_response(&self, resp: Response) -> bool {
        let code = resp.code();
        match self.state() {
            State::Trying | State::Proceeding => {
                self.set_last_response(resp.clone());
                self.advance_generation();
                if code.is_provisional() {
                    self.set_state(State::Proceeding);
                    self.notify(TransactionEvent::Provisional(resp)).await;
                } else {
                    self.set_state(State::Completed);
                    self.notify(TransactionEvent::Final(resp)).await;
                    self.arm_timer_k();
                }
                true
            }
            State::Completed => false,
            _ => false,
        }
    }

    fn arm_timer_k(&self) {
        let k = if self.0.transport.is_reliable() { Duration::ZERO } else { self.0.t4 };
        self.schedule_once(k, |tsx| async move {
            if tsx.state() == State::Completed {
                tsx.terminate().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{Header, Via};
    use crate::message::{Host, HostPort, SipMethod, StatusCode, StatusLine, TransportKind, Uri};

    fn sample() -> Transaction {
        let mut req = Request::new(SipMethod::Register, Uri::default());
        let mut via = Via::new(
            TransportKind::Udp,
            HostPort::new(Host::IpAddr("127.0.0.1".parse().unwrap()), Some(5060)),
        );
        via.set_branch("z9hG4bK-test-register");
        req.headers.push(Header::Via(via));
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        Transaction::new_client_noninvite(
            req,
            "127.0.0.1:5060".parse().unwrap(),
            Arc::new(crate::transport::mock::MockTransport::new("127.0.0.1:5061".parse().unwrap())),
            TransactionLayer::new(),
            tx,
        )
        .expect("sample non-invite transaction")
    }

    #[tokio::test]
    async fn provisional_keeps_transaction_alive() {
        let tsx = sample();
        let resp = Response::new(StatusLine::from_code(StatusCode::TRYING));
        assert!(tsx.on_client_noninvite_response(resp).await);
        assert_eq!(tsx.state(), State::Proceeding);
    }

    #[tokio::test]
    async fn final_response_moves_to_completed() {
        let tsx = sample();
        let resp = Response::new(StatusLine::from_code(StatusCode::OK));
        assert!(tsx.on_client_noninvite_response(resp).await);
        assert_eq!(tsx.state(), State::Completed);
    }
}
