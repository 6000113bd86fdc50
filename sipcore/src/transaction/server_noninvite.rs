//! RFC 3261 §17.2.2: the non-INVITE server transaction. Starts in
//! `Trying`, no timer runs until a final response is sent; then retransmits
//! the final on every retransmitted request (handled by the caller feeding
//! duplicate requests back in) and drains via timer J.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::message::{Request, Response};
use crate::transport::Transport;

use super::{Inner, State, Transaction, TransactionEvent, TransactionKey, TransactionLayer, T1, T2, T4};

impl Transaction {
    pub fn new_server_noninvite(
        request: Request,
        dest: SocketAddr,
        transport: Arc<dyn Transport>,
        layer: TransactionLayer,
        owner_tx: tokio::sync::mpsc::Sender<TransactionEvent>,
    ) -> Option<Transaction> {
        let key = TransactionKey::for_server(&request)?;
        Some(Transaction(Arc::new(Inner {
            kind: super::Kind::NonInviteServer,
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
        })))
    }

    /// RFC 3261 Figure 8. A provisional moves `Trying` -> `Proceeding`; a
    /// final moves to `Completed` and arms timer J.
    pub(crate) async fn respond_noninvite_server(&self, resp: Response) -> crate::error::Result<()> {
        let code = resp.code();
        self.set_last_response(resp.clone());
        let bytes = resp.to_string().into_bytes();
        self.transport_send(&bytes).await?;
        self.advance_generation();
        if code.is_provisional() {
            self.set_state(State::Proceeding);
        } else {
            self.set_state(State::Completed);
            self.arm_timer_j();
        }
        Ok(())
    }

    /// A retransmitted request landed while we already have a response:
    /// resend the last one instead of re-running the handler. Returns
    /// `false` if there was nothing to resend (still in `Trying`, no
    /// response chosen yet — the request is simply absorbed).
    pub async fn on_request_retransmit(&self) -> bool {
        if let Some(resp) = self.last_response() {
            let bytes = resp.to_string().into_bytes();
            let _ = self.transport_send(&bytes).await;
            true
        } else {
            false
        }
    }

    fn arm_timer_j(&self) {
        let j = if self.0.transport.is_reliable() { Duration::ZERO } else { self.0.t1 * 64 };
        self.schedule_once(j, |tsx| async move {
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
        let mut req = Request::new(SipMethod::Bye, Uri::default());
        let mut via = Via::new(
            TransportKind::Udp,
            HostPort::new(Host::IpAddr("192.0.2.1".parse().unwrap()), Some(5060)),
        );
        via.set_branch("z9hG4bK-test-srv-bye");
        req.headers.push(Header::Via(via));
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        Transaction::new_server_noninvite(
            req,
            "192.0.2.1:5060".parse().unwrap(),
            Arc::new(crate::transport::mock::MockTransport::new("192.0.2.9:5060".parse().unwrap())),
            TransactionLayer::new(),
            tx,
        )
        .expect("sample server non-invite transaction")
    }

    #[tokio::test]
    async fn final_response_moves_to_completed() {
        let tsx = sample();
        let resp = Response::new(StatusLine::from_code(StatusCode::OK));
        tsx.respond_noninvite_server(resp).await.unwrap();
        assert_eq!(tsx.state(), State::Completed);
    }

    #[tokio::test]
    async fn retransmit_after_completed_resends_last_response() {
        let tsx = sample();
        let resp = Response::new(StatusLine::from_code(StatusCode::OK));
        tsx.respond_noninvite_server(resp).await.unwrap();
        assert!(tsx.on_request_retransmit().await);
    }

    #[tokio::test]
    async fn retransmit_before_any_response_is_absorbed() {
        let tsx = sample();
        assert!(!tsx.on_request_retransmit().await);
    }
}
