//! The top-level SIP endpoint: binds a transport, owns the transaction and
//! dialog registries, and dispatches inbound traffic to a [`SipHandler`].
//! Grounded on the teacher's `Endpoint(Arc<Inner>)` + `Builder` shape and
//! its `new_response` header-copying recipe (§18.2.2/§12.1.1 header
//! carry-over on responses).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::sync::mpsc;

use crate::config::EndpointConfig;
use crate::dialog::{Dialog, DialogId, DialogManager};
use crate::error::{Error, Result};
use crate::handler::{HandlerAction, SipHandler};
use crate::headers::Header;
use crate::message::{Request, Response, SipMethod, SipMsg, Source, StatusCode, StatusLine, Uri};
use crate::transaction::{Kind, MethodFamily, Role, Transaction, TransactionEvent, TransactionKey, TransactionLayer};
use crate::transport::{apply_nat_hints, response_destination, udp::UdpTransport, Transport};

struct Inner {
    transport: UdpTransport,
    transactions: TransactionLayer,
    dialogs: DialogManager,
    handler: Arc<dyn SipHandler>,
    config: EndpointConfig,
    contact: Uri,
}

/// The endpoint: cheap to clone, shared across every task the receive loop
/// and outbound requests spawn.
#[derive(Clone)]
pub struct Endpoint(Arc<Inner>);

pub struct Builder {
    config: EndpointConfig,
    handler: Option<Arc<dyn SipHandler>>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder { config: EndpointConfig::default(), handler: None }
    }
}

impl Builder {
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    pub fn handler(mut self, handler: Arc<dyn SipHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub async fn build(self) -> Result<Endpoint> {
        let handler = self.handler.unwrap_or_else(|| Arc::new(crate::handler::DefaultHandler));
        let bind_addr = SocketAddr::new(self.config.listen_addr, self.config.listen_port);
        let transport = UdpTransport::bind(bind_addr).await?;
        let local = transport.local_addr();
        let contact_ip = self.config.exposed_addr.unwrap_or(local.ip());
        let contact_port = self.config.exposed_port.unwrap_or(local.port());
        let contact = Uri::builder()
            .host(crate::message::HostPort::new(host_from_ip(contact_ip), Some(contact_port)))
            .build();

        Ok(Endpoint(Arc::new(Inner {
            transport,
            transactions: TransactionLayer::new(),
            dialogs: DialogManager::new(),
            handler,
            config: self.config,
            contact,
        })))
    }
}

fn host_from_ip(ip: IpAddr) -> crate::message::Host {
    crate::message::Host::IpAddr(ip)
}

impl Endpoint {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.0.transport.local_addr()
    }

    pub fn contact(&self) -> &Uri {
        &self.0.contact
    }

    pub fn transactions(&self) -> &TransactionLayer {
        &self.0.transactions
    }

    pub fn dialogs(&self) -> &DialogManager {
        &self.0.dialogs
    }

    /// Spawns the receive loop; returns once the transport channel closes
    /// (transport task panicked or was dropped).
    pub async fn run(self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(self.0.config.max_burst.max(1) * 4);
        self.0.transport.spawn_recv_loop(tx);
        while let Some((mut msg, source)) = rx.recv().await {
            apply_nat_hints(&mut msg, source.remote);
            let endpoint = self.clone();
            tokio::spawn(async move {
                endpoint.dispatch(msg, source).await;
            });
        }
        Err(Error::ChannelClosed)
    }

    async fn dispatch(&self, msg: SipMsg, source: Source) {
        match msg {
            SipMsg::Request(req) => self.dispatch_request(req, source).await,
            SipMsg::Response(resp) => self.dispatch_response(resp).await,
        }
    }

    async fn dispatch_response(&self, resp: Response) {
        let Some(via) = resp.headers.top_via() else {
            debug!("dropping response with no Via");
            return;
        };
        let Some(cseq) = resp.headers.cseq() else {
            debug!("dropping response with no CSeq");
            return;
        };
        let Some(branch) = via.branch() else {
            debug!("dropping response with no Via branch");
            return;
        };
        let key = TransactionKey {
            branch: branch.to_string(),
            family: MethodFamily::of(cseq.method),
            role: Role::Client,
            sent_by: None,
        };
        let Some(tsx) = self.0.transactions.find(&key) else {
            trace!("no matching client transaction for {key}, dropping response");
            return;
        };
        match tsx.kind() {
            Kind::InviteClient => {
                tsx.on_client_invite_response(resp).await;
            }
            Kind::NonInviteClient => {
                tsx.on_client_noninvite_response(resp).await;
            }
            _ => {}
        }
    }

    async fn dispatch_request(&self, req: Request, source: Source) {
        match req.method() {
            SipMethod::Ack => self.dispatch_ack(req).await,
            SipMethod::Cancel => self.dispatch_cancel(req, source).await,
            _ => self.dispatch_ordinary_request(req, source).await,
        }
    }

    async fn dispatch_ack(&self, ack: Request) {
        let Some(via) = ack.headers.top_via().cloned() else { return };
        let Some(key) = TransactionKey::invite_target_for_cancel(&via) else { return };
        if let Some(tsx) = self.0.transactions.find(&key) {
            tsx.on_ack(ack).await;
        } else {
            trace!("no matching INVITE server transaction for ACK, dropping");
        }
    }

    async fn dispatch_cancel(&self, cancel: Request, source: Source) {
        let Some(via) = cancel.headers.top_via().cloned() else { return };
        let Some(target_key) = TransactionKey::invite_target_for_cancel(&via) else { return };
        let dest = response_destination(&SipMsg::Request(cancel.clone()), source);

        let ok = self.new_response_for(&cancel, StatusCode::OK);
        let _ = self.0.transport.send(ok.to_string().as_bytes(), dest).await;

        if let Some(target) = self.0.transactions.find(&target_key) {
            let dialog_id = dialog_id_for(&target.request());
            let dialog = dialog_id.and_then(|id| self.0.dialogs.find(&id));
            self.0.handler.on_cancel(dialog.as_ref(), &target.request()).await;
            let terminated = self.new_response_for(&target.request(), StatusCode::REQUEST_TERMINATED);
            let _ = target.respond(terminated).await;
        } else {
            trace!("CANCEL for unknown transaction {target_key}");
        }
    }

    async fn dispatch_ordinary_request(&self, req: Request, source: Source) {
        let Some(key) = TransactionKey::for_server(&req) else {
            warn!("inbound request with no Via branch, dropping");
            return;
        };
        if let Some(existing) = self.0.transactions.find(&key) {
            match existing.kind() {
                Kind::NonInviteServer => {
                    existing.on_request_retransmit().await;
                }
                _ => {
                    trace!("retransmitted request for transaction {key}, ignoring");
                }
            }
            return;
        }

        let dest = response_destination(&SipMsg::Request(req.clone()), source);
        let dialog_id = dialog_id_for(&req);
        let dialog = dialog_id.and_then(|id| self.0.dialogs.find(&id));

        let (owner_tx, _owner_rx) = mpsc::channel::<TransactionEvent>(1);
        let method = req.method();
        let is_invite = method == SipMethod::Invite;
        let transport: Arc<dyn Transport> = Arc::new(self.0.transport.clone());

        let tsx = if is_invite {
            Transaction::new_server_invite(req.clone(), dest, transport, self.0.transactions.clone(), owner_tx).await
        } else {
            Transaction::new_server_noninvite(req.clone(), dest, transport, self.0.transactions.clone(), owner_tx)
        };
        let Some(tsx) = tsx else {
            warn!("failed to build server transaction for {method}");
            return;
        };
        self.0.transactions.insert(tsx.clone());

        let action = match &dialog {
            Some(dialog) => self.0.handler.on_in_dialog_request(dialog, &req).await,
            None => self.0.handler.on_request(&req).await,
        };
        match action {
            HandlerAction::Respond(resp) => {
                let _ = tsx.respond(resp).await;
            }
            HandlerAction::Proxy(_) => {
                warn!("proxy action requested but proxying is out of scope; responding 501");
                let _ = tsx.respond(self.new_response_for(&req, StatusCode::NOT_IMPLEMENTED)).await;
            }
            HandlerAction::NoReply => {}
        }
    }

    /// Builds a response from a request, copying the header set a UAS
    /// carries over verbatim (`Via` in full, `Record-Route`, `Call-ID`,
    /// `From`, `To` with a tag added if this is not a provisional,
    /// `CSeq`) — RFC 3261 §8.2.6.2.
    pub fn new_response_for(&self, req: &Request, code: impl Into<StatusCode>) -> Response {
        let code = code.into();
        let mut resp = Response::new(StatusLine::from_code(code));
        for via in req.headers.via_all() {
            resp.headers.push(Header::Via(via.clone()));
        }
        for rr in req.headers.record_routes() {
            resp.headers.push(Header::RecordRoute(rr.clone()));
        }
        if let Some(call_id) = req.headers.call_id() {
            resp.headers.push(Header::CallId(call_id.clone()));
        }
        if let Some(from) = req.headers.from() {
            resp.headers.push(Header::From(from.clone()));
        }
        if let Some(to) = req.headers.to() {
            let mut to = to.clone();
            if to.tag().is_none() && code.0 > 100 {
                to.set_tag(generate_tag());
            }
            resp.headers.push(Header::To(to));
        }
        if let Some(cseq) = req.headers.cseq() {
            resp.headers.push(Header::CSeq(cseq.clone()));
        }
        resp
    }

    /// Sends an initial (out-of-dialog or dialog-forming) request and
    /// returns its client transaction plus the event stream the caller
    /// should drive to completion.
    pub async fn send_request(&self, req: Request, dest: SocketAddr) -> Result<(Transaction, mpsc::Receiver<TransactionEvent>)> {
        let (owner_tx, owner_rx) = mpsc::channel(8);
        let transport: Arc<dyn Transport> = Arc::new(self.0.transport.clone());
        let bytes = req.to_string().into_bytes();

        let tsx = if req.method() == SipMethod::Invite {
            Transaction::new_client_invite(req, dest, transport, self.0.transactions.clone(), owner_tx)
        } else {
            Transaction::new_client_noninvite(req, dest, transport, self.0.transactions.clone(), owner_tx)
        }
        .ok_or_else(|| Error::Protocol("request has no Via branch to key a transaction on".into()))?;

        self.0.transactions.insert(tsx.clone());
        self.0.transport.send(&bytes, dest).await?;
        Ok((tsx, owner_rx))
    }

    pub fn register_dialog(&self, dialog: Dialog) {
        self.0.dialogs.insert(dialog);
    }
}

fn dialog_id_for(req: &Request) -> Option<DialogId> {
    let call_id = req.headers.call_id()?.0.clone();
    let local_tag = req.headers.to()?.tag()?.to_string();
    let remote_tag = req.headers.from()?.tag()?.to_string();
    Some(DialogId { call_id, local_tag, remote_tag })
}

fn generate_tag() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("tag-{:x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
