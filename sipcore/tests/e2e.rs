//! End-to-end scenarios exercising the whole stack together, as opposed to
//! the unit tests living next to each module. Scenarios 1 and 4 drive a
//! real [`Endpoint`] over loopback UDP; scenarios 2, 5 and 6 drive the
//! transaction/dialog layers directly (full `Endpoint::run` would otherwise
//! race a background task against itself); scenario 3 drives a
//! [`MediaSession`] directly.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use sipcore::dialog::{Dialog, DialogState};
use sipcore::handler::{HandlerAction, SipHandler};
use sipcore::headers::{ContentType, Header, Via};
use sipcore::media::codec::Codec;
use sipcore::media::{CodecNegotiationOutcome, MediaHandler, MediaSession, Role as MediaRole, RtpPortPool};
use sipcore::message::{Host, HostPort, NameAddr, Request, Response, Scheme, SipMethod, StatusCode, TransportKind, Uri};
use sipcore::parser::parse_message;
use sipcore::transaction::{Transaction, TransactionLayer};
use sipcore::transport::mock::MockTransport;
use sipcore::transport::Transport;
use sipcore::{Endpoint, EndpointConfig};

fn localhost(port: u16) -> Uri {
    Uri::builder()
        .scheme(Scheme::Sip)
        .host(HostPort::new(Host::IpAddr(IpAddr::V4(Ipv4Addr::LOCALHOST)), Some(port)))
        .build()
}

/// Builds the RFC 3261 §24.2 INVITE, addressed at `dest`, sent from a client
/// bound to `from`, carrying an SDP body offering PCMU and PCMA.
fn sample_invite(from: SocketAddr, dest: SocketAddr, branch: &str, rport: bool) -> Vec<u8> {
    let mut req = Request::new(SipMethod::Invite, localhost(dest.port()));
    let mut via = Via::new(TransportKind::Udp, HostPort::new(Host::IpAddr(from.ip()), Some(from.port())));
    via.set_branch(branch);
    if rport {
        via.params.push(sipcore::message::Param::new("rport", None::<String>));
    }
    req.headers.push(Header::Via(via));
    req.headers.push(Header::MaxForwards(sipcore::headers::MaxForwards::DEFAULT));
    let mut from_na = NameAddr::new(localhost(from.port()));
    from_na.params.push(sipcore::message::Param::new("tag", Some("alice-tag")));
    req.headers.push(Header::From(sipcore::headers::From::new(from_na)));
    req.headers.push(Header::To(sipcore::headers::To::new(NameAddr::new(localhost(dest.port())))));
    req.headers.push(Header::CallId(sipcore::headers::CallId::new("call-e2e-1")));
    req.headers.push(Header::CSeq(sipcore::headers::CSeq::new(1, SipMethod::Invite)));
    req.headers.push(Header::Contact(sipcore::headers::Contact::addr(NameAddr::new(localhost(from.port())))));
    req.headers.push(Header::ContentType(ContentType::sdp()));

    let body = format!(
        "v=0\r\no=alice 1 1 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\n\
         m=audio 5004 RTP/AVP 0 8\r\na=rtpmap:0 PCMU/8000\r\na=rtpmap:8 PCMA/8000\r\n"
    );
    req.headers.push(Header::ContentLength(sipcore::headers::ContentLength::new(body.len())));
    req.body = Some(body.into_bytes());

    req.to_string().into_bytes()
}

fn sample_bye(from: SocketAddr, dest: SocketAddr, branch: &str, to_tag: &str) -> Vec<u8> {
    let mut req = Request::new(SipMethod::Bye, localhost(dest.port()));
    let mut via = Via::new(TransportKind::Udp, HostPort::new(Host::IpAddr(from.ip()), Some(from.port())));
    via.set_branch(branch);
    req.headers.push(Header::Via(via));
    req.headers.push(Header::MaxForwards(sipcore::headers::MaxForwards::DEFAULT));
    let mut from_na = NameAddr::new(localhost(from.port()));
    from_na.params.push(sipcore::message::Param::new("tag", Some("alice-tag")));
    req.headers.push(Header::From(sipcore::headers::From::new(from_na)));
    let mut to_na = NameAddr::new(localhost(dest.port()));
    to_na.params.push(sipcore::message::Param::new("tag", Some(to_tag.to_string())));
    req.headers.push(Header::To(sipcore::headers::To::new(to_na)));
    req.headers.push(Header::CallId(sipcore::headers::CallId::new("call-e2e-1")));
    req.headers.push(Header::CSeq(sipcore::headers::CSeq::new(2, SipMethod::Bye)));

    req.to_string().into_bytes()
}

/// Hands every INVITE off to the test body (`NoReply`) and terminates the
/// dialog on an in-dialog BYE.
struct EchoUas;

struct QuietMediaHandler;
#[async_trait]
impl MediaHandler for QuietMediaHandler {}

#[async_trait]
impl SipHandler for EchoUas {
    fn name(&self) -> &str {
        "echo-uas"
    }

    async fn on_request(&self, request: &Request) -> HandlerAction {
        if request.method() != SipMethod::Invite {
            return HandlerAction::Respond(Response::new(sipcore::message::StatusLine::from_code(StatusCode::METHOD_NOT_ALLOWED)));
        }
        HandlerAction::NoReply
    }

    async fn on_in_dialog_request(&self, dialog: &Dialog, request: &Request) -> HandlerAction {
        if request.method() == SipMethod::Bye {
            dialog.terminate();
        }
        HandlerAction::NoReply
    }
}

/// Scenario 1 and 4 share this harness: a real `Endpoint` bound to loopback,
/// driven over a raw UDP client socket so assertions can inspect the exact
/// bytes on the wire.
async fn start_uas() -> (Endpoint, SocketAddr) {
    let config = EndpointConfig::builder().listen_addr(IpAddr::V4(Ipv4Addr::LOCALHOST)).listen_port(0).build();
    let endpoint = Endpoint::builder()
        .config(config)
        .handler(Arc::new(EchoUas))
        .build()
        .await
        .expect("endpoint binds");
    let addr = endpoint.local_addr();
    let running = endpoint.clone();
    tokio::spawn(async move {
        let _ = running.run().await;
    });
    (endpoint, addr)
}

#[tokio::test]
async fn scenario1_basic_uas_call() {
    let (endpoint, uas_addr) = start_uas().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client.local_addr().unwrap();

    let invite = sample_invite(client_addr, uas_addr, "z9hG4bK-e2e-1", false);
    client.send_to(&invite, uas_addr).await.unwrap();

    // 100 Trying arrives well inside 50ms since it's sent synchronously by
    // the server INVITE transaction constructor.
    let mut buf = vec![0u8; 65536];
    let (len, _) = tokio::time::timeout(Duration::from_millis(50), client.recv_from(&mut buf)).await.unwrap().unwrap();
    let trying = parse_message(&buf[..len]).unwrap();
    assert_eq!(trying.response().unwrap().code(), StatusCode::TRYING);

    // Since `on_request` only registers NoReply for the bare handler used
    // here, drive the actual answer manually through the endpoint the way a
    // richer handler's async negotiation would, then resend through the
    // transaction: build the 200 OK with a PCMA answer directly.
    let req = parse_message(&invite).unwrap().request().unwrap().clone();
    let tsx = endpoint
        .transactions()
        .find(&sipcore::transaction::TransactionKey::for_server(&req).unwrap())
        .expect("server transaction registered");

    let session = MediaSession::new(
        MediaRole::Uas,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        vec![Codec::Pcma],
        Arc::new(RtpPortPool::new((16484, 16584))),
        Box::new(QuietMediaHandler),
        Duration::from_secs(5),
    );
    let offer = std::str::from_utf8(req.body.as_deref().unwrap()).unwrap();
    let answer = session.process_offer(offer).await.unwrap();
    assert!(answer.contains("a=rtpmap:8 PCMA/8000"));

    let dialog = Dialog::new_uas(&req, "bob-tag", localhost(uas_addr.port())).unwrap();
    dialog.confirm();
    endpoint.register_dialog(dialog.clone());

    let mut ok = endpoint.new_response_for(&req, StatusCode::OK);
    ok.headers.push(Header::ContentType(ContentType::sdp()));
    ok.headers.push(Header::ContentLength(sipcore::headers::ContentLength::new(answer.len())));
    ok.body = Some(answer.into_bytes());
    tsx.respond(ok).await.unwrap();

    let (len, _) = tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await.unwrap().unwrap();
    let resp = parse_message(&buf[..len]).unwrap();
    let resp = resp.response().unwrap();
    assert_eq!(resp.code(), StatusCode::OK);
    assert!(std::str::from_utf8(resp.body.as_ref().unwrap()).unwrap().contains("a=rtpmap:8 PCMA/8000"));

    // A 2xx final exits the INVITE server transaction immediately per RFC
    // 3261 §13.3.1.4; the dialog layer, not this transaction, owns the ACK.
    assert!(endpoint.transactions().find(tsx.key()).is_none());

    let bye = sample_bye(client_addr, uas_addr, "z9hG4bK-e2e-1-bye", "bob-tag");
    client.send_to(&bye, uas_addr).await.unwrap();
    let (len, _) = tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await.unwrap().unwrap();
    let resp = parse_message(&buf[..len]).unwrap();
    assert_eq!(resp.response().unwrap().code(), StatusCode::OK);
    assert_eq!(dialog.state(), DialogState::Terminated);
}

#[tokio::test]
async fn scenario4_symmetric_response_routing() {
    let (_endpoint, uas_addr) = start_uas().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client.local_addr().unwrap();

    // Claim a bogus sent-by host in the Via, as a NATted client would; the
    // UAS can only route the response back via `received`/`rport`, derived
    // from the socket the datagram actually arrived from.
    let mut req = Request::new(SipMethod::Invite, localhost(uas_addr.port()));
    let mut via = Via::new(TransportKind::Udp, HostPort::new(Host::DomainName("host.example.com".into()), None));
    via.set_branch("z9hG4bK-e2e-nat");
    via.params.push(sipcore::message::Param::new("rport", None::<String>));
    req.headers.push(Header::Via(via));
    req.headers.push(Header::MaxForwards(sipcore::headers::MaxForwards::DEFAULT));
    req.headers.push(Header::From(sipcore::headers::From::new(NameAddr::new(localhost(client_addr.port())))));
    req.headers.push(Header::To(sipcore::headers::To::new(NameAddr::new(localhost(uas_addr.port())))));
    req.headers.push(Header::CallId(sipcore::headers::CallId::new("call-e2e-nat")));
    req.headers.push(Header::CSeq(sipcore::headers::CSeq::new(1, SipMethod::Invite)));
    req.headers.push(Header::ContentLength(sipcore::headers::ContentLength::new(0)));

    client.send_to(req.to_string().as_bytes(), uas_addr).await.unwrap();

    let mut buf = vec![0u8; 65536];
    let (len, _) = tokio::time::timeout(Duration::from_millis(100), client.recv_from(&mut buf)).await.unwrap().unwrap();
    let trying = parse_message(&buf[..len]).unwrap();
    let via = trying.headers().top_via().unwrap();
    assert_eq!(via.received(), Some(client_addr.ip()));
    assert_eq!(via.rport(), Some(client_addr.port()));
}

#[tokio::test(start_paused = true)]
async fn scenario2_invite_client_retransmission() {
    let mock = Arc::new(MockTransport::new("127.0.0.1:5061".parse().unwrap()));

    let mut req = Request::new(SipMethod::Invite, localhost(5060));
    let mut via = Via::new(TransportKind::Udp, HostPort::new(Host::IpAddr(IpAddr::V4(Ipv4Addr::LOCALHOST)), Some(5061)));
    via.set_branch("z9hG4bK-e2e-retransmit");
    req.headers.push(Header::Via(via));

    let layer = TransactionLayer::new();
    let (owner_tx, mut owner_rx) = tokio::sync::mpsc::channel(8);
    let tsx = Transaction::new_client_invite(req, "127.0.0.1:5060".parse().unwrap(), mock.clone(), layer.clone(), owner_tx)
        .expect("client invite transaction");
    layer.insert(tsx.clone());

    // T1, 2*T1, 4*T1 (module defaults: T1=500ms, T2=4s, so the third
    // retransmit is capped at T2 rather than reaching 4s uncapped).
    assert_eq!(mock.sent_count(), 0);
    tokio::time::advance(Duration::from_millis(500)).await;
    assert_eq!(mock.sent_count(), 1);
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(mock.sent_count(), 2);
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(mock.sent_count(), 3);

    // Timer B: 64*T1 = 32s total with no final response ever arriving.
    tokio::time::advance(Duration::from_secs(29)).await;
    let event = owner_rx.recv().await.expect("timeout event");
    assert!(matches!(event, sipcore::transaction::TransactionEvent::Timeout));
    assert!(layer.find(tsx.key()).is_none());
}

#[tokio::test]
async fn scenario3_codec_selection_via_handler() {
    struct PreferOpus {
        negotiated: Arc<Mutex<Option<Codec>>>,
    }
    #[async_trait]
    impl MediaHandler for PreferOpus {
        async fn handle_codec_negotiation(&mut self, offered: &[Codec], _supported: &[Codec]) -> CodecNegotiationOutcome {
            if offered.contains(&Codec::Opus) {
                CodecNegotiationOutcome::Codec(Codec::Opus)
            } else {
                CodecNegotiationOutcome::Error("opus required".into())
            }
        }

        async fn handle_negotiation_complete(&mut self, _local: &str, _remote: &str, codec: Codec) -> std::result::Result<(), String> {
            *self.negotiated.lock().unwrap() = Some(codec);
            Ok(())
        }
    }

    let negotiated = Arc::new(Mutex::new(None));
    let pool = Arc::new(RtpPortPool::new((16384, 16484)));
    let session = MediaSession::new(
        MediaRole::Uas,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        vec![Codec::Opus, Codec::Pcma, Codec::Pcmu],
        pool,
        Box::new(PreferOpus { negotiated: negotiated.clone() }),
        Duration::from_secs(5),
    );

    let offer = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\n\
                 m=audio 5004 RTP/AVP 0 8 111\r\na=rtpmap:0 PCMU/8000\r\na=rtpmap:8 PCMA/8000\r\n\
                 a=rtpmap:111 opus/48000/2\r\n";
    let answer = session.process_offer(offer).await.unwrap();
    assert!(answer.contains("a=rtpmap:111 opus/48000/2"));
    assert_eq!(session.selected_codec(), Some(Codec::Opus));
    assert_eq!(*negotiated.lock().unwrap(), Some(Codec::Opus));
}

#[tokio::test(start_paused = true)]
async fn scenario5_cancel_race() {
    // Exercises the same sequence `Endpoint::dispatch_cancel` drives,
    // without a live receive loop so the assertions aren't racing the
    // handler's own response on the same transaction.
    let transport = Arc::new(MockTransport::new("127.0.0.1:5061".parse().unwrap()));
    let transport_dyn: Arc<dyn Transport> = transport.clone();

    let mut req = Request::new(SipMethod::Invite, localhost(5060));
    let mut via = Via::new(TransportKind::Udp, HostPort::new(Host::IpAddr(IpAddr::V4(Ipv4Addr::LOCALHOST)), Some(5061)));
    via.set_branch("z9hG4bK-e2e-cancel");
    req.headers.push(Header::Via(via));
    req.headers.push(Header::CallId(sipcore::headers::CallId::new("call-cancel")));

    let layer = TransactionLayer::new();
    let (owner_tx, _owner_rx) = tokio::sync::mpsc::channel(8);
    let tsx = Transaction::new_server_invite(req.clone(), "127.0.0.1:5060".parse().unwrap(), transport_dyn, layer.clone(), owner_tx)
        .await
        .expect("server invite transaction");
    layer.insert(tsx.clone());
    assert_eq!(transport.sent_count(), 1); // 100 Trying

    // CANCEL arrives before any final: the dispatcher answers it with 200
    // directly (not modeled here, it never touches this transaction) and
    // sends 487 through the INVITE transaction.
    let terminated = Response::new(sipcore::message::StatusLine::from_code(StatusCode::REQUEST_TERMINATED));
    tsx.respond(terminated).await.unwrap();
    assert_eq!(transport.sent_count(), 2);
    assert_eq!(tsx.last_response().unwrap().code(), StatusCode::REQUEST_TERMINATED);

    let ack = Request::new(SipMethod::Ack, localhost(5060));
    tsx.on_ack(ack).await;
    assert_eq!(tsx.state(), sipcore::transaction::State::Confirmed);

    // Timer I (T4 = 5s default) drains retransmissions, then terminates.
    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(layer.find(tsx.key()).is_none());
}

#[test]
fn scenario6_dialog_bye_after_early_media() {
    let mut req = Request::new(SipMethod::Invite, Uri::default());
    let mut from_na = NameAddr::new(Uri::default());
    from_na.params.push(sipcore::message::Param::new("tag", Some("caller-tag")));
    req.headers.push(Header::From(sipcore::headers::From::new(from_na)));
    req.headers.push(Header::To(sipcore::headers::To::new(NameAddr::new(Uri::default()))));
    req.headers.push(Header::CallId(sipcore::headers::CallId::new("call-early")));
    req.headers.push(Header::CSeq(sipcore::headers::CSeq::new(1, SipMethod::Invite)));

    let dialog = Dialog::new_uas(&req, "callee-tag", Uri::default()).unwrap();
    assert_eq!(dialog.state(), DialogState::Early);

    // A UAS rejects an in-dialog BYE while the dialog is still early
    // (no 2xx/ACK exchanged yet) with 481 — modeled here as the predicate
    // a handler would gate on before accepting the request.
    let bye_accepted_while_early = dialog.state() == DialogState::Confirmed;
    assert!(!bye_accepted_while_early);

    dialog.confirm();
    assert_eq!(dialog.state(), DialogState::Confirmed);
    let bye_accepted_once_confirmed = dialog.state() == DialogState::Confirmed;
    assert!(bye_accepted_once_confirmed);
}
