use std::error::Error;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use sipcore::dialog::Dialog;
use sipcore::handler::HandlerAction;
use sipcore::headers::{ContentType, Header};
use sipcore::media::codec::Codec;
use sipcore::media::{CodecNegotiationOutcome, MediaHandler, MediaSession, OfferAnswerOutcome, Role as MediaRole, RtpPortPool};
use sipcore::message::{Request, StatusCode};
use sipcore::{Endpoint, SipHandler};
use tracing::Level;

fn next_local_tag() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("media-uas-{:x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Logs every offer/answer and prefers Opus over PCMA/PCMU when both sides
/// support it; everything else keeps the default negotiation behavior.
struct LoggingMediaHandler;

#[async_trait]
impl MediaHandler for LoggingMediaHandler {
    async fn handle_offer(&mut self, sdp: &str, _direction: sipcore::media::MediaDirection) -> OfferAnswerOutcome {
        tracing::debug!(%sdp, "received offer");
        OfferAnswerOutcome::Ok(sdp.to_string())
    }

    async fn handle_codec_negotiation(&mut self, offered: &[Codec], supported: &[Codec]) -> CodecNegotiationOutcome {
        for preferred in Codec::DEFAULT_PREFERENCE {
            if offered.contains(&preferred) && supported.contains(&preferred) {
                return CodecNegotiationOutcome::Codec(preferred);
            }
        }
        CodecNegotiationOutcome::Error("no codec in common preference order".to_string())
    }

    async fn handle_negotiation_complete(&mut self, _local_sdp: &str, _remote_sdp: &str, codec: Codec) -> std::result::Result<(), String> {
        tracing::info!(?codec, "media negotiated");
        Ok(())
    }
}

struct Uas {
    endpoint: OnceLock<Endpoint>,
    port_pool: Arc<RtpPortPool>,
}

#[async_trait]
impl SipHandler for Uas {
    fn name(&self) -> &str {
        "uas-with-media"
    }

    async fn on_request(&self, request: &Request) -> HandlerAction {
        let endpoint = self.endpoint.get().expect("endpoint set before dispatch");
        if request.method() != sipcore::message::SipMethod::Invite {
            return HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::METHOD_NOT_ALLOWED));
        }
        let Some(offer) = request.body.as_deref().and_then(|b| std::str::from_utf8(b).ok()) else {
            return HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::NOT_ACCEPTABLE_HERE));
        };

        let session = MediaSession::new(
            MediaRole::Uas,
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            Codec::DEFAULT_PREFERENCE.to_vec(),
            self.port_pool.clone(),
            Box::new(LoggingMediaHandler),
            Duration::from_secs(5),
        );
        let answer = match session.process_offer(offer).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "media negotiation failed");
                return HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::NOT_ACCEPTABLE_HERE));
            }
        };
        if session.start_media().await.is_err() {
            return HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::SERVER_INTERNAL_ERROR));
        }

        let contact = endpoint.contact().clone();
        let dialog = match Dialog::new_uas(request, &next_local_tag(), contact) {
            Ok(d) => d,
            Err(_) => return HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::BAD_REQUEST)),
        };
        dialog.confirm();
        endpoint.register_dialog(dialog);

        let mut ok = endpoint.new_response_for(request, StatusCode::OK);
        ok.headers.push(Header::ContentType(ContentType::sdp()));
        ok.body = Some(answer.into_bytes());
        HandlerAction::Respond(ok)
    }

    async fn on_in_dialog_request(&self, dialog: &Dialog, request: &Request) -> HandlerAction {
        let endpoint = self.endpoint.get().expect("endpoint set before dispatch");
        if request.method() == sipcore::message::SipMethod::Bye {
            dialog.terminate();
            HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::OK))
        } else {
            HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::METHOD_NOT_ALLOWED))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).with_env_filter("sipcore=debug").init();

    let handler = Arc::new(Uas {
        endpoint: OnceLock::new(),
        port_pool: Arc::new(RtpPortPool::new((16384, 16484))),
    });
    let endpoint = Endpoint::builder().handler(handler.clone()).build().await?;
    let _ = handler.endpoint.set(endpoint.clone());

    println!("listening on {}", endpoint.local_addr());
    tokio::select! {
        res = endpoint.run() => { res?; }
        _ = tokio::signal::ctrl_c() => { println!(); }
    }
    Ok(())
}
