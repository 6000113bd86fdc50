use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use sipcore::dialog::Dialog;
use sipcore::handler::HandlerAction;
use sipcore::headers::{Contact as ContactHeader, Header};
use sipcore::message::{NameAddr, Request, SipMethod, StatusCode};
use sipcore::{Endpoint, SipHandler};
use tracing::Level;

fn next_local_tag() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("uas-{:x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Answers an out-of-dialog INVITE with 200 OK, forms the dialog, and hangs
/// up on any in-dialog BYE. Everything else out-of-dialog falls through to
/// the default 405.
struct Uas {
    endpoint: OnceLock<Endpoint>,
}

impl Uas {
    fn endpoint(&self) -> &Endpoint {
        self.endpoint.get().expect("endpoint set before first request is dispatched")
    }
}

#[async_trait]
impl SipHandler for Uas {
    fn name(&self) -> &str {
        "simple-dialog-uas"
    }

    async fn on_request(&self, request: &Request) -> HandlerAction {
        if request.method() != SipMethod::Invite {
            return HandlerAction::Respond(self.endpoint().new_response_for(request, StatusCode::METHOD_NOT_ALLOWED));
        }
        let endpoint = self.endpoint();
        let contact = endpoint.contact().clone();
        let dialog = match Dialog::new_uas(request, &next_local_tag(), contact.clone()) {
            Ok(d) => d,
            Err(_) => return HandlerAction::Respond(endpoint.new_response_for(request, StatusCode::BAD_REQUEST)),
        };
        dialog.confirm();
        endpoint.register_dialog(dialog);

        let mut ok = endpoint.new_response_for(request, StatusCode::OK);
        ok.headers.push(Header::Contact(ContactHeader::addr(NameAddr::new(contact))));
        HandlerAction::Respond(ok)
    }

    async fn on_in_dialog_request(&self, dialog: &Dialog, request: &Request) -> HandlerAction {
        let endpoint = self.endpoint();
        if request.method() == SipMethod::Bye {
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

    let handler = Arc::new(Uas { endpoint: OnceLock::new() });
    let endpoint = Endpoint::builder().handler(handler.clone()).build().await?;
    let _ = handler.endpoint.set(endpoint.clone());

    println!("listening on {}", endpoint.local_addr());
    tokio::select! {
        res = endpoint.run() => { res?; }
        _ = tokio::signal::ctrl_c() => { println!(); }
    }
    Ok(())
}
