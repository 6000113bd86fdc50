//! The SIP handler contract (spec §4.6 / §6): the extension point an
//! application plugs request/response processing into, grounded on the
//! teacher's `EndpointHandler`/`SipService` trait — a name-plus-callbacks
//! trait with permissive default bodies a service overrides selectively.

use async_trait::async_trait;

use crate::dialog::Dialog;
use crate::message::{Request, Response, StatusCode};

/// What a [`SipHandler`] wants done with a request it was asked about.
#[derive(Debug, Clone)]
pub enum HandlerAction {
    /// Send this response through the transaction/dialog layer.
    Respond(Response),
    /// Forward the request onward to `target` (proxy behavior); out of
    /// scope for this handler contract beyond the enum shape (spec non-goal:
    /// full proxy/registrar logic), but handlers that just forward to a
    /// dialog-internal media/app layer use it for readability.
    Proxy(crate::message::Uri),
    /// The handler chose to respond asynchronously (e.g. after user
    /// interaction) and will call back into the endpoint itself; no action
    /// needed from the dispatcher now.
    NoReply,
}

/// Called once per inbound request with the method-matching dispatch the
/// teacher's `EndpointHandler` does (one optional callback per concern),
/// defaulting to `405 Method Not Allowed` for anything not overridden.
#[async_trait]
pub trait SipHandler: Send + Sync + 'static {
    fn name(&self) -> &str {
        "sip-handler"
    }

    /// A request that doesn't yet belong to a dialog.
    async fn on_request(&self, request: &Request) -> HandlerAction {
        let _ = request;
        HandlerAction::Respond(method_not_allowed(request))
    }

    /// A request that matched an existing dialog.
    async fn on_in_dialog_request(&self, dialog: &Dialog, request: &Request) -> HandlerAction {
        let _ = (dialog, request);
        HandlerAction::Respond(method_not_allowed(request))
    }

    /// A CANCEL matched an existing INVITE server transaction; the handler
    /// decides whether the original INVITE should now be answered 487.
    async fn on_cancel(&self, dialog: Option<&Dialog>, original: &Request) {
        let _ = (dialog, original);
    }

    /// A response arrived for a request this handler originated (UAC role).
    async fn on_response(&self, dialog: Option<&Dialog>, response: &Response) {
        let _ = (dialog, response);
    }

    /// The dialog this handler is party to was torn down, by either side.
    async fn on_dialog_terminated(&self, dialog: &Dialog) {
        let _ = dialog;
    }
}

/// A handler that accepts every default: every request gets 405, CANCEL and
/// responses are silently observed. Used when an [`crate::endpoint::Endpoint`]
/// is built without an explicit handler.
pub struct DefaultHandler;

#[async_trait]
impl SipHandler for DefaultHandler {
    fn name(&self) -> &str {
        "default-handler"
    }
}

fn method_not_allowed(request: &Request) -> Response {
    let mut resp = Response::new(crate::message::StatusLine::from_code(StatusCode::METHOD_NOT_ALLOWED));
    resp.headers = request.headers.clone();
    resp.headers.retain(|h| {
        matches!(
            h,
            crate::headers::Header::Via(_)
                | crate::headers::Header::From(_)
                | crate::headers::Header::To(_)
                | crate::headers::Header::CallId(_)
                | crate::headers::Header::CSeq(_)
        )
    });
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{SipMethod, Uri};

    struct NoopHandler;
    #[async_trait]
    impl SipHandler for NoopHandler {}

    #[tokio::test]
    async fn default_handler_rejects_unhandled_requests() {
        let handler = NoopHandler;
        let req = Request::new(SipMethod::Invite, Uri::default());
        match handler.on_request(&req).await {
            HandlerAction::Respond(resp) => assert_eq!(resp.code(), StatusCode::METHOD_NOT_ALLOWED),
            _ => panic!("expected a Respond action"),
        }
    }
}
