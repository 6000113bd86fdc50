//! RFC 3261 §12: dialog lifecycle (early -> confirmed -> terminated), the
//! route set captured from `Record-Route` at creation, and in-dialog
//! request construction. Grounded on the dialog module's `Dialog`/`Inner`
//! shape (`Arc<Inner>`, `Mutex<DialogState>`, atomic sequence numbers,
//! `DialogId` keyed off Call-ID + tags), generalized to the owned-data
//! model and registered in a process-wide [`DialogManager`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::headers::Header;
use crate::message::{Request, Response, SipMethod, Uri};
use crate::transaction::Role;

/// Call-ID + local tag + remote tag: the RFC 3261 §12 dialog identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialogId {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: String,
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};local={};remote={}", self.call_id, self.local_tag, self.remote_tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Early,
    Confirmed,
    Terminated,
}

struct Inner {
    id: DialogId,
    role: Role,
    state: Mutex<DialogState>,
    local_seq: AtomicU32,
    remote_seq: Mutex<Option<u32>>,
    local_uri: Uri,
    remote_uri: Uri,
    remote_target: Mutex<Uri>,
    /// Captured once from `Record-Route` at dialog creation (RFC 3261
    /// §12.1.1/§12.1.2) and never recomputed; already in the order this
    /// side must send it back in (reversed relative to how it arrived, for
    /// the UAS side).
    route_set: Vec<Uri>,
    secure: bool,
}

/// A confirmed or early SIP dialog. Cheap to clone (`Arc` handle).
#[derive(Clone)]
pub struct Dialog(Arc<Inner>);

impl Dialog {
    /// Builds the dialog a UAS forms on sending/receiving a to-tagged
    /// response to a dialog-forming request (RFC 3261 §12.1.1).
    pub fn new_uas(request: &Request, local_tag: &str, contact: Uri) -> Result<Dialog> {
        if !request.method().can_establish_dialog() {
            return Err(Error::Protocol(format!("{} cannot establish a dialog", request.method())));
        }
        let from = request.headers.from().ok_or_else(|| Error::Protocol("missing From".into()))?;
        let to = request.headers.to().ok_or_else(|| Error::Protocol("missing To".into()))?;
        let call_id = request.headers.call_id().ok_or_else(|| Error::Protocol("missing Call-ID".into()))?;
        let remote_tag = from.tag().ok_or_else(|| Error::Protocol("From has no tag".into()))?.to_string();

        let id = DialogId { call_id: call_id.0.clone(), local_tag: local_tag.to_string(), remote_tag };
        let route_set = route_set_from(&request.headers, Role::Server);
        let remote_target = request
            .headers
            .contacts()
            .next()
            .and_then(|c| c.first())
            .map(|na| na.uri.clone())
            .unwrap_or_else(|| request.uri().clone());

        Ok(Dialog(Arc::new(Inner {
            id,
            role: Role::Server,
            state: Mutex::new(DialogState::Early),
            local_seq: AtomicU32::new(0),
            remote_seq: Mutex::new(Some(request.headers.cseq().map(|c| c.seq).unwrap_or(0))),
            local_uri: to.0.uri.clone(),
            remote_uri: from.0.uri.clone(),
            remote_target: Mutex::new(remote_target),
            route_set,
            secure: contact.scheme == crate::message::Scheme::Sips,
        })))
    }

    /// Builds the dialog a UAC forms on receiving a to-tagged 1xx/2xx to a
    /// dialog-forming request (RFC 3261 §12.1.2).
    pub fn new_uac(request: &Request, response: &Response, contact: Uri) -> Result<Dialog> {
        let to = response.headers.to().ok_or_else(|| Error::Protocol("missing To".into()))?;
        let call_id = response.headers.call_id().ok_or_else(|| Error::Protocol("missing Call-ID".into()))?;
        let remote_tag = to.tag().ok_or_else(|| Error::Protocol("To has no tag".into()))?.to_string();
        let local_tag = request.headers.from().and_then(|f| f.tag()).ok_or_else(|| Error::Protocol("From has no tag".into()))?.to_string();

        let id = DialogId { call_id: call_id.0.clone(), local_tag, remote_tag };
        let route_set = route_set_from(&response.headers, Role::Client);
        let remote_target = response
            .headers
            .contacts()
            .next()
            .and_then(|c| c.first())
            .map(|na| na.uri.clone())
            .unwrap_or_else(|| to.0.uri.clone());
        let state = if response.code().is_success() { DialogState::Confirmed } else { DialogState::Early };

        Ok(Dialog(Arc::new(Inner {
            id,
            role: Role::Client,
            state: Mutex::new(state),
            local_seq: AtomicU32::new(request.headers.cseq().map(|c| c.seq).unwrap_or(0)),
            remote_seq: Mutex::new(None),
            local_uri: request.headers.from().map(|f| f.0.uri.clone()).unwrap_or_else(|| request.uri().clone()),
            remote_uri: to.0.uri.clone(),
            remote_target: Mutex::new(remote_target),
            route_set,
            secure: contact.scheme == crate::message::Scheme::Sips,
        })))
    }

    pub fn id(&self) -> &DialogId {
        &self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn state(&self) -> DialogState {
        *self.0.state.lock().expect("lock poisoned")
    }

    pub fn set_state(&self, state: DialogState) {
        *self.0.state.lock().expect("lock poisoned") = state;
    }

    pub fn confirm(&self) {
        self.set_state(DialogState::Confirmed);
    }

    pub fn terminate(&self) {
        self.set_state(DialogState::Terminated);
    }

    pub fn remote_target(&self) -> Uri {
        self.0.remote_target.lock().expect("lock poisoned").clone()
    }

    /// A target-refresh request/response (re-INVITE, UPDATE, any 2xx with a
    /// `Contact`) updates the URI future in-dialog requests are sent to
    /// (RFC 3261 §12.2.1.2 / §12.2.2).
    pub fn set_remote_target(&self, uri: Uri) {
        *self.0.remote_target.lock().expect("lock poisoned") = uri;
    }

    pub fn route_set(&self) -> &[Uri] {
        &self.0.route_set
    }

    pub fn next_local_cseq(&self) -> u32 {
        self.0.local_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Validates and records an in-dialog request's CSeq (RFC 3261
    /// §12.2.2): it must be greater than the last one seen, else the
    /// request is out of order and must be rejected with 500.
    pub fn accept_remote_cseq(&self, cseq: u32) -> bool {
        let mut slot = self.0.remote_seq.lock().expect("lock poisoned");
        match *slot {
            Some(last) if cseq <= last => false,
            _ => {
                *slot = Some(cseq);
                true
            }
        }
    }

    /// Builds an in-dialog request addressed to the current remote target,
    /// with the dialog's route set applied as `Route` headers. Every
    /// in-dialog method gets the route set applied the same way, including
    /// ACK: a UAC that drops the route set on ACK specifically will route
    /// off the signaling path the rest of the dialog uses, so there is no
    /// special case for it here.
    pub fn build_request(&self, method: SipMethod) -> Request {
        let target = if self.0.route_set.is_empty() { self.remote_target() } else { self.0.route_set[0].clone() };
        let mut req = Request::new(method, target);

        let mut from_na = crate::message::NameAddr::new(self.0.local_uri.clone());
        from_na.params.push(crate::message::Param::new("tag", Some(self.0.id.local_tag.clone())));
        req.headers.push(Header::From(crate::headers::From::new(from_na)));

        let mut to_na = crate::message::NameAddr::new(self.0.remote_uri.clone());
        to_na.params.push(crate::message::Param::new("tag", Some(self.0.id.remote_tag.clone())));
        req.headers.push(Header::To(crate::headers::To::new(to_na)));

        req.headers.push(Header::CallId(crate::headers::CallId::new(self.0.id.call_id.clone())));
        req.headers.push(Header::CSeq(crate::headers::CSeq::new(self.next_local_cseq(), method)));
        req.headers.push(Header::MaxForwards(crate::headers::MaxForwards::DEFAULT));

        for route in &self.0.route_set {
            req.headers.push(Header::Route(crate::headers::Route(vec![crate::message::NameAddr::new(route.clone())])));
        }

        req
    }

    pub fn is_secure(&self) -> bool {
        self.0.secure
    }
}

/// Captures the dialog route set from `Record-Route`, in the order this
/// role must send it back in: a UAS reverses the order it received the
/// headers in (RFC 3261 §12.1.1), a UAC keeps it as received.
fn route_set_from(headers: &crate::headers::Headers, role: Role) -> Vec<Uri> {
    let mut uris: Vec<Uri> = headers
        .record_routes()
        .flat_map(|rr| rr.0.iter())
        .map(|na| na.uri.clone())
        .collect();
    if role == Role::Server {
        uris.reverse();
    }
    uris
}

/// Process-wide dialog registry (spec §5): every in-dialog request looks a
/// dialog up here by [`DialogId`] before anything else happens to it.
#[derive(Clone, Default)]
pub struct DialogManager {
    map: Arc<DashMap<DialogId, Dialog>>,
}

impl DialogManager {
    pub fn new() -> Self {
        DialogManager::default()
    }

    pub fn insert(&self, dialog: Dialog) {
        self.map.insert(dialog.id().clone(), dialog);
    }

    pub fn find(&self, id: &DialogId) -> Option<Dialog> {
        self.map.get(id).map(|e| e.value().clone())
    }

    pub fn remove(&self, id: &DialogId) {
        self.map.remove(id);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{CSeq, CallId, Contact, From as FromHeader, To as ToHeader};
    use crate::message::{NameAddr, Param, StatusCode, StatusLine};

    fn invite_with_tag(call_id: &str, from_tag: &str) -> Request {
        let mut req = Request::new(SipMethod::Invite, Uri::default());
        let mut from_na = NameAddr::new(Uri::default());
        from_na.params.push(Param::new("tag", Some(from_tag.to_string())));
        req.headers.push(Header::From(FromHeader::new(from_na)));
        req.headers.push(Header::To(ToHeader::new(NameAddr::new(Uri::default()))));
        req.headers.push(Header::CallId(CallId::new(call_id)));
        req.headers.push(Header::CSeq(CSeq::new(1, SipMethod::Invite)));
        req.headers.push(Header::Contact(Contact::Addr(vec![NameAddr::new(Uri::default())])));
        req
    }

    #[test]
    fn uas_dialog_requires_from_tag() {
        let mut req = Request::new(SipMethod::Invite, Uri::default());
        req.headers.push(Header::From(FromHeader::new(NameAddr::new(Uri::default()))));
        req.headers.push(Header::CallId(CallId::new("abc")));
        assert!(Dialog::new_uas(&req, "local-tag", Uri::default()).is_err());
    }

    #[test]
    fn uas_dialog_starts_early() {
        let req = invite_with_tag("call-1", "remote-tag");
        let dialog = Dialog::new_uas(&req, "local-tag", Uri::default()).unwrap();
        assert_eq!(dialog.state(), DialogState::Early);
        assert_eq!(dialog.id().remote_tag, "remote-tag");
        assert_eq!(dialog.id().local_tag, "local-tag");
    }

    #[test]
    fn out_of_order_cseq_is_rejected() {
        let req = invite_with_tag("call-2", "remote-tag");
        let dialog = Dialog::new_uas(&req, "local-tag", Uri::default()).unwrap();
        assert!(dialog.accept_remote_cseq(2));
        assert!(!dialog.accept_remote_cseq(2));
        assert!(!dialog.accept_remote_cseq(1));
        assert!(dialog.accept_remote_cseq(3));
    }

    #[test]
    fn confirmed_uac_dialog_from_2xx() {
        let req = invite_with_tag("call-3", "unused");
        let mut resp = Response::new(StatusLine::from_code(StatusCode::OK));
        let mut to_na = NameAddr::new(Uri::default());
        to_na.params.push(Param::new("tag", Some("uas-tag".to_string())));
        resp.headers.push(Header::To(ToHeader::new(to_na)));
        resp.headers.push(Header::CallId(CallId::new("call-3")));
        let dialog = Dialog::new_uac(&req, &resp, Uri::default()).unwrap();
        assert_eq!(dialog.state(), DialogState::Confirmed);
    }

    #[test]
    fn build_request_carries_route_set_for_ack() {
        let mut req = invite_with_tag("call-4", "remote-tag");
        req.headers.push(Header::RecordRoute(crate::headers::RecordRoute(vec![NameAddr::new(Uri::default())])));
        let dialog = Dialog::new_uas(&req, "local-tag", Uri::default()).unwrap();
        assert_eq!(dialog.route_set().len(), 1);

        let ack = dialog.build_request(SipMethod::Ack);
        assert_eq!(ack.headers.routes().count(), 1);
    }
}
