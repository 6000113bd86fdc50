//! Typed SIP headers. Each header module implements `parse(&str) -> Result<Self>`
//! and `Display`; unrecognized header names fall back to [`OtherHeader`].

mod accept;
mod allow;
mod call_id;
mod contact;
mod content_length;
mod content_type;
mod cseq;
mod event;
mod expires;
mod from;
mod max_forwards;
mod record_route;
mod refer_to;
mod route;
mod subject;
mod subscription_state;
mod supported;
mod to;
mod via;

pub use accept::Accept;
pub use allow::Allow;
pub use call_id::CallId;
pub use contact::Contact;
pub use content_length::ContentLength;
pub use content_type::ContentType;
pub use cseq::CSeq;
pub use event::Event;
pub use expires::Expires;
pub use from::From;
pub use max_forwards::MaxForwards;
pub use record_route::RecordRoute;
pub use refer_to::ReferTo;
pub use route::Route;
pub use subject::Subject;
pub use subscription_state::SubscriptionState;
pub use supported::Supported;
pub use to::To;
pub use via::Via;

use std::fmt;

/// A header with no dedicated typed representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherHeader {
    pub name: String,
    pub value: String,
}

impl fmt::Display for OtherHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// A single parsed SIP header. `Via`, `Contact`, `Route` and `Record-Route`
/// are the ones the spec expects to appear as repeatable, ordered entries;
/// [`Headers`] is the multimap that preserves that order across the whole
/// message.
#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    Via(Via),
    From(From),
    To(To),
    CSeq(CSeq),
    CallId(CallId),
    Contact(Contact),
    Route(Route),
    RecordRoute(RecordRoute),
    MaxForwards(MaxForwards),
    Allow(Allow),
    Supported(Supported),
    ContentType(ContentType),
    ContentLength(ContentLength),
    Expires(Expires),
    Accept(Accept),
    Subject(Subject),
    Event(Event),
    SubscriptionState(SubscriptionState),
    ReferTo(ReferTo),
    Other(OtherHeader),
}

macro_rules! header_name {
    ($self:expr, { $($variant:ident => $name:expr),* $(,)? }) => {
        match $self {
            $( Header::$variant(_) => $name, )*
            Header::Other(o) => &o.name,
        }
    };
}

impl Header {
    pub fn name(&self) -> &str {
        header_name!(self, {
            Via => "Via",
            From => "From",
            To => "To",
            CSeq => "CSeq",
            CallId => "Call-ID",
            Contact => "Contact",
            Route => "Route",
            RecordRoute => "Record-Route",
            MaxForwards => "Max-Forwards",
            Allow => "Allow",
            Supported => "Supported",
            ContentType => "Content-Type",
            ContentLength => "Content-Length",
            Expires => "Expires",
            Accept => "Accept",
            Subject => "Subject",
            Event => "Event",
            SubscriptionState => "Subscription-State",
            ReferTo => "Refer-To",
        })
    }

    pub fn as_via(&self) -> Option<&Via> {
        if let Header::Via(v) = self { Some(v) } else { None }
    }
    pub fn as_from(&self) -> Option<&From> {
        if let Header::From(v) = self { Some(v) } else { None }
    }
    pub fn as_to(&self) -> Option<&To> {
        if let Header::To(v) = self { Some(v) } else { None }
    }
    pub fn as_cseq(&self) -> Option<&CSeq> {
        if let Header::CSeq(v) = self { Some(v) } else { None }
    }
    pub fn as_call_id(&self) -> Option<&CallId> {
        if let Header::CallId(v) = self { Some(v) } else { None }
    }
    pub fn as_contact(&self) -> Option<&Contact> {
        if let Header::Contact(v) = self { Some(v) } else { None }
    }
    pub fn as_route(&self) -> Option<&Route> {
        if let Header::Route(v) = self { Some(v) } else { None }
    }
    pub fn as_record_route(&self) -> Option<&RecordRoute> {
        if let Header::RecordRoute(v) = self { Some(v) } else { None }
    }
    pub fn as_max_forwards(&self) -> Option<&MaxForwards> {
        if let Header::MaxForwards(v) = self { Some(v) } else { None }
    }
    pub fn as_content_length(&self) -> Option<&ContentLength> {
        if let Header::ContentLength(v) = self { Some(v) } else { None }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::Via(h) => write!(f, "Via: {h}"),
            Header::From(h) => write!(f, "From: {h}"),
            Header::To(h) => write!(f, "To: {h}"),
            Header::CSeq(h) => write!(f, "CSeq: {h}"),
            Header::CallId(h) => write!(f, "Call-ID: {h}"),
            Header::Contact(h) => write!(f, "Contact: {h}"),
            Header::Route(h) => write!(f, "Route: {h}"),
            Header::RecordRoute(h) => write!(f, "Record-Route: {h}"),
            Header::MaxForwards(h) => write!(f, "Max-Forwards: {h}"),
            Header::Allow(h) => write!(f, "Allow: {h}"),
            Header::Supported(h) => write!(f, "Supported: {h}"),
            Header::ContentType(h) => write!(f, "Content-Type: {h}"),
            Header::ContentLength(h) => write!(f, "Content-Length: {h}"),
            Header::Expires(h) => write!(f, "Expires: {h}"),
            Header::Accept(h) => write!(f, "Accept: {h}"),
            Header::Subject(h) => write!(f, "Subject: {h}"),
            Header::Event(h) => write!(f, "Event: {h}"),
            Header::SubscriptionState(h) => write!(f, "Subscription-State: {h}"),
            Header::ReferTo(h) => write!(f, "Refer-To: {h}"),
            Header::Other(h) => write!(f, "{h}"),
        }
    }
}

/// An ordered multimap of [`Header`]s, preserving wire order per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, header: Header) {
        self.0.push(header);
    }

    pub fn append(&mut self, other: &mut Headers) {
        self.0.append(&mut other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn retain(&mut self, f: impl FnMut(&Header) -> bool) {
        self.0.retain(f);
    }

    /// All `Via` entries, top (first sent) first.
    pub fn via_all(&self) -> impl Iterator<Item = &Via> {
        self.0.iter().filter_map(Header::as_via)
    }

    pub fn top_via(&self) -> Option<&Via> {
        self.via_all().next()
    }

    pub fn top_via_mut(&mut self) -> Option<&mut Via> {
        self.0.iter_mut().find_map(|h| if let Header::Via(v) = h { Some(v) } else { None })
    }

    pub fn from(&self) -> Option<&From> {
        self.0.iter().find_map(Header::as_from)
    }

    pub fn to(&self) -> Option<&To> {
        self.0.iter().find_map(Header::as_to)
    }

    pub fn to_mut(&mut self) -> Option<&mut To> {
        self.0.iter_mut().find_map(|h| if let Header::To(v) = h { Some(v) } else { None })
    }

    pub fn cseq(&self) -> Option<&CSeq> {
        self.0.iter().find_map(Header::as_cseq)
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.0.iter().find_map(Header::as_call_id)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.0.iter().filter_map(Header::as_contact)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.0.iter().filter_map(Header::as_route)
    }

    pub fn record_routes(&self) -> impl Iterator<Item = &RecordRoute> {
        self.0.iter().filter_map(Header::as_record_route)
    }

    pub fn max_forwards(&self) -> Option<&MaxForwards> {
        self.0.iter().find_map(Header::as_max_forwards)
    }

    pub fn content_length(&self) -> Option<i64> {
        self.0.iter().find_map(Header::as_content_length).map(|c| c.0)
    }

    pub fn has_required_request_headers(&self) -> bool {
        self.top_via().is_some()
            && self.from().is_some()
            && self.to().is_some()
            && self.call_id().is_some()
            && self.cseq().is_some()
            && self.max_forwards().is_some()
    }

    /// Produces header lines in the canonical wire order demanded by the
    /// external-interfaces contract: `Via`, `Max-Forwards`, `From`, `To`,
    /// `Call-ID`, `CSeq`, then the rest in definition order, `Content-Length`
    /// last.
    pub fn canonical_lines(&self, body_len: usize, freeze_content_length: bool) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.0.len() + 1);
        let mut rest = Vec::new();
        let mut content_length: Option<i64> = None;

        for h in &self.0 {
            match h {
                Header::Via(_) => lines.push(h.to_string()),
                _ => rest.push(h),
            }
        }
        for kind in ["Max-Forwards", "From", "To", "Call-ID", "CSeq"] {
            if let Some(pos) = rest.iter().position(|h| h.name() == kind) {
                lines.push(rest.remove(pos).to_string());
            }
        }
        for h in rest {
            if let Header::ContentLength(c) = h {
                content_length = Some(c.0);
                continue;
            }
            lines.push(h.to_string());
        }

        let len = if freeze_content_length {
            content_length.unwrap_or(body_len as i64)
        } else {
            body_len as i64
        };
        lines.push(format!("Content-Length: {len}"));
        lines
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.canonical_lines(0, true) {
            writeln!(f, "{line}\r")?;
        }
        Ok(())
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Headers(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Header; N]> for Headers {
    fn from(arr: [Header; N]) -> Self {
        Headers(arr.into_iter().collect())
    }
}
