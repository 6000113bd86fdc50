//! SIP message types: the request/response envelope, status/request lines,
//! the method and status-code enums, the URI model and generic parameters.

mod code;
mod method;
mod params;
mod protocol;
mod uri;

pub use code::StatusCode;
pub use method::{MethodSet, SipMethod};
pub use params::{Param, Params};
pub use protocol::TransportKind;
pub use uri::{Host, HostPort, NameAddr, Scheme, Uri, UriBuilder, UserInfo};

use std::net::SocketAddr;

use crate::headers::Headers;

/// Where a message came from and which local socket received it.
///
/// Set by the transport adapter on every inbound message; carried alongside
/// the parsed message so that NAT handling and symmetric response routing
/// (RFC 3261 §18.2.1/§18.2.2, RFC 3581) have the information they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub transport: TransportKind,
}

/// A parsed SIP message: either a [`Request`] or a [`Response`].
#[derive(Debug, Clone)]
pub enum SipMsg {
    Request(Request),
    Response(Response),
}

impl SipMsg {
    pub fn is_request(&self) -> bool {
        matches!(self, SipMsg::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, SipMsg::Response(_))
    }

    pub fn request(&self) -> Option<&Request> {
        match self {
            SipMsg::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            SipMsg::Response(r) => Some(r),
            _ => None,
        }
    }

    pub fn headers(&self) -> &Headers {
        match self {
            SipMsg::Request(r) => &r.headers,
            SipMsg::Response(r) => &r.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            SipMsg::Request(r) => &mut r.headers,
            SipMsg::Response(r) => &mut r.headers,
        }
    }

    pub fn body(&self) -> Option<&[u8]> {
        match self {
            SipMsg::Request(r) => r.body.as_deref(),
            SipMsg::Response(r) => r.body.as_deref(),
        }
    }

    pub fn source(&self) -> Option<Source> {
        match self {
            SipMsg::Request(r) => r.source,
            SipMsg::Response(r) => r.source,
        }
    }
}

impl From<Request> for SipMsg {
    fn from(r: Request) -> Self {
        SipMsg::Request(r)
    }
}

impl From<Response> for SipMsg {
    fn from(r: Response) -> Self {
        SipMsg::Response(r)
    }
}

impl std::fmt::Display for SipMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SipMsg::Request(r) => r.fmt(f),
            SipMsg::Response(r) => r.fmt(f),
        }
    }
}

pub const SIPV2: &str = "SIP/2.0";

/// `Method Request-URI SIP/2.0`.
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: SipMethod,
    pub uri: Uri,
}

impl std::fmt::Display for RequestLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {SIPV2}", self.method, self.uri)
    }
}

/// `SIP/2.0 Code Reason`.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub code: StatusCode,
    pub reason: String,
}

impl StatusLine {
    pub fn new(code: impl Into<StatusCode>, reason: impl Into<String>) -> Self {
        let code = code.into();
        StatusLine { code, reason: reason.into() }
    }

    pub fn from_code(code: impl Into<StatusCode>) -> Self {
        let code = code.into();
        let reason = code.reason().to_string();
        StatusLine { code, reason }
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SIPV2} {} {}", self.code.0, self.reason)
    }
}

/// A parsed (or to-be-serialized) SIP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub req_line: RequestLine,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub source: Option<Source>,
}

impl Request {
    pub fn new(method: SipMethod, uri: Uri) -> Self {
        Request {
            req_line: RequestLine { method, uri },
            headers: Headers::new(),
            body: None,
            source: None,
        }
    }

    pub fn method(&self) -> SipMethod {
        self.req_line.method
    }

    pub fn uri(&self) -> &Uri {
        &self.req_line.uri
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}\r", self.req_line)?;
        let body_len = self.body.as_deref().map_or(0, <[u8]>::len);
        for line in self.headers.canonical_lines(body_len, false) {
            writeln!(f, "{line}\r")?;
        }
        writeln!(f, "\r")?;
        if let Some(body) = &self.body {
            f.write_str(&String::from_utf8_lossy(body))?;
        }
        Ok(())
    }
}

/// A parsed (or to-be-serialized) SIP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_line: StatusLine,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub source: Option<Source>,
}

impl Response {
    pub fn new(status_line: StatusLine) -> Self {
        Response {
            status_line,
            headers: Headers::new(),
            body: None,
            source: None,
        }
    }

    pub fn code(&self) -> StatusCode {
        self.status_line.code
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}\r", self.status_line)?;
        let body_len = self.body.as_deref().map_or(0, <[u8]>::len);
        for line in self.headers.canonical_lines(body_len, false) {
            writeln!(f, "{line}\r")?;
        }
        writeln!(f, "\r")?;
        if let Some(body) = &self.body {
            f.write_str(&String::from_utf8_lossy(body))?;
        }
        Ok(())
    }
}
