//! Hand-written byte-scanner parser for SIP messages, URIs and header
//! values. Built directly on [`sipcore_util::Scanner`] rather than a
//! parser-combinator crate, matching how this family of SIP stacks is
//! usually written: the grammar is small and performance-sensitive enough
//! that a combinator layer buys nothing.

use sipcore_util::{digits, space, token, util::is_valid_port, Scanner};

use crate::error::{Error, ParseError, Result};
use crate::headers::{Header, Headers};
use crate::message::{
    Host, HostPort, NameAddr, Param, Params, Request, RequestLine, Response, SipMethod, SipMsg,
    StatusCode, StatusLine, TransportKind, Uri, UserInfo,
};

macro_rules! parse_error {
    ($($arg:tt)*) => {
        Err(Error::Parse(ParseError {
            message: format!($($arg)*),
            line: 0,
            col: 0,
        }))
    };
}
pub(crate) use parse_error;

pub struct Parser<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Parser { scanner: Scanner::new(src) }
    }

    fn skip_ws(&mut self) {
        space!(self.scanner);
    }

    fn read_token_str(&mut self) -> Result<&'a str> {
        let bytes = token!(self.scanner);
        if bytes.is_empty() {
            return parse_error!("expected token");
        }
        std::str::from_utf8(bytes).map_err(|e| Error::Parse(e.into()))
    }

    pub fn parse_sip_version(&mut self) -> Result<()> {
        self.scanner
            .matches_slice(crate::message::SIPV2.as_bytes())
            .map_err(|e| Error::Parse(e.into()))
    }

    /// `user[:password]`. Only called once a lookahead has confirmed an
    /// `@` follows before any URI-terminating character.
    fn parse_userinfo(&mut self) -> Result<Option<UserInfo>> {
        let user = self.scanner.read_while(|b| b != b':' && b != b'@' && !sipcore_util::util::is_space(b));
        let user = std::str::from_utf8(user).map_err(|e| Error::Parse(e.into()))?;
        let password = if self.scanner.consume_if(|b| b == b':').is_some() {
            let pass = self.scanner.read_while(|b| b != b'@');
            Some(std::str::from_utf8(pass).map_err(|e| Error::Parse(e.into()))?)
        } else {
            None
        };
        self.scanner.must_read(b'@').map_err(|e| Error::Parse(e.into()))?;
        Ok(Some(UserInfo::new(user, password)))
    }

    pub fn parse_host_port(&mut self) -> Result<HostPort> {
        let host = if self.scanner.peek() == Some(&b'[') {
            self.scanner.bump_n(1);
            let inner = self.scanner.read_while(|b| b != b']');
            self.scanner.must_read(b']').map_err(|e| Error::Parse(e.into()))?;
            let s = std::str::from_utf8(inner).map_err(|e| Error::Parse(e.into()))?;
            Host::IpAddr(s.parse().map_err(|_| Error::Parse(format!("bad IPv6 literal: {s}").into()))?)
        } else {
            let raw = self.scanner.read_while(|b| b != b':' && b != b';' && b != b'?' && !sipcore_util::util::is_space(b) && b != b'>' && b != b',');
            let s = std::str::from_utf8(raw).map_err(|e| Error::Parse(e.into()))?;
            s.parse()?
        };
        let port = if self.scanner.consume_if(|b| b == b':').is_some() {
            let p: u32 = self.scanner.read_num().map_err(|e| Error::Parse(e.into()))?;
            if !is_valid_port(p) {
                return parse_error!("invalid port {p}");
            }
            Some(p as u16)
        } else {
            None
        };
        Ok(HostPort { host, port })
    }

    pub fn parse_param(&mut self) -> Result<Param> {
        let name = self.read_token_str()?;
        let value = if self.scanner.consume_if(|b| b == b'=').is_some() {
            if self.scanner.peek() == Some(&b'"') {
                Some(self.parse_quoted_string()?)
            } else {
                Some(self.read_token_str()?)
            }
        } else {
            None
        };
        Ok(Param::new(name, value))
    }

    /// Consumes a leading run of `;name[=value]` pairs.
    pub fn parse_params(&mut self) -> Result<Params> {
        let mut params = Params::new();
        while self.scanner.peek() == Some(&b';') {
            self.scanner.bump_n(1);
            params.push(self.parse_param()?);
        }
        Ok(params)
    }

    fn parse_quoted_string(&mut self) -> Result<&'a str> {
        self.scanner.must_read(b'"').map_err(|e| Error::Parse(e.into()))?;
        let inner = self.scanner.read_while(|b| b != b'"');
        self.scanner.must_read(b'"').map_err(|e| Error::Parse(e.into()))?;
        std::str::from_utf8(inner).map_err(|e| Error::Parse(e.into()))
    }

    pub fn parse_uri(&mut self) -> Result<Uri> {
        let scheme_bytes = self.scanner.read_while(|b| b != b':');
        let scheme = match scheme_bytes {
            b"sip" => crate::message::Scheme::Sip,
            b"sips" => crate::message::Scheme::Sips,
            other => {
                let s = String::from_utf8_lossy(other);
                return parse_error!("unsupported URI scheme: {s}");
            }
        };
        self.scanner.must_read(b':').map_err(|e| Error::Parse(e.into()))?;

        // lookahead for '@' before the next uri-terminating char to decide
        // whether there's a userinfo component.
        let has_userinfo = {
            let (ahead, _) = self.scanner.peek_while(|b| {
                !matches!(b, b';' | b'?' | b'>' | b',' | b' ' | b'\t' | b'\r' | b'\n')
            });
            ahead.contains(&b'@')
        };
        let user = if has_userinfo { self.parse_userinfo()? } else { None };

        let host_port = self.parse_host_port()?;

        let mut uri = Uri::new(scheme, user, host_port);
        while self.scanner.peek() == Some(&b';') {
            self.scanner.bump_n(1);
            let param = self.parse_param()?;
            match param.name.as_str() {
                "user" => uri.user_param = param.value,
                "method" => uri.method_param = param.value.as_deref().and_then(SipMethod::from_bytes_str),
                "transport" => uri.transport_param = param.value.as_deref().map(|v| v.as_bytes().into()),
                "ttl" => uri.ttl_param = param.value.as_deref().and_then(|v| v.parse().ok()),
                "maddr" => uri.maddr_param = param.value.as_deref().and_then(|v| v.parse::<Host>().ok()),
                "lr" => uri.lr_param = true,
                _ => uri.params.push(param),
            }
        }
        if self.scanner.consume_if(|b| b == b'?').is_some() {
            loop {
                let h = self.parse_param()?;
                uri.headers.push(h);
                if self.scanner.consume_if(|b| b == b'&').is_none() {
                    break;
                }
            }
        }
        Ok(uri)
    }

    /// `["display name"] "<" uri ">" *(";" param)` or a bare uri.
    pub fn parse_name_addr(&mut self) -> Result<NameAddr> {
        self.skip_ws();
        let display = if self.scanner.peek() == Some(&b'"') {
            Some(self.parse_quoted_string()?.to_string())
        } else {
            None
        };
        self.skip_ws();
        let uri = if self.scanner.peek() == Some(&b'<') {
            self.scanner.bump_n(1);
            let uri = self.parse_uri()?;
            self.scanner.must_read(b'>').map_err(|e| Error::Parse(e.into()))?;
            uri
        } else {
            self.parse_uri()?
        };
        let params = self.parse_params()?;
        Ok(NameAddr { display, uri, params })
    }

    pub fn parse_request_line(&mut self) -> Result<RequestLine> {
        let method_bytes = self.scanner.read_while(|b| b != b' ');
        let method = SipMethod::from_bytes(method_bytes).ok_or_else(|| {
            Error::Parse(format!("unknown method: {}", String::from_utf8_lossy(method_bytes)).into())
        })?;
        self.skip_ws();
        let uri_bytes = self.scanner.read_while(|b| b != b' ');
        let uri = Parser::new(uri_bytes).parse_uri()?;
        self.skip_ws();
        self.parse_sip_version()?;
        Ok(RequestLine { method, uri })
    }

    pub fn parse_status_line(&mut self) -> Result<StatusLine> {
        self.parse_sip_version()?;
        self.skip_ws();
        let code_digits = digits!(self.scanner);
        if code_digits.len() != 3 {
            return parse_error!("status code must be 3 digits");
        }
        let code: i32 = std::str::from_utf8(code_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Parse("malformed status code".into()))?;
        if !(100..=699).contains(&code) {
            return parse_error!("status code out of range");
        }
        self.skip_ws();
        let reason = self.scanner.remaining();
        let reason = std::str::from_utf8(reason).map_err(|e| Error::Parse(e.into()))?.trim_end();
        Ok(StatusLine::new(StatusCode(code), reason))
    }
}

impl SipMethod {
    fn from_bytes_str(s: &str) -> Option<SipMethod> {
        SipMethod::from_bytes(s.as_bytes())
    }
}

/// Splits `src` on the first `CRLF CRLF` (or bare `LF LF`), returning
/// `(start_line_and_headers, body)`.
fn split_head_body(src: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = src.windows(4).position(|w| w == b"\r\n\r\n") {
        (&src[..pos + 2], &src[pos + 4..])
    } else if let Some(pos) = src.windows(2).position(|w| w == b"\n\n") {
        (&src[..pos + 1], &src[pos + 2..])
    } else {
        (src, &[])
    }
}

fn split_lines(src: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < src.len() {
        if src[i] == b'\n' {
            let mut end = i;
            if end > start && src[end - 1] == b'\r' {
                end -= 1;
            }
            lines.push(&src[start..end]);
            start = i + 1;
        }
        i += 1;
    }
    if start < src.len() {
        lines.push(&src[start..]);
    }
    lines
}

/// Unfolds header continuation lines (leading whitespace) and splits the
/// remainder into `(name, value)` header lines, in wire order.
fn unfold_headers(lines: &[&[u8]]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if matches!(line.first(), Some(b' ') | Some(b'\t')) {
            if let Some((_, value)) = out.last_mut() {
                value.push(' ');
                value.push_str(String::from_utf8_lossy(line).trim());
            }
            continue;
        }
        if let Some(colon) = line.iter().position(|&b| b == b':') {
            let name = String::from_utf8_lossy(&line[..colon]).trim().to_string();
            let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();
            out.push((name, value));
        }
    }
    out
}

fn normalize_header_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn dispatch_header(name: &str, value: &str) -> Result<Header> {
    use crate::headers::*;
    let lname = normalize_header_name(name);
    Ok(match lname.as_str() {
        "via" | "v" => Header::Via(Via::parse(value)?),
        "from" | "f" => Header::From(From::parse(value)?),
        "to" | "t" => Header::To(To::parse(value)?),
        "cseq" => Header::CSeq(CSeq::parse(value)?),
        "call-id" | "i" => Header::CallId(CallId::parse(value)?),
        "contact" | "m" => Header::Contact(Contact::parse(value)?),
        "route" => Header::Route(Route::parse(value)?),
        "record-route" => Header::RecordRoute(RecordRoute::parse(value)?),
        "max-forwards" => Header::MaxForwards(MaxForwards::parse(value)?),
        "allow" => Header::Allow(Allow::parse(value)?),
        "supported" | "k" => Header::Supported(Supported::parse(value)?),
        "content-type" | "c" => Header::ContentType(ContentType::parse(value)?),
        "content-length" | "l" => Header::ContentLength(ContentLength::parse(value)?),
        "expires" => Header::Expires(Expires::parse(value)?),
        "accept" => Header::Accept(Accept::parse(value)?),
        "subject" | "s" => Header::Subject(Subject::parse(value)?),
        "event" | "o" => Header::Event(Event::parse(value)?),
        "subscription-state" => Header::SubscriptionState(SubscriptionState::parse(value)?),
        "refer-to" | "r" => Header::ReferTo(ReferTo::parse(value)?),
        _ => Header::Other(OtherHeader {
            name: name.to_string(),
            value: value.to_string(),
        }),
    })
}

/// Parses a complete SIP message (request or response) from `src`.
///
/// Duplicate `Via` values accumulate in top-down order; a malformed
/// individual header falls back to [`Header::Other`] rather than aborting
/// the whole parse, except for the small set of headers the transaction/
/// dialog layers require (`Via`, `From`, `To`, `Call-ID`, `CSeq`,
/// `Max-Forwards`), whose malformedness is propagated.
pub fn parse_message(src: &[u8]) -> Result<SipMsg> {
    let (head, body) = split_head_body(src);
    let lines = split_lines(head);
    let Some((first_line, header_lines)) = lines.split_first() else {
        return parse_error!("empty message");
    };

    let is_response = first_line.starts_with(crate::message::SIPV2.as_bytes());
    let header_pairs = unfold_headers(header_lines);

    let mut headers = Headers::new();
    for (name, value) in &header_pairs {
        let is_mandatory = matches!(
            normalize_header_name(name).as_str(),
            "via" | "v" | "from" | "f" | "to" | "t" | "call-id" | "i" | "cseq" | "max-forwards"
        );
        match dispatch_header(name, value) {
            Ok(h) => headers.push(h),
            Err(e) if is_mandatory => return Err(e),
            Err(_) => headers.push(Header::Other(crate::headers::OtherHeader {
                name: name.clone(),
                value: value.clone(),
            })),
        }
    }

    let body = match headers.content_length() {
        Some(len) if len < 0 => return parse_error!("negative Content-Length"),
        Some(len) if (len as usize) <= body.len() => body[..len as usize].to_vec(),
        _ => body.to_vec(),
    };
    let body = if body.is_empty() { None } else { Some(body) };

    if is_response {
        let status_line = Parser::new(first_line).parse_status_line()?;
        Ok(SipMsg::Response(Response {
            status_line,
            headers,
            body,
            source: None,
        }))
    } else {
        let req_line = Parser::new(first_line).parse_request_line()?;
        Ok(SipMsg::Request(Request {
            req_line,
            headers,
            body,
            source: None,
        }))
    }
}

/// Canonical serialization: `Via` first, then `Max-Forwards`, `From`, `To`,
/// `Call-ID`, `CSeq`, remaining headers in definition order, `Content-Length`
/// last, then the body. `Content-Length` is recomputed to the body length
/// unless `freeze_content_length` is set (proxy passthrough).
pub fn serialize_message(msg: &SipMsg, freeze_content_length: bool) -> Vec<u8> {
    let mut out = Vec::new();
    match msg {
        SipMsg::Request(r) => {
            out.extend_from_slice(r.req_line.to_string().as_bytes());
        }
        SipMsg::Response(r) => {
            out.extend_from_slice(r.status_line.to_string().as_bytes());
        }
    }
    out.extend_from_slice(b"\r\n");

    let body = msg.body().unwrap_or(&[]);
    let headers = msg.headers();
    for line in headers.canonical_lines(body.len(), freeze_content_length) {
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}
