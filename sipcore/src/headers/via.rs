use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::message::{HostPort, Params, TransportKind};
use crate::parser::Parser;

/// `Via: SIP/2.0/UDP host:port;branch=...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Via {
    pub transport: TransportKind,
    pub sent_by: HostPort,
    pub params: Params,
}

impl Via {
    pub fn new(transport: TransportKind, sent_by: HostPort) -> Self {
        Via { transport, sent_by, params: Params::new() }
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.get("branch").flatten()
    }

    pub fn set_branch(&mut self, branch: impl Into<String>) {
        self.params.push(crate::message::Param::new("branch", Some(branch.into())));
    }

    pub fn received(&self) -> Option<IpAddr> {
        self.params.get("received").flatten().and_then(|v| v.parse().ok())
    }

    pub fn set_received(&mut self, addr: IpAddr) {
        self.params.set("received", Some(addr.to_string()));
    }

    /// `true` if a bare `rport` (no value, request side) or `rport=N`
    /// (response side) is present.
    pub fn has_rport(&self) -> bool {
        self.params.contains("rport")
    }

    pub fn rport(&self) -> Option<u16> {
        self.params.get("rport").flatten().and_then(|v| v.parse().ok())
    }

    pub fn set_rport(&mut self, port: u16) {
        self.params.set("rport", Some(port.to_string()));
    }

    pub fn ttl(&self) -> Option<u8> {
        self.params.get("ttl").flatten().and_then(|v| v.parse().ok())
    }

    pub fn maddr(&self) -> Option<&str> {
        self.params.get("maddr").flatten()
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let sp = value
            .find(|c: char| c.is_whitespace())
            .ok_or_else(|| Error::Parse("missing Via sent-by".into()))?;
        let (proto, rest) = value.split_at(sp);
        let mut proto_parts = proto.splitn(3, '/');
        let name = proto_parts.next().unwrap_or("");
        let version = proto_parts.next().unwrap_or("");
        let transport = proto_parts.next().unwrap_or("");
        if !name.eq_ignore_ascii_case("SIP") || version != "2.0" {
            return Err(Error::Parse(format!("unsupported Via protocol: {proto}").into()));
        }
        let transport = TransportKind::from(transport.as_bytes());
        let mut parser = Parser::new(rest.trim_start().as_bytes());
        let sent_by = parser.parse_host_port()?;
        let params = parser.parse_params()?;
        Ok(Via { transport, sent_by, params })
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}{}", self.transport, self.sent_by, self.params)
    }
}
