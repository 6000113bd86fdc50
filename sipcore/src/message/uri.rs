use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use super::{Params, SipMethod, TransportKind};
use crate::error::{Error, Result};
use crate::parser::Parser;

/// A SIP URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Sip,
    Sips,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The host part of a URI: a domain name or a literal IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    DomainName(String),
    IpAddr(IpAddr),
}

impl Host {
    pub fn is_ip_addr(&self) -> bool {
        matches!(self, Host::IpAddr(_))
    }

    /// Case-insensitive per RFC 3261 §19.1.4.
    fn eq_ci(&self, other: &Host) -> bool {
        match (self, other) {
            (Host::IpAddr(a), Host::IpAddr(b)) => a == b,
            (Host::DomainName(a), Host::DomainName(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::DomainName(d) => f.write_str(d),
            Host::IpAddr(IpAddr::V6(v6)) => write!(f, "[{v6}]"),
            Host::IpAddr(ip) => write!(f, "{ip}"),
        }
    }
}

impl FromStr for Host {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(s);
        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            Ok(Host::IpAddr(ip))
        } else {
            Ok(Host::DomainName(s.to_string()))
        }
    }
}

/// A host plus optional port, as in `sent-by` or a bare `Contact` target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: Host,
    pub port: Option<u16>,
}

impl HostPort {
    pub fn new(host: Host, port: Option<u16>) -> Self {
        HostPort { host, port }
    }

    pub fn ip_addr(&self) -> Option<IpAddr> {
        match self.host {
            Host::IpAddr(ip) => Some(ip),
            Host::DomainName(_) => None,
        }
    }

    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}

impl Default for HostPort {
    fn default() -> Self {
        HostPort {
            host: Host::IpAddr(IpAddr::from([127, 0, 0, 1])),
            port: Some(5060),
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

impl FromStr for HostPort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Parser::new(s.as_bytes()).parse_host_port()
    }
}

/// The userinfo component of a URI (`user[:password]@`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user: String,
    pub password: Option<String>,
}

impl UserInfo {
    pub fn new(user: impl Into<String>, password: Option<impl Into<String>>) -> Self {
        UserInfo {
            user: user.into(),
            password: password.map(Into::into),
        }
    }
}

/// A SIP or SIPS URI.
///
/// Equality follows RFC 3261 §19.1.4: scheme is case-insensitive, user and
/// password are case-sensitive, host is case-insensitive, and only the
/// `user`, `ttl`, `method`, `maddr` and `transport` parameters participate;
/// unrecognized parameters and URI headers do not.
#[derive(Debug, Clone)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<UserInfo>,
    pub host_port: HostPort,
    pub user_param: Option<String>,
    pub method_param: Option<SipMethod>,
    pub transport_param: Option<TransportKind>,
    pub ttl_param: Option<u8>,
    pub lr_param: bool,
    pub maddr_param: Option<Host>,
    pub params: Params,
    pub headers: Params,
}

impl Default for Uri {
    fn default() -> Self {
        Uri {
            scheme: Scheme::default(),
            user: None,
            host_port: HostPort::default(),
            user_param: None,
            method_param: None,
            transport_param: None,
            ttl_param: None,
            lr_param: false,
            maddr_param: None,
            params: Params::new(),
            headers: Params::new(),
        }
    }
}

impl Uri {
    pub fn new(scheme: Scheme, user: Option<UserInfo>, host_port: HostPort) -> Self {
        Uri {
            scheme,
            user,
            host_port,
            ..Default::default()
        }
    }

    pub fn builder() -> UriBuilder {
        UriBuilder::default()
    }

    /// RFC 3261 §19.1.4 URI comparison.
    pub fn is_equivalent(&self, other: &Uri) -> bool {
        if self.scheme != other.scheme {
            return false;
        }
        match (&self.user, &other.user) {
            (Some(a), Some(b)) => {
                if a.user != b.user || a.password != b.password {
                    return false;
                }
            }
            (None, None) => {}
            _ => return false,
        }
        if !self.host_port.host.eq_ci(&other.host_port.host) {
            return false;
        }
        if self.host_port.port_or(self.scheme_default_port()) != other.host_port.port_or(other.scheme_default_port()) {
            return false;
        }
        self.user_param == other.user_param
            && self.ttl_param == other.ttl_param
            && self.method_param == other.method_param
            && self.maddr_param == other.maddr_param
            && self.transport_param == other.transport_param
    }

    fn scheme_default_port(&self) -> u16 {
        match self.scheme {
            Scheme::Sip => 5060,
            Scheme::Sips => 5061,
        }
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent(other)
    }
}
impl Eq for Uri {}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Parser::new(s.as_bytes()).parse_uri()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}", user.user)?;
            if let Some(pass) = &user.password {
                write!(f, ":{pass}")?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.host_port)?;
        if let Some(u) = &self.user_param {
            write!(f, ";user={u}")?;
        }
        if let Some(m) = &self.method_param {
            write!(f, ";method={m}")?;
        }
        if let Some(maddr) = &self.maddr_param {
            write!(f, ";maddr={maddr}")?;
        }
        if let Some(t) = &self.transport_param {
            write!(f, ";transport={t}")?;
        }
        if let Some(ttl) = self.ttl_param {
            write!(f, ";ttl={ttl}")?;
        }
        if self.lr_param {
            write!(f, ";lr")?;
        }
        write!(f, "{}", self.params)?;
        if !self.headers.is_empty() {
            write!(f, "?")?;
            for (i, h) in self.headers.iter().enumerate() {
                if i > 0 {
                    write!(f, "&")?;
                }
                write!(f, "{h}")?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct UriBuilder {
    uri: Uri,
}

impl UriBuilder {
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.uri.scheme = scheme;
        self
    }

    pub fn user(mut self, user: UserInfo) -> Self {
        self.uri.user = Some(user);
        self
    }

    pub fn host(mut self, host_port: HostPort) -> Self {
        self.uri.host_port = host_port;
        self
    }

    pub fn transport(mut self, t: TransportKind) -> Self {
        self.uri.transport_param = Some(t);
        self
    }

    pub fn lr(mut self, lr: bool) -> Self {
        self.uri.lr_param = lr;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.uri.params.push(super::Param::new(name.into(), value));
        self
    }

    pub fn build(self) -> Uri {
        self.uri
    }
}

/// A display name plus URI, as in `"Alice" <sip:alice@example.com>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAddr {
    pub display: Option<String>,
    pub uri: Uri,
    pub params: Params,
}

impl NameAddr {
    pub fn new(uri: Uri) -> Self {
        NameAddr {
            display: None,
            uri,
            params: Params::new(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.params.get("tag").flatten()
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(d) = &self.display {
            write!(f, "\"{d}\" ")?;
        }
        write!(f, "<{}>{}", self.uri, self.params)
    }
}
