use std::fmt;

use crate::error::{Error, Result};
use crate::message::SipMethod;

/// `CSeq: 101 INVITE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CSeq {
    pub seq: u32,
    pub method: SipMethod,
}

impl CSeq {
    pub fn new(seq: u32, method: SipMethod) -> Self {
        CSeq { seq, method }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split_whitespace();
        let seq = parts
            .next()
            .ok_or_else(|| Error::Parse("missing CSeq number".into()))?
            .parse()
            .map_err(|_| Error::Parse("malformed CSeq number".into()))?;
        let method_str = parts.next().ok_or_else(|| Error::Parse("missing CSeq method".into()))?;
        let method = SipMethod::from_bytes(method_str.as_bytes())
            .ok_or_else(|| Error::Parse(format!("unknown CSeq method: {method_str}").into()))?;
        Ok(CSeq { seq, method })
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seq, self.method)
    }
}
