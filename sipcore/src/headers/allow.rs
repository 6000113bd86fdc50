use std::fmt;

use crate::error::Result;
use crate::message::MethodSet;

/// `Allow`: the set of methods the sender supports on this dialog/endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Allow(pub MethodSet);

impl Allow {
    pub fn parse(value: &str) -> Result<Self> {
        let set = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| crate::message::SipMethod::from_bytes(s.as_bytes()))
            .collect();
        Ok(Allow(set))
    }
}

impl fmt::Display for Allow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
