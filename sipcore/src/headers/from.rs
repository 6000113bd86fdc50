use std::fmt;

use crate::error::Result;
use crate::message::{NameAddr, Uri};
use crate::parser::Parser;

/// The `From` header: a name-addr (or bare URI) plus a mandatory `tag` once
/// a dialog exists.
#[derive(Debug, Clone, PartialEq)]
pub struct From(pub NameAddr);

impl From {
    pub fn new(addr: NameAddr) -> Self {
        From(addr)
    }

    pub fn uri(&self) -> &Uri {
        &self.0.uri
    }

    pub fn tag(&self) -> Option<&str> {
        self.0.tag()
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(From(Parser::new(value.as_bytes()).parse_name_addr()?))
    }
}

impl fmt::Display for From {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
