use std::fmt;

use crate::error::Result;
use crate::message::{NameAddr, Uri};
use crate::parser::Parser;

/// The `To` header. Acquires a `tag` once the remote side responds inside
/// a dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct To(pub NameAddr);

impl To {
    pub fn new(addr: NameAddr) -> Self {
        To(addr)
    }

    pub fn uri(&self) -> &Uri {
        &self.0.uri
    }

    pub fn tag(&self) -> Option<&str> {
        self.0.tag()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.0.params.push(crate::message::Param::new("tag", Some(tag.into())));
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(To(Parser::new(value.as_bytes()).parse_name_addr()?))
    }
}

impl fmt::Display for To {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
