use std::fmt;

use crate::error::Result;
use crate::message::{NameAddr, Uri};
use crate::parser::Parser;

/// `Refer-To` (RFC 3515): the target the REFER asks the recipient to
/// contact.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferTo(pub NameAddr);

impl ReferTo {
    pub fn uri(&self) -> &Uri {
        &self.0.uri
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(ReferTo(Parser::new(value.as_bytes()).parse_name_addr()?))
    }
}

impl fmt::Display for ReferTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
