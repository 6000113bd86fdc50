use std::fmt;

use crate::error::{Error, Result};
use crate::message::Params;
use crate::parser::Parser;

/// `Event: event-package;param=value` (RFC 6665 SUBSCRIBE/NOTIFY).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub package: String,
    pub params: Params,
}

impl Event {
    pub fn id(&self) -> Option<&str> {
        self.params.get("id").flatten()
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Parse("empty Event header".into()));
        }
        let (package, rest) = match value.split_once(';') {
            Some((p, r)) => (p, Some(r)),
            None => (value, None),
        };
        let params = match rest {
            Some(r) => Parser::new(format!(";{r}").as_bytes()).parse_params()?,
            None => Params::new(),
        };
        Ok(Event { package: package.trim().to_string(), params })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.package, self.params)
    }
}
