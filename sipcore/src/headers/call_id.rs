use std::fmt;

use crate::error::Result;

/// `Call-ID`: an opaque token identifying the call leg.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        CallId(id.into())
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(CallId(value.trim().to_string()))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
