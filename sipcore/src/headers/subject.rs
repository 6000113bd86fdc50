use std::fmt;

use crate::error::Result;

/// `Subject`: a free-text summary of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject(pub String);

impl Subject {
    pub fn parse(value: &str) -> Result<Self> {
        Ok(Subject(value.trim().to_string()))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
