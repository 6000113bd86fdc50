use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// `Expires`: seconds until a registration/subscription lapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expires(pub u32);

impl Expires {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.0 as u64)
    }

    pub fn parse(value: &str) -> Result<Self> {
        value
            .trim()
            .parse()
            .map(Expires)
            .map_err(|_| Error::Parse(format!("malformed Expires: {value}").into()))
    }
}

impl fmt::Display for Expires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
