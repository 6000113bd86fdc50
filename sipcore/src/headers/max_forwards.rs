use std::fmt;

use crate::error::{Error, Result};

/// `Max-Forwards`: hop-count guard against forwarding loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxForwards(pub u8);

impl MaxForwards {
    pub const DEFAULT: MaxForwards = MaxForwards(70);

    pub fn decremented(&self) -> Option<MaxForwards> {
        self.0.checked_sub(1).map(MaxForwards)
    }

    pub fn parse(value: &str) -> Result<Self> {
        value
            .trim()
            .parse()
            .map(MaxForwards)
            .map_err(|_| Error::Parse(format!("malformed Max-Forwards: {value}").into()))
    }
}

impl Default for MaxForwards {
    fn default() -> Self {
        MaxForwards::DEFAULT
    }
}

impl fmt::Display for MaxForwards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
