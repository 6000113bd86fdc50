use std::fmt;

use crate::error::{Error, Result};

/// `Content-Length`: byte length of the message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLength(pub i64);

impl ContentLength {
    pub fn new(len: usize) -> Self {
        ContentLength(len as i64)
    }

    pub fn parse(value: &str) -> Result<Self> {
        value
            .trim()
            .parse()
            .map(ContentLength)
            .map_err(|_| Error::Parse(format!("malformed Content-Length: {value}").into()))
    }
}

impl fmt::Display for ContentLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
