use std::fmt;

use crate::error::Result;
use crate::message::NameAddr;
use crate::parser::Parser;

/// `Contact: *` (REGISTER deregister-all) or one or more name-addrs.
#[derive(Debug, Clone, PartialEq)]
pub enum Contact {
    Star,
    Addr(Vec<NameAddr>),
}

impl Contact {
    pub fn addr(addr: NameAddr) -> Self {
        Contact::Addr(vec![addr])
    }

    pub fn first(&self) -> Option<&NameAddr> {
        match self {
            Contact::Star => None,
            Contact::Addr(v) => v.first(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NameAddr> {
        match self {
            Contact::Star => [].iter(),
            Contact::Addr(v) => v.iter(),
        }
    }

    /// `;expires=` on the first contact entry, if present.
    pub fn expires(&self) -> Option<u32> {
        self.first()?.params.get("expires").flatten()?.parse().ok()
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value == "*" {
            return Ok(Contact::Star);
        }
        let mut addrs = Vec::new();
        for part in split_top_level_commas(value) {
            if part.trim().is_empty() {
                continue;
            }
            addrs.push(Parser::new(part.trim().as_bytes()).parse_name_addr()?);
        }
        Ok(Contact::Addr(addrs))
    }
}

/// Splits on commas that are not inside a quoted string or `<...>`.
pub(crate) fn split_top_level_commas(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0;
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'<' if !in_quotes => depth += 1,
            b'>' if !in_quotes => depth -= 1,
            b',' if !in_quotes && depth <= 0 => {
                out.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&value[start..]);
    out
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contact::Star => f.write_str("*"),
            Contact::Addr(v) => {
                for (i, a) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                Ok(())
            }
        }
    }
}
