use std::fmt;

use crate::error::Result;
use crate::headers::contact::split_top_level_commas;
use crate::message::NameAddr;
use crate::parser::Parser;

/// A single `Route` header; a comma-separated list collapses to one per
/// the multimap, so [`Route`] carries the whole list for that line.
#[derive(Debug, Clone, PartialEq)]
pub struct Route(pub Vec<NameAddr>);

impl Route {
    pub fn iter(&self) -> impl Iterator<Item = &NameAddr> {
        self.0.iter()
    }

    pub fn parse(value: &str) -> Result<Self> {
        let mut addrs = Vec::new();
        for part in split_top_level_commas(value.trim()) {
            if part.trim().is_empty() {
                continue;
            }
            addrs.push(Parser::new(part.trim().as_bytes()).parse_name_addr()?);
        }
        Ok(Route(addrs))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        Ok(())
    }
}
