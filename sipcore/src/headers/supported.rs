use std::fmt;

use crate::error::Result;

/// `Supported`: a comma-separated list of option tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Supported(pub Vec<String>);

impl Supported {
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(Supported(
            value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
        ))
    }
}

impl fmt::Display for Supported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}
