use std::fmt;

use crate::error::{Error, Result};
use crate::message::Params;
use crate::parser::Parser;

/// `Subscription-State: active;expires=3600` (RFC 6665).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub state: String,
    pub params: Params,
}

impl SubscriptionState {
    pub fn expires(&self) -> Option<u32> {
        self.params.get("expires").flatten()?.parse().ok()
    }

    pub fn reason(&self) -> Option<&str> {
        self.params.get("reason").flatten()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.eq_ignore_ascii_case("terminated")
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Parse("empty Subscription-State header".into()));
        }
        let (state, rest) = match value.split_once(';') {
            Some((s, r)) => (s, Some(r)),
            None => (value, None),
        };
        let params = match rest {
            Some(r) => Parser::new(format!(";{r}").as_bytes()).parse_params()?,
            None => Params::new(),
        };
        Ok(SubscriptionState { state: state.trim().to_string(), params })
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.state, self.params)
    }
}
