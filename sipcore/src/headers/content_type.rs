use std::fmt;

use crate::error::{Error, Result};
use crate::message::Params;
use crate::parser::Parser;

/// `Content-Type: type/subtype;param=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub media_type: String,
    pub media_subtype: String,
    pub params: Params,
}

impl ContentType {
    pub const APPLICATION_SDP: &'static str = "application";

    pub fn is_sdp(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("application") && self.media_subtype.eq_ignore_ascii_case("sdp")
    }

    pub fn sdp() -> Self {
        ContentType {
            media_type: "application".to_string(),
            media_subtype: "sdp".to_string(),
            params: Params::new(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (type_part, param_part) = match value.split_once(';') {
            Some((t, p)) => (t, Some(p)),
            None => (value, None),
        };
        let (media_type, media_subtype) = type_part
            .split_once('/')
            .ok_or_else(|| Error::Parse(format!("malformed Content-Type: {value}").into()))?;
        let params = match param_part {
            Some(p) => Parser::new(format!(";{p}").as_bytes()).parse_params()?,
            None => Params::new(),
        };
        Ok(ContentType {
            media_type: media_type.trim().to_string(),
            media_subtype: media_subtype.trim().to_string(),
            params,
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.media_type, self.media_subtype, self.params)
    }
}
