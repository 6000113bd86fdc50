use std::fmt;

use crate::error::{Error, Result};
use crate::headers::contact::split_top_level_commas;
use crate::message::Params;
use crate::parser::Parser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    pub media_type: String,
    pub media_subtype: String,
    pub params: Params,
}

/// `Accept`: the content types the sender is willing to receive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accept(pub Vec<MediaRange>);

impl Accept {
    pub fn accepts_sdp(&self) -> bool {
        self.0
            .iter()
            .any(|m| m.media_type.eq_ignore_ascii_case("application") && m.media_subtype.eq_ignore_ascii_case("sdp"))
    }

    pub fn parse(value: &str) -> Result<Self> {
        let mut ranges = Vec::new();
        for part in split_top_level_commas(value.trim()) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (type_part, param_part) = match part.split_once(';') {
                Some((t, p)) => (t, Some(p)),
                None => (part, None),
            };
            let (media_type, media_subtype) = type_part
                .split_once('/')
                .ok_or_else(|| Error::Parse(format!("malformed Accept media range: {part}").into()))?;
            let params = match param_part {
                Some(p) => Parser::new(format!(";{p}").as_bytes()).parse_params()?,
                None => Params::new(),
            };
            ranges.push(MediaRange {
                media_type: media_type.trim().to_string(),
                media_subtype: media_subtype.trim().to_string(),
                params,
            });
        }
        Ok(Accept(ranges))
    }
}

impl fmt::Display for Accept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}/{}{}", m.media_type, m.media_subtype, m.params)?;
        }
        Ok(())
    }
}
