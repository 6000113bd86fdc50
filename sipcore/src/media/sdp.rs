//! A minimal RFC 4566 SDP model: just enough of the session/media
//! description to carry the offer/answer codec negotiation (RFC 3264) this
//! crate is responsible for. Audio-only, single `m=` line.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{Error, Result};
use crate::media::codec::Codec;

/// One `a=rtpmap:<pt> <name>/<rate>[/<channels>]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpMap {
    pub payload_type: u8,
    pub codec: Codec,
}

/// A parsed (or to-be-generated) audio session description.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescription {
    pub session_id: u64,
    pub session_version: u64,
    pub origin_addr: IpAddr,
    pub connection_addr: IpAddr,
    pub media_port: u16,
    pub rtpmaps: Vec<RtpMap>,
    pub sendrecv: bool,
}

impl SessionDescription {
    /// Builds an offer/answer body from a codec preference list, in the
    /// order given (first is most preferred).
    pub fn new(
        session_id: u64,
        session_version: u64,
        local_addr: IpAddr,
        media_port: u16,
        codecs: &[Codec],
    ) -> Self {
        SessionDescription {
            session_id,
            session_version,
            origin_addr: local_addr,
            connection_addr: local_addr,
            media_port,
            rtpmaps: codecs.iter().map(|&codec| RtpMap { payload_type: codec.payload_type(), codec }).collect(),
            sendrecv: true,
        }
    }

    pub fn codecs(&self) -> impl Iterator<Item = Codec> + '_ {
        self.rtpmaps.iter().map(|m| m.codec)
    }

    /// The codec set this description offers/accepts, in listed order.
    pub fn codec_preference(&self) -> Vec<Codec> {
        self.codecs().collect()
    }

    pub fn parse(src: &str) -> Result<Self> {
        let mut session_id = 0u64;
        let mut session_version = 0u64;
        let mut origin_addr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let mut connection_addr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let mut media_port = None;
        let mut payload_types: Vec<u8> = Vec::new();
        let mut rtpmap_names: std::collections::HashMap<u8, Codec> = std::collections::HashMap::new();
        let mut sendrecv = true;

        for line in src.lines() {
            let line = line.trim_end_matches('\r');
            let Some((kind, rest)) = line.split_once('=') else { continue };
            match kind {
                "o" => {
                    let mut fields = rest.split_whitespace();
                    session_id = fields.nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);
                    session_version = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                    if let Some(addr) = fields.nth(2) {
                        origin_addr = addr.parse().unwrap_or(origin_addr);
                    }
                }
                "c" => {
                    if let Some(addr) = rest.split_whitespace().nth(2) {
                        connection_addr = addr.parse().unwrap_or(connection_addr);
                    }
                }
                "m" => {
                    let mut fields = rest.split_whitespace();
                    let media = fields.next().unwrap_or("");
                    if media != "audio" {
                        continue;
                    }
                    let port: u16 = fields
                        .next()
                        .ok_or_else(|| Error::Sdp("missing m= port".into()))?
                        .parse()
                        .map_err(|_| Error::Sdp("malformed m= port".into()))?;
                    media_port = Some(port);
                    let _proto = fields.next();
                    payload_types = fields.filter_map(|s| s.parse().ok()).collect();
                }
                "a" if rest.starts_with("rtpmap:") => {
                    let rest = &rest["rtpmap:".len()..];
                    let (pt_str, desc) = rest.split_once(' ').ok_or_else(|| Error::Sdp("malformed a=rtpmap".into()))?;
                    let pt: u8 = pt_str.parse().map_err(|_| Error::Sdp("malformed rtpmap payload type".into()))?;
                    let name = desc.split('/').next().unwrap_or(desc);
                    if let Some(codec) = Codec::from_rtpmap_name(name) {
                        rtpmap_names.insert(pt, codec);
                    }
                }
                "a" if rest == "sendonly" || rest == "inactive" => sendrecv = false,
                _ => {}
            }
        }

        let media_port = media_port.ok_or_else(|| Error::Sdp("missing m=audio line".into()))?;
        let mut rtpmaps = Vec::new();
        for pt in payload_types {
            let codec = rtpmap_names.get(&pt).copied().or_else(|| Codec::from_payload_type(pt));
            if let Some(codec) = codec {
                rtpmaps.push(RtpMap { payload_type: pt, codec });
            }
        }

        Ok(SessionDescription {
            session_id,
            session_version,
            origin_addr,
            connection_addr,
            media_port,
            rtpmaps,
            sendrecv,
        })
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr_type = if self.origin_addr.is_ipv6() { "IP6" } else { "IP4" };
        writeln!(f, "v=0")?;
        writeln!(f, "o=- {} {} IN {addr_type} {}", self.session_id, self.session_version, self.origin_addr)?;
        writeln!(f, "s=-")?;
        writeln!(f, "c=IN {addr_type} {}", self.connection_addr)?;
        writeln!(f, "t=0 0")?;
        let pts: Vec<String> = self.rtpmaps.iter().map(|m| m.payload_type.to_string()).collect();
        writeln!(f, "m=audio {} RTP/AVP {}", self.media_port, pts.join(" "))?;
        for m in &self.rtpmaps {
            if m.codec.channels() > 1 {
                writeln!(f, "a=rtpmap:{} {}/{}/{}", m.payload_type, m.codec.rtpmap_name(), m.codec.clock_rate(), m.codec.channels())?;
            } else {
                writeln!(f, "a=rtpmap:{} {}/{}", m.payload_type, m.codec.rtpmap_name(), m.codec.clock_rate())?;
            }
        }
        writeln!(f, "a=ptime:20")?;
        writeln!(f, "a={}", if self.sendrecv { "sendrecv" } else { "sendonly" })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_parse_round_trips_codecs() {
        let sdp = SessionDescription::new(1, 1, "127.0.0.1".parse().unwrap(), 5004, &[Codec::Opus, Codec::Pcma]);
        let rendered = sdp.to_string();
        let parsed = SessionDescription::parse(&rendered).unwrap();
        assert_eq!(parsed.codec_preference(), vec![Codec::Opus, Codec::Pcma]);
        assert_eq!(parsed.media_port, 5004);
    }

    #[test]
    fn parses_rfc3261_style_offer() {
        let sdp = "v=0\r\no=alice 2890844526 2890844526 IN IP4 host.example.com\r\ns=-\r\nc=IN IP4 host.example.com\r\nt=0 0\r\nm=audio 49172 RTP/AVP 0 8 111\r\na=rtpmap:0 PCMU/8000\r\na=rtpmap:8 PCMA/8000\r\na=rtpmap:111 opus/48000/2\r\n";
        let parsed = SessionDescription::parse(sdp).unwrap();
        assert_eq!(parsed.media_port, 49172);
        assert_eq!(parsed.codec_preference(), vec![Codec::Pcmu, Codec::Pcma, Codec::Opus]);
    }
}
