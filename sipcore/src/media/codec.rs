use std::fmt;

/// A negotiable audio codec, keyed on its RFC 3551 static payload type where
/// one exists (dynamic types are assigned by rtpmap convention, not fixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Pcmu,
    Pcma,
    Opus,
    TelephoneEvent,
}

impl Codec {
    /// Default preference order absent an explicit [`crate::config::EndpointConfig`]
    /// override (spec external-interfaces contract: `[opus, pcma, pcmu]`).
    pub const DEFAULT_PREFERENCE: [Codec; 3] = [Codec::Opus, Codec::Pcma, Codec::Pcmu];

    pub const fn static_payload_type(&self) -> Option<u8> {
        match self {
            Codec::Pcmu => Some(0),
            Codec::Pcma => Some(8),
            Codec::Opus | Codec::TelephoneEvent => None,
        }
    }

    /// Dynamic payload type this crate assigns on offer generation, used
    /// when [`Codec::static_payload_type`] is `None`.
    pub const fn dynamic_payload_type(&self) -> Option<u8> {
        match self {
            Codec::Opus => Some(111),
            Codec::TelephoneEvent => Some(101),
            Codec::Pcmu | Codec::Pcma => None,
        }
    }

    pub const fn payload_type(&self) -> u8 {
        match (self.static_payload_type(), self.dynamic_payload_type()) {
            (Some(pt), _) => pt,
            (None, Some(pt)) => pt,
            (None, None) => unreachable!(),
        }
    }

    pub const fn clock_rate(&self) -> u32 {
        match self {
            Codec::Pcmu | Codec::Pcma | Codec::TelephoneEvent => 8000,
            Codec::Opus => 48000,
        }
    }

    pub const fn channels(&self) -> u8 {
        match self {
            Codec::Opus => 2,
            _ => 1,
        }
    }

    pub fn rtpmap_name(&self) -> &'static str {
        match self {
            Codec::Pcmu => "PCMU",
            Codec::Pcma => "PCMA",
            Codec::Opus => "opus",
            Codec::TelephoneEvent => "telephone-event",
        }
    }

    pub fn from_payload_type(pt: u8) -> Option<Codec> {
        match pt {
            0 => Some(Codec::Pcmu),
            8 => Some(Codec::Pcma),
            101 => Some(Codec::TelephoneEvent),
            111 => Some(Codec::Opus),
            _ => None,
        }
    }

    pub fn from_rtpmap_name(name: &str) -> Option<Codec> {
        match () {
            _ if name.eq_ignore_ascii_case("PCMU") => Some(Codec::Pcmu),
            _ if name.eq_ignore_ascii_case("PCMA") => Some(Codec::Pcma),
            _ if name.eq_ignore_ascii_case("opus") => Some(Codec::Opus),
            _ if name.eq_ignore_ascii_case("telephone-event") => Some(Codec::TelephoneEvent),
            _ => None,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rtpmap_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_payload_types_match_rfc3551() {
        assert_eq!(Codec::Pcmu.payload_type(), 0);
        assert_eq!(Codec::Pcma.payload_type(), 8);
    }

    #[test]
    fn dynamic_round_trip() {
        for codec in [Codec::Opus, Codec::TelephoneEvent] {
            let pt = codec.payload_type();
            assert_eq!(Codec::from_payload_type(pt), Some(codec));
        }
    }

    #[test]
    fn name_round_trip() {
        for codec in Codec::DEFAULT_PREFERENCE {
            assert_eq!(Codec::from_rtpmap_name(codec.rtpmap_name()), Some(codec));
        }
    }
}
