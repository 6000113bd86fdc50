//! Endpoint configuration.
//!
//! Mirrors the recognized options from the environment/config surface:
//! listen address/port, NAT-exposed address, timer bases, RTP port range
//! and codec preference.

use std::net::{IpAddr, Ipv4Addr};

use crate::media::codec::Codec;

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub listen_addr: IpAddr,
    pub listen_port: u16,
    pub exposed_addr: Option<IpAddr>,
    pub exposed_port: Option<u16>,
    pub max_burst: usize,
    pub sip_trace: bool,
    pub t1: std::time::Duration,
    pub t2: std::time::Duration,
    pub t4: std::time::Duration,
    pub rtp_port_range: (u16, u16),
    pub rtp_stats_interval: std::time::Duration,
    pub supported_codecs: Vec<Codec>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: 5060,
            exposed_addr: None,
            exposed_port: None,
            max_burst: 10,
            sip_trace: false,
            t1: std::time::Duration::from_millis(500),
            t2: std::time::Duration::from_secs(4),
            t4: std::time::Duration::from_secs(5),
            rtp_port_range: (16384, 32768),
            rtp_stats_interval: std::time::Duration::from_secs(1),
            supported_codecs: vec![Codec::Pcma],
        }
    }
}

impl EndpointConfig {
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndpointConfigBuilder {
    cfg: EndpointConfig,
}

impl EndpointConfigBuilder {
    pub fn listen_addr(mut self, addr: IpAddr) -> Self {
        self.cfg.listen_addr = addr;
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.cfg.listen_port = port;
        self
    }

    pub fn exposed(mut self, addr: IpAddr, port: u16) -> Self {
        self.cfg.exposed_addr = Some(addr);
        self.cfg.exposed_port = Some(port);
        self
    }

    pub fn max_burst(mut self, n: usize) -> Self {
        self.cfg.max_burst = n;
        self
    }

    pub fn sip_trace(mut self, on: bool) -> Self {
        self.cfg.sip_trace = on;
        self
    }

    pub fn timers(mut self, t1_ms: u64, t2_ms: u64, t4_ms: u64) -> Self {
        self.cfg.t1 = std::time::Duration::from_millis(t1_ms);
        self.cfg.t2 = std::time::Duration::from_millis(t2_ms);
        self.cfg.t4 = std::time::Duration::from_millis(t4_ms);
        self
    }

    pub fn rtp_port_range(mut self, min: u16, max: u16) -> Self {
        self.cfg.rtp_port_range = (min, max);
        self
    }

    pub fn rtp_stats_interval_ms(mut self, ms: u64) -> Self {
        self.cfg.rtp_stats_interval = std::time::Duration::from_millis(ms);
        self
    }

    pub fn supported_codecs(mut self, codecs: Vec<Codec>) -> Self {
        self.cfg.supported_codecs = codecs;
        self
    }

    pub fn build(self) -> EndpointConfig {
        self.cfg
    }
}
