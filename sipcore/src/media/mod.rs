//! The media-session state machine (Idle → Negotiating → Ready → Active →
//! Terminating/Failed) and the [`MediaHandler`] callback contract an
//! application implements to steer codec selection and react to stream
//! events. RTP itself — packetization, jitter buffering, DSP — is an
//! external collaborator; this module only negotiates SDP and tracks state.

pub mod codec;
pub mod sdp;

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::media::codec::Codec;
use crate::media::sdp::SessionDescription;

/// Uniquely identifies a media session in the process-wide registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaSessionId(pub Uuid);

impl MediaSessionId {
    pub fn new() -> Self {
        MediaSessionId(Uuid::new_v4())
    }
}

impl Default for MediaSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MediaSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Uac,
    Uas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Idle,
    Negotiating,
    Ready,
    Active,
    Terminating,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    Inbound,
    Outbound,
    Bidirectional,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OfferAnswerOutcome {
    Ok(String),
    Reject(String),
    NoReply,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodecNegotiationOutcome {
    Codec(Codec),
    Preference(Vec<Codec>),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityAdjustment {
    Lower,
    Higher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpStats {
    pub packets_received: u64,
    pub packets_lost: u64,
    pub jitter_ms: u32,
}

impl RtpStats {
    pub fn packet_loss_rate(&self) -> f32 {
        let total = self.packets_received + self.packets_lost;
        if total == 0 {
            0.0
        } else {
            self.packets_lost as f32 / total as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatsOutcome {
    NoReply,
    AdjustQuality(QualityAdjustment),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamErrorOutcome {
    Retry,
    Continue,
    Stop(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaAction {
    Play(String, Option<String>),
    Stop,
    Pause,
    Resume,
    SetCodec(Codec),
    NoReply,
}

/// Source of periodic RTP statistics. RTP processing itself is an external
/// collaborator (spec non-goal); the default [`NullStatsSource`] reports all
/// zeros, which is sufficient to exercise the reporting timer in tests.
#[async_trait]
pub trait RtpStatsSource: Send + Sync {
    async fn poll_stats(&self) -> RtpStats;
}

pub struct NullStatsSource;

#[async_trait]
impl RtpStatsSource for NullStatsSource {
    async fn poll_stats(&self) -> RtpStats {
        RtpStats { packets_received: 0, packets_lost: 0, jitter_ms: 0 }
    }
}

/// The application-implemented media callback contract (spec §4.6). Every
/// method has a permissive default so an application only overrides what it
/// cares about, mirroring how [`crate::handler::SipHandler`] defaults
/// unimplemented methods to `405`.
#[async_trait]
pub trait MediaHandler: Send + Sync + 'static {
    async fn init(&mut self) -> std::result::Result<(), String> {
        Ok(())
    }

    async fn handle_session_start(&mut self, _session_id: MediaSessionId) -> std::result::Result<(), String> {
        Ok(())
    }

    async fn handle_session_stop(&mut self, _session_id: MediaSessionId, _reason: &str) {}

    async fn handle_offer(&mut self, sdp: &str, _direction: MediaDirection) -> OfferAnswerOutcome {
        OfferAnswerOutcome::Ok(sdp.to_string())
    }

    async fn handle_answer(&mut self, sdp: &str, _direction: MediaDirection) -> OfferAnswerOutcome {
        OfferAnswerOutcome::Ok(sdp.to_string())
    }

    /// Default: first supported codec that also appears in the offer, in
    /// supported-preference order.
    async fn handle_codec_negotiation(&mut self, offered: &[Codec], supported: &[Codec]) -> CodecNegotiationOutcome {
        match supported.iter().find(|c| offered.contains(c)) {
            Some(&codec) => CodecNegotiationOutcome::Codec(codec),
            None => CodecNegotiationOutcome::Error("no common codec".to_string()),
        }
    }

    async fn handle_negotiation_complete(
        &mut self,
        _local_sdp: &str,
        _remote_sdp: &str,
        _codec: Codec,
    ) -> std::result::Result<(), String> {
        Ok(())
    }

    async fn handle_stream_start(&mut self, _session_id: MediaSessionId, _direction: StreamDirection) -> Vec<MediaAction> {
        Vec::new()
    }

    async fn handle_stream_stop(&mut self, _session_id: MediaSessionId, _reason: &str) {}

    async fn handle_stream_error(&mut self, _session_id: MediaSessionId, error: &str) -> StreamErrorOutcome {
        StreamErrorOutcome::Stop(error.to_string())
    }

    async fn handle_rtp_stats(&mut self, _stats: RtpStats) -> StatsOutcome {
        StatsOutcome::NoReply
    }

    async fn handle_play_complete(&mut self, _file_path: &str) -> MediaAction {
        MediaAction::NoReply
    }

    async fn handle_media_request(&mut self, _request: &str) -> std::result::Result<MediaAction, String> {
        Ok(MediaAction::NoReply)
    }
}

/// A process-wide pool of RTP ports in `[min, max)`, stepping by 2 (RTP/RTCP
/// pairing convention) as spec §4.6 describes for exclusive port ownership.
pub struct RtpPortPool {
    free: Mutex<HashSet<u16>>,
}

impl RtpPortPool {
    pub fn new(range: (u16, u16)) -> Self {
        let (min, max) = range;
        let free = (min..max).step_by(2).collect();
        RtpPortPool { free: Mutex::new(free) }
    }

    pub fn alloc(&self) -> Result<u16> {
        let mut free = self.free.lock().expect("lock poisoned");
        let port = *free.iter().next().ok_or(Error::PortExhaustion)?;
        free.remove(&port);
        Ok(port)
    }

    pub fn release(&self, port: u16) {
        self.free.lock().expect("lock poisoned").insert(port);
    }
}

struct Inner {
    id: MediaSessionId,
    role: Role,
    state: Mutex<MediaState>,
    local_addr: IpAddr,
    supported_codecs: Vec<Codec>,
    selected_codec: Mutex<Option<Codec>>,
    local_port: Mutex<Option<u16>>,
    local_sdp: Mutex<Option<SessionDescription>>,
    remote_sdp: Mutex<Option<SessionDescription>>,
    port_pool: Arc<RtpPortPool>,
    handler: AsyncMutex<Box<dyn MediaHandler>>,
    stats_source: Box<dyn RtpStatsSource>,
    stats_interval: Duration,
    terminate_notify: Notify,
}

/// A media session: owns its RTP port allocation and the application's
/// handler state for its lifetime.
#[derive(Clone)]
pub struct MediaSession(Arc<Inner>);

impl MediaSession {
    pub fn new(
        role: Role,
        local_addr: IpAddr,
        supported_codecs: Vec<Codec>,
        port_pool: Arc<RtpPortPool>,
        handler: Box<dyn MediaHandler>,
        stats_interval: Duration,
    ) -> Self {
        MediaSession(Arc::new(Inner {
            id: MediaSessionId::new(),
            role,
            state: Mutex::new(MediaState::Idle),
            local_addr,
            supported_codecs,
            selected_codec: Mutex::new(None),
            local_port: Mutex::new(None),
            local_sdp: Mutex::new(None),
            remote_sdp: Mutex::new(None),
            port_pool,
            handler: AsyncMutex::new(handler),
            stats_source: Box::new(NullStatsSource),
            stats_interval,
            terminate_notify: Notify::new(),
        }))
    }

    pub fn with_stats_source(mut self, source: Box<dyn RtpStatsSource>) -> Self {
        Arc::get_mut(&mut self.0).expect("session not yet shared").stats_source = source;
        self
    }

    pub fn id(&self) -> MediaSessionId {
        self.0.id
    }

    pub fn state(&self) -> MediaState {
        *self.0.state.lock().expect("lock poisoned")
    }

    fn set_state(&self, state: MediaState) {
        *self.0.state.lock().expect("lock poisoned") = state;
    }

    pub fn selected_codec(&self) -> Option<Codec> {
        *self.0.selected_codec.lock().expect("lock poisoned")
    }

    /// UAC path: allocate a local port and emit an offer listing every
    /// supported codec in preference order.
    pub async fn generate_offer(&self) -> Result<String> {
        let port = self.0.port_pool.alloc()?;
        *self.0.local_port.lock().expect("lock poisoned") = Some(port);
        let sdp = SessionDescription::new(session_id_seed(&self.0.id), 1, self.0.local_addr, port, &self.0.supported_codecs);
        *self.0.local_sdp.lock().expect("lock poisoned") = Some(sdp.clone());
        self.set_state(MediaState::Negotiating);
        Ok(sdp.to_string())
    }

    /// UAS path: parse the remote offer, run codec negotiation through the
    /// handler, allocate a local port, and emit an answer with only the
    /// chosen codec.
    pub async fn process_offer(&self, sdp: &str) -> Result<String> {
        self.set_state(MediaState::Negotiating);

        let outcome = {
            let mut handler = self.0.handler.lock().await;
            handler.handle_offer(sdp, MediaDirection::Inbound).await
        };
        let sdp = match outcome {
            OfferAnswerOutcome::Ok(s) => s,
            OfferAnswerOutcome::Reject(reason) => {
                self.set_state(MediaState::Failed);
                return Err(Error::Sdp(reason));
            }
            OfferAnswerOutcome::NoReply => {
                self.set_state(MediaState::Failed);
                return Err(Error::Sdp("media handler declined to answer the offer".to_string()));
            }
        };

        let remote = SessionDescription::parse(&sdp)?;
        let offered = remote.codec_preference();
        *self.0.remote_sdp.lock().expect("lock poisoned") = Some(remote);

        let codec = {
            let mut handler = self.0.handler.lock().await;
            match handler.handle_codec_negotiation(&offered, &self.0.supported_codecs).await {
                CodecNegotiationOutcome::Codec(c) => c,
                CodecNegotiationOutcome::Preference(list) => match list.first() {
                    Some(&c) => c,
                    None => {
                        self.set_state(MediaState::Failed);
                        return Err(Error::NoCommonCodec);
                    }
                },
                CodecNegotiationOutcome::Error(_) => {
                    self.set_state(MediaState::Failed);
                    return Err(Error::NoCommonCodec);
                }
            }
        };
        if !offered.contains(&codec) {
            self.set_state(MediaState::Failed);
            return Err(Error::NoCommonCodec);
        }

        let port = self.0.port_pool.alloc()?;
        *self.0.local_port.lock().expect("lock poisoned") = Some(port);
        *self.0.selected_codec.lock().expect("lock poisoned") = Some(codec);

        let answer = SessionDescription::new(session_id_seed(&self.0.id), 1, self.0.local_addr, port, &[codec]);
        let answer_str = answer.to_string();
        *self.0.local_sdp.lock().expect("lock poisoned") = Some(answer);

        self.finish_negotiation(codec).await?;
        Ok(answer_str)
    }

    /// UAC path: process the remote answer, verifying the chosen codec was
    /// among those offered.
    pub async fn process_answer(&self, sdp: &str) -> Result<()> {
        let outcome = {
            let mut handler = self.0.handler.lock().await;
            handler.handle_answer(sdp, MediaDirection::Inbound).await
        };
        let sdp = match outcome {
            OfferAnswerOutcome::Ok(s) => s,
            OfferAnswerOutcome::Reject(reason) => {
                self.set_state(MediaState::Failed);
                return Err(Error::Sdp(reason));
            }
            OfferAnswerOutcome::NoReply => {
                self.set_state(MediaState::Failed);
                return Err(Error::Sdp("media handler declined to accept the answer".to_string()));
            }
        };

        let remote = SessionDescription::parse(&sdp)?;
        let answered = remote.codec_preference();
        let offered = self
            .0
            .local_sdp
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|s| s.codec_preference())
            .unwrap_or_default();

        let codec = match answered.first() {
            Some(&c) if offered.contains(&c) => c,
            _ => {
                self.set_state(MediaState::Failed);
                return Err(Error::NoCommonCodec);
            }
        };
        *self.0.selected_codec.lock().expect("lock poisoned") = Some(codec);
        *self.0.remote_sdp.lock().expect("lock poisoned") = Some(remote);

        self.finish_negotiation(codec).await
    }

    async fn finish_negotiation(&self, codec: Codec) -> Result<()> {
        let (local, remote) = {
            let local = self.0.local_sdp.lock().expect("lock poisoned").clone();
            let remote = self.0.remote_sdp.lock().expect("lock poisoned").clone();
            (local, remote)
        };
        let (Some(local), Some(remote)) = (local, remote) else {
            return Ok(());
        };
        let mut handler = self.0.handler.lock().await;
        handler
            .handle_negotiation_complete(&local.to_string(), &remote.to_string(), codec)
            .await
            .map_err(Error::Sdp)?;
        drop(handler);
        self.set_state(MediaState::Ready);
        Ok(())
    }

    /// Transitions `Ready -> Active` and starts the periodic RTP-stats
    /// reporting timer (spec §4.6, default interval 1s).
    pub async fn start_media(&self) -> Result<()> {
        self.set_state(MediaState::Active);
        {
            let mut handler = self.0.handler.lock().await;
            handler
                .handle_stream_start(self.0.id, StreamDirection::Bidirectional)
                .await;
        }

        let session = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(session.0.stats_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if session.state() != MediaState::Active {
                            break;
                        }
                        let stats = session.0.stats_source.poll_stats().await;
                        let mut handler = session.0.handler.lock().await;
                        handler.handle_rtp_stats(stats).await;
                    }
                    _ = session.0.terminate_notify.notified() => break,
                }
            }
        });
        Ok(())
    }

    pub async fn terminate(&self, reason: &str) {
        self.set_state(MediaState::Terminating);
        self.0.terminate_notify.notify_waiters();
        {
            let mut handler = self.0.handler.lock().await;
            handler.handle_session_stop(self.0.id, reason).await;
        }
        if let Some(port) = self.0.local_port.lock().expect("lock poisoned").take() {
            self.0.port_pool.release(port);
        }
    }
}

/// Derives a stable o= session-id from the session's UUID without pulling
/// in a random-number source at SDP-render time.
fn session_id_seed(id: &MediaSessionId) -> u64 {
    id.0.as_u128() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct DefaultHandler;
    #[async_trait]
    impl MediaHandler for DefaultHandler {}

    fn new_session(codecs: Vec<Codec>) -> MediaSession {
        let pool = Arc::new(RtpPortPool::new((16384, 16394)));
        MediaSession::new(
            Role::Uas,
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            codecs,
            pool,
            Box::new(DefaultHandler),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn offer_answer_selects_common_codec() {
        let session = new_session(vec![Codec::Pcma, Codec::Pcmu]);
        let offer = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\nm=audio 5004 RTP/AVP 0 8\r\na=rtpmap:0 PCMU/8000\r\na=rtpmap:8 PCMA/8000\r\n";
        let answer = session.process_offer(offer).await.unwrap();
        assert!(answer.contains("a=rtpmap:8 PCMA/8000"));
        assert_eq!(session.state(), MediaState::Ready);
        assert_eq!(session.selected_codec(), Some(Codec::Pcma));
    }

    #[tokio::test]
    async fn offer_with_no_common_codec_fails() {
        let session = new_session(vec![Codec::Pcma]);
        let offer = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\nm=audio 5004 RTP/AVP 111\r\na=rtpmap:111 opus/48000/2\r\n";
        let err = session.process_offer(offer).await.unwrap_err();
        assert!(matches!(err, Error::NoCommonCodec));
        assert_eq!(session.state(), MediaState::Failed);
    }

    #[test]
    fn port_pool_exhausts() {
        let pool = RtpPortPool::new((16384, 16386));
        let a = pool.alloc().unwrap();
        assert!(pool.alloc().is_err());
        pool.release(a);
        assert!(pool.alloc().is_ok());
    }
}
