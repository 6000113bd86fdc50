use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A parse failure, carrying enough context to log a useful diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at line {} column {}", self.message, self.line, self.col)
    }
}

impl From<sipcore_util::Error> for ParseError {
    fn from(e: sipcore_util::Error) -> Self {
        ParseError {
            message: format!("{:?}", e.kind),
            line: e.line,
            col: e.col,
        }
    }
}

impl From<std::str::Utf8Error> for ParseError {
    fn from(e: std::str::Utf8Error) -> Self {
        ParseError {
            message: e.to_string(),
            line: 0,
            col: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("missing required header: {0}")]
    MissingRequiredHeader(&'static str),

    #[error("malformed start line")]
    MalformedStartLine,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel closed")]
    ChannelClosed,

    #[error("transaction not found for key {0:?}")]
    TransactionNotFound(String),

    #[error("dialog not found for id {0:?}")]
    DialogNotFound(String),

    #[error("transaction timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no common codec negotiated")]
    NoCommonCodec,

    #[error("rtp port range exhausted")]
    PortExhaustion,

    #[error("sdp error: {0}")]
    Sdp(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("fmt error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl From<&str> for ParseError {
    fn from(s: &str) -> Self {
        ParseError {
            message: s.to_string(),
            line: 0,
            col: 0,
        }
    }
}

impl From<String> for ParseError {
    fn from(s: String) -> Self {
        ParseError {
            message: s,
            line: 0,
            col: 0,
        }
    }
}
