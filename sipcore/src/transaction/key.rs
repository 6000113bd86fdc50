//! Transaction matching (RFC 3261 §17.1.3 / §17.2.3): client transactions
//! match on branch + method family; server transactions additionally match
//! on the top `Via` sent-by, since a single UDP listener serves requests
//! from many downstream clients that could reuse branches independently.

use std::fmt;

use crate::headers::Via;
use crate::message::{Request, SipMethod};

use super::Role;

/// ACK to a non-2xx final shares its INVITE transaction's branch and is
/// matched against it directly (RFC 3261 §17.1.1.3); CANCEL gets its own
/// branch but is still routed to the INVITE server transaction it targets
/// by method family override at lookup time, not by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodFamily {
    Invite,
    NonInvite,
}

impl MethodFamily {
    pub fn of(method: SipMethod) -> MethodFamily {
        match method {
            SipMethod::Invite | SipMethod::Ack => MethodFamily::Invite,
            _ => MethodFamily::NonInvite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub branch: String,
    pub family: MethodFamily,
    pub role: Role,
    /// Set for server transactions only: the Via sent-by as it appeared on
    /// the wire, lower-cased, so two requests claiming the same branch from
    /// different upstream hosts don't collide.
    pub sent_by: Option<String>,
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sent_by {
            Some(sb) => write!(f, "{}/{:?}/{:?}/{}", self.branch, self.family, self.role, sb),
            None => write!(f, "{}/{:?}/{:?}", self.branch, self.family, self.role),
        }
    }
}

impl TransactionKey {
    pub fn for_client(req: &Request) -> Option<TransactionKey> {
        let via = req.headers.top_via()?;
        Some(TransactionKey {
            branch: via.branch()?.to_string(),
            family: MethodFamily::of(req.req_line.method),
            role: Role::Client,
            sent_by: None,
        })
    }

    pub fn for_server(req: &Request) -> Option<TransactionKey> {
        let via = req.headers.top_via()?;
        Some(TransactionKey {
            branch: via.branch()?.to_string(),
            family: MethodFamily::of(req.req_line.method),
            role: Role::Server,
            sent_by: Some(via.sent_by.to_string().to_ascii_lowercase()),
        })
    }

    /// The key of the INVITE server transaction a CANCEL targets: same
    /// branch and sent-by, forced to the invite family regardless of the
    /// CANCEL's own (non-invite) method family.
    pub fn invite_target_for_cancel(via: &Via) -> Option<TransactionKey> {
        Some(TransactionKey {
            branch: via.branch()?.to_string(),
            family: MethodFamily::Invite,
            role: Role::Server,
            sent_by: Some(via.sent_by.to_string().to_ascii_lowercase()),
        })
    }
}
