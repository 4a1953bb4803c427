//! Per-connection request/reply state machine
//!
//! ```text
//!                 begin_request            finish_reply
//! AwaitingRequest ─────────────→ Processing ───────────→ AwaitingRequest
//!        │                           │
//!        └─────────── close ─────────┴──────────────────→ Closed
//! ```
//!
//! A line-socket connection carries at most one outstanding request. A
//! request that arrives while the previous one is still being processed
//! desynchronizes the conversation, so the session rejects it and the
//! connection is closed.

use std::fmt;
use std::net::SocketAddr;

use super::error::NetworkError;

/// Conversation state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for the next request line
    AwaitingRequest,
    /// A request is being answered
    Processing,
    /// No further traffic is accepted
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingRequest => "awaiting-request",
            SessionState::Processing => "processing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State machine for one line-socket connection
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    state: SessionState,
    requests_served: u64,
}

impl Session {
    /// New session waiting for its first request
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            state: SessionState::AwaitingRequest,
            requests_served: 0,
        }
    }

    /// Peer address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Replies sent so far
    pub fn requests_served(&self) -> u64 {
        self.requests_served
    }

    /// A request line arrived
    ///
    /// Fails if a request is already in flight or the session is closed.
    /// A violation closes the session.
    pub fn begin_request(&mut self) -> Result<(), NetworkError> {
        match self.state {
            SessionState::AwaitingRequest => {
                self.state = SessionState::Processing;
                Ok(())
            }
            SessionState::Processing => {
                self.state = SessionState::Closed;
                Err(self.violation("request received before the previous reply was sent"))
            }
            SessionState::Closed => Err(self.violation("request received on a closed session")),
        }
    }

    /// The reply for the in-flight request was written
    pub fn finish_reply(&mut self) -> Result<(), NetworkError> {
        match self.state {
            SessionState::Processing => {
                self.state = SessionState::AwaitingRequest;
                self.requests_served += 1;
                Ok(())
            }
            other => Err(NetworkError::ProtocolViolation {
                peer: self.peer,
                reason: format!("reply sent while {}", other),
            }),
        }
    }

    /// Stop accepting traffic
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Whether the session still accepts requests
    pub fn is_open(&self) -> bool {
        self.state != SessionState::Closed
    }

    fn violation(&self, reason: &str) -> NetworkError {
        NetworkError::ProtocolViolation {
            peer: self.peer,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_request_reply_cycle() {
        let mut session = Session::new(peer());
        assert_eq!(session.state(), SessionState::AwaitingRequest);

        for served in 1..=3 {
            session.begin_request().unwrap();
            assert_eq!(session.state(), SessionState::Processing);
            session.finish_reply().unwrap();
            assert_eq!(session.state(), SessionState::AwaitingRequest);
            assert_eq!(session.requests_served(), served);
        }
    }

    #[test]
    fn test_second_request_in_flight_closes() {
        let mut session = Session::new(peer());
        session.begin_request().unwrap();

        let err = session.begin_request().unwrap_err();
        assert!(matches!(err, NetworkError::ProtocolViolation { .. }));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_open());
    }

    #[test]
    fn test_reply_without_request() {
        let mut session = Session::new(peer());
        assert!(session.finish_reply().is_err());
        assert_eq!(session.state(), SessionState::AwaitingRequest);
    }

    #[test]
    fn test_closed_session_rejects() {
        let mut session = Session::new(peer());
        session.close();
        assert!(session.begin_request().is_err());
        assert_eq!(session.peer(), peer());
        assert_eq!(session.state().to_string(), "closed");
    }
}
