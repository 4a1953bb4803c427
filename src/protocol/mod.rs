//! Socket request protocols
//!
//! Decodes the two line-socket request shapes into canonical queries and
//! encodes the replies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │           Frame Detector             │
//! │   first non-whitespace byte == '{'   │
//! └───────────┬──────────────┬───────────┘
//!             │              │
//!             v              v
//!     ┌──────────────┐ ┌──────────────┐
//!     │   Period     │ │   JSON-RPC   │
//!     │ dev/daily    │ │  lightlevel  │
//!     └──────┬───────┘ └──────┬───────┘
//!            └───────┬────────┘
//!                    v
//!          ┌──────────────────┐
//!          │ QueryService     │
//!          │ ::answer         │
//!          └──────────────────┘
//! ```

pub mod detect;
pub mod jsonrpc;
pub mod period;

pub use detect::{detect_frame, FrameKind};
pub use jsonrpc::{JsonRpcResponse, METHOD_LIGHTLEVEL};
pub use period::{PeriodKeyword, PeriodRequest};

use crate::context::ServiceContext;
use crate::metrics;

/// Reply to one socket request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Shape of the request that produced this reply
    pub kind: FrameKind,
    /// Encoded reply line, without the trailing newline
    pub line: String,
    /// Whether the request succeeded
    pub success: bool,
}

/// Serve one request line and encode its reply
pub async fn respond(ctx: &ServiceContext, line: &str) -> Reply {
    let kind = detect_frame(line.as_bytes());

    let (encoded, success) = match kind {
        FrameKind::Period => {
            let result = period::handle(ctx, line).await;
            (period::encode_reply(&result), result.is_ok())
        }
        FrameKind::JsonRpc => {
            let response = jsonrpc::handle(ctx, line).await;
            (response.encode(), response.is_success())
        }
    };

    metrics::record_query(kind.transport(), success);
    Reply {
        kind,
        line: encoded,
        success,
    }
}
