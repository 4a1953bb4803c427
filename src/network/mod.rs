//! Network layer
//!
//! Two listeners share one [`ServiceContext`](crate::context::ServiceContext):
//!
//! ```text
//! ┌───────────────────────┐     ┌───────────────────────────┐
//! │  HTTP (axum Router)   │     │  Line socket (TCP)        │
//! │  /device/:id/...      │     │  period | JSON-RPC lines  │
//! └───────────┬───────────┘     └─────────────┬─────────────┘
//!             │                               │ ConnectionManager
//!             │                               │ Session
//!             └───────────────┬───────────────┘
//!                             v
//!                   QueryService::answer
//! ```

pub mod connection;
pub mod error;
pub mod http;
pub mod session;
pub mod tcp;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionSlot};
pub use error::NetworkError;
pub use http::build_router;
pub use session::{Session, SessionState};
pub use tcp::SocketListener;
