//! Frame kind detection
//!
//! Both socket request shapes share one connection, so each line is
//! classified by its first non-whitespace byte:
//!
//! 1. **JSON-RPC**: starts with `{`
//! 2. **Period request**: anything else, `"<device>/<daily|weekly>"`
//!
//! # Example
//!
//! ```rust
//! use lumen_tsdb::protocol::{detect_frame, FrameKind};
//!
//! assert_eq!(detect_frame(b"8918593277/daily"), FrameKind::Period);
//! assert_eq!(detect_frame(b"  {\"jsonrpc\":\"2.0\"}"), FrameKind::JsonRpc);
//! ```

/// Maximum bytes to scan for detection (avoid scanning entire payload)
const MAX_DETECTION_SCAN: usize = 64;

/// Request shape carried by one socket line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// JSON-RPC 2.0 request object
    JsonRpc,
    /// `<device>/<period keyword>` request
    Period,
}

impl FrameKind {
    /// Label used for metrics and logs
    pub const fn transport(self) -> &'static str {
        match self {
            FrameKind::JsonRpc => "jsonrpc",
            FrameKind::Period => "socket",
        }
    }
}

/// Classify one request line
///
/// O(1): only the first bytes are examined.
#[inline]
pub fn detect_frame(data: &[u8]) -> FrameKind {
    let scan_limit = data.len().min(MAX_DETECTION_SCAN);
    let trimmed = skip_whitespace(&data[..scan_limit]);

    match trimmed.first() {
        Some(b'{') => FrameKind::JsonRpc,
        _ => FrameKind::Period,
    }
}

/// Skip leading ASCII whitespace bytes
#[inline]
fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .unwrap_or(data.len());
    &data[start..]
}
