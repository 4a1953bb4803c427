//! Query Service for windowed light-level aggregation
//!
//! # Architecture
//!
//! ```text
//! Transport request (HTTP / period line / JSON-RPC)
//!      │
//!      ▼
//! ┌─────────────┐
//! │  RawQuery   │  adapter decodes, no validation
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Validate   │  reducer → unit → bounds → range → device
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Range read  │  one store read, inclusive [start, end]
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Bucketize  │  two-cursor sweep + reducer
//! └─────────────┘
//!      │
//!      ▼
//!   Vec<f64>
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lumen_tsdb::aggregation::ReducerRegistry;
//! use lumen_tsdb::query::{QueryService, RawQuery};
//! use lumen_tsdb::storage::InMemoryStore;
//! use lumen_tsdb::types::{Device, Measurement};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! store.register_device(Device::new("lamp", 56.1, 10.2))?;
//! store.append(Measurement::new("lamp", 0, 0.2))?;
//! store.append(Measurement::new("lamp", 1800, 0.8))?;
//!
//! let service = QueryService::new(Arc::new(store), ReducerRegistry::builtin());
//! let query = RawQuery::new("lamp", "mean", "hour").between(0, 3600);
//! assert_eq!(service.answer(&query).await?, vec![0.5]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod request;
pub mod service;

pub use error::{QueryError, QueryErrorKind, QueryResult};
pub use request::RawQuery;
pub use service::QueryService;
