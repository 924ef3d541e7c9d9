// Path: crates/api/src/query/mod.rs
//! The client-facing query service contract.
//!
//! Like the command surface, the transport skin lives outside the core;
//! this trait is what a gRPC (or in-process) frontend drives. Queries
//! are answered from committed state only, and failures travel inside
//! [`QueryResponse`], never through the signature.

use async_trait::async_trait;
use meridian_types::app::{BlockResponse, Query, QueryResponse};
use tokio::sync::mpsc;

/// Serves client queries and the committed-block stream.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Answers one query against committed state.
    async fn get_query_response(&self, query: Query) -> QueryResponse;

    /// Streams committed blocks: the chain so far, then every new commit
    /// as it lands. The stream ends when the receiver is dropped.
    async fn get_block_stream(&self) -> mpsc::Receiver<BlockResponse>;
}
