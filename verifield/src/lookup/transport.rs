//! Transport collaborator

use async_trait::async_trait;

use super::LookupRequest;
use crate::error::TransportError;

/// Performs the remote call behind a lookup.
///
/// Implementations need not support cancellation: an abandoned request is
/// simply left to finish and its response is ignored.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use verifield::error::TransportError;
/// use verifield::lookup::{LookupRequest, Transport};
///
/// struct AlwaysDeliverable;
///
/// #[async_trait]
/// impl Transport for AlwaysDeliverable {
///     async fn perform_lookup(
///         &self,
///         _request: &LookupRequest,
///     ) -> Result<serde_json::Value, TransportError> {
///         Ok(serde_json::json!({ "success": true, "result": 0 }))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one lookup and return the response payload.
    async fn perform_lookup(
        &self,
        request: &LookupRequest,
    ) -> Result<serde_json::Value, TransportError>;
}
