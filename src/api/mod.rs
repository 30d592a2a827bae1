//! HTTP plumbing shared by every list screen and lookup.

pub mod endpoint;
pub mod envelope;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod transport;

pub use endpoint::EndpointSpec;
pub use envelope::{
    collection_result, mutation_result, normalize_list, record_result, Envelope, ListShape,
};
pub use error::ApiError;
pub use transport::{resource_path, ApiRequest, ApiResponse, HttpTransport, Method, Transport};

/// Sends a mutation and checks its envelope status.
pub async fn mutate(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<Option<serde_json::Value>, ApiError> {
    let method = request.method;
    let path = request.path.clone();
    let response = transport.send(request).await?;
    let result = mutation_result(response);
    match &result {
        Ok(_) => tracing::info!(%method, %path, "mutation applied"),
        Err(err) => tracing::warn!(%method, %path, error = %err, "mutation rejected"),
    }
    result
}

/// Sends a single-record read and unwraps `data`.
pub async fn fetch_record(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<serde_json::Value, ApiError> {
    let response = transport.send(request).await?;
    record_result(response)
}

/// Sends a whole-collection read and unwraps the `data` array.
pub async fn fetch_collection(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<Vec<serde_json::Value>, ApiError> {
    let response = transport.send(request).await?;
    collection_result(response)
}
