//! Gate service implementation.

use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument, warn};

use super::proto::warden::gate::v1::{gate_server::Gate, CheckRequest, CheckResponse};
use crate::admission::AdmissionBackend;

/// Message returned to callers that exceeded a rule.
pub const RATE_LIMITED_MESSAGE: &str = "Request limit exceeded.";

/// Implementation of the Gate gRPC interface.
pub struct GateServiceImpl<B: AdmissionBackend> {
    /// The admission backend
    backend: Arc<B>,
}

impl<B: AdmissionBackend> GateServiceImpl<B> {
    /// Create a new GateServiceImpl with the given backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

#[tonic::async_trait]
impl<B: AdmissionBackend + 'static> Gate for GateServiceImpl<B> {
    /// Decide whether the caller may proceed to the resource.
    ///
    /// Requests without a caller identity are refused before any rule is
    /// consulted, so they never create or touch a history.
    #[instrument(
        skip(self, request),
        fields(resource = %request.get_ref().resource)
    )]
    async fn check(
        &self,
        request: Request<CheckRequest>,
    ) -> Result<Response<CheckResponse>, Status> {
        let req = request.into_inner();

        if req.caller.is_empty() {
            warn!("Received check request without a caller identity");
            return Err(Status::unauthenticated("caller identity is required"));
        }

        if req.resource.is_empty() {
            warn!("Received check request with empty resource");
            return Err(Status::invalid_argument("resource is required"));
        }

        debug!(resource = %req.resource, "Processing check request");

        if !self
            .backend
            .is_request_allowed(&req.resource, &req.caller)
            .await
        {
            info!(resource = %req.resource, "Request rejected by admission rules");
            return Err(Status::resource_exhausted(RATE_LIMITED_MESSAGE));
        }

        Ok(Response::new(CheckResponse { admitted: true }))
    }
}
