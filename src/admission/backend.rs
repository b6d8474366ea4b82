//! Admission backend trait for abstracting the core from transport layers.

use async_trait::async_trait;

use super::service::AdmissionService;

/// Trait for admission decision implementations.
///
/// The gRPC gate works against this trait rather than `AdmissionService`
/// directly, so it can be exercised with a fixed verdict in tests.
#[async_trait]
pub trait AdmissionBackend: Send + Sync {
    /// Decide whether `caller` may access `resource` now.
    async fn is_request_allowed(&self, resource: &str, caller: &str) -> bool;
}

#[async_trait]
impl AdmissionBackend for AdmissionService {
    async fn is_request_allowed(&self, resource: &str, caller: &str) -> bool {
        self.check_now(resource, caller)
    }
}
