//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::warden::gate::v1::gate_server::GateServer as GateGrpcServer;
use super::service::GateServiceImpl;
use crate::admission::AdmissionBackend;
use crate::error::{Result, WardenError};

/// gRPC server for the admission gate.
pub struct GateServer<B: AdmissionBackend + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// The admission backend
    backend: Arc<B>,
}

impl<B: AdmissionBackend + 'static> GateServer<B> {
    /// Create a new gRPC server around an admission backend.
    pub fn new(addr: SocketAddr, backend: Arc<B>) -> Self {
        Self { addr, backend }
    }

    /// The address this server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the gRPC server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        info!(addr = %self.addr, "Starting gRPC server for Gate");

        let (addr, router) = self.into_router();
        router.serve(addr).await.map_err(server_failed)
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        info!(addr = %self.addr, "Starting gRPC server for Gate with graceful shutdown");

        let (addr, router) = self.into_router();
        router
            .serve_with_shutdown(addr, signal)
            .await
            .map_err(server_failed)
    }

    fn into_router(self) -> (SocketAddr, Router) {
        let gate = GateGrpcServer::new(GateServiceImpl::new(self.backend));
        (self.addr, Server::builder().add_service(gate))
    }
}

fn server_failed(e: tonic::transport::Error) -> WardenError {
    error!(error = %e, "gRPC server failed");
    WardenError::Grpc(e)
}
