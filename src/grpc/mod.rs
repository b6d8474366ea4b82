//! gRPC gate in front of the admission service.

mod server;
mod service;

pub use server::GateServer;
pub use service::{GateServiceImpl, RATE_LIMITED_MESSAGE};

// Include the generated protobuf code
pub mod proto {
    pub mod warden {
        pub mod gate {
            pub mod v1 {
                tonic::include_proto!("warden.gate.v1");
            }
        }
    }
}

// Re-export commonly used types
pub use proto::warden::gate::v1::{CheckRequest, CheckResponse};
