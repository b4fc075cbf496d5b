//! Transport layer for the relay control plane.
//!
//! [`ApiHandler`] is the seam between transports and the dispatch core;
//! [`TaskServiceAdapter`] is the stock implementation over `relay_core::service::TaskService`.
//!
//! - `http` (default): axum router under `/api/v1`, see [`HttpApi`].
//! - `grpc`: tonic service `relay.v1.RelayApi`, see [`RelayApiService`].
mod adapter;
pub use adapter::TaskServiceAdapter;

mod error;
pub use error::ApiError;

mod handler;
pub use handler::ApiHandler;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::{DeliveryBody, HttpApi, PayloadBody};

#[cfg(feature = "grpc")]
pub mod proto {
    tonic::include_proto!("relay.v1");
}

#[cfg(feature = "grpc")]
mod convert;

#[cfg(feature = "grpc")]
mod grpc;
#[cfg(feature = "grpc")]
pub use grpc::RelayApiService;
#[cfg(feature = "grpc")]
pub use proto::relay_api_server::RelayApiServer;
