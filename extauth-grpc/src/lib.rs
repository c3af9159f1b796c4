//! Wire protocol for the external authorization service: the generated
//! `Authorization/Check` types and a [`tonic`] service wrapping
//! [`extauth_core::manager::Manager`].

pub mod convert;
pub mod service;

pub mod proto {
    tonic::include_proto!("extauth.v1");
}

pub use service::AuthorizationGrpcService;

pub use tonic;
pub use prost;
