//! The tonic service implementation: each `Check` call runs the manager's
//! pipeline and renders its decision back onto the wire.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use extauth_core::manager::Manager;

use crate::convert::{check_response_from_outcome, raw_request_from_proto};
use crate::proto::authorization_server::Authorization;
use crate::proto::{CheckRequest, CheckResponse};

/// Wraps a [`Manager`] behind the generated `Authorization` service trait.
///
/// `Check` never fails at the gRPC layer: every failure mode a controller
/// can hit is already caught by the manager and folded into an ALLOW/DENY
/// decision, so this method has nothing left to map to a `Status` error.
pub struct AuthorizationGrpcService {
    manager: Arc<Manager>,
}

impl AuthorizationGrpcService {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }
}

#[tonic::async_trait]
impl Authorization for AuthorizationGrpcService {
    async fn check(&self, request: Request<CheckRequest>) -> Result<Response<CheckResponse>, Status> {
        let raw = raw_request_from_proto(request.into_inner());
        let outcome = self.manager.check(raw).await;
        Ok(Response::new(check_response_from_outcome(outcome)))
    }
}
