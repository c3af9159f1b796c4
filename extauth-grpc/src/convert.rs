//! Conversions between the generated protobuf types and the
//! wire-format-agnostic types the manager operates on.

use extauth_core::context::{Headers, RawCheckRequest};
use extauth_core::manager::CheckOutcome;

use crate::proto;

/// gRPC status codes this service ever returns, per `google.rpc.Code`.
mod grpc_code {
    pub const OK: i32 = 0;
    pub const PERMISSION_DENIED: i32 = 7;
    pub const UNAUTHENTICATED: i32 = 16;
}

/// Build the core's wire-agnostic request from the generated `CheckRequest`.
pub fn raw_request_from_proto(request: proto::CheckRequest) -> RawCheckRequest {
    let attributes = request.attributes;
    let http = attributes.as_ref().and_then(|attrs| attrs.request.as_ref()).and_then(|req| req.http.as_ref());
    let source = attributes.as_ref().and_then(|attrs| attrs.source.as_ref());

    let headers = http
        .map(|http| Headers::from_pairs(http.headers.clone()))
        .unwrap_or_default();
    let authority = http.map(|http| http.host.clone()).filter(|h| !h.is_empty());
    let transport_source_address = source
        .and_then(|peer| peer.address.as_ref())
        .and_then(|addr| addr.socket_address.as_ref())
        .map(|sock| sock.address.clone());

    RawCheckRequest {
        headers,
        authority,
        transport_source_address,
    }
}

/// Render the manager's decision as the generated `CheckResponse`.
pub fn check_response_from_outcome(outcome: CheckOutcome) -> proto::CheckResponse {
    match outcome {
        CheckOutcome::Allow { upstream_headers } => proto::CheckResponse {
            status: Some(proto::Status {
                code: grpc_code::OK,
                message: String::new(),
            }),
            http_response: Some(proto::check_response::HttpResponse::OkResponse(
                proto::OkHttpResponse {
                    headers: header_options(upstream_headers),
                },
            )),
        },
        CheckOutcome::Deny {
            http_status,
            downstream_headers,
            reason,
        } => {
            let code = if http_status == 401 {
                grpc_code::UNAUTHENTICATED
            } else {
                grpc_code::PERMISSION_DENIED
            };
            proto::CheckResponse {
                status: Some(proto::Status {
                    code,
                    message: reason.clone(),
                }),
                http_response: Some(proto::check_response::HttpResponse::DeniedResponse(
                    proto::DeniedHttpResponse {
                        status: Some(proto::HttpStatus { code: http_status as u32 }),
                        headers: header_options(downstream_headers),
                        body: reason,
                    },
                )),
            }
        }
    }
}

fn header_options(headers: Vec<(String, String)>) -> Vec<proto::HeaderValueOption> {
    headers
        .into_iter()
        .map(|(key, value)| proto::HeaderValueOption {
            header: Some(proto::HeaderValue { key, value }),
            append_action: proto::AppendAction::OverwriteIfExistsOrAdd as i32,
        })
        .collect()
}
