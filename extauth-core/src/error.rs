//! Error taxonomy for the evaluation pipeline.
//!
//! Analysis and match errors are always caught at the call site and folded
//! into a report/verdict describing the failure — they never propagate out
//! of [`crate::manager::Manager::check`], whose signature has no `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis controller {controller} failed: {source}")]
    Failed {
        controller: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("analysis controller {controller} timed out")]
    Timeout { controller: String },
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("match controller {controller} failed: {source}")]
    Failed {
        controller: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("match controller {controller} timed out")]
    Timeout { controller: String },
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("{controller} ({kind}) is unhealthy: {reason}")]
    Unhealthy {
        controller: String,
        kind: String,
        reason: String,
    },
}

/// Raised while turning a controller declaration into a live controller
/// instance. Fatal at startup: a bad declaration must stop the process
/// rather than silently skip a controller.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no factory registered for controller kind {kind:?}")]
    UnknownKind { kind: String },
    #[error("controller {name:?} (kind {kind:?}) has invalid settings: {source}")]
    InvalidSettings {
        name: String,
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("controller {name:?} (kind {kind:?}) failed to initialize: {source}")]
    InitFailed {
        name: String,
        kind: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("duplicate controller name {name:?}")]
    DuplicateName { name: String },
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unexpected token {token:?} at position {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("expected {expected:?}, found {found:?}")]
    Expected { expected: String, found: String },
    #[error("unknown identifier {identifier:?}: not the name of any configured match controller")]
    UnknownIdentifier { identifier: String },
    #[error("trailing input after expression: {remainder:?}")]
    TrailingInput { remainder: String },
}
