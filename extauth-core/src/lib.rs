//! The request-evaluation pipeline for the external authorization service:
//! controller contracts, the controller registries, the policy engine, and
//! the request manager that ties them together.

pub mod context;
pub mod controller;
pub mod error;
pub mod header;
pub mod manager;
pub mod policy;
pub mod registry;
pub mod report;
pub mod verdict;

pub use context::{Headers, LogFields, RawCheckRequest, RequestContext};
pub use controller::{AnalysisController, MatchController};
pub use error::{AnalysisError, BuildError, HealthError, MatchError, PolicyError};
pub use manager::{CheckOutcome, Manager};
pub use policy::{Ast, Policy};
pub use registry::{
    AnalysisControllerFactory, AnalysisControllerRegistry, ControllerDeclaration,
    MatchControllerFactory, MatchControllerRegistry,
};
pub use report::{AnalysisData, AnalysisReport, AnalysisReports};
pub use verdict::{DenyCode, MatchVerdict, MatchVerdicts};
