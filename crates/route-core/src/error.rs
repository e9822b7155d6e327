//! Error taxonomy for the route planner.
//!
//! The planner never lets a dependency failure abort the whole request; these
//! variants exist to let internal code distinguish failure kinds, not to be
//! thrown across a request boundary. Every fallible step is caught at its
//! phase boundary and downgraded to a phase-log entry (see `route_server::planner`).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("geometry failure: {0}")]
    GeometryFailure(String),

    #[error("no route at all: {0}")]
    NoRouteAtAll(String),
}
