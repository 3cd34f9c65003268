use thiserror::Error;

use crate::dem::DemLoadError;
use crate::graph::NodeId;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("elevation data unavailable: {0}")]
    NoData(#[from] DemLoadError),
    #[error("no route from node {from} to node {to}")]
    Unreachable { from: NodeId, to: NodeId },
    #[error("graph has no node {0}")]
    UnknownNode(NodeId),
    #[error("no candidate routes to select from")]
    EmptyCandidateSet,
}

impl RouteError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
