pub use shared::{
    ApiError, CandidateOutcome, CandidateRoute, Coordinate, ElevationSummary, RouteMetrics,
    ScoreReport, ScoreRequest, Selection, SelectionParams,
};
