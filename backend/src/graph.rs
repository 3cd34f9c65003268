use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use petgraph::{
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
    Direction,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    elevation::{build_profile, ElevationSource},
    error::RouteError,
    metrics::{net_gain, slope_stats},
    models::Coordinate,
    resample::resample,
};

/// Caller-chosen node identifier.
pub type NodeId = u64;
/// Handle of an edge inside its [`RouteGraph`]. Handles grow in insertion order.
pub type EdgeId = EdgeIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub coord: Coordinate,
}

/// A directed, fully measured street segment.
///
/// Everything is computed once when the edge is built and never changes.
#[derive(Debug, Clone)]
pub struct Edge {
    start: NodeId,
    end: NodeId,
    shape: Vec<Coordinate>,
    elevations: Vec<f64>,
    slopes: Vec<f64>,
    distance_m: f64,
    elevation_gain_m: f64,
    max_slope_pct: f64,
    avg_slope_pct: f64,
}

impl Edge {
    /// Resample `shape` at `step_m`, profile it against `source` and derive
    /// the net gain and slope statistics.
    pub fn measure<S>(
        start: NodeId,
        end: NodeId,
        shape: &[Coordinate],
        source: &S,
        step_m: f64,
    ) -> Result<Self, RouteError>
    where
        S: ElevationSource + ?Sized,
    {
        let path = resample(shape, step_m)?;
        let profile = build_profile(path.coords(), source);
        let stats = slope_stats(path.cumulative_m(), &profile.elevations);
        let elevation_gain_m = net_gain(&profile.elevations);
        let distance_m = path.distance_m();

        Ok(Self {
            start,
            end,
            shape: path.into_coords(),
            elevation_gain_m,
            distance_m,
            max_slope_pct: stats.max_slope_pct,
            avg_slope_pct: stats.avg_slope_pct,
            slopes: stats.slopes,
            elevations: profile.elevations,
        })
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn shape(&self) -> &[Coordinate] {
        &self.shape
    }

    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    pub fn slopes(&self) -> &[f64] {
        &self.slopes
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    /// Net gain: rises only.
    pub fn elevation_gain_m(&self) -> f64 {
        self.elevation_gain_m
    }

    pub fn max_slope_pct(&self) -> f64 {
        self.max_slope_pct
    }

    pub fn avg_slope_pct(&self) -> f64 {
        self.avg_slope_pct
    }

    /// Straight two-point edge with the given totals, for search fixtures.
    #[cfg(test)]
    pub(crate) fn from_totals(start: NodeId, end: NodeId, distance_m: f64, gain_m: f64) -> Self {
        let origin = Coordinate { lat: 0.0, lon: 0.0 };
        Self {
            start,
            end,
            shape: vec![origin, origin],
            elevations: vec![0.0, gain_m],
            slopes: vec![0.0],
            distance_m,
            elevation_gain_m: gain_m,
            max_slope_pct: 0.0,
            avg_slope_pct: 0.0,
        }
    }
}

/// Directed street graph: an arena of nodes and edges keyed by handle.
#[derive(Debug, Default)]
pub struct RouteGraph {
    graph: DiGraph<Node, Edge>,
    index: HashMap<NodeId, NodeIndex>,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or return the existing one with the same id unchanged.
    pub fn add_node(&mut self, id: NodeId, coord: Coordinate) -> &Node {
        let graph = &mut self.graph;
        let idx = *self
            .index
            .entry(id)
            .or_insert_with(|| graph.add_node(Node { id, coord }));
        &self.graph[idx]
    }

    /// Measure `shape` and connect `start` to `end` with it. An empty shape
    /// stands for the straight segment between the two nodes. Parallel
    /// edges between the same pair are kept side by side.
    pub fn add_edge<S>(
        &mut self,
        start: NodeId,
        end: NodeId,
        shape: &[Coordinate],
        source: &S,
        step_m: f64,
    ) -> Result<EdgeId, RouteError>
    where
        S: ElevationSource + ?Sized,
    {
        let from = self.require(start)?;
        let to = self.require(end)?;

        let edge = if shape.is_empty() {
            let straight = [self.graph[from].coord, self.graph[to].coord];
            Edge::measure(start, end, &straight, source, step_m)?
        } else {
            Edge::measure(start, end, shape, source, step_m)?
        };
        Ok(self.graph.add_edge(from, to, edge))
    }

    /// Attach an already measured edge.
    pub fn insert_edge(&mut self, edge: Edge) -> Result<EdgeId, RouteError> {
        let from = self.require(edge.start)?;
        let to = self.require(edge.end)?;
        Ok(self.graph.add_edge(from, to, edge))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.graph.edge_weight(id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Outgoing edges of `id` in the order they were added.
    pub fn outgoing(&self, id: NodeId) -> Result<Vec<EdgeId>, RouteError> {
        let idx = self.require(id)?;
        Ok(self
            .outgoing_from(idx)
            .into_iter()
            .map(|(edge, _)| edge)
            .collect())
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    pub(crate) fn id_of(&self, idx: NodeIndex) -> NodeId {
        self.graph[idx].id
    }

    /// `(edge, target)` pairs sorted by edge handle. petgraph walks adjacency
    /// newest first.
    pub(crate) fn outgoing_from(&self, idx: NodeIndex) -> Vec<(EdgeId, NodeIndex)> {
        let mut out: Vec<(EdgeId, NodeIndex)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        out.sort_by_key(|(edge, _)| *edge);
        out
    }

    fn require(&self, id: NodeId) -> Result<NodeIndex, RouteError> {
        self.index_of(id).ok_or(RouteError::UnknownNode(id))
    }

    pub fn from_graph_file<S>(file: GraphFile, source: &S, step_m: f64) -> Result<Self, GraphFileError>
    where
        S: ElevationSource + ?Sized,
    {
        let mut graph = Self::new();
        for node in &file.nodes {
            graph.add_node(
                node.id,
                Coordinate {
                    lat: node.lat,
                    lon: node.lon,
                },
            );
        }

        for (position, edge) in file.edges.iter().enumerate() {
            for endpoint in [edge.from, edge.to] {
                if !graph.contains_node(endpoint) {
                    return Err(GraphFileError::MissingNode {
                        edge: position,
                        node: endpoint,
                    });
                }
            }
            let shape: Vec<Coordinate> = edge
                .shape
                .iter()
                .map(|[lon, lat]| Coordinate::from_lon_lat(*lon, *lat))
                .collect();
            graph.add_edge(edge.from, edge.to, &shape, source, step_m)?;
        }

        tracing::info!(
            "built route graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    pub fn from_reader<S>(reader: impl Read, source: &S, step_m: f64) -> Result<Self, GraphFileError>
    where
        S: ElevationSource + ?Sized,
    {
        let file: GraphFile = serde_json::from_reader(reader)?;
        Self::from_graph_file(file, source, step_m)
    }

    pub fn from_path<S>(path: impl AsRef<Path>, source: &S, step_m: f64) -> Result<Self, GraphFileError>
    where
        S: ElevationSource + ?Sized,
    {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), source, step_m)
    }
}

/// JSON graph description.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphFile {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: NodeId,
    pub to: NodeId,
    /// `[lon, lat]` pairs; empty means the straight segment between the nodes.
    #[serde(default)]
    pub shape: Vec<[f64; 2]>,
}

#[derive(Debug, Error)]
pub enum GraphFileError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid graph definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("edge #{edge} references unknown node {node}")]
    MissingNode { edge: usize, node: NodeId },
    #[error(transparent)]
    Route(#[from] RouteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    /// Elevation rising 1 m per 0.0001° of latitude north of 47.6.
    fn ramp(lat: f64, _lon: f64) -> Option<f64> {
        Some((lat - 47.6) * 10_000.0)
    }

    fn two_node_graph() -> RouteGraph {
        let mut graph = RouteGraph::new();
        graph.add_node(1, coord(47.6000, -122.33));
        graph.add_node(2, coord(47.6010, -122.33));
        graph
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = RouteGraph::new();
        graph.add_node(7, coord(47.0, -122.0));
        let again = *graph.add_node(7, coord(48.0, -121.0));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(again.coord, coord(47.0, -122.0));
    }

    #[test]
    fn edge_is_profiled_once_at_construction() {
        let mut graph = two_node_graph();
        let id = graph.add_edge(1, 2, &[], &ramp, 5.0).expect("edge");
        let edge = graph.edge(id).expect("stored");

        assert!(edge.shape().len() >= 2);
        assert_eq!(edge.elevations().len(), edge.shape().len());
        assert_eq!(edge.slopes().len(), edge.elevations().len() - 1);
        assert!((edge.distance_m() - 111.2).abs() < 1.0);
        assert!((edge.elevation_gain_m() - 10.0).abs() < 1e-6);
        assert!(edge.max_slope_pct() > 8.0 && edge.max_slope_pct() < 10.0);
    }

    #[test]
    fn reverse_edge_has_no_net_gain() {
        let mut graph = two_node_graph();
        let up = graph.add_edge(1, 2, &[], &ramp, 5.0).expect("edge");
        let down = graph.add_edge(2, 1, &[], &ramp, 5.0).expect("edge");
        let (up, down) = (graph.edge(up).unwrap(), graph.edge(down).unwrap());

        assert!((up.distance_m() - down.distance_m()).abs() < 1e-6);
        assert_eq!(down.elevation_gain_m(), 0.0);
        assert!(up.elevation_gain_m() > 9.9);
    }

    #[test]
    fn parallel_edges_are_kept_in_insertion_order() {
        let mut graph = two_node_graph();
        let direct = graph.add_edge(1, 2, &[], &ramp, 5.0).expect("edge");
        let detour = graph
            .add_edge(
                1,
                2,
                &[coord(47.6000, -122.33), coord(47.6005, -122.331), coord(47.6010, -122.33)],
                &ramp,
                5.0,
            )
            .expect("edge");

        assert_eq!(graph.outgoing(1).expect("node"), vec![direct, detour]);
        assert!(graph.outgoing(2).expect("node").is_empty());
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let mut graph = two_node_graph();
        assert!(matches!(
            graph.add_edge(1, 99, &[], &ramp, 5.0),
            Err(RouteError::UnknownNode(99))
        ));
        assert!(matches!(graph.outgoing(42), Err(RouteError::UnknownNode(42))));
    }

    #[test]
    fn edge_with_single_point_shape_is_rejected() {
        let mut graph = two_node_graph();
        assert!(matches!(
            graph.add_edge(1, 2, &[coord(47.6, -122.33)], &ramp, 5.0),
            Err(RouteError::InvalidInput(_))
        ));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn graph_file_round_trip_through_json() {
        let json = r#"{
            "nodes": [
                {"id": 1, "lat": 47.6000, "lon": -122.33},
                {"id": 2, "lat": 47.6010, "lon": -122.33}
            ],
            "edges": [
                {"from": 1, "to": 2},
                {"from": 2, "to": 1, "shape": [[-122.33, 47.6010], [-122.331, 47.6005], [-122.33, 47.6000]]}
            ]
        }"#;
        let graph = RouteGraph::from_reader(json.as_bytes(), &ramp, 5.0).expect("graph");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        let back = graph.outgoing(2).expect("node")[0];
        assert!(graph.edge(back).unwrap().distance_m() > 111.2);
    }

    #[test]
    fn graph_file_with_dangling_edge_fails() {
        let file = GraphFile {
            nodes: vec![NodeRecord {
                id: 1,
                lat: 47.6,
                lon: -122.33,
            }],
            edges: vec![EdgeRecord {
                from: 1,
                to: 5,
                shape: Vec::new(),
            }],
        };
        assert!(matches!(
            RouteGraph::from_graph_file(file, &ramp, 5.0),
            Err(GraphFileError::MissingNode { edge: 0, node: 5 })
        ));
    }

    #[test]
    fn graph_file_from_disk() {
        use std::io::Write;

        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            tmp,
            r#"{{"nodes":[{{"id":1,"lat":47.6,"lon":-122.33}},{{"id":2,"lat":47.601,"lon":-122.33}}],"edges":[{{"from":1,"to":2}}]}}"#
        )
        .expect("write");
        let graph = RouteGraph::from_path(tmp.path(), &ramp, 5.0).expect("graph");
        assert_eq!(graph.edge_count(), 1);

        assert!(matches!(
            RouteGraph::from_path("/nonexistent/graph.json", &ramp, 5.0),
            Err(GraphFileError::Io(_))
        ));
    }
}
