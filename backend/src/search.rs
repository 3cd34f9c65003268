use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::cost::CostFunction;
use crate::error::RouteError;
use crate::graph::{Edge, EdgeId, NodeId, RouteGraph};
use crate::metrics::metrics_from_series;
use crate::models::{Coordinate, RouteMetrics};

/// Result of a successful search: node and edge sequences from start to goal.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PathSummary {
    pub distance_m: f64,
    /// Net gain along the path.
    pub elevation_gain_m: f64,
    pub max_slope_pct: f64,
    /// Overall grade, `gain / distance * 100`.
    pub avg_slope_pct: f64,
}

impl RoutePath {
    fn resolve<'g>(&self, graph: &'g RouteGraph) -> Result<Vec<&'g Edge>, RouteError> {
        self.edges
            .iter()
            .map(|id| {
                graph
                    .edge(*id)
                    .ok_or_else(|| RouteError::invalid(format!("edge {} is not in this graph", id.index())))
            })
            .collect()
    }

    pub fn summarize(&self, graph: &RouteGraph) -> Result<PathSummary, RouteError> {
        let edges = self.resolve(graph)?;
        let distance_m: f64 = edges.iter().map(|e| e.distance_m()).sum();
        let elevation_gain_m: f64 = edges.iter().map(|e| e.elevation_gain_m()).sum();
        let max_slope_pct = edges.iter().map(|e| e.max_slope_pct()).fold(0.0, f64::max);
        let avg_slope_pct = if distance_m > 0.0 {
            elevation_gain_m / distance_m * 100.0
        } else {
            0.0
        };
        Ok(PathSummary {
            distance_m,
            elevation_gain_m,
            max_slope_pct,
            avg_slope_pct,
        })
    }

    /// Geometry of the whole path; junction points appear once.
    pub fn coordinates(&self, graph: &RouteGraph) -> Result<Vec<Coordinate>, RouteError> {
        let edges = self.resolve(graph)?;
        Ok(stitch(&edges, Edge::shape))
    }

    /// Score the path with the same metrics as a free-standing candidate.
    pub fn metrics(&self, graph: &RouteGraph, name: impl Into<String>) -> Result<RouteMetrics, RouteError> {
        let edges = self.resolve(graph)?;
        let distance_m: f64 = edges.iter().map(|e| e.distance_m()).sum();
        let elevations = stitch(&edges, Edge::elevations);
        Ok(metrics_from_series(name, distance_m, &elevations))
    }
}

/// Concatenate one per-edge series along a path. An edge drops its first
/// sample only when its shape starts exactly where the previous shape ended.
fn stitch<'a, T: Copy + 'a>(edges: &[&'a Edge], series: impl Fn(&'a Edge) -> &'a [T]) -> Vec<T> {
    let mut out = Vec::new();
    let mut previous: Option<&Edge> = None;
    for &edge in edges {
        let shared = previous.is_some_and(|p| p.shape().last() == edge.shape().first());
        out.extend(series(edge).iter().skip(usize::from(shared)).copied());
        previous = Some(edge);
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    cost: f64,
    seq: u64,
    node: NodeIndex,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Clone, Copy)]
struct Label {
    cost: f64,
    via: Option<(EdgeId, NodeIndex)>,
}

#[derive(Debug, Clone, Copy)]
enum NodeState {
    Unvisited,
    Frontier(Label),
    Finalized(Label),
}

/// Dijkstra from `start` to `goal` under `cost`.
///
/// Equal-cost frontier entries pop in insertion order, so among equally
/// cheap paths the one discovered first wins.
pub fn shortest_path(
    graph: &RouteGraph,
    start: NodeId,
    goal: NodeId,
    cost: &CostFunction,
) -> Result<RoutePath, RouteError> {
    cost.validate()?;
    let source = graph.index_of(start).ok_or(RouteError::UnknownNode(start))?;
    let target = graph.index_of(goal).ok_or(RouteError::UnknownNode(goal))?;

    let mut state = vec![NodeState::Unvisited; graph.node_count()];
    let mut frontier = BinaryHeap::new();
    let mut seq = 0u64;
    let mut pops = 0usize;

    state[source.index()] = NodeState::Frontier(Label { cost: 0.0, via: None });
    frontier.push(Reverse(FrontierEntry {
        cost: 0.0,
        seq,
        node: source,
    }));

    while let Some(Reverse(entry)) = frontier.pop() {
        let label = match state[entry.node.index()] {
            NodeState::Frontier(label) if label.cost == entry.cost => label,
            // stale entry superseded by a cheaper push
            _ => continue,
        };
        state[entry.node.index()] = NodeState::Finalized(label);
        pops += 1;

        if entry.node == target {
            let path = reconstruct(graph, &state, source, target, label.cost);
            tracing::debug!(
                "{} search {} -> {}: cost {:.2} over {} edges after {} pops",
                cost.label(),
                start,
                goal,
                path.cost,
                path.edges.len(),
                pops
            );
            return Ok(path);
        }

        for (edge_id, next) in graph.outgoing_from(entry.node) {
            let Some(edge) = graph.edge(edge_id) else {
                continue;
            };
            let candidate = label.cost + cost.cost(edge);
            let improves = match state[next.index()] {
                NodeState::Unvisited => true,
                NodeState::Frontier(known) => candidate < known.cost,
                NodeState::Finalized(_) => false,
            };
            if improves {
                seq += 1;
                state[next.index()] = NodeState::Frontier(Label {
                    cost: candidate,
                    via: Some((edge_id, entry.node)),
                });
                frontier.push(Reverse(FrontierEntry {
                    cost: candidate,
                    seq,
                    node: next,
                }));
            }
        }
    }

    tracing::debug!(
        "{} search {} -> {} exhausted the frontier after {} pops",
        cost.label(),
        start,
        goal,
        pops
    );
    Err(RouteError::Unreachable {
        from: start,
        to: goal,
    })
}

fn reconstruct(
    graph: &RouteGraph,
    state: &[NodeState],
    source: NodeIndex,
    target: NodeIndex,
    cost: f64,
) -> RoutePath {
    let mut nodes = vec![graph.id_of(target)];
    let mut edges = Vec::new();
    let mut current = target;
    while current != source {
        let via = match state[current.index()] {
            NodeState::Finalized(label) | NodeState::Frontier(label) => label.via,
            NodeState::Unvisited => None,
        };
        let Some((edge, previous)) = via else {
            break;
        };
        edges.push(edge);
        nodes.push(graph.id_of(previous));
        current = previous;
    }
    nodes.reverse();
    edges.reverse();
    RoutePath { nodes, edges, cost }
}
