//! Centrality metrics over the directed schema graph.
//!
//! Degree counts, weighted pagerank (power iteration with uniform dangling
//! redistribution) and Brandes betweenness on unweighted shortest paths.

use std::collections::{HashMap, VecDeque};

use petgraph::visit::EdgeRef;
use petgraph::Directed;
use serde::{Deserialize, Serialize};

use super::SchemaGraph;

/// Pagerank iteration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerankParams {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PagerankParams {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Per-table centrality metrics, keyed by table id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CentralityScores {
    pub in_degree: HashMap<i64, usize>,
    pub out_degree: HashMap<i64, usize>,
    pub pagerank: HashMap<i64, f64>,
    pub betweenness: HashMap<i64, f64>,
}

/// Compute all centrality metrics for a directed graph.
///
/// Pure and deterministic; an empty graph yields empty mappings.
pub fn centrality_scores(
    graph: &SchemaGraph<Directed>,
    params: &PagerankParams,
) -> CentralityScores {
    let g = graph.inner();
    let mut scores = CentralityScores::default();

    for index in g.node_indices() {
        let table_id = graph.table_id_of(index);
        scores.in_degree.insert(
            table_id,
            g.edges_directed(index, petgraph::Direction::Incoming).count(),
        );
        scores.out_degree.insert(
            table_id,
            g.edges_directed(index, petgraph::Direction::Outgoing).count(),
        );
    }

    let pagerank = weighted_pagerank(graph, params);
    let betweenness = brandes_betweenness(graph);
    for index in g.node_indices() {
        let table_id = graph.table_id_of(index);
        scores.pagerank.insert(table_id, pagerank[index.index()]);
        scores.betweenness.insert(table_id, betweenness[index.index()]);
    }

    scores
}

/// Weighted random-surfer pagerank. Outgoing probability mass is split in
/// proportion to edge weight; nodes with no outgoing weight spread their
/// rank uniformly.
fn weighted_pagerank(graph: &SchemaGraph<Directed>, params: &PagerankParams) -> Vec<f64> {
    let g = graph.inner();
    let n = g.node_count();
    if n == 0 {
        return Vec::new();
    }

    let d = params.damping;
    let uniform = 1.0 / n as f64;
    let mut rank = vec![uniform; n];

    let out_weight: Vec<f64> = g
        .node_indices()
        .map(|u| g.edges(u).map(|e| e.weight().weight).sum())
        .collect();

    for _ in 0..params.max_iterations {
        let mut next = vec![(1.0 - d) * uniform; n];
        let mut dangling_mass = 0.0;

        for u in g.node_indices() {
            let ui = u.index();
            if out_weight[ui] <= f64::EPSILON {
                dangling_mass += rank[ui];
                continue;
            }
            for edge in g.edges(u) {
                next[edge.target().index()] +=
                    d * rank[ui] * edge.weight().weight / out_weight[ui];
            }
        }

        let dangling_share = d * dangling_mass * uniform;
        for value in next.iter_mut() {
            *value += dangling_share;
        }

        let diff: f64 = next
            .iter()
            .zip(rank.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        rank = next;
        if diff < params.tolerance {
            break;
        }
    }

    rank
}

/// Brandes betweenness on the directed graph, shortest paths by hop count.
/// Normalized by (n-1)(n-2), the number of ordered pairs a node can sit
/// between.
fn brandes_betweenness(graph: &SchemaGraph<Directed>) -> Vec<f64> {
    let g = graph.inner();
    let n = g.node_count();
    let mut bc = vec![0.0; n];

    for s in g.node_indices() {
        let mut stack = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0; n];
        let mut dist = vec![-1i64; n];
        sigma[s.index()] = 1.0;
        dist[s.index()] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for edge in g.edges(v) {
                let w = edge.target();
                if dist[w.index()] < 0 {
                    dist[w.index()] = dist[v.index()] + 1;
                    queue.push_back(w);
                }
                if dist[w.index()] == dist[v.index()] + 1 {
                    sigma[w.index()] += sigma[v.index()];
                    preds[w.index()].push(v.index());
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w.index()] {
                delta[v] += sigma[v] / sigma[w.index()] * (1.0 + delta[w.index()]);
            }
            if w != s {
                bc[w.index()] += delta[w.index()];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for value in bc.iter_mut() {
            *value *= scale;
        }
    }

    bc
}
