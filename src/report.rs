//! Analytics report assembly.
//!
//! Combines centrality and clustering into the serializable summary consumed
//! by the external description/reporting layer: clusters with their most
//! central member tables, plus a full centrality ranking.

use std::cmp::Ordering;

use serde::Serialize;

use crate::catalog::Scope;
use crate::graph::{
    assign_clusters, centrality_scores, DirectedSchemaGraph, PagerankParams,
};
use crate::store::RelationshipRecord;

/// Number of central tables surfaced per cluster.
const CENTRAL_TABLES_PER_CLUSTER: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct TableCentrality {
    pub table_id: i64,
    pub in_degree: usize,
    pub out_degree: usize,
    pub pagerank: f64,
    pub betweenness: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub tables: Vec<i64>,
    /// Highest-pagerank members, used to narrate the cluster.
    pub central_tables: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub scope: Scope,
    pub table_count: usize,
    pub relationship_count: usize,
    pub clusters: Vec<ClusterSummary>,
    /// Ranking over all tables, highest pagerank first.
    pub centrality: Vec<TableCentrality>,
}

/// Build the analytics report for a scope's current relationship set.
pub fn build_report(
    scope: &Scope,
    records: &[RelationshipRecord],
    params: &PagerankParams,
) -> AnalyticsReport {
    let graph = DirectedSchemaGraph::build(records);
    let scores = centrality_scores(&graph, params);
    let assignment = assign_clusters(&graph);

    let mut centrality: Vec<TableCentrality> = graph
        .table_ids()
        .into_iter()
        .map(|table_id| TableCentrality {
            table_id,
            in_degree: scores.in_degree.get(&table_id).copied().unwrap_or(0),
            out_degree: scores.out_degree.get(&table_id).copied().unwrap_or(0),
            pagerank: scores.pagerank.get(&table_id).copied().unwrap_or(0.0),
            betweenness: scores.betweenness.get(&table_id).copied().unwrap_or(0.0),
        })
        .collect();
    centrality.sort_by(|a, b| {
        b.pagerank
            .partial_cmp(&a.pagerank)
            .unwrap_or(Ordering::Equal)
            .then(a.table_id.cmp(&b.table_id))
    });

    let clusters = assignment
        .clusters
        .iter()
        .map(|cluster| {
            let mut ranked: Vec<i64> = cluster.tables.clone();
            ranked.sort_by(|a, b| {
                let rank_a = scores.pagerank.get(a).copied().unwrap_or(0.0);
                let rank_b = scores.pagerank.get(b).copied().unwrap_or(0.0);
                rank_b
                    .partial_cmp(&rank_a)
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(b))
            });
            ranked.truncate(CENTRAL_TABLES_PER_CLUSTER);
            ClusterSummary {
                cluster_id: cluster.cluster_id.clone(),
                tables: cluster.tables.clone(),
                central_tables: ranked,
            }
        })
        .collect();

    AnalyticsReport {
        scope: scope.clone(),
        table_count: graph.node_count(),
        relationship_count: records.len(),
        clusters,
        centrality,
    }
}
