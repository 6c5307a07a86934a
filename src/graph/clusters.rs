//! Connected-component clustering of the schema graph.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use petgraph::EdgeType;
use serde::Serialize;

use super::SchemaGraph;

/// One connected component with its member tables, sorted.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub cluster_id: String,
    pub tables: Vec<i64>,
}

/// Mapping from table id to cluster label, recomputed each run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterAssignment {
    pub by_table: HashMap<i64, String>,
    pub clusters: Vec<Cluster>,
}

impl ClusterAssignment {
    pub fn label_of(&self, table_id: i64) -> Option<&str> {
        self.by_table.get(&table_id).map(|s| s.as_str())
    }
}

/// Assign each table to a connected component.
///
/// Edge direction is ignored, so directed and undirected graphs cluster
/// identically. Components are labeled `cluster_1`, `cluster_2`, ... ordered
/// by their smallest member table id, which keeps labels stable for
/// identical input.
pub fn assign_clusters<Ty: EdgeType>(graph: &SchemaGraph<Ty>) -> ClusterAssignment {
    let g = graph.inner();
    let n = g.node_count();
    if n == 0 {
        return ClusterAssignment::default();
    }

    let mut union_find = UnionFind::<usize>::new(n);
    for edge in g.edge_references() {
        union_find.union(edge.source().index(), edge.target().index());
    }

    let mut members: HashMap<usize, Vec<i64>> = HashMap::new();
    for index in g.node_indices() {
        members
            .entry(union_find.find(index.index()))
            .or_default()
            .push(graph.table_id_of(index));
    }

    let mut components: Vec<Vec<i64>> = members.into_values().collect();
    for component in &mut components {
        component.sort_unstable();
    }
    components.sort_by_key(|component| component[0]);

    let mut assignment = ClusterAssignment::default();
    for (position, tables) in components.into_iter().enumerate() {
        let cluster_id = format!("cluster_{}", position + 1);
        for table_id in &tables {
            assignment.by_table.insert(*table_id, cluster_id.clone());
        }
        assignment.clusters.push(Cluster { cluster_id, tables });
    }

    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DirectedSchemaGraph, UndirectedSchemaGraph};
    use crate::matcher::RelationshipType;
    use crate::store::RelationshipRecord;

    fn record(source: i64, target: i64) -> RelationshipRecord {
        RelationshipRecord {
            relationship_id: format!("{source}-{target}"),
            server_name: "srv".to_string(),
            database_name: "db".to_string(),
            schema_name: "dbo".to_string(),
            source_table_id: source,
            target_table_id: target,
            source_column_id: source * 10,
            target_column_id: target * 10,
            column_name: "cust_id".to_string(),
            relationship_type: RelationshipType::NameMatch,
            confidence_score: 0.6,
            description: None,
            source_tag: None,
            is_current: true,
            date_created: "2026-01-01T00:00:00Z".to_string(),
            date_updated: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_two_components() {
        // A(1)-B(2), B(2)-C(3), D(4)-E(5)
        let records = vec![record(1, 2), record(2, 3), record(4, 5)];
        let graph = UndirectedSchemaGraph::build(&records);
        let assignment = assign_clusters(&graph);

        assert_eq!(assignment.clusters.len(), 2);
        assert_eq!(assignment.clusters[0].cluster_id, "cluster_1");
        assert_eq!(assignment.clusters[0].tables, vec![1, 2, 3]);
        assert_eq!(assignment.clusters[1].cluster_id, "cluster_2");
        assert_eq!(assignment.clusters[1].tables, vec![4, 5]);

        assert_eq!(assignment.label_of(3), Some("cluster_1"));
        assert_eq!(assignment.label_of(5), Some("cluster_2"));
        assert_eq!(assignment.label_of(99), None);
    }

    #[test]
    fn test_direction_is_ignored() {
        // 1 -> 2 and 3 -> 2 connect all three despite directions
        let records = vec![record(1, 2), record(3, 2)];
        let graph = DirectedSchemaGraph::build(&records);
        let assignment = assign_clusters(&graph);
        assert_eq!(assignment.clusters.len(), 1);
        assert_eq!(assignment.clusters[0].tables, vec![1, 2, 3]);
    }

    #[test]
    fn test_labels_ordered_by_smallest_member() {
        // Insert the high-id component first; it must still label second
        let records = vec![record(8, 9), record(1, 2)];
        let graph = UndirectedSchemaGraph::build(&records);
        let assignment = assign_clusters(&graph);
        assert_eq!(assignment.clusters[0].tables, vec![1, 2]);
        assert_eq!(assignment.clusters[1].tables, vec![8, 9]);
    }

    #[test]
    fn test_empty_graph() {
        let graph = UndirectedSchemaGraph::build(&Vec::<RelationshipRecord>::new());
        let assignment = assign_clusters(&graph);
        assert!(assignment.clusters.is_empty());
        assert!(assignment.by_table.is_empty());
    }
}
