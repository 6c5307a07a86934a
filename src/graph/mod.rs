//! Schema graph construction and analytics.
//!
//! Relationships rehydrated from the store become a weighted petgraph over
//! table ids: directed for centrality, undirected for clustering. Graphs are
//! derived views, rebuilt from the relationship list on every run.

mod centrality;
mod clusters;

pub use centrality::{centrality_scores, CentralityScores, PagerankParams};
pub use clusters::{assign_clusters, Cluster, ClusterAssignment};

use std::collections::HashMap;

use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, EdgeType, Undirected};

use crate::matcher::RelationshipCandidate;
use crate::store::RelationshipRecord;

/// Edge payload: inference confidence and relationship type.
#[derive(Debug, Clone)]
pub struct RelationEdge {
    pub weight: f64,
    pub kind: String,
}

/// Anything that can contribute an edge to the schema graph.
pub trait RelationshipEdgeSource {
    fn source_table_id(&self) -> i64;
    fn target_table_id(&self) -> i64;
    fn weight(&self) -> f64 {
        1.0
    }
    fn kind(&self) -> &str {
        "unknown"
    }
}

impl RelationshipEdgeSource for RelationshipRecord {
    fn source_table_id(&self) -> i64 {
        self.source_table_id
    }
    fn target_table_id(&self) -> i64 {
        self.target_table_id
    }
    fn weight(&self) -> f64 {
        self.confidence_score
    }
    fn kind(&self) -> &str {
        self.relationship_type.as_str()
    }
}

impl RelationshipEdgeSource for RelationshipCandidate {
    fn source_table_id(&self) -> i64 {
        self.source_table_id
    }
    fn target_table_id(&self) -> i64 {
        self.target_table_id
    }
    fn weight(&self) -> f64 {
        self.confidence_score
    }
    fn kind(&self) -> &str {
        self.relationship_type.as_str()
    }
}

/// Graph over table ids with relationship edges.
///
/// In the undirected variant the mirrored ordered-pair candidates coalesce
/// into a single edge; the directed variant keeps both directions.
pub struct SchemaGraph<Ty: EdgeType> {
    graph: Graph<i64, RelationEdge, Ty>,
    nodes: HashMap<i64, NodeIndex>,
}

pub type DirectedSchemaGraph = SchemaGraph<Directed>;
pub type UndirectedSchemaGraph = SchemaGraph<Undirected>;

impl<Ty: EdgeType> SchemaGraph<Ty> {
    /// Build a graph from a relationship list. Deterministic for the same
    /// input order; node indices follow first appearance.
    pub fn build<R: RelationshipEdgeSource>(relationships: &[R]) -> Self {
        let mut graph = Graph::<i64, RelationEdge, Ty>::with_capacity(0, relationships.len());
        let mut nodes: HashMap<i64, NodeIndex> = HashMap::new();

        for rel in relationships {
            let source = *nodes
                .entry(rel.source_table_id())
                .or_insert_with(|| graph.add_node(rel.source_table_id()));
            let target = *nodes
                .entry(rel.target_table_id())
                .or_insert_with(|| graph.add_node(rel.target_table_id()));
            graph.update_edge(
                source,
                target,
                RelationEdge {
                    weight: rel.weight(),
                    kind: rel.kind().to_string(),
                },
            );
        }

        Self { graph, nodes }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All table ids in the graph, sorted.
    pub fn table_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Edge weight between two tables, if an edge exists. For the undirected
    /// variant the lookup is symmetric.
    pub fn edge_weight(&self, source_table_id: i64, target_table_id: i64) -> Option<f64> {
        let source = *self.nodes.get(&source_table_id)?;
        let target = *self.nodes.get(&target_table_id)?;
        let edge = self.graph.find_edge(source, target)?;
        self.graph.edge_weight(edge).map(|e| e.weight)
    }

    /// Edge relationship type between two tables, if an edge exists.
    pub fn edge_kind(&self, source_table_id: i64, target_table_id: i64) -> Option<&str> {
        let source = *self.nodes.get(&source_table_id)?;
        let target = *self.nodes.get(&target_table_id)?;
        let edge = self.graph.find_edge(source, target)?;
        self.graph.edge_weight(edge).map(|e| e.kind.as_str())
    }

    pub(crate) fn inner(&self) -> &Graph<i64, RelationEdge, Ty> {
        &self.graph
    }

    pub(crate) fn table_id_of(&self, index: NodeIndex) -> i64 {
        self.graph[index]
    }
}

impl SchemaGraph<Directed> {
    /// Collapse to the undirected counterpart: an edge in either direction
    /// becomes one undirected edge.
    pub fn to_undirected(&self) -> UndirectedSchemaGraph {
        let mut graph =
            Graph::<i64, RelationEdge, Undirected>::with_capacity(self.node_count(), self.edge_count());
        let mut nodes: HashMap<i64, NodeIndex> = HashMap::new();

        for index in self.graph.node_indices() {
            let table_id = self.graph[index];
            let new_index = graph.add_node(table_id);
            nodes.insert(table_id, new_index);
        }
        for edge in self.graph.edge_references() {
            let source = nodes[&self.graph[edge.source()]];
            let target = nodes[&self.graph[edge.target()]];
            graph.update_edge(source, target, edge.weight().clone());
        }

        UndirectedSchemaGraph { graph, nodes }
    }
}
