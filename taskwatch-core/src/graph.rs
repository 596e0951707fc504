// Rooted source graph built from the flat source table

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use taskwatch_client::Source;

pub const ROOT_ID: &str = "search_engine";
pub const DEFAULT_ROOT_LABEL: &str = "Search engine";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl GraphNode {
    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    // Parent id or ROOT_ID
    pub source: String,
    pub target: String,
}

/// Edge ids only depend on the endpoints so renderers can diff rebuilds.
pub fn edge_id(target: &str, source: &str) -> String {
    format!("e{}-{}", target, source)
}

/// Problems in the source table that the builder tolerates but a caller may
/// want to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    DuplicateNode { id: String, count: usize },
    DanglingParent { node: String, parent: String },
    // Not reachable from the root
    Cycle { nodes: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl SourceGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&GraphNode> {
        self.nodes.first().filter(|node| node.is_root())
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |edge| edge.source == id)
            .map(|edge| edge.target.as_str())
    }

    pub fn topology(&self) -> Topology<'_> {
        Topology::new(self)
    }

    /// Inspect the graph for duplicate ids, dangling parents and cycles.
    /// Never fails; an empty list means the table was a clean forest.
    pub fn diagnostics(&self) -> Vec<GraphIssue> {
        let mut issues = Vec::new();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            *counts.entry(node.id.as_str()).or_default() += 1;
        }
        let mut reported = HashSet::new();
        for node in &self.nodes {
            let count = counts[node.id.as_str()];
            if count > 1 && reported.insert(node.id.as_str()) {
                issues.push(GraphIssue::DuplicateNode {
                    id: node.id.clone(),
                    count,
                });
            }
        }

        for edge in &self.edges {
            if !counts.contains_key(edge.source.as_str()) {
                issues.push(GraphIssue::DanglingParent {
                    node: edge.target.clone(),
                    parent: edge.source.clone(),
                });
            }
        }

        let topology = self.topology();
        for component in tarjan_scc(&topology.graph) {
            let is_loop = component.len() > 1
                || topology.graph.contains_edge(component[0], component[0]);
            if is_loop {
                let mut nodes: Vec<String> = component
                    .iter()
                    .map(|ix| self.nodes[topology.graph[*ix]].id.clone())
                    .collect();
                nodes.sort();
                issues.push(GraphIssue::Cycle { nodes });
            }
        }

        issues
    }
}

/// Adjacency view of a [`SourceGraph`]. Node weights index into
/// `SourceGraph::nodes`; when ids repeat, the first occurrence wins and edges
/// with a missing endpoint are left out.
pub struct Topology<'a> {
    pub graph: DiGraph<usize, ()>,
    index: HashMap<&'a str, NodeIndex>,
}

impl<'a> Topology<'a> {
    fn new(source_graph: &'a SourceGraph) -> Self {
        let mut graph = DiGraph::with_capacity(source_graph.nodes.len(), source_graph.edges.len());
        let mut index = HashMap::with_capacity(source_graph.nodes.len());

        for (position, node) in source_graph.nodes.iter().enumerate() {
            index
                .entry(node.id.as_str())
                .or_insert_with(|| graph.add_node(position));
        }

        for edge in &source_graph.edges {
            if let (Some(from), Some(to)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) {
                graph.add_edge(*from, *to, ());
            }
        }

        Self { graph, index }
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }
}

/// Builds [`SourceGraph`]s. The same sources always produce an equal graph.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    root_label: String,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            root_label: DEFAULT_ROOT_LABEL.to_string(),
        }
    }

    pub fn with_root_label(mut self, label: impl Into<String>) -> Self {
        self.root_label = label.into();
        self
    }

    pub fn build(&self, sources: &[Source]) -> SourceGraph {
        if sources.is_empty() {
            return SourceGraph::default();
        }

        let mut nodes = Vec::with_capacity(sources.len() + 1);
        nodes.push(GraphNode {
            id: ROOT_ID.to_string(),
            label: self.root_label.clone(),
            url: None,
        });

        let mut edges = Vec::with_capacity(sources.len());
        for source in sources {
            let id = source.id.to_string();
            let parent = source
                .parent()
                .map(|parent_id| parent_id.to_string())
                .unwrap_or_else(|| ROOT_ID.to_string());

            edges.push(GraphEdge {
                id: edge_id(&id, &parent),
                source: parent,
                target: id.clone(),
            });
            nodes.push(GraphNode {
                id,
                label: source.title.clone(),
                url: Some(source.url.clone()),
            });
        }

        SourceGraph { nodes, edges }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_graph(sources: &[Source]) -> SourceGraph {
    GraphBuilder::new().build(sources)
}
