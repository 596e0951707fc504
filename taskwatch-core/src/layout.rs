// Layered layout for source graphs

use crate::config::LayoutConfig;
use crate::graph::{GraphEdge, GraphNode, ROOT_ID, SourceGraph, Topology};
use petgraph::Direction as EdgeDirection;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

const MIN_ZOOM: f64 = 0.5;
const MAX_ZOOM: f64 = 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB")]
    TopToBottom,
    #[serde(rename = "LR")]
    LeftToRight,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TB" => Ok(Direction::TopToBottom),
            "LR" => Ok(Direction::LeftToRight),
            other => Err(format!("unknown layout direction '{}' (expected TB or LR)", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::TopToBottom => f.write_str("TB"),
            Direction::LeftToRight => f.write_str("LR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    #[serde(flatten)]
    pub node: GraphNode,
    // Top-left corner
    pub position: Position,
    pub rank: usize,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn of(nodes: &[PositionedNode]) -> Option<Self> {
        let first = nodes.first()?;
        let mut min_x = first.position.x;
        let mut min_y = first.position.y;
        let mut max_x = first.position.x + first.width;
        let mut max_y = first.position.y + first.height;

        for node in &nodes[1..] {
            min_x = min_x.min(node.position.x);
            min_y = min_y.min(node.position.y);
            max_x = max_x.max(node.position.x + node.width);
            max_y = max_y.max(node.position.y + node.height);
        }

        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }
}

/// Pan and zoom that shows a region of the graph inside a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Viewport {
    /// Centre `bounds` in a `width` x `height` viewport, leaving `padding`
    /// (a fraction of the bounds) free around it.
    pub fn fit(bounds: Bounds, width: f64, height: f64, padding: f64) -> Self {
        let padded = 1.0 + padding.max(0.0);
        let zoom_x = width / (bounds.width.max(f64::EPSILON) * padded);
        let zoom_y = height / (bounds.height.max(f64::EPSILON) * padded);
        let zoom = zoom_x.min(zoom_y).clamp(MIN_ZOOM, MAX_ZOOM);

        let center_x = bounds.x + bounds.width / 2.0;
        let center_y = bounds.y + bounds.height / 2.0;

        Self {
            x: width / 2.0 - center_x * zoom,
            y: height / 2.0 - center_y * zoom,
            zoom,
        }
    }
}

/// Turns a graph into positioned nodes. Implementations must not reorder
/// `graph.nodes`: the output lists the same nodes in the same order.
pub trait LayoutAdapter {
    fn layout(&self, graph: &SourceGraph) -> Vec<PositionedNode>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayeredLayout {
    pub node_width: f64,
    pub node_height: f64,
    pub node_sep: f64,
    pub rank_sep: f64,
    pub direction: Direction,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for LayeredLayout {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            node_width: config.node_width,
            node_height: config.node_height,
            node_sep: config.node_sep,
            rank_sep: config.rank_sep,
            direction: config.direction,
        }
    }
}

impl LayeredLayout {
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Group topology nodes into ranks.
    ///
    /// The root's tree is walked first. Whatever it cannot reach (sources
    /// with a missing parent, parent loops) starts its own component at rank
    /// zero, after the root.
    fn ranks(&self, topology: &Topology<'_>) -> Vec<Vec<NodeIndex>> {
        let count = topology.graph.node_count();
        let mut visited = vec![false; count];
        let mut ranks: Vec<Vec<NodeIndex>> = Vec::new();

        let mut starts: Vec<NodeIndex> = Vec::new();
        if let Some(root) = topology.index_of(ROOT_ID) {
            starts.push(root);
        }
        let by_position = |ix: NodeIndex| topology.graph[ix];
        let mut orphans: Vec<NodeIndex> = topology
            .graph
            .node_indices()
            .filter(|ix| {
                topology
                    .graph
                    .neighbors_directed(*ix, EdgeDirection::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        orphans.sort_by_key(|ix| by_position(*ix));
        starts.extend(orphans);

        // Anything still unvisited after the acyclic parts sits on a loop
        let mut leftovers: Vec<NodeIndex> = topology.graph.node_indices().collect();
        leftovers.sort_by_key(|ix| by_position(*ix));

        for start in starts.into_iter().chain(leftovers) {
            if visited[start.index()] {
                continue;
            }
            visited[start.index()] = true;

            let mut queue = VecDeque::from([(start, 0usize)]);
            while let Some((ix, rank)) = queue.pop_front() {
                if ranks.len() <= rank {
                    ranks.resize_with(rank + 1, Vec::new);
                }
                ranks[rank].push(ix);

                for child in children_in_order(topology, ix) {
                    if !visited[child.index()] {
                        visited[child.index()] = true;
                        queue.push_back((child, rank + 1));
                    }
                }
            }
        }

        debug_assert_eq!(ranks.iter().map(Vec::len).sum::<usize>(), count);
        ranks
    }
}

impl LayoutAdapter for LayeredLayout {
    fn layout(&self, graph: &SourceGraph) -> Vec<PositionedNode> {
        let topology = graph.topology();
        let ranks = self.ranks(&topology);

        let (along, across) = match self.direction {
            Direction::TopToBottom => (self.node_width, self.node_height),
            Direction::LeftToRight => (self.node_height, self.node_width),
        };

        let mut placed: Vec<Option<(Position, usize)>> = vec![None; topology.graph.node_count()];
        for (rank, members) in ranks.iter().enumerate() {
            let span = members.len() as f64 * along + (members.len() as f64 - 1.0) * self.node_sep;
            let start = -span / 2.0;
            let depth = rank as f64 * (across + self.rank_sep);

            for (slot, ix) in members.iter().enumerate() {
                let offset = start + slot as f64 * (along + self.node_sep);
                let position = match self.direction {
                    Direction::TopToBottom => Position { x: offset, y: depth },
                    Direction::LeftToRight => Position { x: depth, y: offset },
                };
                placed[ix.index()] = Some((position, rank));
            }
        }

        graph
            .nodes
            .iter()
            .filter_map(|node| {
                let ix = topology.index_of(&node.id)?;
                let (position, rank) = placed[ix.index()]?;
                Some(PositionedNode {
                    node: node.clone(),
                    position,
                    rank,
                    width: self.node_width,
                    height: self.node_height,
                })
            })
            .collect()
    }
}

fn children_in_order(topology: &Topology<'_>, ix: NodeIndex) -> Vec<NodeIndex> {
    let mut edges: Vec<_> = topology
        .graph
        .edges_directed(ix, EdgeDirection::Outgoing)
        .map(|edge| (edge.id(), edge.target()))
        .collect();
    edges.sort_by_key(|(id, _)| *id);
    edges.into_iter().map(|(_, target)| target).collect()
}

/// Everything a renderer needs for one rebuild: positioned nodes, edges and
/// the viewport fitted once to the whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutFrame {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl LayoutFrame {
    pub fn compute(graph: &SourceGraph, adapter: &dyn LayoutAdapter, config: &LayoutConfig) -> Self {
        let nodes = adapter.layout(graph);
        let bounds = Bounds::of(&nodes);
        let viewport = bounds.map(|bounds| {
            Viewport::fit(
                bounds,
                config.viewport_width,
                config.viewport_height,
                config.fit_padding,
            )
        });

        Self {
            nodes,
            edges: graph.edges.clone(),
            bounds,
            viewport,
        }
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|positioned| positioned.node.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!("tb".parse::<Direction>(), Ok(Direction::TopToBottom));
        assert_eq!("LR".parse::<Direction>(), Ok(Direction::LeftToRight));
        assert!("diagonal".parse::<Direction>().is_err());
    }

    #[test]
    fn test_fit_single_node() {
        let bounds = Bounds {
            x: -100.0,
            y: 0.0,
            width: 200.0,
            height: 50.0,
        };
        let viewport = Viewport::fit(bounds, 1000.0, 500.0, 0.5);

        // 1000 / (200 * 1.5) = 3.33 and 500 / (50 * 1.5) = 6.67, clamped
        assert_eq!(viewport.zoom, MAX_ZOOM);
        assert_eq!(viewport.x, 500.0);
        assert_eq!(viewport.y, 250.0 - 25.0 * MAX_ZOOM);
    }

    #[test]
    fn test_fit_large_graph_clamps_zoom_out() {
        let bounds = Bounds {
            x: 0.0,
            y: 0.0,
            width: 20_000.0,
            height: 3_000.0,
        };
        let viewport = Viewport::fit(bounds, 800.0, 600.0, 0.5);
        assert_eq!(viewport.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_bounds_of_empty() {
        assert_eq!(Bounds::of(&[]), None);
    }
}
