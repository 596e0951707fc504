// Tests for the layered layout and viewport fitting

use taskwatch_client::Source;
use taskwatch_core::config::LayoutConfig;
use taskwatch_core::graph::{ROOT_ID, build_graph};
use taskwatch_core::layout::{
    Bounds, Direction, LayeredLayout, LayoutAdapter, LayoutFrame, PositionedNode,
};

fn source(id: i64, parent_id: Option<i64>) -> Source {
    Source {
        id,
        parent_id,
        title: format!("Source {}", id),
        url: format!("https://example.net/{}", id),
        weight: 1.0,
    }
}

fn tree() -> Vec<Source> {
    vec![
        source(1, None),
        source(2, None),
        source(3, Some(1)),
        source(4, Some(1)),
        source(5, Some(2)),
    ]
}

fn find<'a>(nodes: &'a [PositionedNode], id: &str) -> &'a PositionedNode {
    nodes.iter().find(|n| n.node.id == id).unwrap()
}

fn overlaps(a: &PositionedNode, b: &PositionedNode) -> bool {
    a.position.x < b.position.x + b.width
        && b.position.x < a.position.x + a.width
        && a.position.y < b.position.y + b.height
        && b.position.y < a.position.y + a.height
}

// ============================================================================
// Ranks and positions
// ============================================================================

#[test]
fn test_ranks_follow_distance_from_root() {
    let graph = build_graph(&tree());
    let nodes = LayeredLayout::default().layout(&graph);

    assert_eq!(find(&nodes, ROOT_ID).rank, 0);
    assert_eq!(find(&nodes, "1").rank, 1);
    assert_eq!(find(&nodes, "2").rank, 1);
    assert_eq!(find(&nodes, "3").rank, 2);
    assert_eq!(find(&nodes, "5").rank, 2);
}

#[test]
fn test_output_keeps_node_order() {
    let graph = build_graph(&tree());
    let nodes = LayeredLayout::default().layout(&graph);

    let ids: Vec<&str> = nodes.iter().map(|n| n.node.id.as_str()).collect();
    let expected: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_top_to_bottom_uses_rank_for_y() {
    let graph = build_graph(&tree());
    let layout = LayeredLayout::default();
    let nodes = layout.layout(&graph);

    let step = layout.node_height + layout.rank_sep;
    assert_eq!(find(&nodes, ROOT_ID).position.y, 0.0);
    assert_eq!(find(&nodes, "1").position.y, step);
    assert_eq!(find(&nodes, "4").position.y, 2.0 * step);
    // Siblings keep their source order left to right
    assert!(find(&nodes, "3").position.x < find(&nodes, "4").position.x);
    assert!(find(&nodes, "4").position.x < find(&nodes, "5").position.x);
}

#[test]
fn test_left_to_right_swaps_axes() {
    let graph = build_graph(&tree());
    let layout = LayeredLayout::default().with_direction(Direction::LeftToRight);
    let nodes = layout.layout(&graph);

    assert_eq!(find(&nodes, ROOT_ID).position.x, 0.0);
    assert_eq!(find(&nodes, "1").position.x, layout.node_width + layout.rank_sep);
    assert!(find(&nodes, "1").position.y < find(&nodes, "2").position.y);
}

#[test]
fn test_nodes_never_overlap() {
    let graph = build_graph(&tree());
    for direction in [Direction::TopToBottom, Direction::LeftToRight] {
        let nodes = LayeredLayout::default().with_direction(direction).layout(&graph);
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                assert!(!overlaps(a, b), "{} overlaps {}", a.node.id, b.node.id);
            }
        }
    }
}

#[test]
fn test_single_rank_is_centred() {
    let graph = build_graph(&[source(1, None), source(2, None)]);
    let layout = LayeredLayout::default();
    let nodes = layout.layout(&graph);

    let left = find(&nodes, "1").position.x;
    let right = find(&nodes, "2").position.x + layout.node_width;
    assert_eq!(left, -right);
}

#[test]
fn test_unreachable_nodes_still_get_positions() {
    let graph = build_graph(&[source(1, None), source(2, Some(7)), source(3, Some(2))]);
    let nodes = LayeredLayout::default().layout(&graph);

    assert_eq!(nodes.len(), graph.nodes.len());
    assert_eq!(find(&nodes, "2").rank, 0);
    assert_eq!(find(&nodes, "3").rank, 1);
}

#[test]
fn test_parent_loop_does_not_hang() {
    let graph = build_graph(&[source(1, Some(2)), source(2, Some(1))]);
    let nodes = LayeredLayout::default().layout(&graph);
    assert_eq!(nodes.len(), 3);
}

#[test]
fn test_empty_graph_has_no_positions() {
    let graph = build_graph(&[]);
    assert!(LayeredLayout::default().layout(&graph).is_empty());
}

// ============================================================================
// Frames and viewport
// ============================================================================

#[test]
fn test_frame_bounds_cover_all_nodes() {
    let graph = build_graph(&tree());
    let config = LayoutConfig::default();
    let frame = LayoutFrame::compute(&graph, &LayeredLayout::from(&config), &config);
    let bounds = frame.bounds.unwrap();

    for node in &frame.nodes {
        assert!(node.position.x >= bounds.x);
        assert!(node.position.y >= bounds.y);
        assert!(node.position.x + node.width <= bounds.x + bounds.width);
        assert!(node.position.y + node.height <= bounds.y + bounds.height);
    }
    assert_eq!(frame.edges, graph.edges);
}

#[test]
fn test_frame_viewport_centres_graph() {
    let graph = build_graph(&tree());
    let config = LayoutConfig::default();
    let frame = LayoutFrame::compute(&graph, &LayeredLayout::from(&config), &config);

    let bounds = frame.bounds.unwrap();
    let viewport = frame.viewport.unwrap();
    let centre_x = (bounds.x + bounds.width / 2.0) * viewport.zoom + viewport.x;
    let centre_y = (bounds.y + bounds.height / 2.0) * viewport.zoom + viewport.y;

    assert!((centre_x - config.viewport_width / 2.0).abs() < 1e-9);
    assert!((centre_y - config.viewport_height / 2.0).abs() < 1e-9);
    assert!((0.5..=2.0).contains(&viewport.zoom));
}

#[test]
fn test_empty_frame_has_no_viewport() {
    let config = LayoutConfig::default();
    let frame = LayoutFrame::compute(&build_graph(&[]), &LayeredLayout::default(), &config);
    assert!(frame.nodes.is_empty());
    assert!(frame.bounds.is_none());
    assert!(frame.viewport.is_none());
}

#[test]
fn test_bounds_of_single_node() {
    let graph = build_graph(&[source(1, None)]);
    let nodes = LayeredLayout::default().layout(&graph);
    let bounds = Bounds::of(&nodes[..1]).unwrap();
    assert_eq!(bounds.width, 200.0);
    assert_eq!(bounds.height, 50.0);
}

#[test]
fn test_frame_serializes_flat_nodes() {
    let graph = build_graph(&[source(1, None)]);
    let config = LayoutConfig::default();
    let frame = LayoutFrame::compute(&graph, &LayeredLayout::default(), &config);

    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["nodes"][0]["id"], ROOT_ID);
    assert_eq!(json["nodes"][1]["url"], "https://example.net/1");
    assert!(json["nodes"][1]["position"]["y"].as_f64().unwrap() > 0.0);
}
