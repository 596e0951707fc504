// Terminal, JSON and DOT output for tasks and source graphs

use crate::graph::SourceGraph;
use crate::layout::LayoutFrame;
use colored::{ColoredString, Colorize};
use petgraph::dot::{Config as DotConfig, Dot};
use petgraph::graph::DiGraph;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use taskwatch_client::model::{ProtocolItem, Task, TaskSummary};
use taskwatch_client::TaskStatus;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Dot,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "tree" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "dot" | "graphviz" => Ok(OutputFormat::Dot),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Dot => f.write_str("dot"),
        }
    }
}

/// Coloured status label. Unknown statuses are shown verbatim, dimmed.
pub fn status_badge(status: &TaskStatus) -> ColoredString {
    let label = status.label();
    match status {
        TaskStatus::Created => label.blue(),
        TaskStatus::Active => label.green(),
        TaskStatus::InProcessing => label.yellow(),
        TaskStatus::Stopped => label.truecolor(255, 165, 0),
        TaskStatus::StoppedWithError => label.red(),
        TaskStatus::Unknown(_) => label.dimmed(),
    }
}

fn launch_badge(status: &str) -> ColoredString {
    match status {
        "finished" => status.green(),
        "failed" => status.red(),
        "running" | "in_progress" => status.blue(),
        _ => status.dimmed(),
    }
}

fn source_badge(launch: &ProtocolItem) -> ColoredString {
    if launch.is_source_available() {
        launch.source_status.green()
    } else {
        launch.source_status.red()
    }
}

/// "1 source", "5 sources".
pub fn count_sources(count: i64) -> String {
    if count == 1 {
        "1 source".to_string()
    } else {
        format!("{} sources", count)
    }
}

pub fn render_task_list(tasks: &[TaskSummary], total: i64) -> String {
    let mut out = String::new();
    if tasks.is_empty() {
        out.push_str("  (no tasks)\n");
        return out;
    }

    for task in tasks {
        out.push_str(&format!(
            "  {:>6}  {:<20}  {:<12}  {}\n",
            format!("#{}", task.id),
            status_badge(&task.status),
            count_sources(task.count_sources),
            task.query
        ));
    }
    if total > tasks.len() as i64 {
        out.push_str(&format!("\n  showing {} of {}\n", tasks.len(), total));
    }
    out
}

pub fn render_task(task: &Task) -> String {
    let mut out = String::new();

    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("TASK #{}\n", task.id));
    out.push_str(RULE);
    out.push_str("\n\n");

    out.push_str(&format!("Query:          {}\n", task.query));
    out.push_str(&format!("Status:         {}\n", status_badge(&task.status)));
    out.push_str(&format!(
        "Created:        {}\n",
        task.created_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!(
        "Updated:        {}\n",
        task.updated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    if let Some(processed_at) = task.processed_at {
        out.push_str(&format!(
            "Processed:      {}\n",
            processed_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out.push('\n');

    out.push_str("Parameters\n");
    out.push_str(&format!("  Depth level:      {}\n", task.depth_level));
    out.push_str(&format!("  Min weight:       {}\n", task.min_weight));
    out.push_str(&format!("  Max sources:      {}\n", task.max_sources));
    out.push_str(&format!(
        "  Max neighbours:   {}\n",
        task.max_neighbours_for_source
    ));
    out.push('\n');

    if task.sources_viewed.is_some() || task.launch_duration.is_some() {
        out.push_str("Last launch\n");
        if let Some(viewed) = task.sources_viewed {
            out.push_str(&format!("  Sources viewed:   {}\n", viewed));
        }
        if let Some(duration) = task.launch_duration() {
            out.push_str(&format!(
                "  Duration:         {:.1}s\n",
                duration.as_secs_f64()
            ));
        }
        out.push('\n');
    }

    if let Some(error) = task.error_msg.as_deref().filter(|e| !e.is_empty()) {
        out.push_str(&format!("{} {}\n", "Error:".red().bold(), error));
    }

    out
}

/// One block per launch: task, run number, start time, outcome and source.
pub fn render_protocol(launches: &[ProtocolItem]) -> String {
    let mut out = String::new();
    if launches.is_empty() {
        out.push_str("  (no launches)\n");
        return out;
    }

    for launch in launches {
        let duration = launch
            .duration()
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:>6}  run {:<3}  {}  {:<12}  {:>8}  {:<12}  {}\n",
            format!("#{}", launch.task_id),
            launch.launch_number,
            launch.started_at.format("%Y-%m-%d %H:%M:%S"),
            launch_badge(&launch.launch_status),
            duration,
            source_badge(launch),
            launch.title
        ));
        out.push_str(&format!("          {}\n", launch.url.dimmed()));
        if let Some(error) = launch.launch_error_msg.as_deref().filter(|e| !e.is_empty()) {
            out.push_str(&format!("          {} {}\n", "Error:".red().bold(), error));
        }
    }
    out
}

/// Indented tree starting at the root. Nodes the root cannot reach are
/// printed as extra trees after it.
pub fn render_tree(graph: &SourceGraph) -> String {
    if graph.is_empty() {
        return "  (no sources yet)\n".to_string();
    }

    let mut out = String::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for node in &graph.nodes {
        if !visited.insert(node.id.as_str()) {
            continue;
        }
        out.push_str(&node_line(graph, &node.id));
        out.push('\n');
        write_children(graph, &node.id, "", &mut visited, &mut out);
    }

    out
}

fn write_children<'a>(
    graph: &'a SourceGraph,
    id: &'a str,
    prefix: &str,
    visited: &mut HashSet<&'a str>,
    out: &mut String,
) {
    // Claimed up front so repeated ids and nodes seen elsewhere are never
    // counted as siblings
    let children: Vec<&str> = graph
        .children(id)
        .filter(|child| visited.insert(*child))
        .collect();

    for (i, child) in children.iter().copied().enumerate() {
        let is_last = i == children.len() - 1;
        let branch = if is_last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&node_line(graph, child));
        out.push('\n');

        let next_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        write_children(graph, child, &next_prefix, visited, out);
    }
}

fn node_line(graph: &SourceGraph, id: &str) -> String {
    match graph.node(id) {
        Some(node) => match &node.url {
            Some(url) => format!("{}  {}", node.label, url),
            None => node.label.clone(),
        },
        None => id.to_string(),
    }
}

pub fn render_dot(graph: &SourceGraph) -> String {
    let topology = graph.topology();
    let labelled: DiGraph<String, &str> = topology
        .graph
        .map(|_, position| graph.nodes[*position].label.clone(), |_, _| "");
    format!("{}", Dot::with_config(&labelled, &[DotConfig::EdgeNoLabel]))
}

pub fn render_json(frame: &LayoutFrame) -> serde_json::Result<String> {
    serde_json::to_string_pretty(frame)
}

pub fn render_graph(
    graph: &SourceGraph,
    frame: &LayoutFrame,
    format: OutputFormat,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_tree(graph)),
        OutputFormat::Json => render_json(frame),
        OutputFormat::Dot => Ok(render_dot(graph)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use taskwatch_client::Source;

    fn source(id: i64, parent_id: Option<i64>, title: &str) -> Source {
        Source {
            id,
            parent_id,
            title: title.to_string(),
            url: format!("https://example.com/{}", id),
            weight: 1.0,
        }
    }

    #[test]
    fn test_count_sources() {
        assert_eq!(count_sources(0), "0 sources");
        assert_eq!(count_sources(1), "1 source");
        assert_eq!(count_sources(2), "2 sources");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("dot".parse::<OutputFormat>(), Ok(OutputFormat::Dot));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    fn launch(status: &str, duration: Option<i64>, error: Option<&str>) -> ProtocolItem {
        let at = "2024-05-01T10:00:00Z".parse().unwrap();
        ProtocolItem {
            task_id: 12,
            query: "rust".to_string(),
            source_id: 40,
            title: "Tokio internals".to_string(),
            url: "https://tokio.rs/blog".to_string(),
            created_at: at,
            updated_at: at,
            source_status: "available".to_string(),
            launch_id: 7,
            launch_number: 3,
            started_at: at,
            duration,
            launch_status: status.to_string(),
            launch_error_msg: error.map(str::to_string),
        }
    }

    #[test]
    fn test_protocol_lists_launches() {
        let out = render_protocol(&[
            launch("finished", Some(1_500_000_000), None),
            launch("failed", None, Some("connection reset")),
        ]);

        assert!(out.contains("run 3"));
        assert!(out.contains("2024-05-01 10:00:00"));
        assert!(out.contains("1.5s"));
        assert!(out.contains("Tokio internals"));
        assert!(out.contains("connection reset"));
        assert_eq!(out.matches("https://tokio.rs/blog").count(), 2);
    }

    #[test]
    fn test_protocol_empty() {
        assert_eq!(render_protocol(&[]), "  (no launches)\n");
    }

    #[test]
    fn test_tree_nests_children() {
        let graph = build_graph(&[
            source(1, None, "A"),
            source(2, Some(1), "B"),
            source(3, None, "C"),
        ]);
        let tree = render_tree(&graph);
        let lines: Vec<&str> = tree.lines().collect();

        assert_eq!(lines[0], "Search engine");
        assert_eq!(lines[1], "├── A  https://example.com/1");
        assert_eq!(lines[2], "│   └── B  https://example.com/2");
        assert_eq!(lines[3], "└── C  https://example.com/3");
    }

    #[test]
    fn test_tree_terminates_on_loops() {
        let graph = build_graph(&[source(1, Some(2), "A"), source(2, Some(1), "B")]);
        let tree = render_tree(&graph);
        assert_eq!(tree.lines().count(), 3);
    }

    #[test]
    fn test_tree_repeated_child_id_closes_branch() {
        let graph = build_graph(&[
            source(1, None, "A"),
            source(2, Some(1), "B"),
            source(2, Some(1), "B"),
        ]);
        let tree = render_tree(&graph);
        let lines: Vec<&str> = tree.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Search engine",
                "└── A  https://example.com/1",
                "    └── B  https://example.com/2",
            ]
        );
    }

    #[test]
    fn test_dot_lists_every_node() {
        let graph = build_graph(&[source(1, None, "A"), source(2, Some(1), "B")]);
        let dot = render_dot(&graph);
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("Search engine"));
        assert_eq!(dot.matches("->").count(), 2);
    }
}
