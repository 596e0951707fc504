pub mod config;
pub mod graph;
pub mod layout;
pub mod page;
pub mod render;

pub use config::{Config, ConfigError, LayoutConfig};
pub use graph::{GraphBuilder, GraphIssue, SourceGraph, build_graph};
pub use layout::{LayeredLayout, LayoutAdapter, LayoutFrame};
pub use page::{PageEvent, TaskPage};
