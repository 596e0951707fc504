// Client-side mirror of one task, kept current by a status monitor

use crate::config::LayoutConfig;
use crate::graph::{DEFAULT_ROOT_LABEL, GraphBuilder, GraphIssue, SourceGraph};
use crate::layout::{LayeredLayout, LayoutFrame};
use std::future::Future;
use std::sync::Arc;
use taskwatch_client::error::Result;
use taskwatch_client::{
    MonitorConfig, MonitorHandle, PollState, Source, StatusMonitor, Task, TaskApi, TaskStatus,
    Transition,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happened to the page in response to a status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Only the displayed status changed.
    StatusChanged(Transition),
    /// Task detail and sources were fetched again and the graph rebuilt.
    Reloaded { transition: Transition, sources: usize },
    /// The reload failed; the page keeps showing the previous data.
    ReloadFailed { transition: Transition, error: String },
}

impl PageEvent {
    pub fn transition(&self) -> &Transition {
        match self {
            PageEvent::StatusChanged(transition) => transition,
            PageEvent::Reloaded { transition, .. } => transition,
            PageEvent::ReloadFailed { transition, .. } => transition,
        }
    }
}

struct Watch {
    handle: MonitorHandle,
    events: mpsc::UnboundedReceiver<Transition>,
}

pub struct TaskPage<A: TaskApi + 'static> {
    api: Arc<A>,
    task_id: i64,
    task: Option<Task>,
    status: Option<TaskStatus>,
    sources: Vec<Source>,
    graph: SourceGraph,
    frame: Option<LayoutFrame>,
    layout: LayeredLayout,
    layout_config: LayoutConfig,
    monitor_config: MonitorConfig,
    watch: Option<Watch>,
    rebuilds: usize,
}

impl<A: TaskApi + 'static> TaskPage<A> {
    pub fn new(api: Arc<A>, task_id: i64) -> Self {
        let layout_config = LayoutConfig::default();
        Self {
            api,
            task_id,
            task: None,
            status: None,
            sources: Vec::new(),
            graph: SourceGraph::default(),
            frame: None,
            layout: LayeredLayout::from(&layout_config),
            layout_config,
            monitor_config: MonitorConfig::default(),
            watch: None,
            rebuilds: 0,
        }
    }

    pub fn with_layout(mut self, config: LayoutConfig) -> Self {
        self.layout = LayeredLayout::from(&config);
        self.layout_config = config;
        self
    }

    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    // May be newer than task().status
    pub fn status(&self) -> Option<&TaskStatus> {
        self.status.as_ref()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn graph(&self) -> &SourceGraph {
        &self.graph
    }

    pub fn frame(&self) -> Option<&LayoutFrame> {
        self.frame.as_ref()
    }

    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Fetch task detail and sources, then rebuild the graph.
    pub async fn load(&mut self) -> Result<()> {
        let (task, sources) = tokio::try_join!(
            self.api.fetch_task_detail(self.task_id),
            self.api.fetch_sources(self.task_id)
        )?;

        info!(
            "Loaded task {} ({}) with {} sources",
            self.task_id,
            task.status,
            sources.len()
        );
        self.status = Some(task.status.clone());
        self.task = Some(task);
        self.sources = sources;
        self.rebuild();
        Ok(())
    }

    fn rebuild(&mut self) {
        let root_label = self
            .task
            .as_ref()
            .map(|task| task.query.as_str())
            .filter(|query| !query.is_empty())
            .unwrap_or(DEFAULT_ROOT_LABEL);

        let graph = GraphBuilder::new()
            .with_root_label(root_label)
            .build(&self.sources);

        for issue in graph.diagnostics() {
            match issue {
                GraphIssue::DuplicateNode { id, count } => {
                    warn!("Task {}: source id {} appears {} times", self.task_id, id, count)
                }
                GraphIssue::DanglingParent { node, parent } => warn!(
                    "Task {}: source {} points at unknown parent {}",
                    self.task_id, node, parent
                ),
                GraphIssue::Cycle { nodes } => warn!(
                    "Task {}: sources {} reference each other in a loop",
                    self.task_id,
                    nodes.join(", ")
                ),
            }
        }

        self.frame = Some(LayoutFrame::compute(&graph, &self.layout, &self.layout_config));
        self.graph = graph;
        self.rebuilds += 1;
        debug!(
            "Rebuilt graph for task {}: {} nodes, {} edges",
            self.task_id,
            self.graph.nodes.len(),
            self.graph.edges.len()
        );
    }

    /// Update the page for one observed transition.
    pub async fn apply_transition(&mut self, transition: Transition) -> PageEvent {
        self.status = Some(transition.to.clone());

        if !transition.requires_reload() {
            return PageEvent::StatusChanged(transition);
        }

        info!(
            "Task {} finished processing, reloading results",
            self.task_id
        );
        match self.load().await {
            Ok(()) => PageEvent::Reloaded {
                transition,
                sources: self.sources.len(),
            },
            Err(e) => {
                warn!("Reload of task {} failed: {}", self.task_id, e);
                PageEvent::ReloadFailed {
                    transition,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Start polling the task status. A running monitor is replaced.
    pub async fn start_watching(&mut self) {
        self.stop_watching().await;

        let state = match &self.status {
            Some(status) => PollState::with_status(self.task_id, status.clone()),
            None => PollState::new(self.task_id),
        };
        let source: Arc<A> = self.api.clone();
        let monitor = StatusMonitor::new(source).with_config(self.monitor_config);
        let (handle, events) = monitor.subscribe(state);
        self.watch = Some(Watch { handle, events });
    }

    pub async fn stop_watching(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.handle.stop().await;
        }
    }

    /// Wait for the next transition and apply it. `None` when not watching.
    pub async fn next_event(&mut self) -> Option<PageEvent> {
        let transition = self.watch.as_mut()?.events.recv().await?;
        Some(self.apply_transition(transition).await)
    }

    /// Point the page at another task. All state from the previous task is
    /// dropped, including the monitor's poll state.
    pub async fn switch_task(&mut self, task_id: i64) -> Result<()> {
        let was_watching = self.is_watching();
        self.stop_watching().await;

        self.task_id = task_id;
        self.task = None;
        self.status = None;
        self.sources.clear();
        self.graph = SourceGraph::default();
        self.frame = None;

        self.load().await?;
        if was_watching {
            self.start_watching().await;
        }
        Ok(())
    }

    /// Watch until `shutdown` resolves, calling `observer` for every event.
    /// With `until_stopped`, also return once the task reaches a stopped
    /// status.
    pub async fn watch<F, O>(&mut self, shutdown: F, until_stopped: bool, mut observer: O)
    where
        F: Future<Output = ()>,
        O: FnMut(&Self, &PageEvent),
    {
        self.start_watching().await;
        tokio::pin!(shutdown);

        loop {
            if until_stopped && self.status.as_ref().is_some_and(TaskStatus::is_stopped) {
                info!("Task {} stopped, done watching", self.task_id);
                break;
            }

            let event = tokio::select! {
                _ = &mut shutdown => break,
                event = self.next_event() => event,
            };
            match event {
                Some(event) => observer(self, &event),
                None => break,
            }
        }

        self.stop_watching().await;
    }
}
