use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use taskwatch_client::model::{ProtocolFilter, TaskFilter, TaskParams};
use taskwatch_client::{ApiClient, TaskStatus};
use taskwatch_core::config::Config;
use taskwatch_core::layout::Direction;
use taskwatch_core::page::{PageEvent, TaskPage};
use taskwatch_core::render::{
    OutputFormat, count_sources, render_graph, render_protocol, render_task, render_task_list,
    status_badge,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

// Setup helpers

/// Log level used when `RUST_LOG` is not set.
pub fn verbosity_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

pub fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbose, quiet)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read the config file named by `--config`, then apply `--api-url`.
pub fn load_settings(args: &ArgMatches) -> Result<Config> {
    let path = args
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(taskwatch_core::config::DEFAULT_CONFIG_PATH);
    let mut config = Config::load(path)?;

    if let Some(url) = args.get_one::<Url>("api-url") {
        config.api.base_url = url.to_string();
    }
    debug!("Using task service at {}", config.api.base_url);
    Ok(config)
}

pub fn build_client(config: &Config) -> Result<ApiClient> {
    ApiClient::with_timeout(&config.api.base_url, config.api.request_timeout_secs)
        .with_context(|| format!("Cannot use task service URL {}", config.api.base_url))
}

pub fn parse_task_filter(args: &ArgMatches) -> TaskFilter {
    let mut filter = TaskFilter::default();
    if let Some(limit) = args.get_one::<i64>("limit") {
        filter.limit = *limit;
    }
    if let Some(offset) = args.get_one::<i64>("offset") {
        filter.offset = *offset;
    }
    filter.status = args
        .get_one::<String>("status")
        .map(|s| TaskStatus::from(s.as_str()));
    filter.query = text_arg(args, "query");
    filter
}

fn text_arg(args: &ArgMatches, name: &str) -> Option<String> {
    args.get_one::<String>(name)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub fn parse_protocol_filter(args: &ArgMatches) -> ProtocolFilter {
    let mut filter = ProtocolFilter::default();
    if let Some(limit) = args.get_one::<i64>("limit") {
        filter.limit = *limit;
    }
    if let Some(offset) = args.get_one::<i64>("offset") {
        filter.offset = *offset;
    }
    filter.task_id = args.get_one::<i64>("task").copied();
    filter.source_id = args.get_one::<i64>("source").copied();
    filter.query = text_arg(args, "query");
    filter.title = text_arg(args, "title");
    filter.source_status = args.get_one::<String>("source-status").cloned();
    filter
}

pub fn parse_task_params(args: &ArgMatches) -> TaskParams {
    TaskParams {
        depth_level: args.get_one::<i32>("depth-level").copied(),
        min_weight: args.get_one::<f64>("min-weight").copied(),
        max_sources: args.get_one::<i64>("max-sources").copied(),
        max_neighbours_for_source: args.get_one::<i64>("max-neighbours").copied(),
    }
}

fn task_id(args: &ArgMatches) -> Result<i64> {
    args.get_one::<i64>("ID")
        .copied()
        .context("A task id is required")
}

/// One line for the watch log.
pub fn describe_event(event: &PageEvent) -> String {
    match event {
        PageEvent::StatusChanged(transition) => format!(
            "{} {} → {}",
            "•".blue(),
            status_badge(&transition.from),
            status_badge(&transition.to)
        ),
        PageEvent::Reloaded { sources, .. } => format!(
            "{} Processing finished, reloaded {}",
            "✓".green().bold(),
            count_sources(*sources as i64)
        ),
        PageEvent::ReloadFailed { error, .. } => {
            format!("{} Reload failed: {}", "✗".red().bold(), error)
        }
    }
}

fn spinner(message: String) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message);
    Ok(spinner)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

// Subcommand handlers

pub async fn handle_tasks(client: &ApiClient, args: &ArgMatches) -> Result<()> {
    let filter = parse_task_filter(args);
    let list = client
        .tasks(&filter)
        .await
        .context("Failed to list tasks")?;

    print_divider();
    println!("{}", "  TASKS".bright_white().bold());
    print_divider();
    print!("{}", render_task_list(&list.tasks, list.total));
    Ok(())
}

pub async fn handle_protocol(client: &ApiClient, args: &ArgMatches) -> Result<()> {
    let filter = parse_protocol_filter(args);
    let launches = client
        .protocol(&filter)
        .await
        .context("Failed to load the launch protocol")?;

    print_divider();
    println!("{}", "  PROTOCOL".bright_white().bold());
    print_divider();
    print!("{}", render_protocol(&launches));
    if launches.len() as i64 == filter.limit {
        println!(
            "\n{} More may follow: pass --offset {}",
            "→".blue(),
            filter.offset + filter.limit
        );
    }
    Ok(())
}

pub async fn handle_create(client: &ApiClient, args: &ArgMatches) -> Result<()> {
    let query = args
        .get_one::<String>("QUERY")
        .map(|q| q.trim())
        .unwrap_or_default();
    if query.is_empty() {
        bail!("The search query must not be empty");
    }

    let id = client
        .create_task(query)
        .await
        .context("Failed to create task")?;
    println!("{} Created task #{} for \"{}\"", "✓".green().bold(), id, query);
    println!(
        "{} Run `taskwatch activate {}` to start crawling",
        "→".blue(),
        id
    );
    Ok(())
}

pub async fn handle_show(client: &ApiClient, args: &ArgMatches) -> Result<()> {
    let id = task_id(args)?;
    let (task, sources) = tokio::try_join!(client.task(id), client.sources(id))
        .with_context(|| format!("Failed to load task {}", id))?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    print!("{}", render_task(&task));
    println!();
    println!("{} {} found", "→".blue(), count_sources(sources.len() as i64));
    Ok(())
}

pub async fn handle_tune(client: &ApiClient, args: &ArgMatches) -> Result<()> {
    let id = task_id(args)?;
    let params = parse_task_params(args);
    if params.is_empty() {
        bail!(
            "Nothing to change: pass at least one of --depth-level, --min-weight, \
             --max-sources or --max-neighbours"
        );
    }

    client
        .update_task(id, &params)
        .await
        .with_context(|| format!("Failed to update task {}", id))?;

    println!("{} Updated task #{}", "✓".green().bold(), id);
    if let Some(depth) = params.depth_level {
        println!("  {} depth level: {}", "•".yellow(), depth);
    }
    if let Some(weight) = params.min_weight {
        println!("  {} min weight: {}", "•".yellow(), weight);
    }
    if let Some(max) = params.max_sources {
        println!("  {} max sources: {}", "•".yellow(), max);
    }
    if let Some(max) = params.max_neighbours_for_source {
        println!("  {} max neighbours: {}", "•".yellow(), max);
    }
    Ok(())
}

pub async fn handle_activate(client: &ApiClient, args: &ArgMatches) -> Result<()> {
    let id = task_id(args)?;
    client
        .activate_task(id)
        .await
        .with_context(|| format!("Failed to activate task {}", id))?;
    println!("{} Task #{} is active and queued", "✓".green().bold(), id);
    Ok(())
}

pub async fn handle_graph(client: Arc<ApiClient>, config: &Config, args: &ArgMatches) -> Result<()> {
    let id = task_id(args)?;
    let format: OutputFormat = args
        .get_one::<String>("format")
        .map(|f| f.parse())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();

    let mut layout = config.layout.clone();
    if let Some(direction) = args.get_one::<String>("direction") {
        layout.direction = direction.parse::<Direction>().map_err(anyhow::Error::msg)?;
    }

    let mut page = TaskPage::new(client, id).with_layout(layout);
    page.load()
        .await
        .with_context(|| format!("Failed to load task {}", id))?;
    let frame = page.frame().context("No layout was computed")?;

    print!("{}", render_graph(page.graph(), frame, format)?);
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

pub async fn handle_watch(client: Arc<ApiClient>, config: &Config, args: &ArgMatches) -> Result<()> {
    let id = task_id(args)?;
    let until_stopped = args.get_flag("until-stopped");

    let mut monitor = config.monitor.clone();
    if let Some(interval_ms) = args.get_one::<u64>("interval-ms") {
        monitor.interval_ms = *interval_ms;
    }

    let mut page = TaskPage::new(client, id)
        .with_layout(config.layout.clone())
        .with_monitor_config(monitor.to_monitor_config());
    page.load()
        .await
        .with_context(|| format!("Failed to load task {}", id))?;

    if let Some(task) = page.task() {
        println!("{} Task #{}: {}", "→".blue(), id, task.query.bright_white().bold());
        println!(
            "{} {} with {}",
            "→".blue(),
            status_badge(&task.status),
            count_sources(page.sources().len() as i64)
        );
    }

    let spinner = spinner(format!("Watching task #{} (ctrl-c to stop)", id))?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            debug!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    page.watch(shutdown, until_stopped, |page, event| {
        spinner.println(describe_event(event));
        if let Some(status) = page.status() {
            spinner.set_message(format!(
                "Watching task #{} ({}, {})",
                id,
                status_badge(status),
                count_sources(page.sources().len() as i64)
            ));
        }
    })
    .await;
    spinner.finish_and_clear();

    match page.status() {
        Some(status) => println!("{} Task #{} is {}", "✓".green().bold(), id, status_badge(status)),
        None => println!("{} Stopped watching task #{}", "✓".green().bold(), id),
    }
    Ok(())
}
