use std::io::Write;
use taskwatch::handlers::*;
use taskwatch::command_argument_builder;
use taskwatch_client::{TaskStatus, Transition};
use taskwatch_core::page::PageEvent;
use tempfile::NamedTempFile;

fn matches(args: &[&str]) -> clap::ArgMatches {
    command_argument_builder()
        .try_get_matches_from(args)
        .expect("arguments should parse")
}

fn sub<'a>(matches: &'a clap::ArgMatches, name: &str) -> &'a clap::ArgMatches {
    match matches.subcommand() {
        Some((found, args)) if found == name => args,
        other => panic!("expected subcommand {}, got {:?}", name, other.map(|(n, _)| n)),
    }
}

// ============================================================================
// Command line parsing
// ============================================================================

#[test]
fn test_subcommand_is_required() {
    assert!(command_argument_builder().try_get_matches_from(["taskwatch"]).is_err());
}

#[test]
fn test_task_id_must_be_numeric() {
    let result = command_argument_builder().try_get_matches_from(["taskwatch", "show", "abc"]);
    assert!(result.is_err());
}

#[test]
fn test_graph_format_is_restricted() {
    let result =
        command_argument_builder().try_get_matches_from(["taskwatch", "graph", "3", "-f", "svg"]);
    assert!(result.is_err());
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    let result =
        command_argument_builder().try_get_matches_from(["taskwatch", "-q", "-v", "tasks"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_task_params_only_given_fields() {
    let m = matches(&["taskwatch", "tune", "7", "--depth-level", "3", "--min-weight", "0.4"]);
    let params = parse_task_params(sub(&m, "tune"));

    assert_eq!(params.depth_level, Some(3));
    assert_eq!(params.min_weight, Some(0.4));
    assert_eq!(params.max_sources, None);
    assert_eq!(params.max_neighbours_for_source, None);
    assert!(!params.is_empty());
}

#[test]
fn test_parse_task_params_empty() {
    let m = matches(&["taskwatch", "tune", "7"]);
    assert!(parse_task_params(sub(&m, "tune")).is_empty());
}

#[test]
fn test_parse_task_filter_defaults() {
    let m = matches(&["taskwatch", "tasks"]);
    let filter = parse_task_filter(sub(&m, "tasks"));
    assert_eq!(filter.limit, 20);
    assert_eq!(filter.offset, 0);
    assert_eq!(filter.status, None);
    assert_eq!(filter.query, None);
}

#[test]
fn test_parse_task_filter_with_status_and_query() {
    let m = matches(&[
        "taskwatch",
        "tasks",
        "--status",
        "in_processing",
        "--query",
        "  rust  ",
        "--limit",
        "5",
        "--offset",
        "10",
    ]);
    let filter = parse_task_filter(sub(&m, "tasks"));
    assert_eq!(filter.status, Some(TaskStatus::InProcessing));
    assert_eq!(filter.query.as_deref(), Some("rust"));
    assert_eq!(filter.limit, 5);
    assert_eq!(filter.offset, 10);
}

#[test]
fn test_parse_protocol_filter() {
    let m = matches(&[
        "taskwatch",
        "protocol",
        "--task",
        "12",
        "--title",
        "  Tokio ",
        "--query",
        "   ",
        "--source-status",
        "unavailable",
        "--limit",
        "50",
    ]);
    let filter = parse_protocol_filter(sub(&m, "protocol"));
    assert_eq!(filter.task_id, Some(12));
    assert_eq!(filter.title.as_deref(), Some("Tokio"));
    assert_eq!(filter.query, None);
    assert_eq!(filter.source_id, None);
    assert_eq!(filter.source_status.as_deref(), Some("unavailable"));
    assert_eq!(filter.limit, 50);
    assert_eq!(filter.offset, 0);
}

#[test]
fn test_protocol_source_status_is_restricted() {
    let result = command_argument_builder().try_get_matches_from([
        "taskwatch",
        "protocol",
        "--source-status",
        "gone",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_verbosity_filter() {
    assert_eq!(verbosity_filter(0, false), "warn");
    assert_eq!(verbosity_filter(1, false), "info");
    assert_eq!(verbosity_filter(3, false), "debug");
    assert_eq!(verbosity_filter(0, true), "error");
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_load_settings_reads_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[api]")?;
    writeln!(file, "base_url = \"http://tasks.example.com:9000\"")?;
    writeln!(file, "[monitor]")?;
    writeln!(file, "interval_ms = 2500")?;

    let path = file.path().to_str().unwrap();
    let m = matches(&["taskwatch", "--config", path, "tasks"]);
    let config = load_settings(&m)?;

    assert_eq!(config.api.base_url, "http://tasks.example.com:9000");
    assert_eq!(config.monitor.interval_ms, 2500);
    Ok(())
}

#[test]
fn test_api_url_flag_overrides_config() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[api]")?;
    writeln!(file, "base_url = \"http://tasks.example.com:9000\"")?;

    let path = file.path().to_str().unwrap();
    let m = matches(&[
        "taskwatch",
        "tasks",
        "--config",
        path,
        "--api-url",
        "http://localhost:8088/api/",
    ]);
    let config = load_settings(&m)?;

    assert_eq!(config.api.base_url, "http://localhost:8088/api/");
    assert!(build_client(&config).is_ok());
    Ok(())
}

#[test]
fn test_invalid_config_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[monitor]")?;
    writeln!(file, "interval_ms = 0")?;

    let path = file.path().to_str().unwrap();
    let m = matches(&["taskwatch", "--config", path, "tasks"]);
    let err = load_settings(&m).unwrap_err();
    assert!(err.to_string().contains("monitor.interval_ms"));
    Ok(())
}

// ============================================================================
// Watch output
// ============================================================================

#[test]
fn test_describe_reload_event() {
    let event = PageEvent::Reloaded {
        transition: Transition::new(TaskStatus::InProcessing, TaskStatus::Active),
        sources: 1,
    };
    let line = describe_event(&event);
    assert!(line.contains("reloaded 1 source"));
    assert!(!line.contains("1 sources"));
}

#[test]
fn test_describe_status_change_event() {
    let event = PageEvent::StatusChanged(Transition::new(
        TaskStatus::Active,
        TaskStatus::StoppedWithError,
    ));
    let line = describe_event(&event);
    assert!(line.contains("Active"));
    assert!(line.contains("Stopped with error"));
}

#[test]
fn test_describe_failed_reload_event() {
    let event = PageEvent::ReloadFailed {
        transition: Transition::new(TaskStatus::InProcessing, TaskStatus::Active),
        error: "connection refused".to_string(),
    };
    assert!(describe_event(&event).contains("connection refused"));
}
