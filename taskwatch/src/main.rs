use clap::ArgMatches;
use colored::Colorize;
use std::sync::Arc;
use taskwatch::command_argument_builder;
use taskwatch::handlers::*;

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();
    init_tracing(matches.get_count("verbose"), matches.get_flag("quiet"));

    if let Err(e) = run(&matches).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = load_settings(matches)?;
    let client = Arc::new(build_client(&config)?);

    match matches.subcommand() {
        Some(("tasks", args)) => handle_tasks(&client, args).await,
        Some(("create", args)) => handle_create(&client, args).await,
        Some(("show", args)) => handle_show(&client, args).await,
        Some(("tune", args)) => handle_tune(&client, args).await,
        Some(("activate", args)) => handle_activate(&client, args).await,
        Some(("protocol", args)) => handle_protocol(&client, args).await,
        Some(("graph", args)) => handle_graph(client, &config, args).await,
        Some(("watch", args)) => handle_watch(client, &config, args).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
