use crate::CLAP_STYLING;
use clap::{arg, command};
use taskwatch_core::config::DEFAULT_CONFIG_PATH;
use url::Url;

fn task_id_arg() -> clap::Arg {
    arg!(<ID>)
        .required(true)
        .help("The task id")
        .value_parser(clap::value_parser!(i64))
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("taskwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("taskwatch")
        .about("Manage crawler tasks and watch their source graphs grow")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Only log errors")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" "More log output (repeat for debug)")
                .required(false)
                .global(true)
                .action(clap::ArgAction::Count),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Path to the config file")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            arg!(--"api-url" <URL>)
                .required(false)
                .global(true)
                .help("Base URL of the task service (overrides the config file)")
                .value_parser(clap::value_parser!(Url)),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("tasks")
                .about("List crawler tasks")
                .arg(
                    arg!(-s --"status" <STATUS>)
                        .required(false)
                        .help("Only tasks with this status")
                        .value_parser([
                            "created",
                            "active",
                            "in_processing",
                            "stopped",
                            "stopped_with_error",
                        ]),
                )
                .arg(
                    arg!(--"query" <TEXT>)
                        .required(false)
                        .help("Only tasks whose query contains TEXT"),
                )
                .arg(
                    arg!(-l --"limit" <N>)
                        .required(false)
                        .help("Page size")
                        .value_parser(clap::value_parser!(i64).range(1..))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"offset" <N>)
                        .required(false)
                        .help("Number of tasks to skip")
                        .value_parser(clap::value_parser!(i64).range(0..))
                        .default_value("0"),
                ),
        )
        .subcommand(
            command!("create")
                .about("Create a task from a search query")
                .arg(arg!(<QUERY>).required(true).help("The search query to crawl for")),
        )
        .subcommand(
            command!("show")
                .about("Show task parameters and launch statistics")
                .arg(task_id_arg())
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the raw task as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("tune")
                .about("Change crawl parameters. Parameters you leave out stay as they are.")
                .arg(task_id_arg())
                .arg(
                    arg!(--"depth-level" <N>)
                        .required(false)
                        .help("How many links deep to follow")
                        .value_parser(clap::value_parser!(i32)),
                )
                .arg(
                    arg!(--"min-weight" <WEIGHT>)
                        .required(false)
                        .help("Drop sources scoring below WEIGHT")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"max-sources" <N>)
                        .required(false)
                        .help("Stop after N sources")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"max-neighbours" <N>)
                        .required(false)
                        .help("Follow at most N links from each source")
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
        .subcommand(
            command!("activate")
                .about("Mark a task active and queue it for crawling")
                .arg(task_id_arg()),
        )
        .subcommand(
            command!("protocol")
                .about("List crawl launches per source")
                .arg(
                    arg!(-t --"task" <ID>)
                        .required(false)
                        .help("Only launches of this task")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"query" <TEXT>)
                        .required(false)
                        .help("Only tasks whose query contains TEXT"),
                )
                .arg(
                    arg!(--"source" <ID>)
                        .required(false)
                        .help("Only launches over this source")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"title" <TEXT>)
                        .required(false)
                        .help("Only sources whose title contains TEXT"),
                )
                .arg(
                    arg!(--"source-status" <STATUS>)
                        .required(false)
                        .help("Only sources with this status")
                        .value_parser(["available", "unavailable"]),
                )
                .arg(
                    arg!(-l --"limit" <N>)
                        .required(false)
                        .help("Page size")
                        .value_parser(clap::value_parser!(i64).range(1..))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"offset" <N>)
                        .required(false)
                        .help("Number of launches to skip")
                        .value_parser(clap::value_parser!(i64).range(0..))
                        .default_value("0"),
                ),
        )
        .subcommand(
            command!("graph")
                .about("Print the source graph of a task")
                .arg(task_id_arg())
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json, dot")
                        .value_parser(["text", "json", "dot"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"direction" <DIR>)
                        .required(false)
                        .help("Layout direction for JSON output: TB or LR")
                        .value_parser(["TB", "LR"]),
                ),
        )
        .subcommand(
            command!("watch")
                .about("Follow a task's status and reload its sources once processing finishes")
                .arg(task_id_arg())
                .arg(
                    arg!(--"interval-ms" <MS>)
                        .required(false)
                        .help("Time between status polls (default: from config, 1000)")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    arg!(--"until-stopped")
                        .required(false)
                        .help("Exit once the task is stopped")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}
