//! Clap command tree definition.
//!
//! Builds the `clap::Command` tree for the `zar` archive maintenance
//! tool: one subcommand per archive operation, the way the original
//! tool split these into separate `find`/`import`/`ls`/`rm`/`rmdirs`
//! programs registered under a shared root command.

use clap::{Arg, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("zar")
        .about("Archive maintenance tool for zq chunk archives")
        .subcommand_required(true)
        .arg(
            Arg::new("root")
                .short('R')
                .long("root")
                .help("Archive root, as a URI or local path (default: .)")
                .global(true),
        )
        .subcommand(build_import())
        .subcommand(build_ls())
        .subcommand(build_find())
        .subcommand(build_rm())
        .subcommand(build_rmdirs())
        .subcommand(build_stat())
}

fn build_import() -> Command {
    Command::new("import")
        .about("Import NDJSON log files into the archive as new chunks")
        .arg(
            Arg::new("paths")
                .required(true)
                .num_args(1..)
                .value_name("PATH")
                .help("Log file(s) to import"),
        )
}

fn build_ls() -> Command {
    Command::new("ls")
        .about("List the archive's chunks in its configured direction")
        .arg(
            Arg::new("json")
                .long("json")
                .action(clap::ArgAction::SetTrue)
                .help("Print one JSON object per chunk instead of a tab-separated line"),
        )
}

fn build_find() -> Command {
    Command::new("find")
        .about("List chunks whose span overlaps a time range")
        .arg(
            Arg::new("ts")
                .required(true)
                .value_name("TS")
                .help("Span start, in nanoseconds since the epoch"),
        )
        .arg(
            Arg::new("dur")
                .required(true)
                .value_name("DUR")
                .help("Span duration, in nanoseconds"),
        )
}

fn build_rm() -> Command {
    Command::new("rm")
        .about("Remove one or more chunks from the archive")
        .arg(
            Arg::new("chunks")
                .required(true)
                .num_args(1..)
                .value_name("CHUNK")
                .help("Chunk id(s) to remove"),
        )
}

fn build_rmdirs() -> Command {
    Command::new("rmdirs").about("Remove the archive's entire directory tree")
}

fn build_stat() -> Command {
    Command::new("stat").about("Summarize the archive: chunk count, direction, and overall span")
}
