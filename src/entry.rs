//! Process entry: argument parsing, config merge, runtime bootstrap.
use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::app::{run_export, run_summary, run_watch};
use crate::args::{Command, LinkpulseArgs};
use crate::config::{apply_config, load_config};
use crate::error::AppResult;

/// Runs the `linkpulse` command line.
///
/// # Errors
///
/// Returns an error when arguments or config are invalid, the runtime cannot
/// start, or the selected command fails.
pub fn run() -> AppResult<()> {
    let (args, matches) = parse_args()?;

    crate::system::logger::init_logging(args.verbose, args.no_color);

    let args = merge_config(args, &matches)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(args))
}

fn parse_args() -> AppResult<(LinkpulseArgs, ArgMatches)> {
    let matches = LinkpulseArgs::command().get_matches();
    let args = LinkpulseArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

fn merge_config(mut args: LinkpulseArgs, matches: &ArgMatches) -> AppResult<LinkpulseArgs> {
    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, matches, &config)?;
    }
    Ok(args)
}

async fn run_async(args: LinkpulseArgs) -> AppResult<()> {
    match args.command {
        Command::Watch(watch) => run_watch(&watch).await,
        Command::Summary(summary) => run_summary(&summary.source).await,
        Command::Export(export) => run_export(&export).await,
    }
}
