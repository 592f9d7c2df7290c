#[macro_use]
extern crate log;

use std::env;
use std::io::{self, Write};
use std::process;

use chrono::Local;
use env_logger::Builder;
use failure::{Error, ResultExt};
use log::LevelFilter;
use repo_sync::{Config, Driver, Git, GitHub, RepoType, UpdateFailure};
use structopt::StructOpt;

fn main() {
    let args = Args::from_args();

    if let Err(e) = run(&args) {
        if let Some(outcome_failure) = e.downcast_ref::<UpdateFailure>() {
            let mut stderr = io::stderr();
            outcome_failure.display(&mut stderr).ok();
        } else {
            eprintln!("Error: {}", e);

            for cause in e.iter_chain().skip(1) {
                eprintln!("\tCaused By: {}", cause);
            }
        }

        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    initialize_logging(args)?;
    let cfg = args.config(env::var(Config::TOKEN_VAR).ok())?;

    if log_enabled!(log::Level::Debug) {
        for line in format!("{:#?}", cfg).lines() {
            debug!("{}", line);
        }
    }

    cfg.ensure_dest_dir()?;

    let github = GitHub::with_config(&cfg)?;
    let driver = Driver::with_config(cfg);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    driver.run(&github, &Git::new(), &mut out)?;
    out.flush()?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(about = "Clone or update every repository you own on GitHub.")]
struct Args {
    #[structopt(
        short = "d",
        long = "destination",
        default_value = "./repos",
        help = "The destination directory for cloned repositories"
    )]
    destination: String,
    #[structopt(
        long = "type",
        default_value = "owner",
        help = "Which repositories to sync (all, owner, public, private or member)"
    )]
    repo_type: RepoType,
    #[structopt(
        long = "api-root",
        default_value = "https://api.github.com",
        help = "The base URL for the GitHub API"
    )]
    api_root: String,
    #[structopt(
        long = "max-pages",
        help = "Stop after fetching this many pages of repositories"
    )]
    max_pages: Option<usize>,
    #[structopt(
        long = "strict",
        help = "Exit with an error if any repository couldn't be synced"
    )]
    strict: bool,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Verbose output (repeat for more verbosity)"
    )]
    verbosity: u64,
}

impl Args {
    pub fn config(&self, token: Option<String>) -> Result<Config, Error> {
        let destination = shellexpand::full(&self.destination)
            .context("Unable to expand the destination directory")?;

        let mut cfg = Config::new(token, &*destination)?;
        cfg.repo_type = self.repo_type;
        cfg.api_root = self.api_root.clone();
        cfg.max_pages = self.max_pages;
        cfg.strict = self.strict;

        Ok(cfg)
    }
}

fn initialize_logging(args: &Args) -> Result<(), Error> {
    let mut builder = Builder::new();

    let level = match args.verbosity {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };

    if let Some(lvl) = level {
        builder.filter(Some("repo_sync"), lvl);
    }

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    builder.format(|out, record| match record.line() {
        Some(line) => writeln!(
            out,
            "{} [{:5}] ({}#{}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            line,
            record.args()
        ),
        None => writeln!(
            out,
            "{} [{:5}] ({}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        ),
    });

    builder.try_init()?;

    Ok(())
}
