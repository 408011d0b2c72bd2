mod config;
mod dispatcher;
mod fs;
mod protocol;
mod reaper;
mod server;
mod session;
mod session_table;
mod signals;
mod wire;

use std::fs as stdfs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(version, author, about = "serve a directory tree over the trivial network file system protocol")]
struct Args {
    #[clap(help = "the directory to expose as the filesystem root")]
    root: PathBuf,

    #[clap(short, long, help = "udp port to listen on")]
    port: Option<u16>,

    #[clap(short, long, action = clap::ArgAction::Count, help = "show more in logs, may be provided multiple times")]
    verbose: u8,

    #[clap(short, long, help = "a toml file containing configuration")]
    config: Option<PathBuf>,

    #[clap(long, help = "seconds of inactivity before a session is reaped")]
    idle_timeout_secs: Option<u64>,
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let filter_level = if verbose == 0 {
        log::LevelFilter::Info
    } else if verbose == 1 {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Trace
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.target(),
                message,
            ));
        })
        .level(log::LevelFilter::Warn)
        .level_for("tnfsd", filter_level)
        .chain(std::io::stderr())
        .apply()
        .context("configuring logger")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut cfg = config::Config::default();
    if let Some(path) = &args.config {
        let raw = stdfs::read_to_string(path).context("reading config file")?;
        cfg = toml::from_str(&raw).context("parsing config file")?;
    }
    if args.port.is_some() {
        cfg.port = args.port;
    }
    if args.idle_timeout_secs.is_some() {
        cfg.idle_timeout_secs = args.idle_timeout_secs;
    }

    let port = cfg.port.unwrap_or(config::DEFAULT_PORT);
    server::run(&args.root, port, cfg).context("running server")
}
