use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::server::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "zipmeta")]
#[command(version)]
#[command(about = "HTTP service exposing metadata of staged zip archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipmeta                              serve /tmp/ on 0.0.0.0:7715\n  \
  zipmeta -d /srv/samples -p 8080      serve another staging directory\n  \
  curl localhost:7715/zipmeta/abc-123  fetch metadata of /tmp/abc-123")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "ZIPMETA_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, env = "ZIPMETA_PORT", default_value_t = 7715)]
    pub port: u16,

    /// Directory sample identifiers are resolved against
    #[arg(
        short = 'd',
        long,
        env = "ZIPMETA_STAGING_DIR",
        value_name = "DIR",
        default_value = "/tmp/"
    )]
    pub staging_dir: PathBuf,

    /// Maximum number of archives processed concurrently
    #[arg(
        short = 'w',
        long,
        env = "ZIPMETA_WORKERS",
        default_value_t = 4,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub workers: u32,

    /// Return escaped error details to clients on internal errors
    #[arg(long, env = "ZIPMETA_EXPOSE_DIAGNOSTICS")]
    pub expose_diagnostics: bool,

    /// Log output format
    #[arg(long, env = "ZIPMETA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            staging_dir: self.staging_dir.clone(),
            workers: self.workers as usize,
            expose_diagnostics: self.expose_diagnostics,
        }
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "zipmeta=debug,info",
            (false, _) => "trace",
        }
    }
}
