use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Harbor: a headless host for Chrome-style browser extensions.
#[derive(Parser, Debug)]
#[command(name = "harbor", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load every extension under a directory and report the outcome.
    Load {
        /// Extensions directory. Defaults to the configured one.
        dir: Option<PathBuf>,
    },
    /// Test a URL against a match pattern.
    Match { pattern: String, url: String },
    /// Load one extension and serve call envelopes read from stdin.
    ///
    /// Each input line is a `{api, method, params, callbackId}` object.
    /// Replies and events are written to stdout as JSON lines.
    Serve {
        extension: PathBuf,

        /// Open a tab at this URL and inject matching content scripts.
        #[arg(long)]
        url: Option<String>,
    },
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_takes_an_optional_url() {
        let args = Args::try_parse_from(["harbor", "serve", "./ext", "--url", "https://example.com/"]).unwrap();
        match args.command {
            Command::Serve { extension, url } => {
                assert_eq!(extension, PathBuf::from("./ext"));
                assert_eq!(url.as_deref(), Some("https://example.com/"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_come_before_the_subcommand() {
        let args = Args::try_parse_from(["harbor", "--log-level", "debug", "load"]).unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(matches!(args.command, Command::Load { dir: None }));
    }

    #[test]
    fn match_needs_pattern_and_url() {
        assert!(Args::try_parse_from(["harbor", "match", "<all_urls>"]).is_err());
    }
}
