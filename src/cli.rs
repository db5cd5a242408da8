use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Convert new feed items into standalone EPUB files.
#[derive(Debug, Parser)]
#[command(name = "rss2epub", version, about)]
pub struct Cli {
    /// Directory that receives one subdirectory of documents per feed
    #[arg(long, short, global = true, env = "RSS2EPUB_OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Where seen-sets are kept [default: <OUTPUT>/.seen]
    #[arg(long, global = true, env = "RSS2EPUB_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Per-fetch timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert new items from a single feed, then exit
    Once {
        /// Feed URL (http, https or file)
        url: String,
    },
    /// Watch every feed in a list file, reloading the list when it changes
    Watch {
        /// File with one feed URL per line
        #[arg(long, short, env = "RSS2EPUB_FEEDS")]
        feeds: PathBuf,

        /// Seconds between polling cycles
        #[arg(
            long,
            short,
            env = "RSS2EPUB_INTERVAL",
            default_value_t = 300,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: u64,
    },
}

impl Cli {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| self.output.join(".seen"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn once_defaults() {
        let cli = Cli::try_parse_from(["rss2epub", "once", "https://e.com/feed"]).unwrap();

        assert!(matches!(cli.command, Command::Once { ref url } if url == "https://e.com/feed"));
        assert_eq!(cli.timeout, 30);
        assert_eq!(cli.state_dir(), PathBuf::from(".").join(".seen"));
    }

    #[test]
    fn watch_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rss2epub", "watch", "--feeds", "feeds.txt", "-i", "60", "--output", "books",
            "--state-dir", "st",
        ])
        .unwrap();

        match cli.command {
            Command::Watch { ref feeds, interval } => {
                assert_eq!(feeds, &PathBuf::from("feeds.txt"));
                assert_eq!(interval, 60);
            }
            _ => panic!("expected watch"),
        }
        assert_eq!(cli.output, PathBuf::from("books"));
        assert_eq!(cli.state_dir(), PathBuf::from("st"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Cli::try_parse_from(["rss2epub", "watch", "-f", "x", "-i", "0"]).is_err());
    }
}
