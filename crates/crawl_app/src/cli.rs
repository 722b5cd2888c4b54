use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crawl_engine::{DEFAULT_PARALLEL_REQUESTS, DEFAULT_QUEUE_CAPACITY, DEFAULT_USER_AGENT};

const DEFAULT_SERVE_DIR: &str = "./www";
const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

#[derive(Parser, Debug)]
#[command(
    name = "crawl",
    version,
    about = "A performance measurement tool for page loads over HTTP"
)]
pub struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write the log to ./crawl.log.
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one or more pages, optionally with everything they need to render.
    Client(ClientArgs),
    /// Serve a directory of static files.
    Server(ServerArgs),
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Also download inlined images, sounds, scripts and referenced
    /// stylesheets needed to display each HTML page.
    #[arg(short = 'p', long)]
    pub page_requisites: bool,

    /// Number of parallel requests to send.
    #[arg(long, default_value_t = DEFAULT_PARALLEL_REQUESTS)]
    pub parallel: usize,

    /// Identification of the client to the HTTP server.
    #[arg(short = 'U', long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// File with one regular expression per line; matching urls are never requested.
    #[arg(long, value_name = "FILE")]
    pub url_blacklist: Option<PathBuf>,

    /// Maximum number of discovered urls waiting for a free request slot.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Log progress every N seconds.
    #[arg(long, value_name = "SECS")]
    pub progress_secs: Option<u64>,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// IP address and TCP port to listen on.
    #[arg(long, default_value = DEFAULT_SERVER_ADDR)]
    pub addr: String,

    /// Directory to serve.
    #[arg(long, default_value = DEFAULT_SERVE_DIR)]
    pub dir: PathBuf,

    /// Interpret the first directory level as the domain name.
    #[arg(long)]
    pub multi_domain: bool,

    /// Serve files with the query string as part of the file name.
    #[arg(long)]
    pub query_in_filename: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn client_defaults() {
        let cli = Cli::parse_from(["crawl", "client", "https://example.com/"]);
        let Commands::Client(args) = cli.command else {
            panic!("expected client subcommand");
        };
        assert_eq!(args.urls, vec!["https://example.com/"]);
        assert_eq!(args.parallel, 10);
        assert_eq!(args.user_agent, "crawl-perf");
        assert!(!args.page_requisites);
        assert!(args.url_blacklist.is_none());
    }

    #[test]
    fn client_short_flags() {
        let cli = Cli::parse_from([
            "crawl", "-v", "client", "-p", "-U", "loadtest", "--parallel", "3", "a", "b",
        ]);
        assert!(cli.verbose);
        let Commands::Client(args) = cli.command else {
            panic!("expected client subcommand");
        };
        assert!(args.page_requisites);
        assert_eq!(args.user_agent, "loadtest");
        assert_eq!(args.parallel, 3);
        assert_eq!(args.urls, vec!["a", "b"]);
    }

    #[test]
    fn server_defaults() {
        let cli = Cli::parse_from(["crawl", "server", "--multi-domain"]);
        let Commands::Server(args) = cli.command else {
            panic!("expected server subcommand");
        };
        assert_eq!(args.addr, "0.0.0.0:8080");
        assert_eq!(args.dir, PathBuf::from("./www"));
        assert!(args.multi_domain);
        assert!(!args.query_in_filename);
    }
}
