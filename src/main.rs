use adaptive_images::codec::encode_variant;
use adaptive_images::config::{self, ImagineConfig};
use adaptive_images::context::RequestContext;
use adaptive_images::resolver::{CacheResolver, Resolved};
use adaptive_images::routing::route_name;
use adaptive_images::{output, serve};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adaptive-images")]
#[command(about = "On-demand image variants sized for the client's screen")]
#[command(long_about = "\
On-demand image variants sized for the client's screen

Cached variants live under web_root/cache_prefix/{filter}/. Breakpoint
variants carry the breakpoint name in front of the original basename:

  web/media/cache/
  ├── adaptive/
  │   └── photos/
  │       ├── small.dawn.jpg       # breakpoint `small` of photos/dawn.jpg
  │       └── large.dawn.jpg
  └── thumb/
      └── photos/dawn.jpg          # per-filter variant, no breakpoint

The resolution cookie (\"<screen width>,<pixel density>\") decides which
breakpoint a client gets first.

Run 'adaptive-images gen-config' to generate a documented imagine.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults when missing)
    #[arg(long, default_value = "imagine.toml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Client signals a request would carry.
#[derive(clap::Args, Clone)]
struct ClientArgs {
    /// Resolution cookie value, e.g. "1280,2"
    #[arg(long)]
    cookie: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show whether a variant is cached and where it lives
    Resolve {
        filter: String,
        path: String,
        /// Breakpoint named by the request URL
        #[arg(long)]
        breakpoint: Option<String>,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// List every browser path of an image in selection order
    Paths {
        filter: String,
        path: String,
        /// Generate absolute URLs
        #[arg(long)]
        absolute: bool,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Remove every cached variant of an image
    Remove { filter: String, path: String },
    /// Remove all cached variants
    Clear,
    /// Serve cached variants over HTTP, generating misses
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
        /// Worker threads
        #[arg(long, default_value_t = 4)]
        threads: usize,
    },
    /// Validate the config file
    Check,
    /// Print a stock imagine.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = Arc::new(config::load_config(&cli.config)?);
    debug!(path = %cli.config.display(), filters = config.filters.len(), "loaded config");
    let resolver = CacheResolver::from_config(Arc::clone(&config));

    match cli.command {
        Command::Resolve {
            filter,
            path,
            breakpoint,
            client,
        } => {
            let mut request = cli_request(&config, &filter, &path, breakpoint.as_deref(), &client);
            let resolved = resolver.resolve(&mut request, &path, &filter)?;
            if client.json {
                let value = match &resolved {
                    Resolved::Redirect(redirect) => serde_json::json!({
                        "state": "hit",
                        "location": redirect.location,
                        "status": redirect.status,
                    }),
                    Resolved::Miss { target, breakpoint } => serde_json::json!({
                        "state": "miss",
                        "target": target,
                        "breakpoint": breakpoint,
                    }),
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                output::print_resolve(&filter, &path, &resolved);
            }
        }
        Command::Paths {
            filter,
            path,
            absolute,
            client,
        } => {
            let mut request = cli_request(&config, &filter, &path, None, &client);
            let paths = resolver.browser_paths(&mut request, &path, &filter, absolute)?;
            if client.json {
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                output::print_paths(&filter, &path, &paths);
            }
        }
        Command::Remove { filter, path } => {
            let removed = resolver.purge(&path, &filter)?;
            println!("{}", output::format_remove(&filter, &path, removed));
        }
        Command::Clear => {
            let cleared = resolver.clear(&config.cache_prefix)?;
            println!("{}", output::format_clear(&config.cache_root(), cleared));
        }
        Command::Serve { addr, threads } => {
            println!("==> Serving {} on http://{}", config.web_root.display(), addr);
            serve::serve(config, &addr, threads)?;
        }
        Command::Check => {
            output::print_check(&config);
            println!("==> Config is valid");
        }
        Command::GenConfig => unreachable!("handled before config loading"),
    }

    Ok(())
}

/// 0 = warn, 1 = info, 2+ = debug. `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("adaptive_images=warn"),
        1 => EnvFilter::new("adaptive_images=info"),
        _ => EnvFilter::new("adaptive_images=debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Request a browser would send for `path` under `filter`.
fn cli_request(
    config: &ImagineConfig,
    filter: &str,
    path: &str,
    breakpoint: Option<&str>,
    client: &ClientArgs,
) -> RequestContext {
    let relative = path.trim_start_matches('/');
    let variant = match breakpoint {
        Some(name) => encode_variant(relative, name),
        None => relative.to_string(),
    };
    let path_info = format!("/{}/{}/{}", config.cache_prefix(), filter, variant);

    let mut request = RequestContext::new(path_info)
        .with_script(&config.script_name)
        .with_route(route_name(filter))
        .with_attribute("filter", filter)
        .with_attribute("path", relative);
    if let Some(name) = breakpoint {
        request = request.with_attribute("name", name);
    }
    if let Some(cookie) = &client.cookie {
        request = request.with_cookie(&config.cookie_name, cookie);
    }
    request
}
