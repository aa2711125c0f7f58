//! CLI mode for folio: sync the cache, run single requests, inspect stores.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderValue};
use tokio::io::AsyncWriteExt;

use crate::{
    AppConfig, CacheController, CacheStorage, Destination, DiskStorage, Error, FetchOutcome,
    Fetcher, HttpFetcher, PathConfig, Request,
};

use progress::{TerminalEvents, print_registration, print_stores};

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Install the current version if needed and activate it.
    Sync,
    /// Run one request through the controller.
    Fetch {
        url: String,
        accept: Option<String>,
        destination: Destination,
    },
    /// List cache stores.
    Stores,
    /// Run the local proxy.
    Serve {
        host: Option<String>,
        port: Option<u16>,
    },
    /// Run the terminal particle animation.
    Particles { theme: Option<String> },
    /// Print usage.
    Help,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

impl CliArgs {
    /// Parses arguments (without the program name).
    ///
    /// # Errors
    ///
    /// Returns a message for unknown commands, unknown options and missing values.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut config_path = None;
        let mut command_name = None;
        let mut positional = Vec::new();
        let mut accept = None;
        let mut destination = Destination::Empty;
        let mut host = None;
        let mut port = None;
        let mut theme = None;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "-c" | "--config" => {
                    config_path = Some(PathBuf::from(take_value(args, &mut i, "--config")?));
                }
                "--accept" => accept = Some(take_value(args, &mut i, "--accept")?.to_string()),
                "--dest" => {
                    destination = Destination::from_fetch_dest(take_value(args, &mut i, "--dest")?);
                }
                "--host" => host = Some(take_value(args, &mut i, "--host")?.to_string()),
                "--port" => {
                    let value = take_value(args, &mut i, "--port")?;
                    port = Some(value.parse().map_err(|_| format!("invalid port: {value}"))?);
                }
                "--theme" => {
                    let value = take_value(args, &mut i, "--theme")?;
                    if value != "dark" && value != "light" {
                        return Err(format!("invalid theme: {value} (expected dark or light)"));
                    }
                    theme = Some(value.to_string());
                }
                "-h" | "--help" => {
                    return Ok(Self {
                        config_path,
                        command: Command::Help,
                    });
                }
                arg if !arg.starts_with('-') => {
                    if command_name.is_none() {
                        command_name = Some(arg.to_string());
                    } else {
                        positional.push(arg.to_string());
                    }
                }
                other => return Err(format!("Unknown option: {other}")),
            }
            i += 1;
        }

        let command = match command_name.as_deref() {
            None => Command::Help,
            Some("sync") => Command::Sync,
            Some("stores") => Command::Stores,
            Some("serve") => Command::Serve { host, port },
            Some("particles") => Command::Particles { theme },
            Some("fetch") => {
                let mut positional = positional.into_iter();
                let url = positional
                    .next()
                    .ok_or_else(|| "fetch requires a URL".to_string())?;
                Command::Fetch {
                    url,
                    accept,
                    destination,
                }
            }
            Some(other) => return Err(format!("Unknown command: {other}")),
        };

        Ok(Self {
            config_path,
            command,
        })
    }
}

pub fn print_usage() {
    eprintln!("Usage: folio [OPTIONS] <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  sync                Install the configured version (if new) and activate it");
    eprintln!("  fetch <url>         Run one request through the cache and print the body");
    eprintln!("      --accept <V>    Accept header to send (e.g. text/html)");
    eprintln!("      --dest <D>      Request destination (document, image, script, ...)");
    eprintln!("  stores              List cache stores");
    eprintln!("  serve               Run the offline caching proxy");
    eprintln!("      --host <HOST>   Bind address");
    eprintln!("      --port <PORT>   Bind port");
    eprintln!("  particles           Run the particle animation in the terminal");
    eprintln!("      --theme <T>     Initial theme: dark or light");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH> Config file (created with defaults if missing)");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FOLIO_LOG           Log filter (default: info)");
}

type DiskController = CacheController<DiskStorage, HttpFetcher>;

fn build_controller(config: &AppConfig, paths: &PathConfig) -> crate::Result<DiskController> {
    let storage = Arc::new(DiskStorage::new(&paths.storage_dir));
    CacheController::new(config.cache.clone(), storage, HttpFetcher::new()?)
}

/// Registers the controller and prints a summary.
async fn run_sync(controller: DiskController) -> crate::Result<()> {
    let events = Arc::new(TerminalEvents::new());
    let controller = controller.with_events(events.clone());
    let registration = controller.register().await;
    events.finish();
    print_registration(controller.store_name(), &registration?);
    Ok(())
}

/// Runs one request through the controller, body to stdout, outcome to stderr.
async fn run_fetch(
    controller: DiskController,
    url: &str,
    accept: Option<&str>,
    destination: Destination,
) -> crate::Result<()> {
    controller.register().await?;

    let target = if url.starts_with('/') {
        controller.config().resolve(url)?
    } else {
        Request::parse_get(url)?.url
    };
    let mut request = Request::get(target).with_destination(destination);
    if let Some(accept) = accept {
        let value = HeaderValue::from_str(accept).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: format!("invalid Accept value: {e}"),
        })?;
        request = request.with_header(ACCEPT, value);
    }

    let (label, response) = match controller.handle_fetch(&request).await {
        FetchOutcome::Intercept(response) => ("intercepted", response),
        FetchOutcome::PassThrough => ("pass-through", controller.fetcher().fetch(&request).await.ok()),
    };
    controller.settle().await;

    match response {
        Some(response) => {
            eprintln!("{label}: {} ({} bytes)", response.status, response.body.len());
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&response.body).await?;
            stdout.flush().await?;
        }
        None => eprintln!("{label}: no response"),
    }
    Ok(())
}

async fn run_stores(controller: &DiskController) -> crate::Result<()> {
    let storage = controller.storage();
    let mut stores = Vec::new();
    for name in storage.keys().await? {
        let entries = storage.entries(&name).await?.len();
        stores.push((name, entries));
    }
    print_stores(controller.store_name(), &stores);
    Ok(())
}

/// Runs the CLI with parsed arguments.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the command fails.
pub async fn run(args: CliArgs) -> crate::Result<()> {
    if args.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let paths = PathConfig::default();
    let config_path = args.config_path.unwrap_or_else(|| paths.config_path.clone());
    let mut config = AppConfig::load_or_create(&config_path)?;
    log::debug!("Loaded config from {}", config_path.display());

    match args.command {
        Command::Sync => run_sync(build_controller(&config, &paths)?).await,
        Command::Fetch {
            url,
            accept,
            destination,
        } => {
            run_fetch(
                build_controller(&config, &paths)?,
                &url,
                accept.as_deref(),
                destination,
            )
            .await
        }
        Command::Stores => run_stores(&build_controller(&config, &paths)?).await,
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.serve.host = host;
            }
            if let Some(port) = port {
                config.serve.port = port;
            }
            run_serve(&config, &paths).await
        }
        Command::Particles { theme } => {
            if let Some(theme) = theme {
                config.particles.theme = theme;
            }
            run_particles(&config).await
        }
        Command::Help => Ok(()),
    }
}

#[cfg(feature = "serve")]
async fn run_serve(config: &AppConfig, paths: &PathConfig) -> crate::Result<()> {
    let controller = Arc::new(build_controller(config, paths)?);
    crate::serve::run_proxy_server(controller, &config.serve).await
}

#[cfg(not(feature = "serve"))]
#[allow(clippy::unused_async)]
async fn run_serve(_config: &AppConfig, _paths: &PathConfig) -> crate::Result<()> {
    Err(Error::Config("proxy support not compiled in".to_string()))
}

#[cfg(feature = "tui")]
async fn run_particles(config: &AppConfig) -> crate::Result<()> {
    crate::tui::run(config.particles.clone()).await.map_err(Error::Io)
}

#[cfg(not(feature = "tui"))]
#[allow(clippy::unused_async)]
async fn run_particles(_config: &AppConfig) -> crate::Result<()> {
    Err(Error::Config("terminal animation not compiled in".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        CliArgs::parse(&args)
    }

    #[test]
    fn no_arguments_is_help() {
        assert_eq!(parse(&[]).unwrap().command, Command::Help);
        assert_eq!(parse(&["sync", "--help"]).unwrap().command, Command::Help);
    }

    #[test]
    fn sync_with_config() {
        let args = parse(&["--config", "/tmp/folio.toml", "sync"]).unwrap();
        assert_eq!(args.config_path, Some(PathBuf::from("/tmp/folio.toml")));
        assert_eq!(args.command, Command::Sync);
    }

    #[test]
    fn fetch_with_options() {
        let args = parse(&["fetch", "/about.html", "--accept", "text/html", "--dest", "document"])
            .unwrap();
        assert_eq!(
            args.command,
            Command::Fetch {
                url: "/about.html".to_string(),
                accept: Some("text/html".to_string()),
                destination: Destination::Document,
            }
        );
    }

    #[test]
    fn fetch_requires_url() {
        assert!(parse(&["fetch"]).is_err());
    }

    #[test]
    fn serve_overrides() {
        let args = parse(&["serve", "--host", "0.0.0.0", "--port", "9000"]).unwrap();
        assert_eq!(
            args.command,
            Command::Serve {
                host: Some("0.0.0.0".to_string()),
                port: Some(9000)
            }
        );
        assert!(parse(&["serve", "--port", "http"]).is_err());
    }

    #[test]
    fn particles_theme() {
        let args = parse(&["particles", "--theme", "dark"]).unwrap();
        assert_eq!(
            args.command,
            Command::Particles {
                theme: Some("dark".to_string())
            }
        );
        assert!(parse(&["particles", "--theme", "sepia"]).is_err());
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse(&["launch"]).is_err());
        assert!(parse(&["sync", "--verbose"]).is_err());
        assert!(parse(&["--config"]).is_err());
    }
}
