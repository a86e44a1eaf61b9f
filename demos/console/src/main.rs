use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::sync::mpsc;

use ws_observer::{ConnectionObserver, EchoServer, Event, Handlers, HostBuilder, ObserverConfig};

mod cli;

use cli::{Cli, Commands};

fn setup_logging(verbose: bool, quiet: bool) {
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else if quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }

    builder.init();
}

struct ObserveArgs {
    config: Option<PathBuf>,
    endpoint: Option<String>,
    greeting: Option<String>,
    no_greeting: bool,
    origin: Option<String>,
    protocols: Vec<String>,
}

fn build_config(args: ObserveArgs) -> Result<ObserverConfig> {
    let mut config = match &args.config {
        Some(path) => ObserverConfig::load(path)
            .wrap_err_with(|| format!("Failed to load config from {}", path.display()))?,
        None => ObserverConfig::default(),
    };

    if let Some(endpoint) = args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if args.no_greeting {
        config = config.without_greeting();
    } else if let Some(greeting) = args.greeting {
        config = config.with_greeting(greeting);
    }
    if let Some(origin) = args.origin {
        config = config.with_origin(origin);
    }
    for protocol in args.protocols {
        config = config.with_protocol(protocol);
    }

    Ok(config)
}

fn observe(args: ObserveArgs) -> Result<()> {
    let config = build_config(args)?;
    let host = HostBuilder::new().build().context("Failed to start host")?;

    let (done, closed) = mpsc::channel();
    let handlers = Handlers::logging().on_closed(move |reason| {
        info!("on close");
        info!("{}", Event::Closed(reason.clone()).to_json());
        let _ = done.send(reason.clone());
    });

    let observer = ConnectionObserver::connect(&host.client(), &config, handlers)
        .context("Failed to start observer")?;
    info!("Observing {} as connection {}", observer.endpoint(), observer.id());

    let reason = closed.recv().context("Host stopped before the connection closed")?;
    info!(
        "Connection {} finished with {} {:?} (clean: {})",
        observer.id(),
        reason.code,
        reason.reason,
        reason.was_clean
    );
    Ok(())
}

fn serve(addr: String, echo_limit: Option<usize>, greeting: Option<String>) -> Result<()> {
    let host = HostBuilder::new().build().context("Failed to start host")?;

    host.runtime().block_on(async move {
        let mut server = EchoServer::bind(addr.as_str())
            .await
            .wrap_err_with(|| format!("Failed to bind {}", addr))?
            .with_echo_limit(echo_limit);
        if let Some(greeting) = greeting {
            server = server.with_greeting(greeting);
        }
        server.run().await.context("Echo server stopped")
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Observe {
            config,
            endpoint,
            greeting,
            no_greeting,
            origin,
            protocols,
        } => observe(ObserveArgs {
            config,
            endpoint,
            greeting,
            no_greeting,
            origin,
            protocols,
        }),
        Commands::Serve {
            addr,
            echoes,
            unlimited,
            greeting,
        } => serve(addr, (!unlimited).then_some(echoes), greeting),
    }
}
