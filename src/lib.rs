// Module declarations for the application's components
pub mod config;         // YAML configuration and validation
pub mod datalog_writer; // JSON line log of every snapshot
pub mod error;          // Error macros carrying file and line
pub mod history;        // Sample ring, averaging and quality of service
pub mod monitor;        // Poll loop tying transport, history and publishing together
pub mod options;        // Command line options parsing
pub mod prelude;        // Common imports and types
pub mod snapshot;       // Published, rounded view of the inverter
pub mod solax;          // SolaX RS485 protocol: frames, live data, queries, transports
pub mod status_server;  // HTTP endpoint serving the latest snapshot
pub mod utils;          // Utility functions

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::monitor::Monitor;
use crate::prelude::*;
use crate::status_server::StatusServer;

use std::io::Write;
use std::time::Duration;

/// Sets up `env_logger` with the configured level (`RUST_LOG` wins) and
/// optionally redirects it to `log_file`.
pub fn init_logging(config: &Config) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.loglevel.as_str()));

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never);

    if let Some(path) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| file_error_with_source!(e, "cannot open log file {}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;

    Ok(())
}

/// Runs the bridge until Ctrl+C, the optional runtime limit, or a fatal error
/// from the poll loop or the status server.
///
/// Startup order:
/// 1. open the transport (serial device or simulation)
/// 2. create the monitor, which opens the datalog file
/// 3. bind the status server, unless `status_port` is 0
pub async fn app(options: Options, config: Config) -> Result<()> {
    info!("solax-bridge {} starting", CARGO_PKG_VERSION);
    config.log_summary();

    let transport = Monitor::open_transport(&config)?;
    let monitor = Monitor::new(config.clone(), transport)?;

    let mut server = if config.status_port == 0 {
        None
    } else {
        let server = StatusServer::bind(&config.status_bind, config.status_port, monitor.subscribe()).await?;
        Some(tokio::spawn(server.run()))
    };

    let runtime_limit = async {
        match options.runtime {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => futures::future::pending::<()>().await,
        }
    };

    let server_exit = async {
        match server.as_mut() {
            Some(handle) => handle.await,
            None => futures::future::pending().await,
        }
    };

    let result = tokio::select! {
        r = monitor.run() => r,
        r = server_exit => {
            let r = match r {
                Ok(Ok(())) => Err(anyhow!("status server stopped")),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(file_error_with_source!(e, "status server task failed")),
            };
            if let Err(e) = &r {
                error!("{}", e);
            }
            r
        }
        r = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            r.map_err(|e| file_error_with_source!(e, "cannot listen for ctrl-c"))
        }
        _ = runtime_limit => {
            info!("runtime limit of {}s reached, shutting down", options.runtime.unwrap_or_default());
            Ok(())
        }
    };

    if let Some(server) = server {
        server.abort();
    }

    result
}
