//! Logging for the shard process.

use std::{
    fs::File,
    sync::Arc,
    env,
    panic,
};
use backtrace::Backtrace;
use tracing_subscriber::{
    fmt::{
        self,
        time::uptime,
    },
    prelude::*,
    Registry,
    EnvFilter,
};
use anyhow::*;


/// Filter applied before `RUST_LOG`: gump and shard events from debug up, dependencies only warn.
pub const DEFAULT_FILTER: &'static str = "warn,gump=debug,shard=debug";

/// Name of the file logs are also written to.
pub const LOG_FILE_NAME: &'static str = "log";

/// Installs a `tracing` logging backend which outputs to stdout and also a `log` file, and routes
/// panics through it. Accepts ecosystem-standard `RUST_LOG` env filters on top of the defaults.
pub fn init_logging() -> Result<()> {
    let format = fmt::format()
        .compact()
        .with_timer(uptime())
        .with_line_number(true);
    let stdout_log = fmt::layer()
        .event_format(format);

    let log_file = File::create(LOG_FILE_NAME)
        .context("unable to create log file")?;
    let log_file_log = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    let subscriber = Registry::default()
        .with(EnvFilter::new(filter_directives(env::var(EnvFilter::DEFAULT_ENV).ok())))
        .with(stdout_log)
        .with(log_file_log);
    tracing::subscriber::set_global_default(subscriber)
        .context("unable to install log subscriber")?;
    info!("starting shard");

    // panics land in the log file alongside everything else
    panic::set_hook(Box::new(|info| {
        error!("{}", info);
        if env::var("RUST_BACKTRACE").map(|val| val == "1").unwrap_or(true) {
            error!("{:?}", Backtrace::new());
        }
    }));
    trace!("installed custom panic hook");
    Ok(())
}

// defaults, with the env var's directives taking precedence
fn filter_directives(env_filter: Option<String>) -> String {
    let mut filter = DEFAULT_FILTER.to_owned();
    if let Some(env_filter) = env_filter.filter(|f| !f.is_empty()) {
        filter.push(',');
        filter.push_str(&env_filter);
    }
    filter
}


#[test]
fn test_env_filter_appends() {
    assert_eq!(filter_directives(None), DEFAULT_FILTER);
    assert_eq!(filter_directives(Some(String::new())), DEFAULT_FILTER);
    assert_eq!(
        filter_directives(Some("gump=trace".into())),
        "warn,gump=debug,shard=debug,gump=trace",
    );
}
