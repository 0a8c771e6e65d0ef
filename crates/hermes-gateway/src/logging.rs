use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize tracing: console output filtered by `RUST_LOG` (default
/// `info`), plus append-mode file logs under `logs/` when a directory is
/// given (`gateway.log` for everything, `gateway.error.log` for errors).
///
/// File-log setup failures are reported on stderr and skipped; logging
/// must never stop the gateway.
pub fn init(logs_dir: Option<&Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layers = logs_dir.and_then(|dir| match open_log_files(dir) {
        Ok(layers) => Some(layers),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e}");
            None
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layers)
        .init();
}

type FileLayers<S> = Vec<Box<dyn Layer<S> + Send + Sync>>;

fn open_log_files<S>(dir: &Path) -> std::io::Result<FileLayers<S>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(dir)?;
    let open = |name: &str| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(name))
    };
    let log = Arc::new(open("gateway.log")?);
    let errors = Arc::new(open("gateway.error.log")?);

    Ok(vec![
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(log)
            .boxed(),
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(errors)
            .with_filter(LevelFilter::ERROR)
            .boxed(),
    ])
}
