//! Log output for the `ragdiag` binary.
//!
//! A diagnosis is the program's result and is printed on stdout, so log lines
//! always go to stderr. The verbosity flag only raises ragdiag's own targets;
//! the HTTP stack underneath stays at `warn` unless `RUST_LOG` asks for more.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const OWN_TARGETS: &[&str] = &["ragdiag", "ragdiag_core", "ragdiag_http"];

/// Install the global subscriber. Later calls leave the first one in place.
pub fn init_tracing(json: bool, level: Level) {
    let filter = filter_for(std::env::var("RUST_LOG").ok().as_deref(), level);

    let text = (!json).then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));
    let lines = json.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(lines)
        .try_init()
        .ok();
}

/// `RUST_LOG` when it parses, otherwise `level` for ragdiag targets only.
fn filter_for(rust_log: Option<&str>, level: Level) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }

    let level = level.as_str().to_ascii_lowercase();
    let own: Vec<String> = OWN_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    EnvFilter::new(format!("warn,{}", own.join(",")))
}
