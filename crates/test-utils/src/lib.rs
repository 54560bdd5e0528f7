pub mod builders;
pub mod fake_collaborator;

use std::path::Path;
use std::sync::Once;

use taskweave::config::{parse_str, ConfigFile};
use taskweave::project::Project;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::ProjectBuilder;
pub use fake_collaborator::{Behaviour, FakeCollaborator, Invocation};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Parse and validate a TOML config held in a string.
pub fn config_from_toml(toml: &str) -> taskweave::errors::Result<ConfigFile> {
    ConfigFile::try_from(parse_str(toml)?)
}

/// Parse, validate and load a TOML config into a `Project` rooted at `root`.
pub fn project_from_toml(
    toml: &str,
    root: impl AsRef<Path>,
) -> taskweave::errors::Result<Project> {
    let cfg = config_from_toml(toml)?;
    Project::from_config(&cfg, root.as_ref())
}
