//! Tracing setup for processes embedding the sync engine.

use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Default filter when `RUST_LOG` does not mention the engine.
pub const DEFAULT_DIRECTIVE: &str = "rota_sync=info";

/// Install a `fmt` subscriber filtered by `RUST_LOG` plus `default_directive`.
///
/// Fails when the directive does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter = env_filter(default_directive)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| Error::InvalidInput(format!("tracing already initialized: {error}")))
}

fn env_filter(default_directive: &str) -> Result<EnvFilter> {
    let directive = default_directive
        .parse()
        .map_err(|error| Error::InvalidInput(format!("invalid log directive '{default_directive}': {error}")))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directive() {
        let err = env_filter("rota_sync=loud").unwrap_err();
        assert!(err.to_string().contains("rota_sync=loud"));
        assert!(env_filter(DEFAULT_DIRECTIVE).is_ok());
    }

    #[test]
    fn second_init_fails() {
        // the first call may lose to another test; the second never succeeds
        let _ = init_tracing(DEFAULT_DIRECTIVE);
        assert!(init_tracing(DEFAULT_DIRECTIVE).is_err());
    }
}
