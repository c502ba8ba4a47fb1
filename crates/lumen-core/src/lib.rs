// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub mod error;

pub use error::{error_kind, CapabilityError, LumenError, ValidationReport};

use std::{fs, path::Path, sync::Mutex};

/// Installs the global subscriber. With a log file, output goes there
/// (ANSI off) instead of stderr. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            let _ = fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .compact()
                .try_init();
            tracing::info!("logging to {}", path.display());
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter())
                .with_target(false)
                .compact()
                .try_init();
        }
    }
    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| LumenError::platform("create log dir", e))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LumenError::asset(path.display().to_string(), e.to_string()))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("lumen.log");
        let file = open_log_file(&path).unwrap();
        drop(file);
        assert!(path.exists());
    }
}
