// SPDX-License-Identifier: CEPL-1.0
//! Error taxonomy shared by every lumen crate.
//!
//! Nothing below the application boundary retries or recovers. Errors are
//! raised where detected and travel up, usually wrapped in `anyhow::Error`,
//! until `main` logs one structured record and exits non-zero.

use std::fmt;
use thiserror::Error;

/// A hard requirement the hardware or the surface does not meet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("No GPU adapters enumerated.")]
    NoAdapters,
    #[error("No adapter supports the required device extensions (missing: {})", .missing.join(", "))]
    MissingExtensions { missing: Vec<String> },
    #[error("No adapter has a queue family with graphics, compute and present support")]
    NoQueueFamily,
    #[error("No adapter offers a compatible surface format")]
    NoSurfaceFormat,
    #[error("No adapter supports the {mode} present mode")]
    NoPresentMode { mode: String },
    #[error("Could not find needed memory type (allowed bits {allowed_bits:#034b}, required {required})")]
    NoMemoryType { allowed_bits: u32, required: String },
    #[error("Surface cannot provide {requested} images (supported {min}..={max})")]
    ImageCount { requested: u32, min: u32, max: u32 },
}

/// Structured record of a validation-layer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub object_type: String,
    pub handle: u64,
    pub message_id: String,
    pub message: String,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} 0x{:x}: {}",
            self.message_id, self.object_type, self.handle, self.message
        )
    }
}

#[derive(Debug, Error)]
pub enum LumenError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("{what} failed: {detail}")]
    Platform { what: &'static str, detail: String },

    #[error("validation error {0}")]
    Validation(ValidationReport),

    #[error("{file}: {}", .diagnostic.as_deref().unwrap_or("unreadable or malformed"))]
    Asset {
        file: String,
        diagnostic: Option<String>,
    },

    #[error("configuration mismatch: {0}")]
    Config(String),

    #[error("upload rejected: {0}")]
    Upload(String),
}

impl LumenError {
    pub fn asset(file: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        LumenError::Asset {
            file: file.into(),
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn platform(what: &'static str, detail: impl fmt::Display) -> Self {
        LumenError::Platform {
            what,
            detail: detail.to_string(),
        }
    }

    /// Stable lowercase tag used as the `kind` field of the fatal log record.
    pub fn kind(&self) -> &'static str {
        match self {
            LumenError::Capability(_) => "capability",
            LumenError::Platform { .. } => "platform",
            LumenError::Validation(_) => "validation",
            LumenError::Asset { .. } => "asset",
            LumenError::Config(_) => "config",
            LumenError::Upload(_) => "upload",
        }
    }
}

/// Kind of an arbitrary error chain: the first `LumenError` found wins,
/// anything else is a raw device/API failure.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|e| e.downcast_ref::<LumenError>())
        .map(LumenError::kind)
        .or_else(|| {
            err.chain()
                .find_map(|e| e.downcast_ref::<CapabilityError>())
                .map(|_| "capability")
        })
        .unwrap_or("device")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            LumenError::from(CapabilityError::NoQueueFamily).kind(),
            "capability"
        );
        assert_eq!(LumenError::asset("a.spv", "missing").kind(), "asset");
        assert_eq!(LumenError::platform("create_surface", "x").kind(), "platform");
    }

    #[test]
    fn kind_survives_anyhow_context() {
        let err = anyhow::Error::from(LumenError::Config("3 views, 2 slots".into()))
            .context("create_frame_resources");
        assert_eq!(error_kind(&err), "config");

        let raw: anyhow::Result<()> = Err(anyhow::anyhow!("ERROR_DEVICE_LOST"));
        let err = raw.context("queue_submit").unwrap_err();
        assert_eq!(error_kind(&err), "device");

        let bare = anyhow::Error::from(CapabilityError::NoAdapters);
        assert_eq!(error_kind(&bare), "capability");
    }

    #[test]
    fn asset_error_names_file_and_diagnostic() {
        let e = LumenError::asset("simple.vert.spv", "No such file or directory");
        assert_eq!(e.to_string(), "simple.vert.spv: No such file or directory");

        let e = LumenError::Asset {
            file: "scene.gltf".into(),
            diagnostic: None,
        };
        assert!(e.to_string().starts_with("scene.gltf"));
    }

    #[test]
    fn validation_report_carries_object() {
        let r = ValidationReport {
            object_type: "BUFFER".into(),
            handle: 0xbeef,
            message_id: "VUID-vkCmdDraw-None-02699".into(),
            message: "descriptor set not bound".into(),
        };
        let s = LumenError::Validation(r).to_string();
        assert!(s.contains("BUFFER 0xbeef"));
        assert!(s.contains("descriptor set not bound"));
    }
}
