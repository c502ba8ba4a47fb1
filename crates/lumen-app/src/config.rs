// SPDX-License-Identifier: CEPL-1.0
use lumen_core::LumenError;
use lumen_platform::WindowConfig;
use lumen_render::frame::PER_DRAW_UNIFORM_BYTES;
use lumen_render::{check_arena, RenderOptions};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub scene: SceneCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub validation: bool,
    pub shader_dir: PathBuf,
    pub uniform_bytes: u64,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct SceneCfg {
    pub path: Option<PathBuf>,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let w = WindowConfig::default();
        WindowCfg {
            title: w.title,
            width: w.width,
            height: w.height,
            resizable: w.resizable,
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from(lumen_render_vk::SHADER_DIR),
            uniform_bytes: 65535,
        }
    }
}

fn default_clear() -> [f32; 4] {
    [0.02, 0.02, 0.04, 1.0]
}

impl WindowCfg {
    pub fn to_window_config(&self) -> WindowConfig {
        WindowConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: self.resizable,
        }
    }
}

impl RenderCfg {
    /// The device may still raise the `uniform_bytes` floor to its offset
    /// alignment; here it is one unaligned draw.
    pub fn to_options(&self) -> Result<RenderOptions, LumenError> {
        check_arena(self.uniform_bytes, PER_DRAW_UNIFORM_BYTES, 1)?;
        Ok(RenderOptions {
            clear_color: self.clear_color,
            validation: self.validation,
            shader_dir: self.shader_dir.clone(),
            uniform_bytes: self.uniform_bytes,
        })
    }
}

pub fn parse(text: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Missing file: defaults. Unreadable or malformed file: a warning, then defaults.
pub fn load(path: &Path) -> AppConfig {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no config at {}, using defaults", path.display());
            return AppConfig::default();
        }
        Err(e) => {
            warn!("cannot read {}: {e}; using defaults", path.display());
            return AppConfig::default();
        }
    };
    match parse(&text) {
        Ok(cfg) => {
            info!("config loaded from {}", path.display());
            cfg
        }
        Err(e) => {
            warn!("malformed config {}: {e}; using defaults", path.display());
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.window.title, "lumen");
        assert_eq!((cfg.window.width, cfg.window.height), (1024, 768));
        assert!(!cfg.window.resizable);
        assert_eq!(cfg.render.uniform_bytes, 65535);
        assert_eq!(cfg.render.validation, cfg!(debug_assertions));
        assert!(cfg.scene.path.is_none());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = parse(
            r#"
            [window]
            title = "demo"
            resizable = true

            [render]
            clear_color = [1.0, 0.0, 0.0, 1.0]

            [scene]
            path = "assets/box.gltf"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "demo");
        assert!(cfg.window.resizable);
        assert_eq!(cfg.window.width, 1024);
        assert_eq!(cfg.render.clear_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(cfg.render.shader_dir, PathBuf::from(lumen_render_vk::SHADER_DIR));
        assert_eq!(cfg.scene.path, Some(PathBuf::from("assets/box.gltf")));
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn malformed_or_missing_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("absent.toml")), AppConfig::default());

        let path = dir.path().join("lumen.toml");
        fs::write(&path, "[render\nvalidation = ").unwrap();
        assert_eq!(load(&path), AppConfig::default());

        fs::write(&path, "[render]\nuniform_bytes = 4096\n").unwrap();
        assert_eq!(load(&path).render.uniform_bytes, 4096);
    }

    #[test]
    fn render_options_carry_every_field() {
        let mut cfg = RenderCfg::default();
        cfg.validation = true;
        cfg.shader_dir = PathBuf::from("shaders");
        let opts = cfg.to_options().unwrap();
        assert!(opts.validation);
        assert_eq!(opts.shader_dir, PathBuf::from("shaders"));
        assert_eq!(opts.uniform_bytes, 65535);
        assert_eq!(opts.clear_color, default_clear());
    }

    #[test]
    fn undersized_uniform_arena_is_a_config_error() {
        for bytes in [0, 1, 63] {
            let cfg = parse(&format!("[render]\nuniform_bytes = {bytes}\n")).unwrap();
            let err = cfg.render.to_options().unwrap_err();
            assert_eq!(err.kind(), "config", "uniform_bytes = {bytes}");
        }
        let cfg = parse("[render]\nuniform_bytes = 64\n").unwrap();
        assert_eq!(cfg.render.to_options().unwrap().uniform_bytes, 64);
    }
}
