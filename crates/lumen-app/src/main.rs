// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use anyhow::Result;
use clap::Parser;
use lumen_core::{error_kind, init_tracing};
use lumen_platform::{winit::window::Window, EventSink};
use lumen_render::scene::SceneData;
use lumen_render::{RenderSize, Renderer};
use lumen_render_vk::VkRenderer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file; missing means defaults
    #[arg(long, default_value = "lumen.toml")]
    config: PathBuf,

    /// glTF scene to show instead of the builtin quad
    #[arg(long)]
    scene: Option<PathBuf>,

    #[arg(long, default_value = "logs/lumen.log")]
    log_file: PathBuf,

    /// Override `[render] validation`
    #[arg(long)]
    validation: Option<bool>,
}

struct Viewer {
    renderer: VkRenderer,
    frames: u32,
    since: Duration,
}

impl EventSink for Viewer {
    fn tick(&mut self, dt: Duration) -> Result<()> {
        self.since += dt;
        if self.since >= Duration::from_secs(1) {
            info!("fps ~ {} ({} total)", self.frames, self.renderer.frames());
            self.frames = 0;
            self.since = Duration::ZERO;
        }
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        self.renderer.render()?;
        self.frames = self.frames.saturating_add(1);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.renderer.resize(RenderSize { width, height })
    }
}

fn load_scene(path: Option<&PathBuf>) -> Result<SceneData> {
    match path {
        Some(path) => {
            let started = Instant::now();
            let scene = lumen_asset::load_gltf(path)?;
            info!("scene {} imported in {:?}", path.display(), started.elapsed());
            Ok(scene)
        }
        None => {
            info!("no scene given, showing the builtin quad");
            Ok(SceneData::builtin_quad())
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut cfg = config::load(&args.config);
    if let Some(v) = args.validation {
        cfg.render.validation = v;
    }
    let scene_path = args.scene.or(cfg.scene.path.clone());
    let scene = load_scene(scene_path.as_ref())?;
    let options = cfg.render.to_options()?;
    info!(
        "validation={} shader_dir={} uniform_bytes={}",
        options.validation,
        options.shader_dir.display(),
        options.uniform_bytes
    );

    lumen_platform::run(cfg.window.to_window_config(), |window: &Window| {
        let size = window.inner_size();
        let size = RenderSize {
            width: size.width,
            height: size.height,
        };
        let renderer = VkRenderer::new(window, window, size, &options, &scene)?;
        Ok(Viewer {
            renderer,
            frames: 0,
            since: Duration::ZERO,
        })
    })?;
    info!("clean exit");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(Some(&args.log_file)) {
        eprintln!("lumen: logging unavailable: {e:#}");
        return ExitCode::FAILURE;
    }
    info!("lumen {} starting", env!("CARGO_PKG_VERSION"));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let chain: Vec<String> = e.chain().skip(1).map(ToString::to_string).collect();
            error!(kind = error_kind(&e), error = %e, chain = ?chain, "fatal");
            ExitCode::FAILURE
        }
    }
}
