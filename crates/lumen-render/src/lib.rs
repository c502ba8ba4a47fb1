// SPDX-License-Identifier: CEPL-1.0
pub mod draw;
pub mod frame;
pub mod memory;
pub mod negotiate;
pub mod resident;
pub mod scene;
pub mod types;
pub mod uniform;
pub mod upload;
pub mod vertex;

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use scene::SceneData;
use std::path::PathBuf;

pub use draw::{DrawCall, DrawRecord, Geometry};
pub use frame::{Acquire, FrameDevice, FrameOutcome, FramePipeline, PresentStatus, SlotState};
pub use memory::{find_memory_type, MemoryClass};
pub use resident::ResidentScene;
pub use negotiate::{select_adapter, AdapterProbe, FormatRequirement, Requirements, Selection};
pub use types::*;
pub use uniform::{align_up, check_arena, DynamicOffsets};
pub use vertex::Vertex;
pub use upload::{read_back, upload, upload_image, DeviceBuffer, DeviceImage, TransferCommand, TransferDevice};

#[derive(Clone, Copy, Debug)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub clear_color: [f32; 4],
    pub validation: bool,
    /// Directory holding `simple.vert.spv` / `simple.frag.spv`.
    pub shader_dir: PathBuf,
    /// Per-slot dynamic uniform buffer size.
    pub uniform_bytes: u64,
}

pub trait Renderer {
    /// Builds the device, swap chain and frame slots, then uploads `scene`.
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        options: &RenderOptions,
        scene: &SceneData,
    ) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self) -> Result<()>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
}
