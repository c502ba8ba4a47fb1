// SPDX-License-Identifier: CEPL-1.0
//! Simulated backends for the integration tests. Nothing here touches a GPU.
#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use lumen_render::draw::{DrawCall, Geometry};
use lumen_render::frame::{Acquire, FrameDevice, PresentStatus};
use lumen_render::types::*;
use lumen_render::upload::{TransferCommand, TransferDevice};
use lumen_render::{AdapterProbe, MemoryClass};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const SWAPCHAIN: &str = "VK_KHR_swapchain";

// ============================================================================
// Adapters
// ============================================================================

#[derive(Clone, Debug)]
pub struct SimAdapter {
    pub name: String,
    pub class: DeviceClass,
    pub extensions: Vec<String>,
    /// (capabilities, can present to the target surface)
    pub families: Vec<(QueueCaps, bool)>,
    pub formats: Vec<SurfaceFormat>,
    pub modes: Vec<PresentMode>,
}

impl SimAdapter {
    /// Meets every requirement of the default policy.
    pub fn capable(name: &str, class: DeviceClass) -> Self {
        Self {
            name: name.to_string(),
            class,
            extensions: vec![SWAPCHAIN.to_string(), "VK_KHR_maintenance1".to_string()],
            families: vec![
                (QueueCaps::TRANSFER, false),
                (QueueCaps::GRAPHICS | QueueCaps::COMPUTE | QueueCaps::TRANSFER, true),
            ],
            formats: vec![SurfaceFormat::BGRA8_SRGB_NONLINEAR],
            modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    pub fn without_swapchain(mut self) -> Self {
        self.extensions.retain(|e| e != SWAPCHAIN);
        self
    }

    /// Graphics and present live on different families, so no single
    /// family satisfies the mask.
    pub fn split_queues(mut self) -> Self {
        self.families = vec![
            (QueueCaps::GRAPHICS | QueueCaps::COMPUTE, false),
            (QueueCaps::TRANSFER, true),
        ];
        self
    }

    pub fn with_formats(mut self, formats: Vec<SurfaceFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_modes(mut self, modes: Vec<PresentMode>) -> Self {
        self.modes = modes;
        self
    }
}

pub struct MockProbe {
    pub adapters: Vec<SimAdapter>,
}

impl AdapterProbe for MockProbe {
    type Adapter = usize;

    fn adapters(&self) -> Vec<usize> {
        (0..self.adapters.len()).collect()
    }
    fn name(&self, a: usize) -> String {
        self.adapters[a].name.clone()
    }
    fn device_class(&self, a: usize) -> DeviceClass {
        self.adapters[a].class
    }
    fn extensions(&self, a: usize) -> Vec<String> {
        self.adapters[a].extensions.clone()
    }
    fn queue_families(&self, a: usize) -> Vec<QueueCaps> {
        self.adapters[a].families.iter().map(|f| f.0).collect()
    }
    fn supports_present(&self, a: usize, family: u32) -> bool {
        self.adapters[a].families[family as usize].1
    }
    fn surface_formats(&self, a: usize) -> Vec<SurfaceFormat> {
        self.adapters[a].formats.clone()
    }
    fn present_modes(&self, a: usize) -> Vec<PresentMode> {
        self.adapters[a].modes.clone()
    }
}

// ============================================================================
// Transfer device with byte-addressed simulated memory
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

#[derive(Debug)]
pub struct SimBuffer {
    pub bytes: Vec<u8>,
    pub usage: BufferUsage,
    pub class: MemoryClass,
}

#[derive(Debug)]
pub struct SimImage {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub layout: ImageLayout,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    CopyBuffer,
    Barrier(ImageLayout, ImageLayout),
    CopyBufferToImage,
}

#[derive(Default)]
pub struct MockTransfer {
    pub next: u64,
    pub buffers: HashMap<Handle, SimBuffer>,
    pub images: HashMap<Handle, SimImage>,
    pub submits: Vec<Vec<Op>>,
    pub fail_submit: bool,
    pub fail_optimized_alloc: bool,
}

impl MockTransfer {
    pub fn live_staging(&self) -> usize {
        self.buffers
            .values()
            .filter(|b| b.class == MemoryClass::Staging)
            .count()
    }

    fn alloc(&mut self) -> Handle {
        self.next += 1;
        Handle(self.next)
    }
}

impl TransferDevice for MockTransfer {
    type Buffer = Handle;
    type Image = Handle;

    fn create_buffer(&mut self, size: u64, usage: BufferUsage, class: MemoryClass) -> Result<Handle> {
        if class == MemoryClass::Optimized && self.fail_optimized_alloc {
            bail!("ERROR_OUT_OF_DEVICE_MEMORY");
        }
        let h = self.alloc();
        self.buffers.insert(
            h,
            SimBuffer {
                bytes: vec![0; size as usize],
                usage,
                class,
            },
        );
        Ok(h)
    }

    fn create_image(&mut self, extent: Extent2D, format: PixelFormat, _usage: ImageUsage) -> Result<Handle> {
        if self.fail_optimized_alloc {
            bail!("ERROR_OUT_OF_DEVICE_MEMORY");
        }
        let h = self.alloc();
        let len = extent.area() as usize * format.texel_size().unwrap_or(4);
        self.images.insert(
            h,
            SimImage {
                extent,
                format,
                layout: ImageLayout::Undefined,
                bytes: vec![0; len],
            },
        );
        Ok(h)
    }

    fn write_mapped(&mut self, buffer: Handle, bytes: &[u8]) -> Result<()> {
        let b = self.buffers.get_mut(&buffer).ok_or_else(|| anyhow!("no buffer {buffer:?}"))?;
        if b.class == MemoryClass::Optimized {
            bail!("device-local memory is not mappable");
        }
        b.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn read_mapped(&mut self, buffer: Handle, len: usize) -> Result<Vec<u8>> {
        let b = self.buffers.get(&buffer).ok_or_else(|| anyhow!("no buffer {buffer:?}"))?;
        if b.class == MemoryClass::Optimized {
            bail!("device-local memory is not mappable");
        }
        Ok(b.bytes[..len].to_vec())
    }

    fn submit_and_wait(&mut self, commands: &[TransferCommand<Handle, Handle>]) -> Result<()> {
        if self.fail_submit {
            bail!("ERROR_DEVICE_LOST");
        }
        let mut ops = Vec::new();
        for cmd in commands {
            match *cmd {
                TransferCommand::CopyBuffer { src, dst, size } => {
                    let data = self.buffers[&src].bytes[..size as usize].to_vec();
                    let dst = self.buffers.get_mut(&dst).ok_or_else(|| anyhow!("no dst"))?;
                    if !dst.usage.contains(BufferUsage::TRANSFER_DST) {
                        bail!("copy into buffer without TRANSFER_DST");
                    }
                    dst.bytes[..size as usize].copy_from_slice(&data);
                    ops.push(Op::CopyBuffer);
                }
                TransferCommand::Barrier { image, from, to } => {
                    let img = self.images.get_mut(&image).ok_or_else(|| anyhow!("no image"))?;
                    if img.layout != from {
                        bail!("barrier from {from:?} but image is {:?}", img.layout);
                    }
                    img.layout = to;
                    ops.push(Op::Barrier(from, to));
                }
                TransferCommand::CopyBufferToImage { src, dst, .. } => {
                    let data = self.buffers[&src].bytes.clone();
                    let img = self.images.get_mut(&dst).ok_or_else(|| anyhow!("no image"))?;
                    if img.layout != ImageLayout::TransferDst {
                        bail!("copy into image in {:?}", img.layout);
                    }
                    let n = img.bytes.len().min(data.len());
                    img.bytes[..n].copy_from_slice(&data[..n]);
                    ops.push(Op::CopyBufferToImage);
                }
            }
        }
        self.submits.push(ops);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: Handle) {
        self.buffers.remove(&buffer);
    }

    fn destroy_image(&mut self, image: Handle) {
        self.images.remove(&image);
    }
}

// ============================================================================
// Frame device that records every call
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Wait(usize),
    Acquire,
    Reset(usize),
    Begin(usize),
    BeginPass(usize, u32),
    BindPipeline(usize),
    BindGeometry(usize, Geometry<Handle>),
    WriteUniform(usize, u32, usize),
    BindSets(usize, u32, Option<u32>),
    Draw(usize, DrawCall),
    Submit(usize, u32),
    Abandon(usize),
    Present(usize, u32),
}

pub struct RecordingDevice {
    pub slots: usize,
    pub images: u32,
    next_image: u32,
    pub calls: Vec<Call>,
    pub uniforms: Vec<Vec<u8>>,
    pub acquire_script: Vec<Acquire>,
    pub present_script: Vec<PresentStatus>,
    pub fail_submit: bool,
}

impl RecordingDevice {
    pub fn new(slots: usize, uniform_bytes: usize) -> Self {
        Self {
            slots,
            images: slots as u32,
            next_image: 0,
            calls: Vec::new(),
            uniforms: vec![vec![0; uniform_bytes]; slots],
            acquire_script: Vec::new(),
            present_script: Vec::new(),
            fail_submit: false,
        }
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(_, d) => Some(*d),
                _ => None,
            })
            .collect()
    }
}

impl FrameDevice for RecordingDevice {
    type Buffer = Handle;
    type Material = u32;

    fn slot_count(&self) -> usize {
        self.slots
    }
    fn wait_slot(&mut self, slot: usize) -> Result<()> {
        self.calls.push(Call::Wait(slot));
        Ok(())
    }
    fn acquire(&mut self) -> Result<Acquire> {
        self.calls.push(Call::Acquire);
        if !self.acquire_script.is_empty() {
            return Ok(self.acquire_script.remove(0));
        }
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.images;
        Ok(Acquire::Ready {
            image,
            suboptimal: false,
        })
    }
    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        self.calls.push(Call::Reset(slot));
        Ok(())
    }
    fn begin_commands(&mut self, slot: usize) -> Result<()> {
        self.calls.push(Call::Begin(slot));
        Ok(())
    }
    fn begin_pass(&mut self, slot: usize, image: u32) {
        self.calls.push(Call::BeginPass(slot, image));
    }
    fn bind_pipeline(&mut self, slot: usize) {
        self.calls.push(Call::BindPipeline(slot));
    }
    fn bind_geometry(&mut self, slot: usize, geometry: &Geometry<Handle>) {
        self.calls.push(Call::BindGeometry(slot, *geometry));
    }
    fn write_uniform(&mut self, slot: usize, offset: u32, bytes: &[u8]) -> Result<()> {
        let dst = &mut self.uniforms[slot];
        let start = offset as usize;
        dst[start..start + bytes.len()].copy_from_slice(bytes);
        self.calls.push(Call::WriteUniform(slot, offset, bytes.len()));
        Ok(())
    }
    fn bind_sets(&mut self, slot: usize, dynamic_offset: u32, material: Option<u32>) {
        self.calls.push(Call::BindSets(slot, dynamic_offset, material));
    }
    fn draw_indexed(&mut self, slot: usize, call: DrawCall) {
        self.calls.push(Call::Draw(slot, call));
    }
    fn end_and_submit(&mut self, slot: usize, image: u32) -> Result<()> {
        if self.fail_submit {
            bail!("ERROR_DEVICE_LOST");
        }
        self.calls.push(Call::Submit(slot, image));
        Ok(())
    }
    fn abandon_slot(&mut self, slot: usize) -> Result<()> {
        self.calls.push(Call::Abandon(slot));
        Ok(())
    }
    fn present(&mut self, slot: usize, image: u32) -> Result<PresentStatus> {
        self.calls.push(Call::Present(slot, image));
        if !self.present_script.is_empty() {
            return Ok(self.present_script.remove(0));
        }
        Ok(PresentStatus::Optimal)
    }
}

// ============================================================================
// Slow GPU: submissions complete on a worker thread after a delay
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    WaitBegin(usize),
    WaitEnd(usize),
    Reset(usize),
    Submit(usize),
    Completed(usize),
    Abandon(usize),
}

/// Binary fence: `true` = signaled.
pub type SimFence = Arc<(Mutex<bool>, Condvar)>;

pub struct SlowGpu {
    pub fences: Vec<SimFence>,
    pub events: Arc<Mutex<Vec<(Event, Instant)>>>,
    pub latency: Duration,
    pub fail_submit: bool,
    workers: Vec<thread::JoinHandle<()>>,
    next_image: u32,
}

impl SlowGpu {
    pub fn new(slots: usize, latency: Duration) -> Self {
        Self {
            fences: (0..slots)
                .map(|_| Arc::new((Mutex::new(true), Condvar::new())))
                .collect(),
            events: Arc::new(Mutex::new(Vec::new())),
            latency,
            fail_submit: false,
            workers: Vec::new(),
            next_image: 0,
        }
    }

    fn log(&self, e: Event) {
        self.events.lock().unwrap().push((e, Instant::now()));
    }

    pub fn join(&mut self) {
        for w in self.workers.drain(..) {
            w.join().unwrap();
        }
    }

    pub fn signaled(&self, slot: usize) -> bool {
        *self.fences[slot].0.lock().unwrap()
    }

    /// Waits like teardown does, but gives up after `timeout`.
    pub fn wait_timeout(&self, slot: usize, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.fences[slot];
        let guard = lock.lock().unwrap();
        let (guard, _) = cvar.wait_timeout_while(guard, timeout, |s| !*s).unwrap();
        *guard
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }
}

impl FrameDevice for SlowGpu {
    type Buffer = Handle;
    type Material = u32;

    fn slot_count(&self) -> usize {
        self.fences.len()
    }

    fn wait_slot(&mut self, slot: usize) -> Result<()> {
        self.log(Event::WaitBegin(slot));
        let (lock, cvar) = &*self.fences[slot];
        let mut signaled = lock.lock().unwrap();
        while !*signaled {
            signaled = cvar.wait(signaled).unwrap();
        }
        drop(signaled);
        self.log(Event::WaitEnd(slot));
        Ok(())
    }

    fn acquire(&mut self) -> Result<Acquire> {
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.fences.len() as u32;
        Ok(Acquire::Ready {
            image,
            suboptimal: false,
        })
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let (lock, _) = &*self.fences[slot];
        let mut signaled = lock.lock().unwrap();
        if !*signaled {
            bail!("slot {slot} reset while its fence is unsignaled");
        }
        *signaled = false;
        drop(signaled);
        self.log(Event::Reset(slot));
        Ok(())
    }

    fn begin_commands(&mut self, _slot: usize) -> Result<()> {
        Ok(())
    }
    fn begin_pass(&mut self, _slot: usize, _image: u32) {}
    fn bind_pipeline(&mut self, _slot: usize) {}
    fn bind_geometry(&mut self, _slot: usize, _geometry: &Geometry<Handle>) {}
    fn write_uniform(&mut self, slot: usize, _offset: u32, _bytes: &[u8]) -> Result<()> {
        let (lock, _) = &*self.fences[slot];
        if *lock.lock().unwrap() {
            bail!("uniform write for slot {slot} outside recording");
        }
        Ok(())
    }
    fn bind_sets(&mut self, _slot: usize, _dynamic_offset: u32, _material: Option<u32>) {}
    fn draw_indexed(&mut self, _slot: usize, _call: DrawCall) {}

    fn end_and_submit(&mut self, slot: usize, _image: u32) -> Result<()> {
        if self.fail_submit {
            bail!("ERROR_DEVICE_LOST");
        }
        self.log(Event::Submit(slot));
        let fence = Arc::clone(&self.fences[slot]);
        let events = Arc::clone(&self.events);
        let latency = self.latency;
        self.workers.push(thread::spawn(move || {
            thread::sleep(latency);
            let (lock, cvar) = &*fence;
            let mut signaled = lock.lock().unwrap();
            events.lock().unwrap().push((Event::Completed(slot), Instant::now()));
            *signaled = true;
            cvar.notify_all();
        }));
        Ok(())
    }

    fn abandon_slot(&mut self, slot: usize) -> Result<()> {
        let (lock, cvar) = &*self.fences[slot];
        *lock.lock().unwrap() = true;
        cvar.notify_all();
        self.log(Event::Abandon(slot));
        Ok(())
    }

    fn present(&mut self, _slot: usize, _image: u32) -> Result<PresentStatus> {
        Ok(PresentStatus::Optimal)
    }
}
