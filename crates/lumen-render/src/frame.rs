// SPDX-License-Identifier: CEPL-1.0
//! The per-tick acquire -> record -> submit -> present cycle over N frame
//! slots.
//!
//! Each slot owns a command buffer, a completion fence and a uniform buffer
//! on the backend side. This module owns the slot state machine and the
//! ordering; the backend only executes the individual steps.
//!
//! Slot lifecycle: `Idle` (fence signaled) -> `Recording` -> `Submitted` ->
//! `Idle` once the fence wait returns. Fences start signaled, so the first
//! pass over every slot never blocks. A tick that fails after the reset
//! abandons the slot, which leaves it `Idle` with a signaled fence.

use crate::draw::{DrawCall, DrawRecord, Geometry};
use crate::uniform::DynamicOffsets;
use anyhow::{Context, Result};
use glam::Mat4;
use lumen_core::LumenError;
use tracing::warn;

/// Bytes written per draw: one clip-from-object matrix.
pub const PER_DRAW_UNIFORM_BYTES: u64 = std::mem::size_of::<Mat4>() as u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Ready { image: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// Backend seam driven by [`FramePipeline::tick`], one call per step.
pub trait FrameDevice {
    type Buffer: Copy;
    type Material: Copy;

    fn slot_count(&self) -> usize;

    /// Blocks, without timeout, until the slot's last submission finished.
    fn wait_slot(&mut self, slot: usize) -> Result<()>;
    /// Next presentable image. May block on its own readiness primitive.
    fn acquire(&mut self) -> Result<Acquire>;
    /// Unsignals the slot fence and resets its command buffer.
    fn reset_slot(&mut self, slot: usize) -> Result<()>;
    fn begin_commands(&mut self, slot: usize) -> Result<()>;
    fn begin_pass(&mut self, slot: usize, image: u32);
    fn bind_pipeline(&mut self, slot: usize);
    fn bind_geometry(&mut self, slot: usize, geometry: &Geometry<Self::Buffer>);
    fn write_uniform(&mut self, slot: usize, offset: u32, bytes: &[u8]) -> Result<()>;
    fn bind_sets(&mut self, slot: usize, dynamic_offset: u32, material: Option<Self::Material>);
    fn draw_indexed(&mut self, slot: usize, call: DrawCall);
    /// Ends the pass and the command buffer, then submits with the slot
    /// fence as completion signal.
    fn end_and_submit(&mut self, slot: usize, image: u32) -> Result<()>;
    /// Reset, recording or submission failed: nothing is in
    /// flight for the slot, and its fence must be waitable again.
    fn abandon_slot(&mut self, slot: usize) -> Result<()>;
    fn present(&mut self, slot: usize, image: u32) -> Result<PresentStatus>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Recording,
    Submitted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { slot: usize, image: u32, draws: usize },
    /// Presented, but the swap chain no longer matches the surface.
    PresentedStale { slot: usize, image: u32, draws: usize },
    /// Acquisition reported out-of-date; nothing was recorded.
    Skipped,
}

impl FrameOutcome {
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, FrameOutcome::Presented { .. })
    }
}

pub struct FramePipeline {
    states: Vec<SlotState>,
    next: usize,
    offsets: DynamicOffsets,
    frames: u64,
}

impl FramePipeline {
    pub fn new(slot_count: usize, uniform_align: u64, uniform_capacity: u64) -> Self {
        Self {
            states: vec![SlotState::Idle; slot_count],
            next: 0,
            offsets: DynamicOffsets::new(uniform_align, uniform_capacity),
            frames: 0,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Slot count must match the swap-chain view count; a mismatch is a
    /// fatal configuration error.
    pub fn check_slot_count(&self, views: usize) -> Result<(), LumenError> {
        if views != self.states.len() {
            return Err(LumenError::Config(format!(
                "{views} swap-chain views but {} frame slots",
                self.states.len()
            )));
        }
        Ok(())
    }

    /// Slots whose fence will signal once their submission completes.
    pub fn submitted(&self) -> impl Iterator<Item = usize> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == SlotState::Submitted)
            .map(|(i, _)| i)
    }

    /// Every submitted slot has been waited on elsewhere (device idle).
    pub fn mark_all_idle(&mut self) {
        for s in &mut self.states {
            if *s == SlotState::Submitted {
                *s = SlotState::Idle;
            }
        }
    }

    /// Runs one frame. `view_proj` is premultiplied into every draw's
    /// transform; draws are issued in slice order.
    pub fn tick<D: FrameDevice>(
        &mut self,
        dev: &mut D,
        view_proj: Mat4,
        draws: &[DrawRecord<D::Buffer, D::Material>],
    ) -> Result<FrameOutcome> {
        self.check_slot_count(dev.slot_count())?;
        self.offsets.check_frame(draws.len(), PER_DRAW_UNIFORM_BYTES)?;
        let slot = self.next;

        match self.states[slot] {
            SlotState::Recording => {
                return Err(LumenError::Config(format!(
                    "frame slot {slot} was left mid-recording"
                ))
                .into())
            }
            SlotState::Submitted | SlotState::Idle => {
                dev.wait_slot(slot).context("wait_slot")?;
                self.states[slot] = SlotState::Idle;
            }
        }

        let (image, acquire_suboptimal) = match dev.acquire().context("acquire")? {
            Acquire::Ready { image, suboptimal } => (image, suboptimal),
            Acquire::OutOfDate => {
                warn!("swap chain out of date at acquire; frame skipped");
                return Ok(FrameOutcome::Skipped);
            }
        };

        self.states[slot] = SlotState::Recording;
        if let Err(e) = self.record_and_submit(dev, slot, image, view_proj, draws) {
            if let Err(restore) = dev.abandon_slot(slot) {
                warn!("frame slot {slot} could not be restored: {restore:#}");
                return Err(e);
            }
            self.states[slot] = SlotState::Idle;
            return Err(e);
        }
        self.states[slot] = SlotState::Submitted;
        self.next = (slot + 1) % self.states.len();
        self.frames += 1;

        let status = dev.present(slot, image).context("present")?;
        let draws = draws.len();
        if acquire_suboptimal || status != PresentStatus::Optimal {
            warn!("swap chain stale after present ({status:?}, acquire suboptimal={acquire_suboptimal})");
            return Ok(FrameOutcome::PresentedStale { slot, image, draws });
        }
        Ok(FrameOutcome::Presented { slot, image, draws })
    }

    fn record_and_submit<D: FrameDevice>(
        &mut self,
        dev: &mut D,
        slot: usize,
        image: u32,
        view_proj: Mat4,
        draws: &[DrawRecord<D::Buffer, D::Material>],
    ) -> Result<()> {
        dev.reset_slot(slot).context("reset_slot")?;
        dev.begin_commands(slot).context("begin_commands")?;
        dev.begin_pass(slot, image);
        dev.bind_pipeline(slot);

        self.offsets.reset();
        for draw in draws {
            dev.bind_geometry(slot, &draw.geometry);
            let mvp = view_proj * draw.transform;
            let offset = self.offsets.reserve(PER_DRAW_UNIFORM_BYTES)?;
            dev.write_uniform(slot, offset, bytemuck::bytes_of(&mvp))?;
            dev.bind_sets(slot, offset, draw.material);
            dev.draw_indexed(slot, draw.call());
        }

        dev.end_and_submit(slot, image).context("end_and_submit")
    }
}
