// SPDX-License-Identifier: CEPL-1.0
//! Static resource upload: host bytes -> staging -> device-local, one
//! blocking one-shot transfer per resource.
//!
//! Uploads only run during setup, so every transfer waits for the queue to
//! go idle before returning. The staging buffer is destroyed on every path,
//! including failed copies.

use crate::memory::MemoryClass;
use crate::types::{BufferUsage, Extent2D, ImageLayout, ImageUsage, PixelFormat};
use anyhow::{Context, Result};
use lumen_core::LumenError;
use tracing::debug;

/// Commands recorded into the one-shot transfer buffer, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferCommand<B, I> {
    CopyBuffer { src: B, dst: B, size: u64 },
    Barrier {
        image: I,
        from: ImageLayout,
        to: ImageLayout,
    },
    CopyBufferToImage { src: B, dst: I, extent: Extent2D },
}

/// Backend seam for the uploader.
pub trait TransferDevice {
    type Buffer: Copy + std::fmt::Debug;
    type Image: Copy + std::fmt::Debug;

    fn create_buffer(&mut self, size: u64, usage: BufferUsage, class: MemoryClass)
        -> Result<Self::Buffer>;
    fn create_image(
        &mut self,
        extent: Extent2D,
        format: PixelFormat,
        usage: ImageUsage,
    ) -> Result<Self::Image>;

    /// Map, copy, unmap. Only valid for host-visible buffers.
    fn write_mapped(&mut self, buffer: Self::Buffer, bytes: &[u8]) -> Result<()>;
    fn read_mapped(&mut self, buffer: Self::Buffer, len: usize) -> Result<Vec<u8>>;

    /// Record `commands` into a one-time command buffer, submit it on the
    /// single queue and block until the queue is idle.
    fn submit_and_wait(
        &mut self,
        commands: &[TransferCommand<Self::Buffer, Self::Image>],
    ) -> Result<()>;

    fn destroy_buffer(&mut self, buffer: Self::Buffer);
    fn destroy_image(&mut self, image: Self::Image);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceBuffer<B> {
    pub handle: B,
    pub size: u64,
    pub usage: BufferUsage,
    pub class: MemoryClass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceImage<I> {
    pub handle: I,
    pub extent: Extent2D,
    pub format: PixelFormat,
}

/// Allocates a staging buffer holding `bytes`, runs `f`, then frees the
/// staging buffer whatever `f` returned.
fn with_staging<D, T>(
    dev: &mut D,
    bytes: &[u8],
    f: impl FnOnce(&mut D, D::Buffer) -> Result<T>,
) -> Result<T>
where
    D: TransferDevice,
{
    let staging = dev
        .create_buffer(bytes.len() as u64, BufferUsage::TRANSFER_SRC, MemoryClass::Staging)
        .context("create staging buffer")?;
    let res = dev
        .write_mapped(staging, bytes)
        .context("fill staging buffer")
        .and_then(|()| f(dev, staging));
    dev.destroy_buffer(staging);
    res
}

fn reject_empty(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(LumenError::Upload("empty payload".into()).into());
    }
    Ok(())
}

/// Copies `bytes` into a new device-local buffer usable as `usage`.
pub fn upload<D: TransferDevice>(
    dev: &mut D,
    usage: BufferUsage,
    bytes: &[u8],
) -> Result<DeviceBuffer<D::Buffer>> {
    reject_empty(bytes)?;
    let size = bytes.len() as u64;
    // TRANSFER_SRC keeps read_back possible
    let usage = usage | BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC;

    let handle = with_staging(dev, bytes, |dev, staging| {
        let dst = dev
            .create_buffer(size, usage, MemoryClass::Optimized)
            .context("create device-local buffer")?;
        let copy = [TransferCommand::CopyBuffer {
            src: staging,
            dst,
            size,
        }];
        if let Err(e) = dev.submit_and_wait(&copy) {
            dev.destroy_buffer(dst);
            return Err(e.context("staging -> buffer copy"));
        }
        Ok(dst)
    })?;

    debug!("uploaded {size} bytes as {usage:?}");
    Ok(DeviceBuffer {
        handle,
        size,
        usage,
        class: MemoryClass::Optimized,
    })
}

/// Copies tightly packed `pixels` into a new sampled image left in
/// shader-read-only layout.
pub fn upload_image<D: TransferDevice>(
    dev: &mut D,
    pixels: &[u8],
    extent: Extent2D,
    format: PixelFormat,
) -> Result<DeviceImage<D::Image>> {
    reject_empty(pixels)?;
    let texel = format.texel_size().ok_or_else(|| {
        LumenError::Upload(format!("{format:?} is not an uploadable texture format"))
    })?;
    let expected = extent.area() * texel as u64;
    if pixels.len() as u64 != expected {
        return Err(LumenError::Upload(format!(
            "{}x{} {format:?} needs {expected} bytes, got {}",
            extent.width,
            extent.height,
            pixels.len()
        ))
        .into());
    }

    let handle = with_staging(dev, pixels, |dev, staging| {
        let dst = dev
            .create_image(extent, format, ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED)
            .context("create device-local image")?;
        let cmds = [
            TransferCommand::Barrier {
                image: dst,
                from: ImageLayout::Undefined,
                to: ImageLayout::TransferDst,
            },
            TransferCommand::CopyBufferToImage {
                src: staging,
                dst,
                extent,
            },
            TransferCommand::Barrier {
                image: dst,
                from: ImageLayout::TransferDst,
                to: ImageLayout::ShaderReadOnly,
            },
        ];
        if let Err(e) = dev.submit_and_wait(&cmds) {
            dev.destroy_image(dst);
            return Err(e.context("staging -> image copy"));
        }
        Ok(dst)
    })?;

    debug!(
        "uploaded {}x{} {format:?} texture",
        extent.width, extent.height
    );
    Ok(DeviceImage {
        handle,
        extent,
        format,
    })
}

/// Debug copy-back: device-local buffer -> fresh staging buffer -> host.
pub fn read_back<D: TransferDevice>(dev: &mut D, buffer: &DeviceBuffer<D::Buffer>) -> Result<Vec<u8>> {
    let size = buffer.size;
    let staging = dev
        .create_buffer(size, BufferUsage::TRANSFER_DST, MemoryClass::Staging)
        .context("create read-back buffer")?;
    let copy = [TransferCommand::CopyBuffer {
        src: buffer.handle,
        dst: staging,
        size,
    }];
    let res = dev
        .submit_and_wait(&copy)
        .context("buffer -> read-back copy")
        .and_then(|()| dev.read_mapped(staging, size as usize));
    dev.destroy_buffer(staging);
    res
}
