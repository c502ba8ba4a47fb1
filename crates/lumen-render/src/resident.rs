// SPDX-License-Identifier: CEPL-1.0
//! A scene made resident on the device, and the draw list built over it.

use crate::draw::{DrawRecord, Geometry};
use crate::scene::{checker_texture, SceneData};
use crate::types::{BufferUsage, IndexType, PixelFormat};
use crate::upload::{upload, upload_image, DeviceBuffer, DeviceImage, TransferDevice};
use anyhow::{Context, Result};
use lumen_core::LumenError;
use tracing::info;

/// Owned device copies of a scene. Filled incrementally so a failed upload
/// leaves everything uploaded so far here for [`ResidentScene::release`].
#[derive(Debug)]
pub struct ResidentScene<B, I> {
    /// One per mesh.
    pub vertex: Vec<DeviceBuffer<B>>,
    /// One per shared index buffer.
    pub index: Vec<(DeviceBuffer<B>, IndexType)>,
    /// Scene textures, then the checker fallback.
    pub textures: Vec<DeviceImage<I>>,
}

impl<B, I> Default for ResidentScene<B, I> {
    fn default() -> Self {
        Self {
            vertex: Vec::new(),
            index: Vec::new(),
            textures: Vec::new(),
        }
    }
}

impl<B: Copy, I: Copy> ResidentScene<B, I> {
    pub fn upload<D>(&mut self, dev: &mut D, scene: &SceneData) -> Result<()>
    where
        D: TransferDevice<Buffer = B, Image = I>,
    {
        scene.validate()?;
        for (i, mesh) in scene.meshes.iter().enumerate() {
            let bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
            let buf = upload(dev, BufferUsage::VERTEX, bytes).with_context(|| format!("mesh {i} vertices"))?;
            self.vertex.push(buf);
        }
        for (i, ib) in scene.index_buffers.iter().enumerate() {
            let buf = upload(dev, BufferUsage::INDEX, &ib.bytes).with_context(|| format!("index buffer {i}"))?;
            self.index.push((buf, ib.index_type));
        }
        let fallback = checker_texture(8, 1);
        for (i, tex) in scene.textures.iter().chain(std::iter::once(&fallback)).enumerate() {
            let img = upload_image(dev, &tex.pixels, tex.extent, PixelFormat::Rgba8Unorm)
                .with_context(|| format!("texture {i}"))?;
            self.textures.push(img);
        }
        info!(
            "scene resident: {} meshes, {} index buffers, {} textures",
            self.vertex.len(),
            self.index.len(),
            self.textures.len()
        );
        Ok(())
    }

    /// Index of the checker texture every untextured mesh samples.
    pub fn fallback_texture(&self) -> Option<usize> {
        self.textures.len().checked_sub(1)
    }

    /// One record per mesh instance, in traversal order. `materials[t]` is
    /// the per-draw state for texture `t`; an empty slice means no material.
    pub fn draw_records<M: Copy>(
        &self,
        scene: &SceneData,
        materials: &[M],
    ) -> Result<Vec<DrawRecord<B, M>>, LumenError> {
        let (instances, _) = scene.flatten();
        let mut out = Vec::with_capacity(instances.len());
        for inst in instances {
            let missing = || LumenError::Config(format!("mesh {} is not resident", inst.mesh));
            let mesh = scene.meshes.get(inst.mesh).ok_or_else(missing)?;
            let vertex = self.vertex.get(inst.mesh).ok_or_else(missing)?;
            let (index, index_type) = self
                .index
                .get(mesh.index_buffer)
                .ok_or_else(|| LumenError::Config(format!("index buffer {} is not resident", mesh.index_buffer)))?;
            let texture = mesh.texture.or(self.fallback_texture());
            out.push(DrawRecord {
                transform: inst.world,
                geometry: Geometry {
                    vertex: vertex.handle,
                    index: index.handle,
                    index_type: *index_type,
                },
                index_count: mesh.index_count,
                first_index: mesh.first_index,
                vertex_offset: mesh.vertex_offset,
                material: texture.and_then(|t| materials.get(t).copied()),
            });
        }
        Ok(out)
    }

    pub fn release<D>(&mut self, dev: &mut D)
    where
        D: TransferDevice<Buffer = B, Image = I>,
    {
        for buf in self.vertex.drain(..) {
            dev.destroy_buffer(buf.handle);
        }
        for (buf, _) in self.index.drain(..) {
            dev.destroy_buffer(buf.handle);
        }
        for img in self.textures.drain(..) {
            dev.destroy_image(img.handle);
        }
    }
}
