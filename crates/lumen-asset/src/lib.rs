// SPDX-License-Identifier: CEPL-1.0
//! glTF import into the renderer's scene model.
//!
//! Every triangle primitive becomes one mesh. Index data is copied verbatim
//! from its buffer view and shared by every primitive that reads the same
//! view at the same component width; a primitive selects its range through
//! `first_index`.

mod image;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3, Vec4};
use gltf::camera::Projection;
use gltf::mesh::util::ReadTexCoords;
use gltf::mesh::Mode;
use lumen_core::LumenError;
use lumen_render::scene::{IndexData, MeshData, Perspective, SceneData, SceneNode};
use lumen_render::vertex::{device_indices, texcoord_from_u16, texcoord_from_u8, IndexWidth};
use lumen_render::Vertex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

pub use image::to_rgba8;

struct Importer<'a> {
    file: String,
    buffers: &'a [gltf::buffer::Data],
    /// glTF image index -> scene texture index
    textures: Vec<Option<usize>>,
    /// (buffer view index, component width) -> scene index buffer
    index_views: HashMap<(usize, u64), usize>,
    /// glTF mesh index -> scene meshes, one per primitive
    mesh_map: HashMap<usize, Vec<usize>>,
    scene: SceneData,
}

/// Loads `path` and everything it references.
pub fn load_gltf(path: &Path) -> Result<SceneData> {
    let file = path.display().to_string();
    let (document, buffers, images) =
        gltf::import(path).map_err(|e| LumenError::asset(&file, e.to_string()))?;

    let mut imp = Importer {
        file,
        buffers: &buffers,
        textures: Vec::with_capacity(images.len()),
        index_views: HashMap::new(),
        mesh_map: HashMap::new(),
        scene: SceneData::default(),
    };
    imp.load_images(&images);

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LumenError::asset(&imp.file, "no scene"))?;
    for node in scene.nodes() {
        let root = imp.load_node(&node)?;
        imp.scene.roots.push(root);
    }

    imp.scene.validate()?;
    info!(
        "{}: {} meshes, {} index buffers, {} textures",
        imp.file,
        imp.scene.meshes.len(),
        imp.scene.index_buffers.len(),
        imp.scene.textures.len()
    );
    Ok(imp.scene)
}

impl Importer<'_> {
    fn error(&self, what: impl Into<String>) -> LumenError {
        LumenError::asset(&self.file, what)
    }

    fn load_images(&mut self, images: &[gltf::image::Data]) {
        for (i, data) in images.iter().enumerate() {
            match image::convert(data) {
                Some(tex) => {
                    self.textures.push(Some(self.scene.textures.len()));
                    self.scene.textures.push(tex);
                }
                None => {
                    warn!("{}: image {i} ({:?}) has no RGBA8 form, using the fallback", self.file, data.format);
                    self.textures.push(None);
                }
            }
        }
    }

    fn load_node(&mut self, node: &gltf::Node<'_>) -> Result<SceneNode> {
        let transform = Mat4::from_cols_array_2d(&node.transform().matrix());

        let meshes = match node.mesh() {
            Some(mesh) => self.load_mesh(&mesh)?,
            None => Vec::new(),
        };

        let camera = node.camera().and_then(|cam| match cam.projection() {
            Projection::Perspective(p) => Some(Perspective {
                yfov: p.yfov(),
                znear: p.znear(),
                zfar: p.zfar(),
            }),
            Projection::Orthographic(_) => {
                warn!("{}: orthographic camera {} ignored", self.file, cam.index());
                None
            }
        });

        let mut children = Vec::new();
        for child in node.children() {
            children.push(self.load_node(&child)?);
        }
        Ok(SceneNode {
            transform,
            meshes,
            camera,
            children,
        })
    }

    /// Meshes referenced by several nodes are only loaded once.
    fn load_mesh(&mut self, mesh: &gltf::Mesh<'_>) -> Result<Vec<usize>> {
        if let Some(ids) = self.mesh_map.get(&mesh.index()) {
            return Ok(ids.clone());
        }
        let mut ids = Vec::new();
        for (p, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != Mode::Triangles {
                warn!("{}: mesh {} primitive {p} is {:?}, skipped", self.file, mesh.index(), primitive.mode());
                continue;
            }
            let data = self
                .load_primitive(&primitive)
                .with_context(|| format!("mesh {} primitive {p}", mesh.index()))?;
            ids.push(self.scene.meshes.len());
            self.scene.meshes.push(data);
        }
        self.mesh_map.insert(mesh.index(), ids.clone());
        Ok(ids)
    }

    fn load_primitive(&mut self, primitive: &gltf::Primitive<'_>) -> Result<MeshData> {
        let accessor = primitive
            .indices()
            .ok_or_else(|| self.error("non-indexed primitive"))?;
        let view = accessor
            .view()
            .ok_or_else(|| self.error("sparse index accessor"))?;
        let width = IndexWidth::from_bytes(accessor.data_type().size())
            .ok_or_else(|| self.error(format!("index component {:?}", accessor.data_type())))?;

        // one view may be read at several widths; each needs its own buffer
        let key = (view.index(), width.bytes());
        let index_buffer = match self.index_views.get(&key) {
            Some(&ib) => ib,
            None => {
                let buffer = self
                    .buffers
                    .get(view.buffer().index())
                    .ok_or_else(|| self.error("index view names a missing buffer"))?;
                let raw = buffer
                    .0
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| self.error("index view runs past its buffer"))?;
                let (index_type, bytes) =
                    device_indices(width, raw).map_err(|e| self.error(e.to_string()))?;
                let ib = self.scene.index_buffers.len();
                self.scene.index_buffers.push(IndexData { index_type, bytes });
                self.index_views.insert(key, ib);
                debug!(
                    "{}: buffer view {} ({}-byte indices) -> index buffer {ib}",
                    self.file,
                    view.index(),
                    width.bytes()
                );
                ib
            }
        };

        let vertices = self.load_vertices(primitive)?;
        let texture = primitive
            .material()
            .pbr_metallic_roughness()
            .base_color_texture()
            .and_then(|info| self.textures.get(info.texture().source().index()).copied().flatten());

        Ok(MeshData {
            vertices,
            index_buffer,
            index_count: accessor.count() as u32,
            first_index: width.first_index(accessor.offset() as u64),
            vertex_offset: 0,
            texture,
        })
    }

    fn load_vertices(&self, primitive: &gltf::Primitive<'_>) -> Result<Vec<Vertex>> {
        let buffers = self.buffers;
        let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| self.error("primitive without POSITION"))?
            .collect();
        let n = positions.len();

        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(it) => it.map(Vec3::from).collect(),
            None => vec![Vec3::Z; n],
        };
        let tangents: Vec<Vec4> = match reader.read_tangents() {
            Some(it) => it.map(Vec4::from).collect(),
            None => vec![Vec4::new(1.0, 0.0, 0.0, 1.0); n],
        };
        let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
            Some(ReadTexCoords::F32(it)) => it.collect(),
            Some(ReadTexCoords::U8(it)) => it.map(texcoord_from_u8).collect(),
            Some(ReadTexCoords::U16(it)) => it.map(texcoord_from_u16).collect(),
            None => vec![[0.0, 0.0]; n],
        };
        if normals.len() != n || tangents.len() != n || uvs.len() != n {
            return Err(self.error("vertex attribute counts differ").into());
        }

        let vertices = (0..n)
            .map(|i| {
                let normal = normals[i];
                let tangent = tangents[i].truncate();
                let bitangent = normal.cross(tangent) * tangents[i].w;
                Vertex::new(positions[i], normal, tangent, bitangent, uvs[i])
            })
            .collect();
        Ok(vertices)
    }
}
