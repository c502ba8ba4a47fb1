// SPDX-License-Identifier: CEPL-1.0
//! Immutable scene description handed from the asset importer to a
//! renderer. Meshes refer to shared index buffers and textures by index.

use crate::types::{Extent2D, IndexType};
use crate::vertex::Vertex;
use glam::{Mat4, Vec3};
use lumen_core::LumenError;

#[derive(Clone, Debug, PartialEq)]
pub struct IndexData {
    pub index_type: IndexType,
    pub bytes: Vec<u8>,
}

/// Tightly packed RGBA8.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub extent: Extent2D,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub index_buffer: usize,
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub texture: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perspective {
    pub yfov: f32,
    pub znear: f32,
    pub zfar: Option<f32>,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            yfov: 45f32.to_radians(),
            znear: 0.1,
            zfar: Some(100.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub world: Mat4,
    pub projection: Perspective,
}

impl Camera {
    /// Clip-from-world for the given aspect ratio. Depth maps to [0, 1];
    /// the y flip happens in the viewport.
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let p = self.projection;
        let proj = match p.zfar {
            Some(zfar) => Mat4::perspective_rh(p.yfov, aspect, p.znear, zfar),
            None => Mat4::perspective_infinite_rh(p.yfov, aspect, p.znear),
        };
        proj * self.world.inverse()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub transform: Mat4,
    pub meshes: Vec<usize>,
    pub camera: Option<Perspective>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn leaf(transform: Mat4, meshes: Vec<usize>) -> Self {
        Self {
            transform,
            meshes,
            camera: None,
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub mesh: usize,
    pub world: Mat4,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneData {
    pub meshes: Vec<MeshData>,
    pub index_buffers: Vec<IndexData>,
    pub textures: Vec<TextureData>,
    pub roots: Vec<SceneNode>,
}

impl SceneData {
    /// Walks the node tree depth-first, composing world transforms. The
    /// last camera node visited wins.
    pub fn flatten(&self) -> (Vec<Instance>, Option<Camera>) {
        fn visit(
            node: &SceneNode,
            parent: Mat4,
            out: &mut Vec<Instance>,
            camera: &mut Option<Camera>,
        ) {
            let world = parent * node.transform;
            if let Some(projection) = node.camera {
                *camera = Some(Camera { world, projection });
            }
            out.extend(node.meshes.iter().map(|&mesh| Instance { mesh, world }));
            for child in &node.children {
                visit(child, world, out, camera);
            }
        }

        let mut out = Vec::new();
        let mut camera = None;
        for root in &self.roots {
            visit(root, Mat4::IDENTITY, &mut out, &mut camera);
        }
        (out, camera)
    }

    /// Every cross reference points at something that exists.
    pub fn validate(&self) -> Result<(), LumenError> {
        fn bad(what: String) -> LumenError {
            LumenError::asset("scene", what)
        }
        for (i, mesh) in self.meshes.iter().enumerate() {
            if mesh.index_buffer >= self.index_buffers.len() {
                return Err(bad(format!("mesh {i} uses missing index buffer {}", mesh.index_buffer)));
            }
            if let Some(t) = mesh.texture.filter(|&t| t >= self.textures.len()) {
                return Err(bad(format!("mesh {i} uses missing texture {t}")));
            }
        }
        let (instances, _) = self.flatten();
        if let Some(inst) = instances.iter().find(|inst| inst.mesh >= self.meshes.len()) {
            return Err(bad(format!("node refers to missing mesh {}", inst.mesh)));
        }
        Ok(())
    }

    /// Unit quad in the XY plane, checker textured, with a camera facing
    /// its front side.
    pub fn builtin_quad() -> Self {
        let n = Vec3::Z;
        let t = Vec3::X;
        let b = Vec3::Y;
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], n, t, b, [0.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], n, t, b, [0.0, 1.0]),
            Vertex::new([1.0, 1.0, 0.0], n, t, b, [1.0, 1.0]),
            Vertex::new([1.0, 0.0, 0.0], n, t, b, [1.0, 0.0]),
        ];
        let indices: [u16; 6] = [0, 1, 3, 1, 2, 3];

        // indices wind clockwise seen from +Z, so look from -Z
        let camera = SceneNode {
            transform: Mat4::from_translation(Vec3::new(0.5, 0.5, -2.0))
                * Mat4::from_rotation_y(std::f32::consts::PI),
            meshes: Vec::new(),
            camera: Some(Perspective::default()),
            children: Vec::new(),
        };

        SceneData {
            meshes: vec![MeshData {
                vertices,
                index_buffer: 0,
                index_count: indices.len() as u32,
                first_index: 0,
                vertex_offset: 0,
                texture: Some(0),
            }],
            index_buffers: vec![IndexData {
                index_type: IndexType::U16,
                bytes: bytemuck::cast_slice::<u16, u8>(&indices).to_vec(),
            }],
            textures: vec![checker_texture(8, 1)],
            roots: vec![SceneNode::leaf(Mat4::IDENTITY, vec![0]), camera],
        }
    }
}

/// `size` x `size` RGBA8 checkerboard with `cell`-texel squares.
pub fn checker_texture(size: u32, cell: u32) -> TextureData {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            let v = if on { 0xE0 } else { 0x30 };
            pixels.extend_from_slice(&[v, v, v, 0xFF]);
        }
    }
    TextureData {
        extent: Extent2D::new(size, size),
        pixels,
    }
}
