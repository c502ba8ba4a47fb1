// SPDX-License-Identifier: CEPL-1.0
use glam::Vec3;
use lumen_asset::load_gltf;
use lumen_render::types::IndexType;
use std::fs;
use std::path::PathBuf;

const GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "buffers": [ { "uri": "scene.bin", "byteLength": 54 } ],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 12 },
    { "buffer": 0, "byteOffset": 48, "byteLength": 6 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
    { "bufferView": 1, "byteOffset": 6, "componentType": 5123, "count": 3, "type": "SCALAR" },
    { "bufferView": 2, "byteOffset": 3, "componentType": 5121, "count": 3, "type": "SCALAR" }
  ],
  "meshes": [
    { "primitives": [
      { "attributes": { "POSITION": 0 }, "indices": 1 },
      { "attributes": { "POSITION": 0 }, "indices": 2 }
    ] },
    { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 3 } ] }
  ],
  "cameras": [
    { "type": "perspective", "perspective": { "yfov": 0.8, "znear": 0.05, "zfar": 50.0 } }
  ],
  "nodes": [
    { "translation": [1.0, 0.0, 0.0], "mesh": 0, "children": [1] },
    { "translation": [0.0, 2.0, 0.0], "mesh": 1 },
    { "translation": [0.0, 0.0, 5.0], "camera": 0 }
  ],
  "scenes": [ { "nodes": [0, 2] } ],
  "scene": 0
}"#;

fn bin() -> Vec<u8> {
    let mut out = Vec::new();
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in p {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in [0u16, 1, 2, 0, 2, 1] {
        out.extend_from_slice(&i.to_le_bytes());
    }
    out.extend_from_slice(&[0u8, 1, 2, 2, 1, 0]);
    assert_eq!(out.len(), 54);
    out
}

fn write_scene(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("scene.gltf");
    fs::write(&path, GLTF).unwrap();
    fs::write(dir.path().join("scene.bin"), bin()).unwrap();
    path
}

#[test]
fn imports_meshes_and_shares_index_views() {
    let dir = tempfile::tempdir().unwrap();
    let scene = load_gltf(&write_scene(&dir)).unwrap();

    assert_eq!(scene.meshes.len(), 3);
    // two primitives read view 1, the byte indices live in view 2
    assert_eq!(scene.index_buffers.len(), 2);
    assert_eq!(scene.meshes[0].index_buffer, scene.meshes[1].index_buffer);

    assert_eq!(scene.meshes[0].first_index, 0);
    assert_eq!(scene.meshes[1].first_index, 3);
    assert_eq!(scene.meshes[2].first_index, 3);
    assert!(scene.meshes.iter().all(|m| m.index_count == 3));
    assert!(scene.meshes.iter().all(|m| m.vertices.len() == 3));
    assert!(scene.meshes.iter().all(|m| m.texture.is_none()));

    let widened = &scene.index_buffers[scene.meshes[2].index_buffer];
    assert_eq!(widened.index_type, IndexType::U16);
    assert_eq!(widened.bytes, vec![0, 0, 1, 0, 2, 0, 2, 0, 1, 0, 0, 0]);
    assert_eq!(scene.index_buffers[0].bytes.len(), 12);
}

#[test]
fn node_transforms_and_camera() {
    let dir = tempfile::tempdir().unwrap();
    let scene = load_gltf(&write_scene(&dir)).unwrap();
    let (instances, camera) = scene.flatten();

    assert_eq!(instances.len(), 3);
    let child = instances.iter().find(|i| i.mesh == 2).unwrap();
    assert_eq!(child.world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));

    let camera = camera.unwrap();
    assert_eq!(camera.projection.yfov, 0.8);
    assert_eq!(camera.projection.zfar, Some(50.0));
    assert_eq!(camera.world.transform_point3(Vec3::ZERO), Vec3::new(0.0, 0.0, 5.0));
}

#[test]
fn missing_attributes_get_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let scene = load_gltf(&write_scene(&dir)).unwrap();
    let v = scene.meshes[0].vertices[1];
    assert_eq!(v.pos, [1.0, 0.0, 0.0]);
    assert_eq!(v.uv, [0.0, 0.0]);
    // +Z normal packs into the blue field
    assert_eq!((v.basis[0] >> 2) & 0x3FF, 0x1FF);
}

#[test]
fn unreadable_file_is_an_asset_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_gltf(&dir.path().join("absent.gltf")).unwrap_err();
    assert_eq!(lumen_core::error_kind(&err), "asset");
    assert!(err.to_string().contains("absent.gltf"));
}

const SHARED_VIEW_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "buffers": [ { "uri": "shared.bin", "byteLength": 42 } ],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
    { "bufferView": 1, "componentType": 5121, "count": 3, "type": "SCALAR" }
  ],
  "meshes": [
    { "primitives": [
      { "attributes": { "POSITION": 0 }, "indices": 1 },
      { "attributes": { "POSITION": 0 }, "indices": 2 }
    ] }
  ],
  "nodes": [ { "mesh": 0 } ],
  "scenes": [ { "nodes": [0] } ]
}"#;

#[test]
fn one_view_read_at_two_widths_gets_two_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.gltf");
    fs::write(&path, SHARED_VIEW_GLTF).unwrap();
    let mut bytes = bin();
    bytes.truncate(36);
    bytes.extend_from_slice(&[0, 0, 1, 0, 2, 0]);
    fs::write(dir.path().join("shared.bin"), bytes).unwrap();

    let scene = load_gltf(&path).unwrap();
    assert_eq!(scene.meshes.len(), 2);
    assert_eq!(scene.index_buffers.len(), 2);
    assert_ne!(scene.meshes[0].index_buffer, scene.meshes[1].index_buffer);

    let wide = &scene.index_buffers[scene.meshes[0].index_buffer];
    assert_eq!(wide.index_type, IndexType::U16);
    assert_eq!(wide.bytes, vec![0, 0, 1, 0, 2, 0]);

    // every byte of the view widened to u16
    let narrow = &scene.index_buffers[scene.meshes[1].index_buffer];
    assert_eq!(narrow.index_type, IndexType::U16);
    assert_eq!(narrow.bytes, vec![0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0]);
}
