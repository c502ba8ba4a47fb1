// SPDX-License-Identifier: CEPL-1.0
use gltf::image::{Data, Format};
use lumen_render::scene::TextureData;
use lumen_render::Extent2D;

/// Expands a decoded glTF image to tightly packed RGBA8. Sixteen-bit
/// channels keep their high byte. Float images have no RGBA8 form here.
pub fn to_rgba8(format: Format, width: u32, height: u32, pixels: &[u8]) -> Option<TextureData> {
    let texels = width as usize * height as usize;
    let (channels, bytes_per_channel) = match format {
        Format::R8 => (1, 1),
        Format::R8G8 => (2, 1),
        Format::R8G8B8 => (3, 1),
        Format::R8G8B8A8 => (4, 1),
        Format::R16 => (1, 2),
        Format::R16G16 => (2, 2),
        Format::R16G16B16 => (3, 2),
        Format::R16G16B16A16 => (4, 2),
        _ => return None,
    };
    let stride = channels * bytes_per_channel;
    if pixels.len() < texels * stride {
        return None;
    }

    let mut out = Vec::with_capacity(texels * 4);
    for texel in pixels.chunks_exact(stride).take(texels) {
        // little-endian u16: high byte second
        let c = |i: usize| texel[i * bytes_per_channel + bytes_per_channel - 1];
        let rgba = match channels {
            1 => [c(0), c(0), c(0), 0xFF],
            2 => [c(0), c(0), c(0), c(1)],
            3 => [c(0), c(1), c(2), 0xFF],
            _ => [c(0), c(1), c(2), c(3)],
        };
        out.extend_from_slice(&rgba);
    }
    Some(TextureData {
        extent: Extent2D::new(width, height),
        pixels: out,
    })
}

pub fn convert(data: &Data) -> Option<TextureData> {
    to_rgba8(data.format, data.width, data.height, &data.pixels)
}
