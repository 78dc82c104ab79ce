use std::borrow::Cow;
use std::collections::BTreeMap;

use gltf::binary::Glb;
use gltf_json::Index;
use gltf_json::accessor::{ComponentType, GenericComponentType, Type as AccessorType};
use gltf_json::buffer::Target;
use gltf_json::mesh::{Mode, Primitive, Semantic};
use gltf_json::validation::{Checked, USize64};

use crate::error::{AtlasError, Result};
use crate::types::{IndexedMesh, SubmeshKind, TextureData};

/// Base colour of underside caps, which never sample the atlas.
const UNDERSIDE_COLOR: [f32; 4] = [0.35, 0.35, 0.35, 1.0];

/// Serialize a low-detail building mesh into a binary GLB (glTF 2.0).
///
/// Every submesh group becomes one primitive sharing the position and UV
/// accessors. Facade and roof primitives use one double-sided material
/// textured with `atlas`; underside caps use an untextured material.
/// UV v is flipped to glTF's top-down image convention. With `compress`,
/// vertex and index buffers use EXT_meshopt_compression.
pub fn write_glb(mesh: &IndexedMesh, atlas: Option<&TextureData>, compress: bool) -> Result<Vec<u8>> {
    let mut root = gltf_json::Root {
        asset: gltf_json::Asset {
            version: "2.0".into(),
            generator: Some("facade-atlas".into()),
            ..Default::default()
        },
        ..Default::default()
    };

    if mesh.is_empty() {
        let node_idx = root.push(gltf_json::Node::default());
        push_scene(&mut root, node_idx);
        return assemble(&root, Vec::new());
    }

    let mut bin_data: Vec<u8> = Vec::new();
    let buffer_idx = Index::new(0);
    let vertex_count = mesh.vertex_count();
    let mut attributes = BTreeMap::new();

    // --- Positions ---
    let (pos_min, pos_max) = compute_position_bounds(&mesh.positions);
    let pos_view = write_vertex_attribute_view(
        &mut root,
        &mut bin_data,
        buffer_idx,
        bytemuck::cast_slice(&mesh.positions),
        12,
        vertex_count,
        compress.then(|| encode_f32x3(&mesh.positions)).flatten(),
    );
    let pos_accessor = root.push(accessor(
        pos_view,
        vertex_count,
        ComponentType::F32,
        AccessorType::Vec3,
        Some((pos_min.to_vec(), pos_max.to_vec())),
    ));
    attributes.insert(Checked::Valid(Semantic::Positions), pos_accessor);

    // --- UVs, v flipped for glTF ---
    if mesh.has_uvs() {
        let uvs: Vec<f32> = mesh
            .uvs
            .chunks_exact(2)
            .flat_map(|uv| [uv[0], 1.0 - uv[1]])
            .collect();
        let view = write_vertex_attribute_view(
            &mut root,
            &mut bin_data,
            buffer_idx,
            bytemuck::cast_slice(&uvs),
            8,
            vertex_count,
            compress.then(|| encode_f32x2(&uvs)).flatten(),
        );
        let uv_accessor = root.push(accessor(view, vertex_count, ComponentType::F32, AccessorType::Vec2, None));
        attributes.insert(Checked::Valid(Semantic::TexCoords(0)), uv_accessor);
    }

    // --- Atlas texture + materials ---
    let texture_index = atlas.map(|tex| push_texture(&mut root, &mut bin_data, buffer_idx, tex));
    let atlas_material = root.push(material(None, texture_index));
    let underside_material = mesh
        .groups
        .iter()
        .any(|g| g.kind == SubmeshKind::Underside)
        .then(|| root.push(material(Some(UNDERSIDE_COLOR), None)));

    // --- One primitive per group ---
    let use_u16_indices = vertex_count <= 65535;
    let index_type = if use_u16_indices {
        ComponentType::U16
    } else {
        ComponentType::U32
    };

    let mut primitives = Vec::with_capacity(mesh.groups.len());
    for group in &mesh.groups {
        let indices = mesh.group_indices(group);
        if indices.is_empty() {
            continue;
        }
        let encoded = if compress {
            meshopt::encode_index_buffer(indices, vertex_count).ok()
        } else {
            None
        };
        let view = write_index_view(&mut root, &mut bin_data, buffer_idx, indices, use_u16_indices, encoded);
        let idx_accessor = root.push(accessor(view, indices.len(), index_type, AccessorType::Scalar, None));

        let material = match group.kind {
            SubmeshKind::Underside => underside_material,
            SubmeshKind::Facade | SubmeshKind::Roof => Some(atlas_material),
        };
        primitives.push(Primitive {
            attributes: attributes.clone(),
            indices: Some(idx_accessor),
            material,
            mode: Checked::Valid(Mode::Triangles),
            targets: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    let mesh_idx = root.push(gltf_json::Mesh {
        primitives,
        weights: None,
        name: Some("lod".into()),
        extensions: Default::default(),
        extras: Default::default(),
    });
    let node_idx = root.push(gltf_json::Node {
        mesh: Some(mesh_idx),
        ..Default::default()
    });
    push_scene(&mut root, node_idx);

    if compress {
        let ext = "EXT_meshopt_compression".to_string();
        root.extensions_used.push(ext.clone());
        root.extensions_required.push(ext);
    }

    pad4(&mut bin_data, 0);
    root.push(gltf_json::Buffer {
        byte_length: USize64::from(bin_data.len()),
        uri: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    assemble(&root, bin_data)
}

fn pad4(data: &mut Vec<u8>, fill: u8) {
    while data.len() % 4 != 0 {
        data.push(fill);
    }
}

fn push_scene(root: &mut gltf_json::Root, node: Index<gltf_json::Node>) {
    let scene_idx = root.push(gltf_json::Scene {
        nodes: vec![node],
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(scene_idx);
}

/// Serialize the JSON chunk and wrap it with `bin` into a GLB container.
fn assemble(root: &gltf_json::Root, bin: Vec<u8>) -> Result<Vec<u8>> {
    let mut json_bytes = gltf_json::serialize::to_string(root)?.into_bytes();
    // JSON chunk pads with spaces.
    pad4(&mut json_bytes, b' ');

    let bin_len = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let glb = Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: (12 + 8 + json_bytes.len() + bin_len) as u32,
        },
        json: Cow::Owned(json_bytes),
        bin: (!bin.is_empty()).then_some(Cow::Owned(bin)),
    };

    glb.to_vec()
        .map_err(|e| AtlasError::Output(format!("GLB serialization failed: {e}")))
}

fn accessor(
    view: Index<gltf_json::buffer::View>,
    count: usize,
    component: ComponentType,
    type_: AccessorType,
    bounds: Option<(Vec<f32>, Vec<f32>)>,
) -> gltf_json::Accessor {
    let (min, max) = match bounds {
        Some((min, max)) => (Some(serde_json::json!(min)), Some(serde_json::json!(max))),
        None => (None, None),
    };
    gltf_json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(count),
        component_type: Checked::Valid(GenericComponentType(component)),
        type_: Checked::Valid(type_),
        min,
        max,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    }
}

fn push_texture(
    root: &mut gltf_json::Root,
    bin_data: &mut Vec<u8>,
    buffer_idx: Index<gltf_json::Buffer>,
    tex: &TextureData,
) -> Index<gltf_json::Texture> {
    pad4(bin_data, 0);
    let byte_offset = bin_data.len();
    bin_data.extend_from_slice(&tex.data);

    let view = root.push(gltf_json::buffer::View {
        buffer: buffer_idx,
        byte_length: USize64::from(tex.data.len()),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        name: None,
        target: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let image_idx = root.push(gltf_json::Image {
        buffer_view: Some(view),
        mime_type: Some(gltf_json::image::MimeType(tex.mime_type.clone())),
        uri: None,
        name: Some("atlas".into()),
        extensions: Default::default(),
        extras: Default::default(),
    });

    // Bleed padding covers bilinear lookups; clamp keeps them off the far edge.
    let sampler_idx = root.push(gltf_json::texture::Sampler {
        mag_filter: Some(Checked::Valid(gltf_json::texture::MagFilter::Linear)),
        min_filter: Some(Checked::Valid(gltf_json::texture::MinFilter::LinearMipmapLinear)),
        wrap_s: Checked::Valid(gltf_json::texture::WrappingMode::ClampToEdge),
        wrap_t: Checked::Valid(gltf_json::texture::WrappingMode::ClampToEdge),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    root.push(gltf_json::Texture {
        sampler: Some(sampler_idx),
        source: image_idx,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn material(color: Option<[f32; 4]>, texture: Option<Index<gltf_json::Texture>>) -> gltf_json::Material {
    let base_color_texture = texture.map(|index| gltf_json::texture::Info {
        index,
        tex_coord: 0,
        extensions: Default::default(),
        extras: Default::default(),
    });

    gltf_json::Material {
        pbr_metallic_roughness: gltf_json::material::PbrMetallicRoughness {
            base_color_factor: gltf_json::material::PbrBaseColorFactor(color.unwrap_or([1.0; 4])),
            metallic_factor: gltf_json::material::StrengthFactor(0.0),
            roughness_factor: gltf_json::material::StrengthFactor(1.0),
            base_color_texture,
            metallic_roughness_texture: None,
            extensions: Default::default(),
            extras: Default::default(),
        },
        alpha_mode: Checked::Valid(gltf_json::material::AlphaMode::Opaque),
        alpha_cutoff: None,
        // Footprint winding is not guaranteed, so facades render from both sides.
        double_sided: true,
        normal_texture: None,
        occlusion_texture: None,
        emissive_texture: None,
        emissive_factor: gltf_json::material::EmissiveFactor([0.0, 0.0, 0.0]),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    }
}

fn encode_f32x3(data: &[f32]) -> Option<Vec<u8>> {
    let vertices: &[[f32; 3]] = bytemuck::cast_slice(data);
    meshopt::encode_vertex_buffer(vertices).ok()
}

fn encode_f32x2(data: &[f32]) -> Option<Vec<u8>> {
    let vertices: &[[f32; 2]] = bytemuck::cast_slice(data);
    meshopt::encode_vertex_buffer(vertices).ok()
}

fn meshopt_extension(
    byte_offset: usize,
    byte_length: usize,
    stride: usize,
    count: usize,
    mode: &str,
) -> gltf_json::extensions::buffer::View {
    let mut others = serde_json::Map::new();
    others.insert(
        "EXT_meshopt_compression".into(),
        serde_json::json!({
            "buffer": 0,
            "byteOffset": byte_offset,
            "byteLength": byte_length,
            "byteStride": stride,
            "count": count,
            "mode": mode
        }),
    );
    gltf_json::extensions::buffer::View { others }
}

/// Write a vertex attribute buffer view, meshopt-encoded when `encoded` is set.
fn write_vertex_attribute_view(
    root: &mut gltf_json::Root,
    bin_data: &mut Vec<u8>,
    buffer_idx: Index<gltf_json::Buffer>,
    raw_bytes: &[u8],
    stride: usize,
    vertex_count: usize,
    encoded: Option<Vec<u8>>,
) -> Index<gltf_json::buffer::View> {
    pad4(bin_data, 0);
    let byte_offset = bin_data.len();

    let (byte_length, target, extensions) = match encoded {
        Some(encoded) => {
            bin_data.extend_from_slice(&encoded);
            let ext = meshopt_extension(byte_offset, encoded.len(), stride, vertex_count, "ATTRIBUTES");
            (encoded.len(), None, Some(ext))
        }
        None => {
            bin_data.extend_from_slice(raw_bytes);
            (raw_bytes.len(), Some(Checked::Valid(Target::ArrayBuffer)), None)
        }
    };

    root.push(gltf_json::buffer::View {
        buffer: buffer_idx,
        byte_length: USize64::from(byte_length),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        name: None,
        target,
        extensions,
        extras: Default::default(),
    })
}

/// Write one group's index buffer view, meshopt-encoded when `encoded` is set.
fn write_index_view(
    root: &mut gltf_json::Root,
    bin_data: &mut Vec<u8>,
    buffer_idx: Index<gltf_json::Buffer>,
    indices: &[u32],
    use_u16: bool,
    encoded: Option<Vec<u8>>,
) -> Index<gltf_json::buffer::View> {
    pad4(bin_data, 0);
    let byte_offset = bin_data.len();
    let index_size = if use_u16 { 2 } else { 4 };

    let (byte_length, target, extensions) = match encoded {
        Some(encoded) => {
            bin_data.extend_from_slice(&encoded);
            let ext = meshopt_extension(byte_offset, encoded.len(), index_size, indices.len(), "TRIANGLES");
            (encoded.len(), None, Some(ext))
        }
        None => {
            if use_u16 {
                let idx_u16: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                bin_data.extend_from_slice(bytemuck::cast_slice(&idx_u16));
            } else {
                bin_data.extend_from_slice(bytemuck::cast_slice(indices));
            }
            (
                indices.len() * index_size,
                Some(Checked::Valid(Target::ElementArrayBuffer)),
                None,
            )
        }
    };

    root.push(gltf_json::buffer::View {
        buffer: buffer_idx,
        byte_length: USize64::from(byte_length),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        name: None,
        target,
        extensions,
        extras: Default::default(),
    })
}

/// Compute min/max for a flat positions array (stride 3).
fn compute_position_bounds(positions: &[f32]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];

    for chunk in positions.chunks_exact(3) {
        for i in 0..3 {
            min[i] = min[i].min(chunk[i]);
            max[i] = max[i].max(chunk[i]);
        }
    }

    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::texture_compress::encode_texture;
    use crate::config::TextureFormat;

    fn quad() -> ([[f32; 3]; 4], [[f32; 2]; 4], [u32; 6]) {
        (
            [
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
            ],
            [[0.0, 0.0], [0.5, 0.0], [0.0, 0.25], [0.5, 0.25]],
            [0, 2, 1, 2, 3, 1],
        )
    }

    fn lod_mesh(with_underside: bool) -> IndexedMesh {
        let (p, uv, idx) = quad();
        let mut mesh = IndexedMesh::default();
        if with_underside {
            mesh.append(SubmeshKind::Underside, &p, &[[0.0, 0.0]; 4], &idx);
        }
        mesh.append(SubmeshKind::Facade, &p, &uv, &idx);
        mesh.append(SubmeshKind::Roof, &p, &uv, &idx);
        mesh
    }

    fn atlas_png() -> TextureData {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        encode_texture(&img, TextureFormat::Png).unwrap()
    }

    #[test]
    fn glb_header() {
        let bytes = write_glb(&lod_mesh(false), None, false).unwrap();
        assert_eq!(&bytes[0..4], b"glTF");
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(version, 2);
        let length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        assert_eq!(length as usize, bytes.len());
    }

    #[test]
    fn one_primitive_per_group() {
        let bytes = write_glb(&lod_mesh(true), Some(&atlas_png()), false).unwrap();
        let (doc, buffers, images) = gltf::import_slice(&bytes).unwrap();

        let mesh = doc.meshes().next().unwrap();
        assert_eq!(mesh.primitives().count(), 3);
        for prim in mesh.primitives() {
            let reader = prim.reader(|buf| Some(&buffers[buf.index()]));
            let idx: Vec<u32> = reader.read_indices().unwrap().into_u32().collect();
            assert_eq!(idx.len(), 6);
            assert_eq!(reader.read_positions().unwrap().count(), 12);
        }

        assert_eq!(doc.materials().count(), 2);
        assert!(doc.materials().all(|m| m.double_sided()));
        assert_eq!(images.len(), 1);
        assert_eq!((images[0].width, images[0].height), (4, 4));

        let first = mesh.primitives().next().unwrap();
        assert!(first.material().pbr_metallic_roughness().base_color_texture().is_none());
        let second = mesh.primitives().nth(1).unwrap();
        assert!(second.material().pbr_metallic_roughness().base_color_texture().is_some());
    }

    #[test]
    fn uv_v_is_flipped() {
        let bytes = write_glb(&lod_mesh(false), None, false).unwrap();
        let (doc, buffers, _) = gltf::import_slice(&bytes).unwrap();
        let prim = doc.meshes().next().unwrap().primitives().next().unwrap();
        let reader = prim.reader(|buf| Some(&buffers[buf.index()]));
        let uvs: Vec<[f32; 2]> = reader.read_tex_coords(0).unwrap().into_f32().collect();
        assert_eq!(uvs[0], [0.0, 1.0]);
        assert_eq!(uvs[3], [0.5, 0.75]);
    }

    #[test]
    fn empty_mesh_is_valid() {
        let bytes = write_glb(&IndexedMesh::default(), None, false).unwrap();
        let glb = Glb::from_slice(&bytes).unwrap();
        assert_eq!(glb.header.version, 2);
        assert!(glb.bin.is_none());
    }

    #[test]
    fn compressed_declares_extension() {
        let bytes = write_glb(&lod_mesh(true), Some(&atlas_png()), true).unwrap();
        let glb = Glb::from_slice(&bytes).unwrap();
        assert!(glb.bin.is_some());
        let json = std::str::from_utf8(&glb.json).unwrap();
        assert!(json.contains("EXT_meshopt_compression"));
    }

    #[test]
    fn position_bounds_correct() {
        let positions = vec![
            -1.0, 0.0, 2.0, //
            3.0, -4.0, 5.0, //
            0.0, 1.0, -3.0, //
        ];
        let (min, max) = compute_position_bounds(&positions);
        assert_eq!(min, [-1.0, -4.0, -3.0]);
        assert_eq!(max, [3.0, 1.0, 5.0]);
    }
}
