use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

use glam::{Mat4, Quat, Vec3};
use tinyjson::JsonValue;

use crate::renderer::gltf::glb::{self, Glb};
use crate::renderer::gltf::{
    Accessor, AssetError, Attribute, Buffer, BufferTarget, BufferView, ComponentType, ElementShape,
    Gltf, Mesh, Node, NodeTransform, Primitive, Scene, Semantic, Skin, Topology,
};

type Object = HashMap<String, JsonValue>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed JSON: {0}")]
    Json(String),
    #[error("malformed binary glTF: {0}")]
    Glb(&'static str),
    #[error("\"{field}\" {problem}")]
    Field { field: String, problem: &'static str },
    #[error("could not find buffer with uri \"{0}\"")]
    MissingResource(String),
    #[error("buffer {index} is {actual} bytes long, but declares byteLength {declared}")]
    BufferLength {
        index: usize,
        declared: usize,
        actual: usize,
    },
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// A loaded asset plus the non-fatal problems noticed while loading it.
pub struct Loaded {
    pub asset: Gltf,
    pub warnings: Vec<String>,
}

/// Loads a `.gltf` or `.glb` file. Buffers with relative URIs are read from
/// the file's directory.
pub fn load_file(path: &Path) -> Result<Loaded, LoadError> {
    let read = |path: &Path| {
        fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })
    };
    let bytes = read(path)?;
    let base_dir = path.parent().unwrap_or(Path::new(""));

    let (json, bin) = if glb::is_glb(&bytes) {
        let glb = Glb::split(&bytes)?;
        (glb.json, glb.bin)
    } else {
        let json = std::str::from_utf8(&bytes)
            .map_err(|_| LoadError::Json("file is neither UTF-8 JSON nor binary glTF".into()))?;
        (json, None)
    };

    load_with(json, |uri| match uri {
        Some(uri) => read(&base_dir.join(uri)),
        None => bin
            .map(<[u8]>::to_vec)
            .ok_or_else(|| LoadError::MissingResource(String::new())),
    })
}

/// Loads a glTF document from its JSON text. Buffers are looked up in
/// `resources` by uri; the BIN buffer of a GLB is the one named "".
pub fn load_gltf(gltf: &str, resources: &[(&str, &[u8])]) -> Result<Loaded, LoadError> {
    load_with(gltf, |uri| {
        let name = uri.unwrap_or("");
        resources
            .iter()
            .find(|(resource_name, _)| *resource_name == name)
            .map(|(_, data)| data.to_vec())
            .ok_or_else(|| LoadError::MissingResource(name.to_owned()))
    })
}

fn load_with(
    gltf: &str,
    mut fetch: impl FnMut(Option<&str>) -> Result<Vec<u8>, LoadError>,
) -> Result<Loaded, LoadError> {
    let gltf: JsonValue = gltf.trim().parse().map_err(|err| LoadError::Json(format!("{err}")))?;
    let gltf = take_object(&gltf, "glTF")?;
    let mut warnings = Vec::new();

    match gltf.get("asset").and_then(|asset| asset.get::<Object>()) {
        Some(asset) => match asset.get("version").and_then(|v| v.get::<String>()) {
            Some(version) if version.starts_with("2.") => {}
            Some(version) => warnings.push(format!("asset.version is \"{version}\", expected 2.x")),
            None => warnings.push("asset.version is missing".to_owned()),
        },
        None => warnings.push("the asset object is missing".to_owned()),
    }
    for extension in take_array(gltf, "extensionsRequired")? {
        if let JsonValue::String(name) = extension {
            warnings.push(format!("required extension {name} is not supported"));
        }
    }

    let mut buffers = Vec::new();
    for (i, buffer) in take_array(gltf, "buffers")?.iter().enumerate() {
        let buffer = take_object(buffer, "buffers[]")?;
        let uri = match buffer.get("uri") {
            Some(JsonValue::String(uri)) => Some(uri.as_str()),
            Some(_) => return Err(invalid("buffers[].uri", "is not a string")),
            None => None,
        };
        let mut data = match uri {
            Some(uri) if uri.starts_with("data:") => parse_data_uri(uri)
                .ok_or_else(|| invalid("buffers[].uri", "is not a base64 data URI"))?,
            uri => fetch(uri)?,
        };
        let byte_length = required_usize(buffer, "byteLength")?;
        if data.len() < byte_length {
            return Err(LoadError::BufferLength {
                index: i,
                declared: byte_length,
                actual: data.len(),
            });
        }
        // The BIN chunk is padded to 4 bytes.
        data.truncate(byte_length);
        buffers.push(Buffer { data });
    }

    let mut buffer_views = Vec::new();
    for view in take_array(gltf, "bufferViews")? {
        let view = take_object(view, "bufferViews[]")?;
        let target = match optional_usize(view, "target")? {
            None | Some(0) => None,
            Some(code) => Some(
                BufferTarget::from_code(code as u32)
                    .ok_or_else(|| invalid("bufferViews[].target", "is not a buffer target"))?,
            ),
        };
        buffer_views.push(BufferView {
            buffer: required_usize(view, "buffer")?,
            byte_offset: optional_usize(view, "byteOffset")?.unwrap_or(0),
            byte_length: required_usize(view, "byteLength")?,
            byte_stride: optional_usize(view, "byteStride")?,
            target,
        });
    }

    let mut accessors = Vec::new();
    for accessor in take_array(gltf, "accessors")? {
        let accessor = take_object(accessor, "accessors[]")?;
        let component_type = ComponentType::from_code(required_usize(accessor, "componentType")? as u32)
            .ok_or_else(|| invalid("accessors[].componentType", "is not a known component type"))?;
        let element_shape = match accessor.get("type") {
            Some(JsonValue::String(name)) => ElementShape::from_name(name)
                .ok_or_else(|| invalid("accessors[].type", "is not a known element type"))?,
            _ => return Err(invalid("accessors[].type", "is missing")),
        };
        let normalized = match accessor.get("normalized") {
            Some(JsonValue::Boolean(normalized)) => *normalized,
            Some(_) => return Err(invalid("accessors[].normalized", "is not a boolean")),
            None => false,
        };
        accessors.push(Accessor {
            buffer_view: optional_usize(accessor, "bufferView")?,
            byte_offset: optional_usize(accessor, "byteOffset")?.unwrap_or(0),
            component_type,
            element_shape,
            count: required_usize(accessor, "count")?,
            normalized,
        });
    }

    let mut meshes = Vec::new();
    for mesh in take_array(gltf, "meshes")? {
        let mesh = take_object(mesh, "meshes[]")?;
        let mut primitives = Vec::new();
        for primitive in take_array(mesh, "primitives")? {
            let primitive = take_object(primitive, "meshes[].primitives[]")?;
            let attributes = match primitive.get("attributes") {
                Some(attributes) => take_object(attributes, "meshes[].primitives[].attributes")?,
                None => return Err(invalid("meshes[].primitives[].attributes", "is missing")),
            };
            let mut attributes = attributes
                .iter()
                .map(|(name, accessor)| {
                    take_usize(accessor, name).map(|accessor| Attribute {
                        name: name.clone(),
                        semantic: Semantic::from_name(name),
                        accessor,
                    })
                })
                .collect::<Result<Vec<_>, LoadError>>()?;
            // JSON objects are unordered once parsed; keep draws deterministic.
            attributes.sort_by(|a, b| a.name.cmp(&b.name));
            let mode = match optional_usize(primitive, "mode")? {
                Some(code) => Topology::from_code(code as u32)
                    .ok_or_else(|| invalid("meshes[].primitives[].mode", "is not a topology"))?,
                None => Topology::Triangles,
            };
            primitives.push(Primitive {
                attributes,
                indices: optional_usize(primitive, "indices")?,
                mode,
            });
        }
        meshes.push(Mesh {
            name: optional_string(mesh, "name"),
            primitives,
        });
    }

    let mut nodes = Vec::new();
    for node in take_array(gltf, "nodes")? {
        let node = take_object(node, "nodes[]")?;
        let transform = if let Some(matrix) = node.get("matrix") {
            NodeTransform::Matrix(Mat4::from_cols_array(&take_floats::<16>(matrix, "matrix")?))
        } else {
            let translation = match node.get("translation") {
                Some(value) => Vec3::from_array(take_floats(value, "translation")?),
                None => Vec3::ZERO,
            };
            let rotation = match node.get("rotation") {
                Some(value) => Quat::from_array(take_floats(value, "rotation")?),
                None => Quat::IDENTITY,
            };
            let scale = match node.get("scale") {
                Some(value) => Vec3::from_array(take_floats(value, "scale")?),
                None => Vec3::ONE,
            };
            NodeTransform::Trs {
                translation,
                rotation,
                scale,
            }
        };
        nodes.push(Node {
            name: optional_string(node, "name"),
            transform,
            mesh: optional_usize(node, "mesh")?,
            skin: optional_usize(node, "skin")?,
            children: take_usizes(node, "children")?,
        });
    }

    let mut scenes = Vec::new();
    for scene in take_array(gltf, "scenes")? {
        let scene = take_object(scene, "scenes[]")?;
        scenes.push(Scene {
            name: optional_string(scene, "name"),
            node_indices: take_usizes(scene, "nodes")?,
        });
    }

    let mut skins = Vec::new();
    for skin in take_array(gltf, "skins")? {
        let skin = take_object(skin, "skins[]")?;
        skins.push(Skin {
            joints: take_usizes(skin, "joints")?,
            inverse_bind_matrices: optional_usize(skin, "inverseBindMatrices")?,
        });
    }

    let asset = Gltf {
        buffers,
        buffer_views,
        accessors,
        meshes,
        nodes,
        scenes,
        skins,
        default_scene: optional_usize(gltf, "scene")?,
    };
    asset.validate()?;
    Ok(Loaded { asset, warnings })
}

fn invalid(field: &str, problem: &'static str) -> LoadError {
    LoadError::Field {
        field: field.to_owned(),
        problem,
    }
}

fn take_object<'a>(json_value: &'a JsonValue, field: &str) -> Result<&'a Object, LoadError> {
    json_value.get::<Object>().ok_or_else(|| invalid(field, "is not an object"))
}

/// Returns the array under `key`, or an empty slice if the key is absent.
fn take_array<'a>(object: &'a Object, key: &str) -> Result<&'a [JsonValue], LoadError> {
    match object.get(key) {
        Some(JsonValue::Array(values)) => Ok(values),
        Some(_) => Err(invalid(key, "is not an array")),
        None => Ok(&[]),
    }
}

/// Return usize if JsonValue is a non-negative integer.
fn take_usize(json_value: &JsonValue, field: &str) -> Result<usize, LoadError> {
    match json_value {
        JsonValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
            Ok(*n as usize)
        }
        _ => Err(invalid(field, "is not a non-negative integer")),
    }
}

fn optional_usize(object: &Object, key: &str) -> Result<Option<usize>, LoadError> {
    object.get(key).map(|value| take_usize(value, key)).transpose()
}

fn required_usize(object: &Object, key: &str) -> Result<usize, LoadError> {
    optional_usize(object, key)?.ok_or_else(|| invalid(key, "is missing"))
}

fn take_usizes(object: &Object, key: &str) -> Result<Vec<usize>, LoadError> {
    take_array(object, key)?
        .iter()
        .map(|value| take_usize(value, key))
        .collect()
}

fn optional_string(object: &Object, key: &str) -> Option<String> {
    object.get(key).and_then(|value| value.get::<String>()).cloned()
}

fn take_floats<const N: usize>(json_value: &JsonValue, field: &str) -> Result<[f32; N], LoadError> {
    let values = match json_value {
        JsonValue::Array(values) if values.len() == N => values,
        _ => return Err(invalid(field, "has the wrong number of components")),
    };
    let mut floats = [0.0; N];
    for (float, value) in floats.iter_mut().zip(values) {
        *float = match value {
            JsonValue::Number(n) => *n as f32,
            _ => return Err(invalid(field, "contains a non-number")),
        };
    }
    Ok(floats)
}

/// Parse a data URI (e.g., `data:application/octet-stream;base64,...`) and
/// return the decoded bytes.
fn parse_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let base64_start = rest.find(";base64,")?;
    base64_decode(&rest[base64_start + ";base64,".len()..])
}

fn base64_decode(input: &str) -> Option<Vec<u8>> {
    fn decode_char(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let input: Vec<u8> = input.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if input.len() % 4 == 1 {
        return None;
    }
    let mut result = Vec::with_capacity(input.len() * 3 / 4);
    for chunk in input.chunks(4) {
        let mut buf = [0u8; 4];
        let mut pad = 4 - chunk.len();
        for (i, &byte) in chunk.iter().enumerate() {
            if byte == b'=' {
                pad += 1;
            } else if pad > 4 - chunk.len() {
                // Data after padding.
                return None;
            } else {
                buf[i] = decode_char(byte)?;
            }
        }
        result.push((buf[0] << 2) | (buf[1] >> 4));
        if pad < 2 {
            result.push((buf[1] << 4) | (buf[2] >> 2));
        }
        if pad < 1 {
            result.push((buf[2] << 6) | buf[3]);
        }
    }
    Some(result)
}
