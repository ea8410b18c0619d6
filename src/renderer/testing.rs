//! Fixtures and a recording [`Device`] for tests that should not need a GL
//! context.

use std::collections::BTreeMap;

use glam::Mat4;

use crate::renderer::device::{BufferHandle, Device, ProgramHandle};
use crate::renderer::draw_calls::DrawCall;
use crate::renderer::gl::{self, GlError};
use crate::renderer::gltf::{load_gltf, BufferTarget, Gltf, ShaderSources};
use crate::renderer::RenderError;

pub fn empty_asset() -> Gltf {
    Gltf {
        buffers: Vec::new(),
        buffer_views: Vec::new(),
        accessors: Vec::new(),
        meshes: Vec::new(),
        nodes: Vec::new(),
        scenes: Vec::new(),
        skins: Vec::new(),
        default_scene: None,
    }
}

/// A triangle drawn by three nodes. Node 0 is the root, node 1 sits behind it
/// and node 2 is moved along X, scaled down and skinned.
///
/// `triangle.bin` holds, in order: positions (view 0), u16 indices (view 1),
/// two bytes of padding, normals (view 2, no target) and two inverse bind
/// matrices (view 3, no target).
pub const TRIANGLE_GLTF: &str = r#"{
    "asset": {"version": "2.0"},
    "scene": 0,
    "scenes": [{"name": "triangles", "nodes": [0]}],
    "nodes": [
        {"name": "root", "mesh": 0, "children": [1, 2]},
        {"mesh": 0, "matrix": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, -1, 1]},
        {"mesh": 0, "skin": 0, "translation": [1, 0, 0], "scale": [0.5, 0.5, 0.5]}
    ],
    "meshes": [{
        "name": "triangle",
        "primitives": [{"attributes": {"POSITION": 0, "NORMAL": 2}, "indices": 1}]
    }],
    "skins": [{"joints": [1, 2], "inverseBindMatrices": 3}],
    "accessors": [
        {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
        {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"},
        {"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC3"},
        {"bufferView": 3, "componentType": 5126, "count": 2, "type": "MAT4"}
    ],
    "bufferViews": [
        {"buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962},
        {"buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963},
        {"buffer": 0, "byteOffset": 44, "byteLength": 36},
        {"buffer": 0, "byteOffset": 80, "byteLength": 128}
    ],
    "buffers": [{"uri": "triangle.bin", "byteLength": 208}]
}"#;

pub fn triangle_bin() -> Vec<u8> {
    let positions: [f32; 9] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.0, 0.5, 0.0];
    let indices: [u16; 3] = [0, 1, 2];
    let normals: [f32; 9] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    let matrices: Vec<f32> = (1..=32).map(|value| value as f32).collect();

    let mut bin = Vec::with_capacity(208);
    bin.extend_from_slice(bytemuck::cast_slice(&positions));
    bin.extend_from_slice(bytemuck::cast_slice(&indices));
    bin.extend_from_slice(&[0, 0]);
    bin.extend_from_slice(bytemuck::cast_slice(&normals));
    bin.extend_from_slice(bytemuck::cast_slice(&matrices));
    assert_eq!(bin.len(), 208);
    bin
}

pub fn triangle_asset() -> Gltf {
    let bin = triangle_bin();
    load_gltf(TRIANGLE_GLTF, &[("triangle.bin", &bin)])
        .unwrap()
        .asset
}

pub fn test_sources() -> ShaderSources {
    ShaderSources {
        vertex: "#version 300 es\nvoid main() {}\n".to_string(),
        fragment: "#version 300 es\nvoid main() {}\n".to_string(),
    }
}

/// A [`Device`] that records what it is asked to do. Attribute and uniform
/// locations are the position of the name in the declared lists.
pub struct RecordingDevice {
    attributes: Vec<String>,
    uniforms: Vec<String>,
    next_handle: u32,
    /// Makes attribute and uniform lookups fail with a GL error.
    pub fail_location_lookups: bool,
    pub buffers: BTreeMap<BufferHandle, (BufferTarget, Vec<u8>)>,
    pub deleted_buffers: Vec<BufferHandle>,
    pub programs: Vec<ProgramHandle>,
    pub deleted_programs: Vec<ProgramHandle>,
    pub used_programs: Vec<ProgramHandle>,
    pub uniform_writes: Vec<(i32, Mat4)>,
    pub viewport: Option<(i32, i32)>,
    pub clears: Vec<[f32; 4]>,
    pub draws: Vec<DrawCall>,
}

impl RecordingDevice {
    /// A device whose shaders declare every attribute and uniform the viewer
    /// knows about.
    pub fn new() -> RecordingDevice {
        RecordingDevice::with_shader(
            &["POSITION", "NORMAL", "TEXCOORD_0"],
            &["projViewMatrix", "modelMatrix"],
        )
    }

    pub fn with_shader(attributes: &[&str], uniforms: &[&str]) -> RecordingDevice {
        RecordingDevice {
            attributes: attributes.iter().map(|name| name.to_string()).collect(),
            uniforms: uniforms.iter().map(|name| name.to_string()).collect(),
            next_handle: 1,
            fail_location_lookups: false,
            buffers: BTreeMap::new(),
            deleted_buffers: Vec::new(),
            programs: Vec::new(),
            deleted_programs: Vec::new(),
            used_programs: Vec::new(),
            uniform_writes: Vec::new(),
            viewport: None,
            clears: Vec::new(),
            draws: Vec::new(),
        }
    }

    fn check_lookup(&self, label: &'static str) -> Result<(), GlError> {
        if self.fail_location_lookups {
            Err(GlError {
                label,
                code: gl::INVALID_OPERATION,
            })
        } else {
            Ok(())
        }
    }

    fn handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Device for RecordingDevice {
    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<BufferHandle, RenderError> {
        let buffer = BufferHandle(self.handle());
        self.buffers.insert(buffer, (target, data.to_vec()));
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.deleted_buffers.push(buffer);
    }

    fn create_program(&mut self, _sources: &ShaderSources) -> Result<ProgramHandle, RenderError> {
        let program = ProgramHandle(self.handle());
        self.programs.push(program);
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.deleted_programs.push(program);
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<(), RenderError> {
        self.used_programs.push(program);
        Ok(())
    }

    fn attribute_location(
        &mut self,
        _program: ProgramHandle,
        name: &str,
    ) -> Result<Option<u32>, RenderError> {
        self.check_lookup("get attrib location")?;
        Ok(self
            .attributes
            .iter()
            .position(|attribute| attribute == name)
            .map(|location| location as u32))
    }

    fn uniform_location(
        &mut self,
        _program: ProgramHandle,
        name: &str,
    ) -> Result<Option<i32>, RenderError> {
        self.check_lookup("get uniform location")?;
        Ok(self
            .uniforms
            .iter()
            .position(|uniform| uniform == name)
            .map(|location| location as i32))
    }

    fn set_uniform_mat4(&mut self, location: i32, value: &Mat4) -> Result<(), RenderError> {
        self.uniform_writes.push((location, *value));
        Ok(())
    }

    fn set_viewport(&mut self, width: i32, height: i32) -> Result<(), RenderError> {
        self.viewport = Some((width, height));
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), RenderError> {
        self.clears.push(color);
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), RenderError> {
        self.draws.push(call.clone());
        Ok(())
    }
}
