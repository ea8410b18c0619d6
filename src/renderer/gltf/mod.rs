//! The in-memory glTF asset graph and everything the viewer derives from it.
//!
//! Loading produces a [`Gltf`], which is validated once and then treated as
//! read-only. The renderer derives its GPU state from it:
//! - every buffer view with a target becomes a device buffer ([`BufferRegistry`])
//! - accessors are decoded into attribute layouts on demand ([`accessor::resolve`])
//! - the selected scene is walked every frame to produce [`DrawCalls`]
//!
//! [`DrawCalls`]: crate::renderer::draw_calls::DrawCalls

use glam::{Mat4, Quat, Vec3};

pub mod accessor;
mod buffers;
mod draw;
mod glb;
mod loader;
mod program;
mod skin;
mod validate;

pub use accessor::{AccessorError, AttributeLayout, ComponentType, ElementShape};
pub use buffers::BufferRegistry;
pub use draw::{collect_draw_calls, describe_scene, visit_order, walk_scene, MeshDraws, PrimitiveDraw};
pub use loader::{load_file, load_gltf, LoadError, Loaded};
pub use program::*;
pub use skin::{extract_skin_matrices, SkinError, SkinMatrices};
pub use validate::AssetError;

pub struct Gltf {
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    pub skins: Vec<Skin>,
    /// The `scene` property. `None` means the first scene is shown.
    pub default_scene: Option<usize>,
}

pub struct Buffer {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    /// `None` when the asset does not say what the view is used for.
    pub target: Option<BufferTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    ArrayBuffer = 34962,
    ElementArrayBuffer = 34963,
}

impl BufferTarget {
    pub fn from_code(code: u32) -> Option<BufferTarget> {
        match code {
            34962 => Some(BufferTarget::ArrayBuffer),
            34963 => Some(BufferTarget::ElementArrayBuffer),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    /// `None` for accessors that only carry sparse data, which this viewer
    /// cannot draw.
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub element_shape: ElementShape,
    pub count: usize,
    pub normalized: bool,
}

pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

pub struct Primitive {
    /// In semantic name order.
    pub attributes: Vec<Attribute>,
    pub indices: Option<usize>,
    pub mode: Topology,
}

impl Primitive {
    pub fn attribute(&self, semantic: Semantic) -> Option<usize> {
        self.attributes
            .iter()
            .find(|attribute| attribute.semantic == Some(semantic))
            .map(|attribute| attribute.accessor)
    }
}

/// One entry of a primitive's `attributes` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// `None` for semantics the viewer does not draw with, e.g. `JOINTS_0`.
    pub semantic: Option<Semantic>,
    pub accessor: usize,
}

/// Primitive topology. The discriminants are the glTF `mode` codes, which
/// match the GL draw modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl Topology {
    pub fn from_code(code: u32) -> Option<Topology> {
        match code {
            0 => Some(Topology::Points),
            1 => Some(Topology::Lines),
            2 => Some(Topology::LineLoop),
            3 => Some(Topology::LineStrip),
            4 => Some(Topology::Triangles),
            5 => Some(Topology::TriangleStrip),
            6 => Some(Topology::TriangleFan),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

pub struct Node {
    pub name: Option<String>,
    pub transform: NodeTransform,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeTransform {
    Matrix(Mat4),
    Trs {
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
}

impl Default for NodeTransform {
    fn default() -> NodeTransform {
        NodeTransform::Trs {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    /// The node's transform relative to its parent: the explicit matrix if
    /// there is one, otherwise `T * R * S`.
    pub fn local_matrix(&self) -> Mat4 {
        match *self {
            NodeTransform::Matrix(matrix) => matrix,
            NodeTransform::Trs {
                translation,
                rotation,
                scale,
            } => Mat4::from_scale_rotation_translation(scale, rotation, translation),
        }
    }
}

pub struct Scene {
    pub name: Option<String>,
    pub node_indices: Vec<usize>,
}

pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("scene is empty")]
    NoScenes,
    #[error("invalid default scene {index}, the asset has {count} scenes")]
    InvalidDefaultScene { index: usize, count: usize },
}

impl Gltf {
    /// Picks the scene to show: the default scene, or the first one if the
    /// asset does not name one.
    pub fn select_scene(&self) -> Result<usize, SceneError> {
        if self.scenes.is_empty() {
            return Err(SceneError::NoScenes);
        }
        match self.default_scene {
            Some(index) if index >= self.scenes.len() => Err(SceneError::InvalidDefaultScene {
                index,
                count: self.scenes.len(),
            }),
            Some(index) => Ok(index),
            None => Ok(0),
        }
    }

    /// Decodes the accessor at `index`, returning its layout and the index of
    /// the buffer view it reads from.
    pub fn resolve_accessor(&self, index: usize) -> Result<(AttributeLayout, usize), AssetError> {
        let wrap = |source| AssetError::Accessor { index, source };
        let accessor = self
            .accessors
            .get(index)
            .ok_or(AssetError::DanglingIndex { kind: "accessor", index })?;
        let view_index = accessor
            .buffer_view
            .ok_or_else(|| wrap(AccessorError::MissingBufferView))?;
        let view = self.buffer_views.get(view_index).ok_or(AssetError::DanglingIndex {
            kind: "bufferView",
            index: view_index,
        })?;
        let layout = accessor::resolve(accessor, view).map_err(wrap)?;
        Ok((layout, view_index))
    }

    /// The bytes a buffer view covers.
    pub fn view_bytes(&self, index: usize) -> Result<&[u8], AssetError> {
        let view = self.buffer_views.get(index).ok_or(AssetError::DanglingIndex {
            kind: "bufferView",
            index,
        })?;
        let buffer = self.buffers.get(view.buffer).ok_or(AssetError::DanglingIndex {
            kind: "buffer",
            index: view.buffer,
        })?;
        view.byte_offset
            .checked_add(view.byte_length)
            .and_then(|end| buffer.data.get(view.byte_offset..end))
            .ok_or(AssetError::BufferViewOutOfRange {
                view: index,
                end: view.byte_offset.saturating_add(view.byte_length),
                buffer_length: buffer.data.len(),
            })
    }
}
