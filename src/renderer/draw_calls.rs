use glam::Mat4;

use crate::renderer::device::BufferHandle;
use crate::renderer::gltf::{AttributeLayout, ComponentType, Topology};

/// Everything needed to draw one primitive of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// The node the primitive belongs to.
    pub node: usize,
    pub mode: Topology,
    pub front_face: FrontFace,
    pub attributes: Vec<AttributeBinding>,
    pub elements: Elements,
    /// The node's world transform.
    pub transform: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub location: u32,
    pub buffer: BufferHandle,
    pub layout: AttributeLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elements {
    Indexed {
        buffer: BufferHandle,
        index_type: ComponentType,
        count: usize,
        byte_offset: usize,
    },
    /// Non-indexed primitives draw `count` vertices from the start.
    Arrays { count: usize },
}

/// The draw calls of one frame, in traversal order.
#[derive(Default)]
pub struct DrawCalls {
    calls: Vec<DrawCall>,
}

impl DrawCalls {
    pub fn new() -> DrawCalls {
        DrawCalls { calls: Vec::new() }
    }

    pub fn add(&mut self, call: DrawCall) {
        self.calls.push(call);
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
