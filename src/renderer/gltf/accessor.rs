//! Decoding accessors into the byte layout the device binds them with.

use std::fmt::{self, Display};

use crate::renderer::gltf::{Accessor, BufferView};

/// The scalar type of each component of an accessor element. The
/// discriminants are the glTF `componentType` codes, which are also the GL
/// type enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte = 5120,
    UnsignedByte = 5121,
    Short = 5122,
    UnsignedShort = 5123,
    UnsignedInt = 5125,
    Float = 5126,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Option<ComponentType> {
        match code {
            5120 => Some(ComponentType::Byte),
            5121 => Some(ComponentType::UnsignedByte),
            5122 => Some(ComponentType::Short),
            5123 => Some(ComponentType::UnsignedShort),
            5125 => Some(ComponentType::UnsignedInt),
            5126 => Some(ComponentType::Float),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn byte_width(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }

    /// Whether this type can be used for an index buffer.
    pub fn is_index_type(self) -> bool {
        matches!(
            self,
            ComponentType::UnsignedByte | ComponentType::UnsignedShort | ComponentType::UnsignedInt
        )
    }
}

/// The `type` of an accessor. Every shape glTF can declare is represented so
/// that unsupported ones can be rejected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementShape {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementShape {
    pub fn from_name(name: &str) -> Option<ElementShape> {
        match name {
            "SCALAR" => Some(ElementShape::Scalar),
            "VEC2" => Some(ElementShape::Vec2),
            "VEC3" => Some(ElementShape::Vec3),
            "VEC4" => Some(ElementShape::Vec4),
            "MAT2" => Some(ElementShape::Mat2),
            "MAT3" => Some(ElementShape::Mat3),
            "MAT4" => Some(ElementShape::Mat4),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementShape::Scalar => "SCALAR",
            ElementShape::Vec2 => "VEC2",
            ElementShape::Vec3 => "VEC3",
            ElementShape::Vec4 => "VEC4",
            ElementShape::Mat2 => "MAT2",
            ElementShape::Mat3 => "MAT3",
            ElementShape::Mat4 => "MAT4",
        }
    }

    /// Components per element, for the shapes this viewer can decode.
    pub fn components(self) -> Option<usize> {
        match self {
            ElementShape::Scalar => Some(1),
            ElementShape::Vec2 => Some(2),
            ElementShape::Vec3 => Some(3),
            ElementShape::Vec4 => Some(4),
            ElementShape::Mat4 => Some(16),
            ElementShape::Mat2 | ElementShape::Mat3 => None,
        }
    }
}

impl Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything needed to point a vertex attribute (or index fetch) at an
/// uploaded buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLayout {
    pub component_type: ComponentType,
    /// Element size in components, e.g. 3 for VEC3.
    pub components: usize,
    pub normalized: bool,
    pub byte_stride: usize,
    /// Offset of the first element from the start of the buffer view.
    pub byte_offset: usize,
    pub count: usize,
}

impl AttributeLayout {
    pub fn element_byte_size(&self) -> usize {
        self.components * self.component_type.byte_width()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessorError {
    #[error("unsupported accessor element shape {0}")]
    UnsupportedElementShape(ElementShape),
    #[error("accessor resolves to a non-positive byte stride")]
    NonPositiveStride,
    #[error("accessor reads up to byte {end} of a buffer view that is {view_length} bytes long")]
    OutOfBounds { end: usize, view_length: usize },
    #[error("accessor has no buffer view")]
    MissingBufferView,
}

/// Computes the layout of `accessor` within `view`.
///
/// The stride is the view's explicit `byteStride` if it has one, otherwise
/// the tightly packed element size. The last element must end inside the
/// view; trailing stride padding after it does not count.
pub fn resolve(accessor: &Accessor, view: &BufferView) -> Result<AttributeLayout, AccessorError> {
    let components = accessor
        .element_shape
        .components()
        .ok_or(AccessorError::UnsupportedElementShape(accessor.element_shape))?;
    let element_byte_size = components * accessor.component_type.byte_width();
    let byte_stride = view.byte_stride.unwrap_or(element_byte_size);
    if byte_stride == 0 {
        return Err(AccessorError::NonPositiveStride);
    }

    if accessor.count > 0 {
        let end = byte_stride
            .checked_mul(accessor.count - 1)
            .and_then(|span| span.checked_add(accessor.byte_offset))
            .and_then(|span| span.checked_add(element_byte_size))
            .unwrap_or(usize::MAX);
        if end > view.byte_length {
            return Err(AccessorError::OutOfBounds {
                end,
                view_length: view.byte_length,
            });
        }
    }

    Ok(AttributeLayout {
        component_type: accessor.component_type,
        components,
        normalized: accessor.normalized,
        byte_stride,
        byte_offset: accessor.byte_offset,
        count: accessor.count,
    })
}
