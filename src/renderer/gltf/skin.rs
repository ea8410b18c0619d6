use std::collections::BTreeMap;
use std::mem;

use glam::Mat4;

use crate::renderer::gltf::{ComponentType, ElementShape, Gltf};

/// Inverse bind matrices, keyed by skin index, one per joint.
pub type SkinMatrices = BTreeMap<usize, Vec<Mat4>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkinError {
    #[error("skin {skin}: inverse bind matrices must be MAT4, not {shape}")]
    NotMat4 { skin: usize, shape: ElementShape },
    #[error("skin {skin}: inverse bind matrices must be FLOAT, not {component_type:?}")]
    NotFloat {
        skin: usize,
        component_type: ComponentType,
    },
    #[error("skin {skin}: {joints} joints but only {matrices} inverse bind matrices")]
    TooFewMatrices {
        skin: usize,
        joints: usize,
        matrices: usize,
    },
    #[error("skin {skin}: inverse bind matrices have no bufferView")]
    MissingBufferView { skin: usize },
    #[error("skin {skin}: inverse bind matrices reach past the end of their buffer")]
    OutOfRange { skin: usize },
}

/// Reads the inverse bind matrix of every joint of every skin. Skins without
/// joints or without an inverse bind matrix accessor are skipped.
pub fn extract_skin_matrices(asset: &Gltf) -> Result<SkinMatrices, SkinError> {
    const MATRIX_SIZE: usize = mem::size_of::<[f32; 16]>();

    let mut skins = SkinMatrices::new();
    for (skin_index, skin) in asset.skins.iter().enumerate() {
        let Some(accessor_index) = skin.inverse_bind_matrices else {
            continue;
        };
        if skin.joints.is_empty() {
            continue;
        }
        // Validation guarantees the accessor exists.
        let Some(accessor) = asset.accessors.get(accessor_index) else {
            continue;
        };
        if accessor.element_shape != ElementShape::Mat4 {
            return Err(SkinError::NotMat4 {
                skin: skin_index,
                shape: accessor.element_shape,
            });
        }
        if accessor.component_type != ComponentType::Float {
            return Err(SkinError::NotFloat {
                skin: skin_index,
                component_type: accessor.component_type,
            });
        }
        if accessor.count < skin.joints.len() {
            return Err(SkinError::TooFewMatrices {
                skin: skin_index,
                joints: skin.joints.len(),
                matrices: accessor.count,
            });
        }

        let view_index = accessor
            .buffer_view
            .ok_or(SkinError::MissingBufferView { skin: skin_index })?;
        let out_of_range = SkinError::OutOfRange { skin: skin_index };
        let bytes = asset.view_bytes(view_index).map_err(|_| out_of_range.clone())?;
        let stride = asset.buffer_views[view_index]
            .byte_stride
            .unwrap_or(MATRIX_SIZE);

        let mut matrices = Vec::with_capacity(skin.joints.len());
        for joint in 0..skin.joints.len() {
            let start = accessor.byte_offset + joint * stride;
            let matrix_bytes = bytes
                .get(start..start + MATRIX_SIZE)
                .ok_or_else(|| out_of_range.clone())?;
            let columns: [f32; 16] = bytemuck::pod_read_unaligned(matrix_bytes);
            let matrix = Mat4::from_cols_array(&columns);
            log::debug!("skin {skin_index} joint {joint} inverse bind matrix: {matrix}");
            matrices.push(matrix);
        }
        skins.insert(skin_index, matrices);
    }
    Ok(skins)
}
