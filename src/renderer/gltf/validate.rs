use crate::renderer::gltf::{AccessorError, ComponentType, Gltf};

/// Integrity problems that make an asset unusable. They are detected once,
/// before any GPU work happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("reference to {kind} {index}, which does not exist")]
    DanglingIndex { kind: &'static str, index: usize },
    #[error("bufferView {view} ends at byte {end}, but its buffer is only {buffer_length} bytes long")]
    BufferViewOutOfRange {
        view: usize,
        end: usize,
        buffer_length: usize,
    },
    #[error("accessor {index}: {source}")]
    Accessor { index: usize, source: AccessorError },
    #[error("accessor {accessor} is used as indices but has component type {component_type:?}")]
    InvalidIndexType {
        accessor: usize,
        component_type: ComponentType,
    },
    #[error("node {node} is its own ancestor")]
    NodeCycle { node: usize },
    #[error("node {node} has more than one parent")]
    MultipleParents { node: usize },
}

impl Gltf {
    /// Checks every cross-reference in the asset, decodes every accessor a
    /// primitive draws with, and rejects node cycles and nodes with more than
    /// one parent.
    pub fn validate(&self) -> Result<(), AssetError> {
        for index in 0..self.buffer_views.len() {
            self.view_bytes(index)?;
        }

        for (index, accessor) in self.accessors.iter().enumerate() {
            if let Some(view) = accessor.buffer_view {
                check_index(self.buffer_views.len(), "bufferView", view)?;
            } else {
                log::debug!("accessor {index} has no bufferView");
            }
        }

        for mesh in &self.meshes {
            for primitive in &mesh.primitives {
                for attribute in &primitive.attributes {
                    self.resolve_accessor(attribute.accessor)?;
                }
                if let Some(indices) = primitive.indices {
                    let (layout, _) = self.resolve_accessor(indices)?;
                    if !layout.component_type.is_index_type() {
                        return Err(AssetError::InvalidIndexType {
                            accessor: indices,
                            component_type: layout.component_type,
                        });
                    }
                }
            }
        }

        for node in &self.nodes {
            if let Some(mesh) = node.mesh {
                check_index(self.meshes.len(), "mesh", mesh)?;
            }
            if let Some(skin) = node.skin {
                check_index(self.skins.len(), "skin", skin)?;
            }
            for &child in &node.children {
                check_index(self.nodes.len(), "node", child)?;
            }
        }

        for skin in &self.skins {
            for &joint in &skin.joints {
                check_index(self.nodes.len(), "node", joint)?;
            }
            if let Some(accessor) = skin.inverse_bind_matrices {
                check_index(self.accessors.len(), "accessor", accessor)?;
            }
        }

        for scene in &self.scenes {
            for &node in &scene.node_indices {
                check_index(self.nodes.len(), "node", node)?;
            }
        }

        self.check_acyclic()?;
        self.check_single_parent()
    }

    /// A node may be the child of at most one node, and a scene root may not
    /// be anyone's child or appear twice among the roots of its scene.
    fn check_single_parent(&self) -> Result<(), AssetError> {
        let mut parents = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            for &child in &node.children {
                parents[child] += 1;
                if parents[child] > 1 {
                    return Err(AssetError::MultipleParents { node: child });
                }
            }
        }

        for scene in &self.scenes {
            let mut is_root = vec![false; self.nodes.len()];
            for &root in &scene.node_indices {
                if parents[root] > 0 || is_root[root] {
                    return Err(AssetError::MultipleParents { node: root });
                }
                is_root[root] = true;
            }
        }
        Ok(())
    }

    /// Depth-first search over the child links of every node, failing on the
    /// first node that is reached again while it is still on the stack.
    fn check_acyclic(&self) -> Result<(), AssetError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::OnStack;
            stack.push((root, 0));
            while let Some((node, next_child)) = stack.last_mut() {
                let node = *node;
                let Some(&child) = self.nodes[node].children.get(*next_child) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                *next_child += 1;
                match marks[child] {
                    Mark::OnStack => return Err(AssetError::NodeCycle { node: child }),
                    Mark::Done => {}
                    Mark::Unvisited => {
                        marks[child] = Mark::OnStack;
                        stack.push((child, 0));
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_index(len: usize, kind: &'static str, index: usize) -> Result<(), AssetError> {
    if index < len {
        Ok(())
    } else {
        Err(AssetError::DanglingIndex { kind, index })
    }
}
