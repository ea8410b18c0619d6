use glam::Mat4;

use crate::renderer::draw_calls::{AttributeBinding, DrawCall, DrawCalls, Elements, FrontFace};
use crate::renderer::gltf::{BufferRegistry, Gltf, Primitive, Semantic, ShaderProgram, Topology};

/// Visits every node reachable from the roots of `scene`, depth-first with
/// children in declaration order, passing each node's world transform.
///
/// Validation guarantees the nodes form a forest, so each node is visited
/// once.
pub fn walk_scene(asset: &Gltf, scene: usize, root: Mat4, visit: &mut impl FnMut(usize, Mat4)) {
    let Some(scene) = asset.scenes.get(scene) else {
        return;
    };
    for &node in &scene.node_indices {
        walk_node(asset, node, root, visit);
    }
}

fn walk_node(asset: &Gltf, index: usize, parent: Mat4, visit: &mut impl FnMut(usize, Mat4)) {
    let Some(node) = asset.nodes.get(index) else {
        return;
    };
    let world = parent * node.transform.local_matrix();
    visit(index, world);
    for &child in &node.children {
        walk_node(asset, child, world, visit);
    }
}

/// The order in which [`walk_scene`] visits the nodes of `scene`.
pub fn visit_order(asset: &Gltf, scene: usize) -> Vec<usize> {
    let mut order = Vec::new();
    walk_scene(asset, scene, Mat4::IDENTITY, &mut |node, _| order.push(node));
    order
}

/// One line per node of `scene`, indented by depth, naming the node and its
/// mesh.
pub fn describe_scene(asset: &Gltf, scene: usize) -> Vec<String> {
    fn describe(asset: &Gltf, index: usize, depth: usize, lines: &mut Vec<String>) {
        let Some(node) = asset.nodes.get(index) else {
            return;
        };
        let mut line = format!("{:indent$}node {index}", "", indent = depth * 2);
        if let Some(name) = &node.name {
            line.push_str(&format!(" \"{name}\""));
        }
        if let Some(mesh) = node.mesh {
            line.push_str(&format!(" mesh {mesh}"));
            if let Some(name) = asset.meshes.get(mesh).and_then(|mesh| mesh.name.as_ref()) {
                line.push_str(&format!(" \"{name}\""));
            }
        }
        if let Some(skin) = node.skin {
            line.push_str(&format!(" skin {skin}"));
        }
        lines.push(line);
        for &child in &node.children {
            describe(asset, child, depth + 1, lines);
        }
    }

    let mut lines = Vec::new();
    if let Some(scene) = asset.scenes.get(scene) {
        for &root in &scene.node_indices {
            describe(asset, root, 0, &mut lines);
        }
    }
    lines
}

/// Everything needed to draw one primitive except the node it is drawn for.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveDraw {
    pub mode: Topology,
    pub attributes: Vec<AttributeBinding>,
    pub elements: Elements,
}

/// The draw description of every primitive, indexed by mesh and primitive.
/// Built once the buffers are uploaded and the program is linked.
pub struct MeshDraws {
    meshes: Vec<Vec<Option<PrimitiveDraw>>>,
}

impl MeshDraws {
    pub fn prepare(asset: &Gltf, buffers: &BufferRegistry, program: &ShaderProgram) -> MeshDraws {
        let meshes = asset
            .meshes
            .iter()
            .map(|mesh| {
                mesh.primitives
                    .iter()
                    .map(|primitive| prepare_primitive(asset, primitive, buffers, program))
                    .collect()
            })
            .collect();
        MeshDraws { meshes }
    }

    /// The drawable primitives of `mesh`, in declaration order.
    pub fn primitives(&self, mesh: usize) -> impl Iterator<Item = &PrimitiveDraw> {
        self.meshes.get(mesh).into_iter().flatten().flatten()
    }

    /// Number of primitives that cannot be drawn.
    pub fn undrawable(&self) -> usize {
        self.meshes.iter().flatten().filter(|draw| draw.is_none()).count()
    }
}

/// Appends one draw call per drawable primitive of every node in `scene`.
pub fn collect_draw_calls(
    asset: &Gltf,
    scene: usize,
    draws: &MeshDraws,
    root: Mat4,
    draw_calls: &mut DrawCalls,
) {
    walk_scene(asset, scene, root, &mut |node_index, transform| {
        let Some(mesh) = asset.nodes[node_index].mesh else {
            return;
        };
        let front_face = if transform.determinant() < 0.0 {
            FrontFace::Clockwise
        } else {
            FrontFace::CounterClockwise
        };
        for draw in draws.primitives(mesh) {
            draw_calls.add(DrawCall {
                node: node_index,
                mode: draw.mode,
                front_face,
                attributes: draw.attributes.clone(),
                elements: draw.elements,
                transform,
            });
        }
    });
}

/// The draw description of a primitive, or `None` if it cannot be drawn: its
/// POSITION or index data was never uploaded.
///
/// Attributes the shader does not declare, or whose data was not uploaded,
/// are left unbound.
fn prepare_primitive(
    asset: &Gltf,
    primitive: &Primitive,
    buffers: &BufferRegistry,
    program: &ShaderProgram,
) -> Option<PrimitiveDraw> {
    let position = primitive.attribute(Semantic::Position)?;
    let (position_layout, position_view) = asset.resolve_accessor(position).ok()?;
    buffers.get(position_view)?;

    let mut attributes = Vec::with_capacity(primitive.attributes.len());
    for attribute in &primitive.attributes {
        let Some(location) = attribute.semantic.and_then(|semantic| program.attribute(semantic))
        else {
            continue;
        };
        let Ok((layout, view)) = asset.resolve_accessor(attribute.accessor) else {
            continue;
        };
        let Some(buffer) = buffers.get(view) else {
            continue;
        };
        attributes.push(AttributeBinding {
            location,
            buffer,
            layout,
        });
    }

    let elements = match primitive.indices {
        Some(indices) => {
            let (layout, view) = asset.resolve_accessor(indices).ok()?;
            Elements::Indexed {
                buffer: buffers.get(view)?,
                index_type: layout.component_type,
                count: layout.count,
                byte_offset: layout.byte_offset,
            }
        }
        None => Elements::Arrays {
            count: position_layout.count,
        },
    };
    Some(PrimitiveDraw {
        mode: primitive.mode,
        attributes,
        elements,
    })
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::renderer::device::ProgramHandle;
    use crate::renderer::gltf::{BufferTarget, ComponentType, NodeTransform};
    use crate::renderer::testing::{triangle_asset, RecordingDevice};

    fn prepare(asset: &Gltf, device: &mut RecordingDevice) -> MeshDraws {
        let buffers = BufferRegistry::upload(device, asset).unwrap();
        let program = ShaderProgram::resolve(device, ProgramHandle(1)).unwrap();
        MeshDraws::prepare(asset, &buffers, &program)
    }

    fn collect(asset: &Gltf, device: &mut RecordingDevice) -> DrawCalls {
        let draws = prepare(asset, device);
        let mut draw_calls = DrawCalls::new();
        collect_draw_calls(asset, 0, &draws, Mat4::IDENTITY, &mut draw_calls);
        draw_calls
    }

    #[test]
    fn nodes_are_visited_depth_first() {
        let asset = triangle_asset();
        assert_eq!(visit_order(&asset, 0), vec![0, 1, 2]);
        assert_eq!(visit_order(&asset, 5), Vec::<usize>::new());
    }

    #[test]
    fn world_transform_is_parent_times_local() {
        let mut asset = triangle_asset();
        asset.nodes[0].transform = NodeTransform::Trs {
            translation: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        };
        let mut transforms = Vec::new();
        let root = Mat4::from_scale(Vec3::splat(2.0));
        walk_scene(&asset, 0, root, &mut |node, world| transforms.push((node, world)));

        let node0 = root * Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(transforms[0], (0, node0));
        assert_eq!(
            transforms[1],
            (1, node0 * Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)))
        );
        let point = transforms[2].1.transform_point3(Vec3::ZERO);
        // Root scale 2, node 0 lifts by 2, node 2 moves by 1 along X.
        assert_eq!(point, Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn indexed_triangles_are_collected() {
        let asset = triangle_asset();
        let mut device = RecordingDevice::new();
        let draw_calls = collect(&asset, &mut device);

        assert_eq!(draw_calls.len(), 3);
        let nodes: Vec<usize> = draw_calls.iter().map(|call| call.node).collect();
        assert_eq!(nodes, vec![0, 1, 2]);
        for call in draw_calls.iter() {
            assert_eq!(call.mode, Topology::Triangles);
            assert_eq!(call.front_face, FrontFace::CounterClockwise);
            assert!(matches!(
                call.elements,
                Elements::Indexed {
                    index_type: ComponentType::UnsignedShort,
                    count: 3,
                    byte_offset: 0,
                    ..
                }
            ));
        }
    }

    #[test]
    fn unuploaded_attributes_are_left_unbound() {
        // NORMAL lives in a view without a target.
        let asset = triangle_asset();
        let mut device = RecordingDevice::new();
        let draw_calls = collect(&asset, &mut device);
        let call = draw_calls.iter().next().unwrap();
        assert_eq!(call.attributes.len(), 1);
        assert_eq!(call.attributes[0].location, 0);
        assert_eq!(call.attributes[0].layout.components, 3);
        assert_eq!(call.attributes[0].layout.byte_stride, 12);
    }

    #[test]
    fn undeclared_attributes_are_left_unbound() {
        let mut asset = triangle_asset();
        asset.buffer_views[2].target = Some(BufferTarget::ArrayBuffer);

        let mut device = RecordingDevice::new();
        let draw_calls = collect(&asset, &mut device);
        let call = draw_calls.iter().next().unwrap();
        assert_eq!(call.attributes.len(), 2);

        let mut device = RecordingDevice::with_shader(&["POSITION"], &[]);
        let draw_calls = collect(&asset, &mut device);
        let call = draw_calls.iter().next().unwrap();
        assert_eq!(call.attributes.len(), 1);
    }

    #[test]
    fn non_indexed_primitives_draw_every_position() {
        let mut asset = triangle_asset();
        asset.meshes[0].primitives[0].indices = None;
        let mut device = RecordingDevice::new();
        let draw_calls = collect(&asset, &mut device);
        let call = draw_calls.iter().next().unwrap();
        assert_eq!(call.elements, Elements::Arrays { count: 3 });
    }

    #[test]
    fn mirrored_nodes_flip_the_front_face() {
        let mut asset = triangle_asset();
        asset.nodes[2].transform = NodeTransform::Trs {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::new(-1.0, 1.0, 1.0),
        };
        let mut device = RecordingDevice::new();
        let draw_calls = collect(&asset, &mut device);
        let faces: Vec<FrontFace> = draw_calls.iter().map(|call| call.front_face).collect();
        assert_eq!(
            faces,
            vec![
                FrontFace::CounterClockwise,
                FrontFace::CounterClockwise,
                FrontFace::Clockwise
            ]
        );
    }

    #[test]
    fn primitives_without_uploaded_positions_are_skipped() {
        let mut asset = triangle_asset();
        asset.buffer_views[0].target = None;
        let mut device = RecordingDevice::new();
        let draw_calls = collect(&asset, &mut device);
        assert!(draw_calls.is_empty());
        assert_eq!(prepare(&asset, &mut device).undrawable(), 1);
    }

    #[test]
    fn bindings_are_prepared_once_per_primitive() {
        let asset = triangle_asset();
        let mut device = RecordingDevice::new();
        let draws = prepare(&asset, &mut device);
        assert_eq!(draws.undrawable(), 0);
        assert_eq!(draws.primitives(0).count(), 1);
        assert_eq!(draws.primitives(7).count(), 0);

        // Every node drawing mesh 0 shares the prepared bindings and only
        // differs in its transform.
        let prepared = draws.primitives(0).next().unwrap();
        let mut draw_calls = DrawCalls::new();
        collect_draw_calls(&asset, 0, &draws, Mat4::IDENTITY, &mut draw_calls);
        for call in draw_calls.iter() {
            assert_eq!(call.attributes, prepared.attributes);
            assert_eq!(call.elements, prepared.elements);
            assert_eq!(call.mode, prepared.mode);
        }
    }

    #[test]
    fn unknown_semantics_are_not_bound() {
        let mut asset = triangle_asset();
        asset.buffer_views[2].target = Some(BufferTarget::ArrayBuffer);
        let normal = asset.meshes[0].primitives[0]
            .attributes
            .iter_mut()
            .find(|attribute| attribute.semantic == Some(Semantic::Normal))
            .unwrap();
        normal.name = "_CUSTOM".to_string();
        normal.semantic = None;

        let mut device = RecordingDevice::new();
        let draw_calls = collect(&asset, &mut device);
        let call = draw_calls.iter().next().unwrap();
        assert_eq!(call.attributes.len(), 1);
    }

    #[test]
    fn scene_description_names_nodes_and_meshes() {
        let asset = triangle_asset();
        assert_eq!(
            describe_scene(&asset, 0),
            vec![
                "node 0 \"root\" mesh 0 \"triangle\"".to_string(),
                "  node 1 mesh 0 \"triangle\"".to_string(),
                "  node 2 mesh 0 \"triangle\" skin 0".to_string(),
            ]
        );
    }
}
