use std::io;
use std::path::PathBuf;

use glam::{Mat4, Vec3};

pub mod device;
pub mod draw_calls;
pub mod gl;
pub mod gltf;
#[cfg(test)]
pub mod testing;

use device::Device;
use draw_calls::DrawCalls;
use gl::{GlError, ShaderStage};
use gltf::{
    AssetError, BufferRegistry, Gltf, MeshDraws, SceneError, ShaderProgram, ShaderSources,
    SkinError, SkinMatrices, Uniform,
};

const CLEAR_COLOR: [f32; 4] = [0.1, 0.2, 0.3, 1.0];
const CAMERA_EYE: Vec3 = Vec3::new(0.0, 0.0, 3.0);
const FOV_Y_DEGREES: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 1000.0;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read shader {}: {source}", path.display())]
    ShaderRead { path: PathBuf, source: io::Error },
    #[error("{stage} shader failed to compile:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    ShaderLink { log: String },
    #[error("shader program has no POSITION attribute")]
    MissingPositionAttribute,
    #[error(transparent)]
    Gl(#[from] GlError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Skin(#[from] SkinError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

#[derive(Debug, Clone, Copy)]
pub struct RendererOptions {
    /// Uniform scale applied to the whole scene.
    pub scale: f32,
    /// Drawable size in pixels.
    pub viewport: (i32, i32),
}

pub struct Renderer<D: Device> {
    device: D,
    asset: Gltf,
    scene: usize,
    buffers: BufferRegistry,
    program: ShaderProgram,
    draws: MeshDraws,
    skins: SkinMatrices,
    options: RendererOptions,
    draw_calls: DrawCalls,
}

impl<D: Device> Renderer<D> {
    /// Sets up everything needed to draw `asset`. Scene and skin problems are
    /// reported before any device resources are created.
    pub fn new(
        mut device: D,
        asset: Gltf,
        sources: &ShaderSources,
        options: RendererOptions,
    ) -> Result<Renderer<D>, RenderError> {
        let scene = asset.select_scene()?;
        let scene_info = &asset.scenes[scene];
        log::info!(
            "Rendering scene {scene} ({}) with root nodes {:?}",
            scene_info.name.as_deref().unwrap_or("unnamed"),
            scene_info.node_indices
        );
        for line in gltf::describe_scene(&asset, scene) {
            log::debug!("{line}");
        }
        let skins = gltf::extract_skin_matrices(&asset)?;

        let program = ShaderProgram::create(&mut device, sources)?;
        let mut buffers = match BufferRegistry::upload(&mut device, &asset) {
            Ok(buffers) => buffers,
            Err(err) => {
                device.delete_program(program.program);
                return Err(err);
            }
        };

        let draws = MeshDraws::prepare(&asset, &buffers, &program);
        let undrawable = draws.undrawable();
        if undrawable > 0 {
            log::warn!("{undrawable} primitives have no uploaded POSITION or index data and will not be drawn");
        }

        if let Err(err) = device.set_viewport(options.viewport.0, options.viewport.1) {
            buffers.release(&mut device);
            device.delete_program(program.program);
            return Err(err);
        }
        log::info!("Loaded {} meshes", asset.meshes.len());

        Ok(Renderer {
            device,
            asset,
            scene,
            buffers,
            program,
            draws,
            skins,
            options,
            draw_calls: DrawCalls::new(),
        })
    }

    pub fn resize(&mut self, width: i32, height: i32) -> Result<(), RenderError> {
        self.options.viewport = (width, height);
        self.device.set_viewport(width, height)
    }

    pub fn render(&mut self) -> Result<(), RenderError> {
        self.device.clear(CLEAR_COLOR)?;
        self.device.use_program(self.program.program)?;
        if let Some(location) = self.program.uniform(Uniform::ProjViewMatrix) {
            self.device.set_uniform_mat4(location, &self.proj_view_matrix())?;
        }

        self.draw_calls.clear();
        let root = Mat4::from_scale(Vec3::splat(self.options.scale));
        gltf::collect_draw_calls(&self.asset, self.scene, &self.draws, root, &mut self.draw_calls);

        let model_matrix = self.program.uniform(Uniform::ModelMatrix);
        for call in self.draw_calls.iter() {
            if let Some(location) = model_matrix {
                self.device.set_uniform_mat4(location, &call.transform)?;
            }
            self.device.draw(call)?;
        }
        Ok(())
    }

    fn proj_view_matrix(&self) -> Mat4 {
        let (width, height) = self.options.viewport;
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let proj = Mat4::perspective_rh_gl(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        let view = Mat4::look_at_rh(CAMERA_EYE, Vec3::ZERO, Vec3::Y);
        proj * view
    }

    /// Inverse bind matrices of every skin, read at setup.
    pub fn skins(&self) -> &SkinMatrices {
        &self.skins
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: Device> Drop for Renderer<D> {
    fn drop(&mut self) {
        self.buffers.release(&mut self.device);
        self.device.delete_program(self.program.program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::testing::{test_sources, triangle_asset, RecordingDevice};

    const OPTIONS: RendererOptions = RendererOptions {
        scale: 1.0,
        viewport: (768, 768),
    };

    #[test]
    fn render_draws_every_node() {
        let asset = triangle_asset();
        let mut renderer =
            Renderer::new(RecordingDevice::new(), asset, &test_sources(), OPTIONS).unwrap();
        renderer.render().unwrap();

        let device = renderer.device();
        assert_eq!(device.viewport, Some((768, 768)));
        assert_eq!(device.clears, vec![CLEAR_COLOR]);
        assert_eq!(device.draws.len(), 3);
        // projViewMatrix once, then modelMatrix before every draw.
        assert_eq!(device.uniform_writes.len(), 4);
        assert_eq!(device.uniform_writes[0].0, 0);
        for (write, call) in device.uniform_writes[1..].iter().zip(&device.draws) {
            assert_eq!(*write, (1, call.transform));
        }
    }

    #[test]
    fn scale_applies_to_every_node() {
        let asset = triangle_asset();
        let options = RendererOptions {
            scale: 2.0,
            ..OPTIONS
        };
        let mut renderer =
            Renderer::new(RecordingDevice::new(), asset, &test_sources(), options).unwrap();
        renderer.render().unwrap();
        let root = renderer.device().draws[0].transform;
        assert_eq!(root, Mat4::from_scale(Vec3::splat(2.0)));
    }

    #[test]
    fn every_frame_redraws_the_scene() {
        let asset = triangle_asset();
        let mut renderer =
            Renderer::new(RecordingDevice::new(), asset, &test_sources(), OPTIONS).unwrap();
        renderer.render().unwrap();
        renderer.render().unwrap();
        renderer.resize(100, 50).unwrap();
        let device = renderer.device();
        assert_eq!(device.draws.len(), 6);
        assert_eq!(device.viewport, Some((100, 50)));
        // One program, linked once and bound every frame.
        assert_eq!(device.programs.len(), 1);
        assert_eq!(device.used_programs, vec![device.programs[0]; 2]);
    }

    #[test]
    fn invalid_default_scene_is_rejected() {
        let mut asset = triangle_asset();
        asset.default_scene = Some(4);
        let result = Renderer::new(RecordingDevice::new(), asset, &test_sources(), OPTIONS);
        assert!(matches!(
            result,
            Err(RenderError::Scene(SceneError::InvalidDefaultScene { index: 4, count: 1 }))
        ));
    }

    #[test]
    fn missing_position_attribute_is_fatal() {
        let asset = triangle_asset();
        let device = RecordingDevice::with_shader(&["NORMAL"], &["modelMatrix"]);
        let result = Renderer::new(device, asset, &test_sources(), OPTIONS);
        assert!(matches!(result, Err(RenderError::MissingPositionAttribute)));
    }

    #[test]
    fn skins_are_read_at_setup() {
        let asset = triangle_asset();
        let renderer =
            Renderer::new(RecordingDevice::new(), asset, &test_sources(), OPTIONS).unwrap();
        assert_eq!(renderer.skins()[&0].len(), 2);
    }
}
