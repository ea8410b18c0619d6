use std::error::Error;
use std::ffi::c_void;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use env_logger::{Builder, Env};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::video::{GLContext, GLProfile, Window};
use sdl2::{EventPump, VideoSubsystem};

use gltf_view::renderer::device::GlDevice;
use gltf_view::renderer::gltf::{self, LoadError, Loaded, SceneError, ShaderSources};
use gltf_view::renderer::{RenderError, Renderer, RendererOptions};

const WINDOW_SIZE: u32 = 768;

/// Displays the default scene of a glTF 2.0 asset.
#[derive(Parser, Debug)]
#[command(name = "gltf-view", version, about)]
struct Args {
    /// Path to a .gltf or .glb file.
    path: Option<PathBuf>,
    /// Uniform scale applied to the whole scene.
    #[arg(default_value_t = 1.0)]
    scale: f32,
    #[arg(long, default_value = "shaders/shader.vert")]
    vertex_shader: PathBuf,
    #[arg(long, default_value = "shaders/shader.frag")]
    fragment_shader: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum ViewerError {
    #[error("failed to load model: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to open a window: {0:#}")]
    Window(#[from] anyhow::Error),
}

impl ViewerError {
    fn exit_code(&self) -> u8 {
        match self {
            ViewerError::Load(_) => 10,
            ViewerError::Render(err) => match err {
                RenderError::Asset(_) => 10,
                RenderError::Scene(SceneError::NoScenes) => 11,
                RenderError::Scene(SceneError::InvalidDefaultScene { .. }) => 12,
                RenderError::ShaderRead { .. }
                | RenderError::ShaderCompile { .. }
                | RenderError::ShaderLink { .. }
                | RenderError::MissingPositionAttribute => 13,
                RenderError::Skin(_) => 15,
                RenderError::Gl(_) => 20,
            },
            ViewerError::Window(_) => 14,
        }
    }
}

fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let Some(path) = args.path.clone() else {
        if let Err(err) = Args::command().print_help() {
            log::error!("{err}");
        }
        return ExitCode::SUCCESS;
    };

    match run(&args, path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Loads the model and checks it has a scene to show, so that broken assets
/// are reported before a window is opened.
fn load_model(path: &Path) -> Result<Loaded, ViewerError> {
    let loaded = gltf::load_file(path)?;
    for warning in &loaded.warnings {
        log::warn!("{warning}");
    }
    log::info!("Load glTF [ {} ] OK", path.display());
    loaded.asset.select_scene().map_err(RenderError::from)?;
    Ok(loaded)
}

fn run(args: &Args, path: PathBuf) -> Result<(), ViewerError> {
    let loaded = load_model(&path)?;
    let sources = ShaderSources::read(&args.vertex_shader, &args.fragment_shader)?;

    let title = format!("Simple glTF viewer: {}", path.display());
    let (video, window, _gl_context, mut event_pump) = open_window(&title)?;
    let device = GlDevice::new(|s| video.gl_get_proc_address(s) as *const c_void)
        .map_err(RenderError::from)?;
    let (width, height) = window.drawable_size();
    let options = RendererOptions {
        scale: args.scale,
        viewport: (width as i32, height as i32),
    };
    let mut renderer = Renderer::new(device, loaded.asset, &sources, options)?;

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Q | Keycode::Escape),
                    ..
                } => break 'running,
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => {
                    let (width, height) = window.drawable_size();
                    renderer.resize(width as i32, height as i32)?;
                }
                _ => {}
            }
        }

        renderer.render()?;
        window.gl_swap_window();
    }
    Ok(())
}

fn open_window(title: &str) -> anyhow::Result<(VideoSubsystem, Window, GLContext, EventPump)> {
    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    // Linear->SRGB conversion is done in the fragment shader.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let window = video_subsystem
        .window(title, WINDOW_SIZE, WINDOW_SIZE)
        .resizable()
        .opengl()
        .build()?;
    let gl_context = window.gl_create_context().map_err(SdlErr)?;
    video_subsystem.gl_set_swap_interval(1).map_err(SdlErr)?;
    let event_pump = sdl_context.event_pump().map_err(SdlErr)?;
    Ok((video_subsystem, window, gl_context, event_pump))
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
