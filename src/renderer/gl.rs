//! OpenGL ES 3.0 bindings and the few helpers the device needs on top of
//! them.

use std::ffi::CString;
use std::fmt::{self, Display};

use crate::renderer::RenderError;

#[allow(
    clippy::all,
    dead_code,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    unused_imports
)]
mod bindings {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

pub use bindings::*;

/// Runs the given GL call and checks `glGetError` afterwards. Evaluates to
/// `Result<T, GlError>` where `T` is the call's return value, with the label
/// recorded in the error.
macro_rules! call {
    ($label:literal, $expr:expr) => {{
        #[allow(unused_unsafe)]
        let result = unsafe { $expr };
        $crate::renderer::gl::check_error($label).map(|()| result)
    }};
}
pub(crate) use call;

/// An error code reported by `glGetError` after a labelled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlError {
    pub label: &'static str,
    pub code: types::GLenum,
}

impl Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.code {
            INVALID_ENUM => "INVALID_ENUM",
            INVALID_VALUE => "INVALID_VALUE",
            INVALID_OPERATION => "INVALID_OPERATION",
            OUT_OF_MEMORY => "OUT_OF_MEMORY",
            INVALID_FRAMEBUFFER_OPERATION => "INVALID_FRAMEBUFFER_OPERATION",
            _ => "unknown error",
        };
        write!(f, "OpenGL error in \"{}\": {name} ({})", self.label, self.code)
    }
}

impl std::error::Error for GlError {}

pub fn check_error(label: &'static str) -> Result<(), GlError> {
    let code = unsafe { GetError() };
    if code == NO_ERROR {
        Ok(())
    } else {
        Err(GlError { label, code })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn gl_enum(self) -> types::GLenum {
        match self {
            ShaderStage::Vertex => VERTEX_SHADER,
            ShaderStage::Fragment => FRAGMENT_SHADER,
        }
    }
}

impl Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Compiles a shader of the given stage, returning the driver's info log
/// inside the error if compilation fails.
pub fn create_shader(stage: ShaderStage, source: &str) -> Result<types::GLuint, RenderError> {
    let shader = call!("create shader", CreateShader(stage.gl_enum()))?;
    let sources = [source.as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(
        "shader source",
        ShaderSource(shader, 1, sources.as_ptr(), source_lens.as_ptr())
    )?;
    call!("compile shader", CompileShader(shader))?;
    let mut compile_status = 0;
    call!(
        "get shader status",
        GetShaderiv(shader, COMPILE_STATUS, &mut compile_status)
    )?;
    if compile_status == FALSE as types::GLint {
        let mut info_log = vec![0u8; 4096];
        let mut length = 0;
        call!(
            "get shader info log",
            GetShaderInfoLog(
                shader,
                info_log.len() as types::GLsizei,
                &mut length,
                info_log.as_mut_ptr() as *mut types::GLchar,
            )
        )?;
        call!("delete shader", DeleteShader(shader))?;
        info_log.truncate(length.max(0) as usize);
        let log = String::from_utf8_lossy(&info_log).into_owned();
        return Err(RenderError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

pub fn create_program(shaders: &[types::GLuint]) -> Result<types::GLuint, RenderError> {
    let program = call!("create program", CreateProgram())?;
    for &shader in shaders {
        call!("attach shader", AttachShader(program, shader))?;
    }
    call!("link program", LinkProgram(program))?;
    let mut link_status = 0;
    call!(
        "get program status",
        GetProgramiv(program, LINK_STATUS, &mut link_status)
    )?;
    if link_status == FALSE as types::GLint {
        let mut info_log = vec![0u8; 4096];
        let mut length = 0;
        call!(
            "get program info log",
            GetProgramInfoLog(
                program,
                info_log.len() as types::GLsizei,
                &mut length,
                info_log.as_mut_ptr() as *mut types::GLchar,
            )
        )?;
        call!("delete program", DeleteProgram(program))?;
        info_log.truncate(length.max(0) as usize);
        let log = String::from_utf8_lossy(&info_log).into_owned();
        return Err(RenderError::ShaderLink { log });
    }
    Ok(program)
}

/// Returns the location of the named vertex attribute, or `None` if the
/// program does not declare (or the linker optimized out) the attribute.
pub fn get_attrib_location(
    program: types::GLuint,
    name: &str,
) -> Result<Option<types::GLuint>, GlError> {
    let Ok(name) = CString::new(name) else {
        return Ok(None);
    };
    let location = call!(
        "get attrib location",
        GetAttribLocation(program, name.as_ptr())
    )?;
    Ok(u32::try_from(location).ok())
}

pub fn get_uniform_location(
    program: types::GLuint,
    name: &str,
) -> Result<Option<types::GLint>, GlError> {
    let Ok(name) = CString::new(name) else {
        return Ok(None);
    };
    let location = call!(
        "get uniform location",
        GetUniformLocation(program, name.as_ptr())
    )?;
    Ok((location >= 0).then_some(location))
}
