use std::ffi::c_void;
use std::ptr;

use glam::Mat4;

use crate::renderer::draw_calls::{DrawCall, Elements, FrontFace};
use crate::renderer::gl::{self, GlError, ShaderStage};
use crate::renderer::gltf::{BufferTarget, ShaderSources};
use crate::renderer::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramHandle(pub u32);

/// The graphics operations the viewer needs. Everything above this trait is
/// plain data and can run without a GL context.
pub trait Device {
    /// Creates a buffer holding a copy of `data`.
    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<BufferHandle, RenderError>;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Compiles and links the vertex and fragment shader.
    fn create_program(&mut self, sources: &ShaderSources) -> Result<ProgramHandle, RenderError>;
    fn delete_program(&mut self, program: ProgramHandle);
    fn use_program(&mut self, program: ProgramHandle) -> Result<(), RenderError>;
    /// `None` if the program has no active attribute with this name.
    fn attribute_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> Result<Option<u32>, RenderError>;
    /// `None` if the program has no active uniform with this name.
    fn uniform_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> Result<Option<i32>, RenderError>;
    fn set_uniform_mat4(&mut self, location: i32, value: &Mat4) -> Result<(), RenderError>;

    fn set_viewport(&mut self, width: i32, height: i32) -> Result<(), RenderError>;
    /// Clears color and depth and enables depth testing.
    fn clear(&mut self, color: [f32; 4]) -> Result<(), RenderError>;
    /// Binds the call's attributes, draws, then disables the attributes again.
    fn draw(&mut self, call: &DrawCall) -> Result<(), RenderError>;
}

/// [`Device`] backed by the current OpenGL ES 3.0 context.
pub struct GlDevice {
    vao: gl::types::GLuint,
}

impl GlDevice {
    /// Loads the GL function pointers with `loader` and sets up the state the
    /// viewer relies on. The context must be current.
    pub fn new(loader: impl FnMut(&'static str) -> *const c_void) -> Result<GlDevice, GlError> {
        gl::load_with(loader);
        let mut vao = 0;
        gl::call!("gen vertex arrays", gl::GenVertexArrays(1, &mut vao))?;
        gl::call!("bind vertex array", gl::BindVertexArray(vao))?;
        Ok(GlDevice { vao })
    }
}

impl Device for GlDevice {
    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<BufferHandle, RenderError> {
        let target = target.code() as gl::types::GLenum;
        let mut buffer = 0;
        gl::call!("gen buffers", gl::GenBuffers(1, &mut buffer))?;
        gl::call!("bind buffer", gl::BindBuffer(target, buffer))?;
        gl::call!(
            "buffer data",
            gl::BufferData(
                target,
                data.len() as gl::types::GLsizeiptr,
                data.as_ptr() as *const c_void,
                gl::STATIC_DRAW,
            )
        )?;
        gl::call!("unbind buffer", gl::BindBuffer(target, 0))?;
        Ok(BufferHandle(buffer))
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Err(err) = gl::call!("delete buffer", gl::DeleteBuffers(1, &buffer.0)) {
            log::warn!("{err}");
        }
    }

    fn create_program(&mut self, sources: &ShaderSources) -> Result<ProgramHandle, RenderError> {
        let vertex_shader = gl::create_shader(ShaderStage::Vertex, &sources.vertex)?;
        let fragment_shader = match gl::create_shader(ShaderStage::Fragment, &sources.fragment) {
            Ok(shader) => shader,
            Err(err) => {
                let _ = gl::call!("delete shader", gl::DeleteShader(vertex_shader));
                return Err(err);
            }
        };
        let program = gl::create_program(&[vertex_shader, fragment_shader]);
        gl::call!("delete shader", gl::DeleteShader(vertex_shader))?;
        gl::call!("delete shader", gl::DeleteShader(fragment_shader))?;
        Ok(ProgramHandle(program?))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if let Err(err) = gl::call!("delete program", gl::DeleteProgram(program.0)) {
            log::warn!("{err}");
        }
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<(), RenderError> {
        gl::call!("use program", gl::UseProgram(program.0))?;
        Ok(())
    }

    fn attribute_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> Result<Option<u32>, RenderError> {
        Ok(gl::get_attrib_location(program.0, name)?)
    }

    fn uniform_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> Result<Option<i32>, RenderError> {
        Ok(gl::get_uniform_location(program.0, name)?)
    }

    fn set_uniform_mat4(&mut self, location: i32, value: &Mat4) -> Result<(), RenderError> {
        let columns = value.to_cols_array();
        gl::call!(
            "uniform matrix",
            gl::UniformMatrix4fv(location, 1, gl::FALSE, columns.as_ptr())
        )?;
        Ok(())
    }

    fn set_viewport(&mut self, width: i32, height: i32) -> Result<(), RenderError> {
        gl::call!("viewport", gl::Viewport(0, 0, width, height))?;
        Ok(())
    }

    fn clear(&mut self, [r, g, b, a]: [f32; 4]) -> Result<(), RenderError> {
        gl::call!("clear color", gl::ClearColor(r, g, b, a))?;
        gl::call!(
            "clear",
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT)
        )?;
        gl::call!("enable depth test", gl::Enable(gl::DEPTH_TEST))?;
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), RenderError> {
        let front_face = match call.front_face {
            FrontFace::CounterClockwise => gl::CCW,
            FrontFace::Clockwise => gl::CW,
        };
        gl::call!("front face", gl::FrontFace(front_face))?;

        for attribute in &call.attributes {
            let layout = &attribute.layout;
            gl::call!(
                "bind buffer",
                gl::BindBuffer(gl::ARRAY_BUFFER, attribute.buffer.0)
            )?;
            gl::call!(
                "vertex attrib pointer",
                gl::VertexAttribPointer(
                    attribute.location,
                    layout.components as gl::types::GLint,
                    layout.component_type.code(),
                    if layout.normalized { gl::TRUE } else { gl::FALSE },
                    layout.byte_stride as gl::types::GLsizei,
                    ptr::null::<c_void>().wrapping_add(layout.byte_offset),
                )
            )?;
            gl::call!(
                "enable vertex attrib array",
                gl::EnableVertexAttribArray(attribute.location)
            )?;
        }

        let mode = call.mode.code();
        match call.elements {
            Elements::Indexed {
                buffer,
                index_type,
                count,
                byte_offset,
            } => {
                gl::call!(
                    "bind buffer",
                    gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, buffer.0)
                )?;
                gl::call!(
                    "draw elements",
                    gl::DrawElements(
                        mode,
                        count as gl::types::GLsizei,
                        index_type.code(),
                        ptr::null::<c_void>().wrapping_add(byte_offset),
                    )
                )?;
            }
            Elements::Arrays { count } => {
                gl::call!(
                    "draw arrays",
                    gl::DrawArrays(mode, 0, count as gl::types::GLsizei)
                )?;
            }
        }

        for attribute in &call.attributes {
            gl::call!(
                "disable vertex attrib array",
                gl::DisableVertexAttribArray(attribute.location)
            )?;
        }
        Ok(())
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        if let Err(err) = gl::call!("delete vertex arrays", gl::DeleteVertexArrays(1, &self.vao)) {
            log::warn!("{err}");
        }
    }
}
