use std::fs;
use std::path::Path;

use crate::renderer::device::{Device, ProgramHandle};
use crate::renderer::RenderError;

/// The vertex attributes the viewer knows how to feed. The shader declares
/// them under their glTF semantic names, e.g. `in vec3 POSITION;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    TexCoord0,
}

impl Semantic {
    pub const ALL: [Semantic; 3] = [Semantic::Position, Semantic::Normal, Semantic::TexCoord0];

    pub fn name(self) -> &'static str {
        match self {
            Semantic::Position => "POSITION",
            Semantic::Normal => "NORMAL",
            Semantic::TexCoord0 => "TEXCOORD_0",
        }
    }

    pub fn from_name(name: &str) -> Option<Semantic> {
        Semantic::ALL.into_iter().find(|semantic| semantic.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    ProjViewMatrix,
    ModelMatrix,
}

impl Uniform {
    pub const ALL: [Uniform; 2] = [Uniform::ProjViewMatrix, Uniform::ModelMatrix];

    pub fn name(self) -> &'static str {
        match self {
            Uniform::ProjViewMatrix => "projViewMatrix",
            Uniform::ModelMatrix => "modelMatrix",
        }
    }
}

pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn read(vertex: &Path, fragment: &Path) -> Result<ShaderSources, RenderError> {
        let read = |path: &Path| -> Result<String, RenderError> {
            let source = fs::read_to_string(path).map_err(|source| RenderError::ShaderRead {
                path: path.to_owned(),
                source,
            })?;
            log::info!("Load shader [ {} ] OK", path.display());
            Ok(source)
        };
        Ok(ShaderSources {
            vertex: read(vertex)?,
            fragment: read(fragment)?,
        })
    }
}

/// The linked program used to render glTF models, with the locations of the
/// attributes and uniforms it declares. Built once, read-only afterwards.
pub struct ShaderProgram {
    pub program: ProgramHandle,
    attributes: [Option<u32>; 3],
    uniforms: [Option<i32>; 2],
}

impl ShaderProgram {
    /// Compiles and links the program and resolves its slots. A program
    /// without a POSITION attribute cannot draw anything and is rejected.
    pub fn create<D: Device>(
        device: &mut D,
        sources: &ShaderSources,
    ) -> Result<ShaderProgram, RenderError> {
        let program = device.create_program(sources)?;
        log::info!("Link shader OK");
        let resolved = match ShaderProgram::resolve(device, program) {
            Ok(resolved) => resolved,
            Err(err) => {
                device.delete_program(program);
                return Err(err);
            }
        };
        if resolved.attribute(Semantic::Position).is_none() {
            device.delete_program(program);
            return Err(RenderError::MissingPositionAttribute);
        }
        Ok(resolved)
    }

    pub fn resolve<D: Device>(
        device: &mut D,
        program: ProgramHandle,
    ) -> Result<ShaderProgram, RenderError> {
        let mut attributes = [None; 3];
        for semantic in Semantic::ALL {
            attributes[semantic as usize] = device.attribute_location(program, semantic.name())?;
            if attributes[semantic as usize].is_none() {
                log::debug!("shader does not use the {} attribute", semantic.name());
            }
        }
        let mut uniforms = [None; 2];
        for uniform in Uniform::ALL {
            uniforms[uniform as usize] = device.uniform_location(program, uniform.name())?;
        }
        Ok(ShaderProgram {
            program,
            attributes,
            uniforms,
        })
    }

    pub fn attribute(&self, semantic: Semantic) -> Option<u32> {
        self.attributes[semantic as usize]
    }

    pub fn uniform(&self, uniform: Uniform) -> Option<i32> {
        self.uniforms[uniform as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::testing::{test_sources, RecordingDevice};

    #[test]
    fn slots_follow_declaration() {
        let mut device = RecordingDevice::with_shader(&["NORMAL", "POSITION"], &["modelMatrix"]);
        let program = ShaderProgram::create(&mut device, &test_sources()).unwrap();
        assert_eq!(program.attribute(Semantic::Normal), Some(0));
        assert_eq!(program.attribute(Semantic::Position), Some(1));
        assert_eq!(program.attribute(Semantic::TexCoord0), None);
        assert_eq!(program.uniform(Uniform::ModelMatrix), Some(0));
        assert_eq!(program.uniform(Uniform::ProjViewMatrix), None);
    }

    #[test]
    fn missing_position_is_fatal() {
        let mut device = RecordingDevice::with_shader(&["NORMAL"], &[]);
        let result = ShaderProgram::create(&mut device, &test_sources());
        assert!(matches!(result, Err(RenderError::MissingPositionAttribute)));
        assert_eq!(device.deleted_programs.len(), 1);
    }

    #[test]
    fn gl_errors_during_lookup_are_not_missing_attributes() {
        let mut device = RecordingDevice::new();
        device.fail_location_lookups = true;
        let result = ShaderProgram::create(&mut device, &test_sources());
        assert!(matches!(result, Err(RenderError::Gl(_))));
        assert_eq!(device.deleted_programs, device.programs);
    }

    #[test]
    fn semantic_names() {
        assert_eq!(Semantic::from_name("TEXCOORD_0"), Some(Semantic::TexCoord0));
        assert_eq!(Semantic::from_name("TEXCOORD_1"), None);
        assert_eq!(Semantic::from_name("JOINTS_0"), None);
    }
}
