use std::sync::Arc;

use tracing::{debug, trace};

use crate::backend::{GpuBackend, ShaderStage};
use crate::error::GlesError;
use crate::gl::*;
use crate::resources::{AttribPointer, ShaderInfo, VertexAttrib, MAX_VERTEX_ATTRIBS};
use crate::vertex::{ComponentType, Semantic};

use super::GlContext;

/// The last argument of `vertex_attrib_pointer`.
#[derive(Clone, Copy, Debug)]
pub enum VertexPointer<'a> {
    /// Byte offset into the buffer bound to `GL_ARRAY_BUFFER`.
    Offset(usize),
    /// Client memory starting at the first element; copied by the call.
    Client(&'a [u8]),
}

fn shader_stage(ty: GLenum) -> Option<ShaderStage> {
    match ty {
        GL_VERTEX_SHADER => Some(ShaderStage::Vertex),
        GL_FRAGMENT_SHADER => Some(ShaderStage::Fragment),
        _ => None,
    }
}

impl<B: GpuBackend> GlContext<B> {
    /// Returns `0` for unsupported shader types.
    pub fn create_shader(&mut self, ty: GLenum) -> GLuint {
        let Some(stage) = shader_stage(ty) else {
            debug!(ty, "create_shader: unsupported shader type");
            return 0;
        };
        let handle = self.shader_ids.allocate();
        self.shaders.insert(handle, ShaderInfo::new(stage));
        handle
    }

    pub fn delete_shader(&mut self, shader: GLuint) {
        if self.shaders.remove(shader).is_some() {
            self.shader_ids.release(shader);
        } else {
            trace!(shader, "delete of unknown shader");
        }
    }

    pub fn shader_source(&mut self, shader: GLuint, source: &str) {
        if let Some(info) = self.shaders.get_mut(shader) {
            info.source = Some(source.to_owned());
        }
    }

    pub fn get_shader_source(&self, shader: GLuint) -> String {
        self.shaders
            .get(shader)
            .and_then(|info| info.source.clone())
            .unwrap_or_default()
    }

    /// Source compilation is not supported; bytecode arrives via
    /// [`GlContext::build_native_shader`].
    pub fn compile_shader(&mut self, shader: GLuint) {
        trace!(shader, "compile_shader ignored");
    }

    /// Attach target bytecode to a shader object. Native shaders are created at link time.
    pub fn build_native_shader(&mut self, shader: GLuint, bytecode: &[u8]) {
        match self.shaders.get_mut(shader) {
            Some(info) => info.bytecode = Some(Arc::from(bytecode)),
            None => trace!(shader, "build_native_shader: unknown shader"),
        }
    }

    pub fn get_shaderiv(&self, shader: GLuint, pname: GLenum) -> GLint {
        let Some(info) = self.shaders.get(shader) else {
            return 0;
        };
        match pname {
            GL_COMPILE_STATUS => GL_TRUE as GLint,
            GL_SHADER_TYPE => match info.stage {
                ShaderStage::Vertex => GL_VERTEX_SHADER as GLint,
                ShaderStage::Fragment => GL_FRAGMENT_SHADER as GLint,
            },
            GL_SHADER_SOURCE_LENGTH => info
                .source
                .as_ref()
                .map_or(0, |source| source.len() as GLint + 1),
            GL_INFO_LOG_LENGTH | GL_DELETE_STATUS => 0,
            _ => {
                debug!(pname, "get_shaderiv: unsupported parameter");
                0
            }
        }
    }

    pub fn get_shader_info_log(&self, _shader: GLuint) -> String {
        String::new()
    }

    pub fn create_program(&mut self) -> GLuint {
        let handle = self.program_ids.allocate();
        self.programs.create(handle);
        handle
    }

    pub fn delete_program(&mut self, program: GLuint) {
        let Some(mut info) = self.programs.remove(program) else {
            trace!(program, "delete of unknown program");
            return;
        };
        info.release_native(&mut self.backend);
        self.program_ids.release(program);
        if self.current_program == program {
            self.current_program = 0;
        }
    }

    pub fn attach_shader(&mut self, program: GLuint, shader: GLuint) {
        let Some(stage) = self.shaders.get(shader).map(|info| info.stage) else {
            trace!(shader, "attach_shader: unknown shader");
            return;
        };
        let Some(info) = self.programs.get_mut(program) else {
            trace!(program, "attach_shader: unknown program");
            return;
        };
        match stage {
            ShaderStage::Vertex => info.vertex_shader = shader,
            ShaderStage::Fragment => info.fragment_shader = shader,
        }
    }

    /// Bind attribute slot `index` to a semantic by name (`POSITION`, `COLOR`, `TEXCOORD` or
    /// the matching `a_*` GLSL names). Unknown names clear the slot.
    pub fn bind_attrib_location(&mut self, program: GLuint, index: GLuint, name: &str) {
        let Some(info) = self.programs.get_mut(program) else {
            trace!(program, "bind_attrib_location: unknown program");
            return;
        };
        let Some(attrib) = info.attribs.get_mut(index as usize) else {
            debug!(index, "bind_attrib_location: slot out of range");
            return;
        };
        let semantic = Semantic::from_name(name);
        if semantic.is_none() {
            debug!(name, "bind_attrib_location: unknown semantic");
        }
        attrib.semantic = semantic;
        let layout = info.layout_slots();
        info.input_layout.update(|current| *current = layout);
    }

    /// Create the program's native shaders from its attached shaders' bytecode.
    ///
    /// A program whose shaders have no bytecode stays unlinked and draws with it no-op.
    pub fn link_program(&mut self, program: GLuint) -> Result<(), GlesError> {
        let Some(info) = self.programs.get_mut(program) else {
            trace!(program, "link_program: unknown program");
            return Ok(());
        };
        info.release_native(&mut self.backend);

        let bytecode = |shader: GLuint| {
            self.shaders
                .get(shader)
                .and_then(|shader| shader.bytecode.clone())
        };
        let (Some(vs_code), Some(fs_code)) =
            (bytecode(info.vertex_shader), bytecode(info.fragment_shader))
        else {
            debug!(program, "link_program: missing shader bytecode");
            return Ok(());
        };

        let vs = self.backend.create_shader(ShaderStage::Vertex, &vs_code)?;
        let fs = match self.backend.create_shader(ShaderStage::Fragment, &fs_code) {
            Ok(fs) => fs,
            Err(err) => {
                self.backend.destroy_shader(vs);
                return Err(err.into());
            }
        };
        info.native_shaders = Some((vs, fs));
        info.vertex_bytecode = Some(vs_code);
        let layout = info.layout_slots();
        info.input_layout.update(|current| *current = layout);
        info.linked = true;
        debug!(program, "program linked");
        Ok(())
    }

    /// Build the program's input layout now instead of at the first draw.
    pub fn build_native_input_layout(&mut self, program: GLuint) -> Result<(), GlesError> {
        self.ensure_input_layout(program)?;
        Ok(())
    }

    pub fn get_programiv(&self, program: GLuint, pname: GLenum) -> GLint {
        let Some(info) = self.programs.get(program) else {
            return 0;
        };
        match pname {
            GL_LINK_STATUS => GLint::from(info.linked),
            GL_VALIDATE_STATUS => GL_TRUE as GLint,
            GL_ATTACHED_SHADERS => info.attached_shaders() as GLint,
            GL_INFO_LOG_LENGTH | GL_DELETE_STATUS => 0,
            _ => {
                debug!(pname, "get_programiv: unsupported parameter");
                0
            }
        }
    }

    pub fn get_program_info_log(&self, _program: GLuint) -> String {
        String::new()
    }

    pub fn use_program(&mut self, program: GLuint) {
        if program != 0 && !self.programs.contains(program) {
            trace!(program, "use_program: unknown program");
            return;
        }
        self.current_program = program;
    }

    /// Describe attribute slot `index` of the current program.
    pub fn vertex_attrib_pointer(
        &mut self,
        index: GLuint,
        size: GLint,
        ty: GLenum,
        normalized: GLboolean,
        stride: GLsizei,
        pointer: VertexPointer<'_>,
    ) {
        let Some(component) = ComponentType::from_gl(ty) else {
            debug!(ty, "vertex_attrib_pointer: unsupported component type");
            return;
        };
        if !(1..=4).contains(&size) || stride < 0 {
            debug!(size, stride, "vertex_attrib_pointer: invalid layout");
            return;
        }
        let pointer = match pointer {
            VertexPointer::Offset(_) if self.array_buffer == 0 => {
                debug!(index, "vertex_attrib_pointer: offset without a bound array buffer");
                return;
            }
            VertexPointer::Offset(offset) => AttribPointer::Buffer {
                buffer: self.array_buffer,
                offset,
            },
            VertexPointer::Client(bytes) => AttribPointer::Client(Arc::from(bytes)),
        };
        let Some(attrib) = self.current_attrib(index) else {
            return;
        };
        attrib.size = size as usize;
        attrib.ty = component;
        attrib.normalized = normalized != GL_FALSE;
        attrib.stride = stride as usize;
        attrib.pointer = pointer;
    }

    pub fn enable_vertex_attrib_array(&mut self, index: GLuint) {
        if let Some(attrib) = self.current_attrib(index) {
            attrib.enabled = true;
        }
    }

    pub fn disable_vertex_attrib_array(&mut self, index: GLuint) {
        if let Some(attrib) = self.current_attrib(index) {
            attrib.enabled = false;
        }
    }

    fn current_attrib(&mut self, index: GLuint) -> Option<&mut VertexAttrib> {
        let program = self.programs.get_mut(self.current_program)?;
        if index as usize >= MAX_VERTEX_ATTRIBS {
            debug!(index, "vertex attribute index out of range");
            return None;
        }
        program.attribs.get_mut(index as usize)
    }
}
