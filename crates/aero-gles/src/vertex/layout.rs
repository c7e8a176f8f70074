use std::fmt;

/// Vertex attribute semantics understood by the repacker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Color,
    TexCoord,
}

impl Semantic {
    /// Resolve the name passed to `bind_attrib_location`.
    ///
    /// Accepts the target semantic names as well as the conventional GLSL attribute names used
    /// by 2D engines.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "POSITION" | "a_position" => Self::Position,
            "COLOR" | "a_color" => Self::Color,
            "TEXCOORD" | "a_texCoord" => Self::TexCoord,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Position => "POSITION",
            Self::Color => "COLOR",
            Self::TexCoord => "TEXCOORD",
        }
    }

    /// Float components written per vertex.
    pub fn components(self) -> usize {
        match self {
            Self::Position => 3,
            Self::Color => 4,
            Self::TexCoord => 2,
        }
    }

    /// Bytes occupied in the interleaved vertex.
    pub fn packed_size(self) -> usize {
        self.components() * 4
    }

    pub fn format(self) -> VertexFormat {
        match self {
            Self::Position => VertexFormat::Float32x3,
            Self::Color => VertexFormat::Float32x4,
            Self::TexCoord => VertexFormat::Float32x2,
        }
    }
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            Self::Float32x2 => wgpu::VertexFormat::Float32x2,
            Self::Float32x3 => wgpu::VertexFormat::Float32x3,
            Self::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

/// One element of the interleaved vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic: Semantic,
    pub format: VertexFormat,
    /// Byte offset inside the interleaved vertex.
    pub offset: u32,
    /// Attribute slot the element was declared in; used as the shader input location.
    pub location: u32,
}

/// Interleaved layout derived from a program's attribute slots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InterleavedLayout {
    elements: Vec<InputElement>,
    stride: u32,
}

impl InterleavedLayout {
    /// Walk attribute slots in order, packing each declared semantic after the previous one.
    /// Undeclared slots are skipped.
    pub fn from_slots(slots: impl IntoIterator<Item = Option<Semantic>>) -> Self {
        let mut elements = Vec::new();
        let mut offset = 0u32;
        for (location, semantic) in slots.into_iter().enumerate() {
            let Some(semantic) = semantic else {
                continue;
            };
            elements.push(InputElement {
                semantic,
                format: semantic.format(),
                offset,
                location: location as u32,
            });
            offset += semantic.packed_size() as u32;
        }
        Self {
            elements,
            stride: offset,
        }
    }

    pub fn elements(&self) -> &[InputElement] {
        &self.elements
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, semantic: Semantic) -> Option<&InputElement> {
        self.elements.iter().find(|e| e.semantic == semantic)
    }
}
