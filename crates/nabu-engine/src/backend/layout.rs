use crate::error::{EngineError, Result};

/// Fixed vertex attribute slots of the backend.
///
/// A shader's declared input location is the ordinal of this enumeration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Attrib {
    Position = 0,
    Normal,
    Tangent,
    Bitangent,
    Color0,
    Color1,
    Color2,
    Color3,
    Indices,
    Weight,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    TexCoord3,
    TexCoord4,
    TexCoord5,
    TexCoord6,
    TexCoord7,
}

impl Attrib {
    pub const COUNT: usize = 18;

    const ALL: [Attrib; Self::COUNT] = [
        Attrib::Position,
        Attrib::Normal,
        Attrib::Tangent,
        Attrib::Bitangent,
        Attrib::Color0,
        Attrib::Color1,
        Attrib::Color2,
        Attrib::Color3,
        Attrib::Indices,
        Attrib::Weight,
        Attrib::TexCoord0,
        Attrib::TexCoord1,
        Attrib::TexCoord2,
        Attrib::TexCoord3,
        Attrib::TexCoord4,
        Attrib::TexCoord5,
        Attrib::TexCoord6,
        Attrib::TexCoord7,
    ];

    /// Maps a declared shader location to its attribute slot.
    pub fn from_location(location: u32) -> Result<Self> {
        Self::ALL
            .get(location as usize)
            .copied()
            .ok_or(EngineError::UnsupportedAttribLocation(location))
    }

    #[inline]
    pub const fn location(self) -> u32 {
        self as u32
    }

    /// Attribute id written into shader containers.
    ///
    /// The ids are part of the container format and are not contiguous.
    pub const fn id(self) -> u16 {
        match self {
            Attrib::Position => 0x0001,
            Attrib::Normal => 0x0002,
            Attrib::Tangent => 0x0003,
            Attrib::Bitangent => 0x0004,
            Attrib::Color0 => 0x0005,
            Attrib::Color1 => 0x0006,
            Attrib::Color2 => 0x0018,
            Attrib::Color3 => 0x0019,
            Attrib::Indices => 0x000e,
            Attrib::Weight => 0x000f,
            Attrib::TexCoord0 => 0x0010,
            Attrib::TexCoord1 => 0x0011,
            Attrib::TexCoord2 => 0x0012,
            Attrib::TexCoord3 => 0x0013,
            Attrib::TexCoord4 => 0x0014,
            Attrib::TexCoord5 => 0x0015,
            Attrib::TexCoord6 => 0x0016,
            Attrib::TexCoord7 => 0x0017,
        }
    }

    /// Inverse of [`Attrib::id`].
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.id() == id)
    }
}

/// Numeric element type of a vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttribType {
    Uint8,
    Int16,
    Float,
}

impl AttribType {
    #[inline]
    pub const fn size(self) -> u16 {
        match self {
            AttribType::Uint8 => 1,
            AttribType::Int16 => 2,
            AttribType::Float => 4,
        }
    }
}

/// One attribute inside a vertex layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayoutAttribute {
    pub attrib: Attrib,
    /// Component count, 1..=4.
    pub count: u8,
    pub kind: AttribType,
    pub normalized: bool,
    /// Byte offset inside one vertex.
    pub offset: u16,
}

/// Interleaved vertex layout handed to the backend with a vertex buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u16,
    pub attributes: Vec<LayoutAttribute>,
}

impl VertexLayout {
    pub fn new(stride: u16) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute at an explicit byte offset.
    ///
    /// A later entry for the same slot replaces the earlier one.
    pub fn add(&mut self, attribute: LayoutAttribute) -> &mut Self {
        self.attributes.retain(|a| a.attrib != attribute.attrib);
        self.attributes.push(attribute);
        self
    }

    pub fn has(&self, attrib: Attrib) -> bool {
        self.attributes.iter().any(|a| a.attrib == attrib)
    }

    pub fn get(&self, attrib: Attrib) -> Option<&LayoutAttribute> {
        self.attributes.iter().find(|a| a.attrib == attrib)
    }
}
