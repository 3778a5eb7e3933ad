//! # Symbol table binary format
//!
//! Layout shared by the symbol-file generator and the in-kernel symbol store.
//! A table is a single little-endian blob:
//!
//! ```text
//! +--------------------+  0
//! | Header (46 bytes)  |
//! +--------------------+  HEADER_LEN
//! | Section records    |  kind: u8, len: u32, body...
//! | ...                |
//! | End record         |  kind = 0
//! +--------------------+  strings_offset
//! | String pool        |  NUL-terminated UTF-8
//! +--------------------+  size
//! ```
//!
//! Every string field inside a section body is a `u32` offset relative to
//! `strings_offset`. The first [`RESERVED_STRING_OFFSETS`] bytes of the pool
//! are NUL so that a typedef definition in `1..=19` is unambiguously a
//! [`BuiltinType`] ordinal; offset `0` is the empty string.

#![cfg_attr(not(any(test, doctest)), no_std)]

#[cfg(feature = "writer")]
extern crate alloc;

#[cfg(feature = "reader")]
pub mod reader;

#[cfg(feature = "writer")]
pub mod writer;

/// Magic bytes at offset 0 of every table.
pub const SIGNATURE: [u8; 4] = *b"SYM\0";

/// Format version written by the generator. Major version lives in the high byte.
pub const VERSION: u16 = 0x0100;

/// Capacity of the fixed, NUL-padded table name field.
pub const MAX_MODULE_NAME: usize = 32;

/// Size of the fixed header.
pub const HEADER_LEN: usize = 4 + MAX_MODULE_NAME + 2 + 4 + 4;

/// Size of the `{kind, len}` prefix of every section record.
pub const SECTION_HEADER_LEN: usize = 5;

/// Pool offsets below this value never start a real string.
pub const RESERVED_STRING_OFFSETS: usize = BuiltinType::ALL.len() + 1;

/// Number of relocation classes carried by a [`SectionKind::Reloc`] section.
pub const RELOC_CLASSES: usize = 4;

/// Field offsets inside the header.
pub mod header {
    pub const SIGNATURE: usize = 0;
    pub const NAME: usize = 4;
    pub const VERSION: usize = NAME + super::MAX_MODULE_NAME;
    pub const SIZE: usize = VERSION + 2;
    pub const STRINGS_OFFSET: usize = SIZE + 4;
}

/// Returns the major part of a format version.
#[inline]
#[must_use]
pub const fn major(version: u16) -> u8 {
    (version >> 8) as u8
}

/// Section record discriminant.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SectionKind {
    End = 0,
    Globals = 1,
    Source = 2,
    FunctionLines = 3,
    FunctionScope = 4,
    Static = 5,
    Typedef = 6,
    Ignore = 7,
    Reloc = 8,
}

impl SectionKind {
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::End,
            1 => Self::Globals,
            2 => Self::Source,
            3 => Self::FunctionLines,
            4 => Self::FunctionScope,
            5 => Self::Static,
            6 => Self::Typedef,
            7 => Self::Ignore,
            8 => Self::Reloc,
            _ => return None,
        })
    }
}

/// Token kinds inside a function scope body.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TokenKind {
    /// Function parameter, `param` is the stack offset.
    Param = 1,
    /// Local variable kept in a register, `param` is the register number.
    RegisterLocal = 2,
    /// Local variable on the stack, `param` is the frame offset.
    StackLocal = 3,
    /// Function-local static, `param` is its address.
    StaticLocal = 4,
    /// Opens a lexical block, `param` is the code offset.
    ScopeOpen = 5,
    /// Closes a lexical block, `param` is the code offset.
    ScopeClose = 6,
}

impl TokenKind {
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Self::Param,
            2 => Self::RegisterLocal,
            3 => Self::StackLocal,
            4 => Self::StaticLocal,
            5 => Self::ScopeOpen,
            6 => Self::ScopeClose,
            _ => return None,
        })
    }
}

/// Built-in type ordinals a typedef entry may use in place of a definition string.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BuiltinType {
    Int = 1,
    Char,
    LongInt,
    UnsignedInt,
    LongUnsignedInt,
    LongLongInt,
    LongLongUnsignedInt,
    ShortInt,
    ShortUnsignedInt,
    SignedChar,
    UnsignedChar,
    Float,
    Double,
    LongDouble,
    ComplexInt,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,
    Void,
}

impl BuiltinType {
    pub const ALL: [Self; 19] = [
        Self::Int,
        Self::Char,
        Self::LongInt,
        Self::UnsignedInt,
        Self::LongUnsignedInt,
        Self::LongLongInt,
        Self::LongLongUnsignedInt,
        Self::ShortInt,
        Self::ShortUnsignedInt,
        Self::SignedChar,
        Self::UnsignedChar,
        Self::Float,
        Self::Double,
        Self::LongDouble,
        Self::ComplexInt,
        Self::ComplexFloat,
        Self::ComplexDouble,
        Self::ComplexLongDouble,
        Self::Void,
    ];

    /// Maps a raw typedef definition value onto a built-in type.
    #[must_use]
    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        let index = usize::try_from(ordinal.checked_sub(1)?).ok()?;
        Self::ALL.get(index).copied()
    }

    /// C spelling of the type.
    #[must_use]
    pub const fn c_name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Char => "char",
            Self::LongInt => "long int",
            Self::UnsignedInt => "unsigned int",
            Self::LongUnsignedInt => "long unsigned int",
            Self::LongLongInt => "long long int",
            Self::LongLongUnsignedInt => "long long unsigned int",
            Self::ShortInt => "short int",
            Self::ShortUnsignedInt => "short unsigned int",
            Self::SignedChar => "signed char",
            Self::UnsignedChar => "unsigned char",
            Self::Float => "float",
            Self::Double => "double",
            Self::LongDouble => "long double",
            Self::ComplexInt => "complex int",
            Self::ComplexFloat => "complex float",
            Self::ComplexDouble => "complex double",
            Self::ComplexLongDouble => "complex long double",
            Self::Void => "void",
        }
    }
}

/// Relocation class indices inside a [`SectionKind::Reloc`] section.
pub mod reloc {
    /// `.text`; `ref_offset` holds the recorded entry point address.
    pub const CODE: usize = 0;
    /// `.data`; `ref_offset` is a data symbol address, `ref_fixup` the code
    /// offset (from the entry point) of an operand referencing it.
    pub const DATA: usize = 1;
    /// Unused by the generator.
    pub const RESERVED: usize = 2;
    /// Uninitialized/common data.
    pub const COMMON: usize = 3;
}

/// Bit 0 of a global's flags: set for data symbols, clear for code.
pub const GLOBAL_FLAG_DATA: u8 = 0x01;
