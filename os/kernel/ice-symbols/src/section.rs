//! Owned, typed section records.
//!
//! Each parser reads only what its own count fields announce and checks that
//! the announced records fit inside the section body before allocating.

use crate::LoadError;
use crate::relocation::RelocationState;
use alloc::string::String;
use alloc::vec::Vec;
use symtab_abi::reader::{Cursor, StringPool};
use symtab_abi::{BuiltinType, GLOBAL_FLAG_DATA, RELOC_CLASSES, SectionKind, TokenKind};

/// A section with the span it occupied in the raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Offset of the record header from the table start.
    pub offset: usize,
    /// Record length including its header.
    pub len: usize,
    pub data: SectionData,
}

impl Section {
    #[must_use]
    pub const fn kind(&self) -> SectionKind {
        self.data.kind()
    }

    /// One past the last byte of the record.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionData {
    Globals(Vec<Global>),
    Source(Source),
    FunctionLines(FunctionLines),
    FunctionScope(FunctionScope),
    Static(StaticSymbols),
    Typedefs(Typedefs),
    Reloc(RelocationInfo),
    Ignore,
}

impl SectionData {
    #[must_use]
    pub const fn kind(&self) -> SectionKind {
        match self {
            Self::Globals(_) => SectionKind::Globals,
            Self::Source(_) => SectionKind::Source,
            Self::FunctionLines(_) => SectionKind::FunctionLines,
            Self::FunctionScope(_) => SectionKind::FunctionScope,
            Self::Static(_) => SectionKind::Static,
            Self::Typedefs(_) => SectionKind::Typedef,
            Self::Reloc(_) => SectionKind::Reloc,
            Self::Ignore => SectionKind::Ignore,
        }
    }

    pub(crate) fn parse(
        kind: SectionKind,
        cur: &mut Cursor<'_>,
        pool: StringPool<'_>,
    ) -> Result<Self, LoadError> {
        Ok(match kind {
            SectionKind::Globals => Self::Globals(Global::parse_all(cur, pool)?),
            SectionKind::Source => Self::Source(Source::parse(cur, pool)?),
            SectionKind::FunctionLines => Self::FunctionLines(FunctionLines::parse(cur)?),
            SectionKind::FunctionScope => Self::FunctionScope(FunctionScope::parse(cur, pool)?),
            SectionKind::Static => Self::Static(StaticSymbols::parse(cur, pool)?),
            SectionKind::Typedef => Self::Typedefs(Typedefs::parse(cur, pool)?),
            SectionKind::Reloc => Self::Reloc(RelocationInfo::parse(cur)?),
            SectionKind::Ignore | SectionKind::End => Self::Ignore,
        })
    }

    /// Shift every address-bearing field. Source, typedef and ignored
    /// sections carry no addresses.
    pub(crate) fn relocate(&mut self, by: RelocationState) {
        match self {
            Self::Globals(globals) => {
                for g in globals {
                    let delta = if g.is_data() { by.data } else { by.code };
                    g.start = g.start.wrapping_add(delta);
                    g.end = g.end.wrapping_add(delta);
                }
            }
            Self::FunctionLines(lines) => {
                lines.start = lines.start.wrapping_add(by.code);
                lines.end = lines.end.wrapping_add(by.code);
            }
            Self::FunctionScope(scope) => {
                scope.start = scope.start.wrapping_add(by.code);
                scope.end = scope.end.wrapping_add(by.code);
            }
            Self::Static(statics) => {
                for s in &mut statics.symbols {
                    s.address = s.address.wrapping_add(by.data);
                }
            }
            Self::Source(_) | Self::Typedefs(_) | Self::Reloc(_) | Self::Ignore => {}
        }
    }
}

fn string(pool: StringPool<'_>, off: u32) -> Result<String, LoadError> {
    Ok(String::from(pool.get(off)?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub def: String,
    pub start: u32,
    pub end: u32,
    pub file_id: u16,
    pub flags: u8,
}

impl Global {
    const RECORD_LEN: usize = 4 + 4 + 4 + 4 + 2 + 1;

    #[must_use]
    pub const fn is_data(&self) -> bool {
        self.flags & GLOBAL_FLAG_DATA != 0
    }

    #[must_use]
    pub const fn is_code(&self) -> bool {
        !self.is_data()
    }

    /// Whether `address` falls inside `[start, end)`, or equals `start` for
    /// zero-length symbols.
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        address == self.start || (address > self.start && address < self.end)
    }

    fn parse_all(cur: &mut Cursor<'_>, pool: StringPool<'_>) -> Result<Vec<Self>, LoadError> {
        let count = cur.u32()? as usize;
        cur.expect_records(count, Self::RECORD_LEN)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(Self {
                name: string(pool, cur.u32()?)?,
                def: string(pool, cur.u32()?)?,
                start: cur.u32()?,
                end: cur.u32()?,
                file_id: cur.u16()?,
                flags: cur.u8()?,
            });
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub file_id: u16,
    pub path: String,
    pub name: String,
    /// Byte offset of every line in the source text.
    pub line_offsets: Vec<u32>,
}

impl Source {
    fn parse(cur: &mut Cursor<'_>, pool: StringPool<'_>) -> Result<Self, LoadError> {
        let file_id = cur.u16()?;
        let path = string(pool, cur.u32()?)?;
        let name = string(pool, cur.u32()?)?;
        let count = cur.u32()? as usize;
        cur.expect_records(count, 4)?;
        let line_offsets = (0..count).map(|_| cur.u32()).collect::<Result<_, _>>()?;
        Ok(Self {
            file_id,
            path,
            name,
            line_offsets,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineEntry {
    /// Offset from [`FunctionLines::start`].
    pub offset: u16,
    pub line: u16,
    pub file_id: u16,
}

/// Line map of one function, sorted by ascending code offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionLines {
    pub start: u32,
    pub end: u32,
    pub entries: Vec<LineEntry>,
}

impl FunctionLines {
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.start && address < self.end
    }

    /// Absolute code address of a line entry.
    #[must_use]
    pub fn address_of(&self, entry: &LineEntry) -> u32 {
        self.start.wrapping_add(u32::from(entry.offset))
    }

    fn parse(cur: &mut Cursor<'_>) -> Result<Self, LoadError> {
        let start = cur.u32()?;
        let end = cur.u32()?;
        let count = usize::from(cur.u16()?);
        cur.expect_records(count, 6)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(LineEntry {
                offset: cur.u16()?,
                line: cur.u16()?,
                file_id: cur.u16()?,
            });
        }
        Ok(Self {
            start,
            end,
            entries,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub param: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionScope {
    pub name: String,
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
    pub tokens: Vec<Token>,
}

impl FunctionScope {
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.start && address < self.end
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.kind == TokenKind::Param)
    }

    fn parse(cur: &mut Cursor<'_>, pool: StringPool<'_>) -> Result<Self, LoadError> {
        let name = string(pool, cur.u32()?)?;
        let file_id = cur.u16()?;
        let start = cur.u32()?;
        let end = cur.u32()?;
        let count = usize::from(cur.u16()?);
        cur.expect_records(count, 1 + 4 + 4)?;
        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            let at = cur.position();
            let kind = TokenKind::from_raw(cur.u8()?).ok_or(LoadError::Malformed { offset: at })?;
            tokens.push(Token {
                kind,
                param: cur.u32()?,
                name: string(pool, cur.u32()?)?,
            });
        }
        Ok(Self {
            name,
            file_id,
            start,
            end,
            tokens,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSymbol {
    pub name: String,
    pub def: String,
    pub address: u32,
}

/// File-scope statics of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSymbols {
    pub file_id: u16,
    pub symbols: Vec<StaticSymbol>,
}

impl StaticSymbols {
    fn parse(cur: &mut Cursor<'_>, pool: StringPool<'_>) -> Result<Self, LoadError> {
        let file_id = cur.u16()?;
        let count = usize::from(cur.u16()?);
        cur.expect_records(count, 12)?;
        let mut symbols = Vec::with_capacity(count);
        for _ in 0..count {
            symbols.push(StaticSymbol {
                name: string(pool, cur.u32()?)?,
                def: string(pool, cur.u32()?)?,
                address: cur.u32()?,
            });
        }
        Ok(Self { file_id, symbols })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefinition {
    Builtin(BuiltinType),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedef {
    pub major: u16,
    pub minor: u16,
    pub name: String,
    pub def: TypeDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedefs {
    pub file_id: u16,
    pub entries: Vec<Typedef>,
}

impl Typedefs {
    fn parse(cur: &mut Cursor<'_>, pool: StringPool<'_>) -> Result<Self, LoadError> {
        let file_id = cur.u16()?;
        let count = usize::from(cur.u16()?);
        cur.expect_records(count, 12)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let major = cur.u16()?;
            let minor = cur.u16()?;
            let name = string(pool, cur.u32()?)?;
            let raw = cur.u32()?;
            let def = match BuiltinType::from_ordinal(raw) {
                Some(ty) => TypeDefinition::Builtin(ty),
                None => TypeDefinition::Text(string(pool, raw)?),
            };
            entries.push(Typedef {
                major,
                minor,
                name,
                def,
            });
        }
        Ok(Self { file_id, entries })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RelocEntry {
    pub ref_offset: u32,
    pub ref_fixup: u32,
}

/// One `(reference-offset, reference-fixup)` pair per relocation class,
/// indexed by [`symtab_abi::reloc`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RelocationInfo {
    pub classes: [RelocEntry; RELOC_CLASSES],
}

impl RelocationInfo {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self, LoadError> {
        let at = cur.position();
        if usize::from(cur.u16()?) != RELOC_CLASSES {
            return Err(LoadError::Malformed { offset: at });
        }
        let mut info = Self::default();
        for class in &mut info.classes {
            class.ref_offset = cur.u32()?;
            class.ref_fixup = cur.u32()?;
        }
        Ok(info)
    }
}
