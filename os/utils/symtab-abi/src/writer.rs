//! Builds table blobs in the on-disk layout.
//!
//! Used by the symbol-file generator and by tests that need real tables.

#![allow(clippy::cast_possible_truncation)]

use crate::{
    BuiltinType, GLOBAL_FLAG_DATA, HEADER_LEN, MAX_MODULE_NAME, RELOC_CLASSES,
    RESERVED_STRING_OFFSETS, SECTION_HEADER_LEN, SIGNATURE, SectionKind, TokenKind, VERSION, header,
};
use alloc::vec::Vec;

#[derive(Debug, Copy, Clone)]
pub struct GlobalDef<'a> {
    pub name: &'a str,
    pub def: &'a str,
    pub start: u32,
    pub end: u32,
    pub file_id: u16,
    pub data: bool,
}

#[derive(Debug, Copy, Clone)]
pub struct LineDef {
    /// Offset from the function start.
    pub offset: u16,
    pub line: u16,
    pub file_id: u16,
}

#[derive(Debug, Copy, Clone)]
pub struct TokenDef<'a> {
    pub kind: TokenKind,
    pub param: u32,
    pub name: &'a str,
}

#[derive(Debug, Copy, Clone)]
pub struct ScopeDef<'a> {
    pub name: &'a str,
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
    pub tokens: &'a [TokenDef<'a>],
}

#[derive(Debug, Copy, Clone)]
pub struct StaticDef<'a> {
    pub name: &'a str,
    pub def: &'a str,
    pub address: u32,
}

/// Typedef definition: either a string or a built-in ordinal.
#[derive(Debug, Copy, Clone)]
pub enum TypeDef<'a> {
    Text(&'a str),
    Builtin(BuiltinType),
}

#[derive(Debug, Copy, Clone)]
pub struct TypedefDef<'a> {
    pub major: u16,
    pub minor: u16,
    pub name: &'a str,
    pub def: TypeDef<'a>,
}

#[derive(Debug, Copy, Clone)]
pub struct SourceDef<'a> {
    pub file_id: u16,
    pub path: &'a str,
    pub name: &'a str,
    pub line_offsets: &'a [u32],
}

/// Appends sections in call order and lays out the string pool on [`finish`](Self::finish).
pub struct TableBuilder {
    name: [u8; MAX_MODULE_NAME],
    version: u16,
    body: Vec<u8>,
    strings: Vec<u8>,
}

impl TableBuilder {
    /// Names longer than the header field are truncated.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut field = [0u8; MAX_MODULE_NAME];
        let n = name.len().min(MAX_MODULE_NAME - 1);
        field[..n].copy_from_slice(&name.as_bytes()[..n]);
        Self {
            name: field,
            version: VERSION,
            body: Vec::new(),
            strings: alloc::vec![0; RESERVED_STRING_OFFSETS],
        }
    }

    #[must_use]
    pub const fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        let off = self.strings.len() as u32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        off
    }

    /// Writes a record header, lets `f` fill the body, then patches the length.
    fn section(&mut self, kind: SectionKind, f: impl FnOnce(&mut Self, &mut Vec<u8>)) -> &mut Self {
        let mut body = Vec::new();
        f(self, &mut body);
        self.body.push(kind as u8);
        self.body
            .extend_from_slice(&((body.len() + SECTION_HEADER_LEN) as u32).to_le_bytes());
        self.body.extend_from_slice(&body);
        self
    }

    pub fn globals(&mut self, globals: &[GlobalDef<'_>]) -> &mut Self {
        self.section(SectionKind::Globals, |b, out| {
            put_u32(out, globals.len() as u32);
            for g in globals {
                let name = b.intern(g.name);
                let def = b.intern(g.def);
                put_u32(out, name);
                put_u32(out, def);
                put_u32(out, g.start);
                put_u32(out, g.end);
                put_u16(out, g.file_id);
                out.push(if g.data { GLOBAL_FLAG_DATA } else { 0 });
            }
        })
    }

    pub fn source(&mut self, source: &SourceDef<'_>) -> &mut Self {
        self.section(SectionKind::Source, |b, out| {
            let path = b.intern(source.path);
            let name = b.intern(source.name);
            put_u16(out, source.file_id);
            put_u32(out, path);
            put_u32(out, name);
            put_u32(out, source.line_offsets.len() as u32);
            for &off in source.line_offsets {
                put_u32(out, off);
            }
        })
    }

    pub fn function_lines(&mut self, start: u32, end: u32, lines: &[LineDef]) -> &mut Self {
        self.section(SectionKind::FunctionLines, |_, out| {
            put_u32(out, start);
            put_u32(out, end);
            put_u16(out, lines.len() as u16);
            for l in lines {
                put_u16(out, l.offset);
                put_u16(out, l.line);
                put_u16(out, l.file_id);
            }
        })
    }

    pub fn function_scope(&mut self, scope: &ScopeDef<'_>) -> &mut Self {
        self.section(SectionKind::FunctionScope, |b, out| {
            let name = b.intern(scope.name);
            put_u32(out, name);
            put_u16(out, scope.file_id);
            put_u32(out, scope.start);
            put_u32(out, scope.end);
            put_u16(out, scope.tokens.len() as u16);
            for t in scope.tokens {
                let name = b.intern(t.name);
                out.push(t.kind as u8);
                put_u32(out, t.param);
                put_u32(out, name);
            }
        })
    }

    pub fn statics(&mut self, file_id: u16, statics: &[StaticDef<'_>]) -> &mut Self {
        self.section(SectionKind::Static, |b, out| {
            put_u16(out, file_id);
            put_u16(out, statics.len() as u16);
            for s in statics {
                let name = b.intern(s.name);
                let def = b.intern(s.def);
                put_u32(out, name);
                put_u32(out, def);
                put_u32(out, s.address);
            }
        })
    }

    pub fn typedefs(&mut self, file_id: u16, typedefs: &[TypedefDef<'_>]) -> &mut Self {
        self.section(SectionKind::Typedef, |b, out| {
            put_u16(out, file_id);
            put_u16(out, typedefs.len() as u16);
            for t in typedefs {
                let name = b.intern(t.name);
                let def = match t.def {
                    TypeDef::Text(s) => b.intern(s),
                    TypeDef::Builtin(ty) => u32::from(ty as u8),
                };
                put_u16(out, t.major);
                put_u16(out, t.minor);
                put_u32(out, name);
                put_u32(out, def);
            }
        })
    }

    pub fn ignore(&mut self, bytes: &[u8]) -> &mut Self {
        self.section(SectionKind::Ignore, |_, out| out.extend_from_slice(bytes))
    }

    /// `pairs[i]` is `(ref_offset, ref_fixup)` for relocation class `i`.
    pub fn reloc(&mut self, pairs: [(u32, u32); RELOC_CLASSES]) -> &mut Self {
        self.section(SectionKind::Reloc, |_, out| {
            put_u16(out, RELOC_CLASSES as u16);
            for (offset, fixup) in pairs {
                put_u32(out, offset);
                put_u32(out, fixup);
            }
        })
    }

    /// Emit the finished blob.
    #[must_use]
    pub fn finish(&self) -> Vec<u8> {
        let strings_offset = HEADER_LEN + self.body.len() + SECTION_HEADER_LEN;
        let size = strings_offset + self.strings.len();

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(&self.name);
        put_u16(&mut out, self.version);
        put_u32(&mut out, size as u32);
        put_u32(&mut out, strings_offset as u32);
        debug_assert_eq!(out.len(), HEADER_LEN);
        debug_assert_eq!(header::STRINGS_OFFSET + 4, HEADER_LEN);

        out.extend_from_slice(&self.body);
        out.push(SectionKind::End as u8);
        put_u32(&mut out, SECTION_HEADER_LEN as u32);
        out.extend_from_slice(&self.strings);
        out
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
