use crate::LoadError;
use crate::relocation::RelocationState;
use crate::section::{
    FunctionLines, FunctionScope, Global, RelocationInfo, Section, SectionData, Source,
    StaticSymbols,
};
use alloc::string::String;
use alloc::vec::Vec;
use log::debug;
use symtab_abi::reader::{Cursor, RawHeader, Sections, StringPool};
use symtab_abi::{HEADER_LEN, SIGNATURE, SectionKind, VERSION, header, major};

/// Validated header of a raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader<'a> {
    pub name: &'a str,
    pub version: u16,
    /// Declared total size (`dwSize`); bounds every later read.
    pub size: usize,
    pub strings_offset: usize,
}

impl<'a> TableHeader<'a> {
    /// Checks signature and major version. Does not look past the header.
    ///
    /// # Errors
    /// [`LoadError::TransportFault`] if `raw` cannot even hold a header.
    pub fn parse(raw: &'a [u8]) -> Result<Self, LoadError> {
        if raw.len() < HEADER_LEN {
            return Err(LoadError::TransportFault {
                declared: HEADER_LEN,
                received: raw.len(),
            });
        }
        let hdr = RawHeader::parse(raw)?;
        if hdr.signature != SIGNATURE {
            return Err(LoadError::InvalidSignature);
        }
        if major(hdr.version) != major(VERSION) {
            return Err(LoadError::IncompatibleVersion {
                found: hdr.version,
                expected: major(VERSION),
            });
        }

        let size = hdr.size as usize;
        if size < HEADER_LEN {
            return Err(LoadError::Malformed {
                offset: header::SIZE,
            });
        }
        let strings_offset = hdr.strings_offset as usize;
        if strings_offset < HEADER_LEN || strings_offset > size {
            return Err(LoadError::Malformed {
                offset: header::STRINGS_OFFSET,
            });
        }

        Ok(Self {
            name: hdr.name,
            version: hdr.version,
            size,
            strings_offset,
        })
    }
}

/// One loaded table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    name: String,
    version: u16,
    size: usize,
    sections: Vec<Section>,
    relocation: RelocationState,
    relocated: bool,
}

impl SymbolTable {
    /// Parse a complete table.
    ///
    /// Only the first `size` bytes of `raw` are ever looked at, and section
    /// records are not trusted past the string pool.
    ///
    /// # Errors
    /// Header errors as in [`TableHeader::parse`],
    /// [`LoadError::TransportFault`] if `raw` is shorter than the declared
    /// size, [`LoadError::Malformed`] for any record that does not fit.
    pub fn parse(raw: &[u8]) -> Result<Self, LoadError> {
        let hdr = TableHeader::parse(raw)?;
        Self::parse_with(&hdr, raw)
    }

    pub(crate) fn parse_with(hdr: &TableHeader<'_>, raw: &[u8]) -> Result<Self, LoadError> {
        let blob = raw.get(..hdr.size).ok_or(LoadError::TransportFault {
            declared: hdr.size,
            received: raw.len(),
        })?;
        let pool = StringPool::new(&blob[hdr.strings_offset..], hdr.strings_offset);

        let mut sections = Vec::new();
        for record in Sections::new(blob, hdr.strings_offset) {
            let record = record?;
            let Some(kind) = record.kind() else {
                debug!(
                    "skipping unknown section kind {} at {:#x}",
                    record.kind, record.offset
                );
                continue;
            };
            let mut cur = Cursor::new(record.body, record.body_offset());
            let data = SectionData::parse(kind, &mut cur, pool)?;
            sections.push(Section {
                offset: record.offset,
                len: record.body.len() + symtab_abi::SECTION_HEADER_LEN,
                data,
            });
        }

        Ok(Self {
            name: String::from(hdr.name),
            version: hdr.version,
            size: hdr.size,
            sections,
            relocation: RelocationState::NONE,
            relocated: false,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn version(&self) -> u16 {
        self.version
    }

    /// Declared size; the amount charged against the pool.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Offsets applied at load time, [`RelocationState::NONE`] if none were.
    #[must_use]
    pub const fn relocation(&self) -> RelocationState {
        self.relocation
    }

    #[must_use]
    pub const fn is_relocated(&self) -> bool {
        self.relocated
    }

    /// First section of `kind`.
    #[must_use]
    pub fn find_section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind() == kind)
    }

    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.sections
            .iter()
            .filter_map(|s| match &s.data {
                SectionData::Globals(g) => Some(g.iter()),
                _ => None,
            })
            .flatten()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sections.iter().filter_map(|s| match &s.data {
            SectionData::Source(src) => Some(src),
            _ => None,
        })
    }

    pub fn function_lines(&self) -> impl Iterator<Item = &FunctionLines> {
        self.sections.iter().filter_map(|s| match &s.data {
            SectionData::FunctionLines(l) => Some(l),
            _ => None,
        })
    }

    pub fn function_scopes(&self) -> impl Iterator<Item = &FunctionScope> {
        self.sections.iter().filter_map(|s| match &s.data {
            SectionData::FunctionScope(f) => Some(f),
            _ => None,
        })
    }

    pub fn statics(&self) -> impl Iterator<Item = &StaticSymbols> {
        self.sections.iter().filter_map(|s| match &s.data {
            SectionData::Static(st) => Some(st),
            _ => None,
        })
    }

    #[must_use]
    pub fn find_source(&self, file_id: u16) -> Option<&Source> {
        self.sources().find(|s| s.file_id == file_id)
    }

    #[must_use]
    pub fn reloc_info(&self) -> Option<&RelocationInfo> {
        self.sections.iter().find_map(|s| match &s.data {
            SectionData::Reloc(r) => Some(r),
            _ => None,
        })
    }

    /// Apply `by` to every address. A table is relocated at most once.
    pub(crate) fn relocate(&mut self, by: RelocationState) {
        debug_assert!(!self.relocated, "table relocated twice");
        if self.relocated {
            return;
        }
        for section in &mut self.sections {
            section.data.relocate(by);
        }
        self.relocation = by;
        self.relocated = true;
    }
}
