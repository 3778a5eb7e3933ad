//! Address and name queries used by the step engine and the command layer.

use crate::section::{FunctionLines, FunctionScope};
use crate::store::SymbolStore;
use crate::table::SymbolTable;

/// Source-stepping context for one instruction pointer.
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext<'a> {
    pub table: &'a SymbolTable,
    pub scope: &'a FunctionScope,
    pub lines: &'a FunctionLines,
}

impl FunctionContext<'_> {
    /// End of the source line containing `address`.
    #[must_use]
    pub fn next_line_address(&self, address: u32) -> u32 {
        next_line_address(self.lines, address)
    }
}

/// Source position of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine {
    pub file_id: u16,
    pub line: u16,
    /// Address the line's code starts at.
    pub address: u32,
}

/// Code address of the first line-map entry strictly after `address`, or the
/// function end if `address` is on the last line.
///
/// Entries are sorted by offset, so this is monotonic in `address`.
#[must_use]
pub fn next_line_address(lines: &FunctionLines, address: u32) -> u32 {
    lines
        .entries
        .iter()
        .map(|e| lines.address_of(e))
        .find(|&a| a > address)
        .unwrap_or(lines.end)
}

impl SymbolStore {
    /// Address of a global or file-scope static, current table first.
    #[must_use]
    pub fn name_to_address(&self, name: &str) -> Option<u32> {
        self.search_order().find_map(|t| {
            t.globals()
                .find(|g| g.name == name)
                .map(|g| g.start)
                .or_else(|| {
                    t.statics()
                        .flat_map(|s| s.symbols.iter())
                        .find(|s| s.name == name)
                        .map(|s| s.address)
                })
        })
    }

    /// Name of the function covering `address`, from function scopes first,
    /// then code globals. Exported symbols of other images never appear here.
    #[must_use]
    pub fn address_to_function_name(&self, address: u32) -> Option<&str> {
        self.search_order().find_map(|t| {
            t.function_scopes()
                .find(|f| f.contains(address))
                .map(|f| f.name.as_str())
                .or_else(|| {
                    t.globals()
                        .find(|g| g.is_code() && g.contains(address))
                        .map(|g| g.name.as_str())
                })
        })
    }

    /// Function scope and line map covering `address`, if any table has both.
    #[must_use]
    pub fn function_context(&self, address: u32) -> Option<FunctionContext<'_>> {
        self.search_order().find_map(|table| {
            let scope = table.function_scopes().find(|f| f.contains(address))?;
            let lines = table.function_lines().find(|l| l.contains(address))?;
            Some(FunctionContext {
                table,
                scope,
                lines,
            })
        })
    }

    /// Line whose code contains `address`.
    #[must_use]
    pub fn address_to_source_line(&self, address: u32) -> Option<SourceLine> {
        self.search_order().find_map(|t| {
            let lines = t.function_lines().find(|l| l.contains(address))?;
            lines
                .entries
                .iter()
                .rev()
                .find(|e| lines.address_of(e) <= address)
                .map(|e| SourceLine {
                    file_id: e.file_id,
                    line: e.line,
                    address: lines.address_of(e),
                })
        })
    }
}
