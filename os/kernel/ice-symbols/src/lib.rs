//! # Symbol table store
//!
//! Every loaded code image may contribute one symbol table. Tables are
//! validated against the binary format in [`symtab_abi`], charged against a
//! fixed memory budget, relocated once against the image's real load address
//! and then queried by the step engine and the command layer.
//!
//! Tables are independent of each other. The store only changes from the
//! command path, never from trap context.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod error;
mod lookup;
mod relocation;
mod section;
mod store;
mod table;

pub use error::LoadError;
pub use lookup::{FunctionContext, SourceLine, next_line_address};
pub use relocation::{ImageResolver, LoadedImage, MemoryProbe, NoHost, RelocationState};
pub use section::{
    FunctionLines, FunctionScope, Global, LineEntry, RelocEntry, RelocationInfo, Section,
    SectionData, Source, StaticSymbol, StaticSymbols, Token, TypeDefinition, Typedef, Typedefs,
};
pub use store::{SymbolPool, SymbolStore, TableId, TableSummary};
pub use symtab_abi::{BuiltinType, SectionKind, TokenKind};
pub use table::{SymbolTable, TableHeader};

/// Built-in type name for a typedef ordinal, if it is one.
#[must_use]
pub fn builtin_type_name(ordinal: u32) -> Option<&'static str> {
    BuiltinType::from_ordinal(ordinal).map(BuiltinType::c_name)
}
