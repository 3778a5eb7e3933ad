/// Why a table could not be loaded or found.
///
/// A failed load never changes the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("invalid symbol table signature")]
    InvalidSignature,
    #[error("incompatible symbol table version {found:#06x} (expected major {expected})")]
    IncompatibleVersion { found: u16, expected: u8 },
    #[error("symbol pool exhausted: {requested} bytes requested, {available} available")]
    OutOfMemory { requested: usize, available: usize },
    #[error("symbol table truncated: {declared} bytes declared, {received} received")]
    TransportFault { declared: usize, received: usize },
    #[error("malformed symbol table at offset {offset:#x}")]
    Malformed { offset: usize },
    #[error("symbol table not found")]
    NotFound,
}

impl From<symtab_abi::reader::ReadError> for LoadError {
    fn from(e: symtab_abi::reader::ReadError) -> Self {
        Self::Malformed { offset: e.offset() }
    }
}
