use crate::SymbolTable;
use log::{debug, warn};
use symtab_abi::reloc;

/// Additive offsets for the code and data relocation classes of one table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RelocationState {
    pub code: u32,
    pub data: u32,
}

impl RelocationState {
    pub const NONE: Self = Self { code: 0, data: 0 };

    #[must_use]
    pub const fn new(code: u32, data: u32) -> Self {
        Self { code, data }
    }

    /// Derive offsets for `table` from the host's view of the image with the same name.
    ///
    /// Returns `None` when the host has no such image or the table does not
    /// define `entry_symbol`; such tables are used unrelocated.
    ///
    /// * code: resolved entry point minus the recorded entry symbol address.
    /// * data: the pointer sampled at `entry + reloc[DATA].ref_fixup` minus
    ///   `reloc[DATA].ref_offset`. Without a relocation section, or if the
    ///   sample cannot be read, the code offset is used for data as well.
    pub fn compute(
        table: &SymbolTable,
        entry_symbol: &str,
        host: &dyn ImageResolver,
        probe: &dyn MemoryProbe,
    ) -> Option<Self> {
        let image = host.find_image(table.name())?;
        let recorded = table.globals().find(|g| g.name == entry_symbol)?.start;
        let code = image.entry.wrapping_sub(recorded);

        let data = match table.reloc_info() {
            Some(info) => {
                let class = info.classes[reloc::DATA];
                let at = image.entry.wrapping_add(class.ref_fixup);
                if let Some(sample) = probe.read_u32(at) {
                    sample.wrapping_sub(class.ref_offset)
                } else {
                    warn!(
                        "{}: cannot sample data reference at {at:#010x}, using code offset",
                        table.name()
                    );
                    code
                }
            }
            None => code,
        };

        debug!("{}: code offset {code:#010x}, data offset {data:#010x}", table.name());
        Some(Self { code, data })
    }
}

/// A code image the host kernel has loaded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// Resolved address of the image's entry point.
    pub entry: u32,
}

/// Lookup of loaded images by name.
pub trait ImageResolver {
    fn find_image(&self, name: &str) -> Option<LoadedImage>;
}

/// Fault-contained memory reads. `None` means the address was unreadable.
pub trait MemoryProbe {
    fn read_u32(&self, address: u32) -> Option<u32>;
}

/// Host with no loaded images and no readable memory.
pub struct NoHost;

impl ImageResolver for NoHost {
    fn find_image(&self, _name: &str) -> Option<LoadedImage> {
        None
    }
}

impl MemoryProbe for NoHost {
    fn read_u32(&self, _address: u32) -> Option<u32> {
        None
    }
}
