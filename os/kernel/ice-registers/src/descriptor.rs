/// Base and limit of a descriptor table, as held by IDTR/GDTR.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TableDescriptor {
    pub base: u32,
    pub limit: u16,
}

impl TableDescriptor {
    #[must_use]
    pub const fn new(base: u32, limit: u16) -> Self {
        Self { base, limit }
    }

    /// Number of whole `entry_size`-byte entries covered by the limit.
    #[must_use]
    pub const fn entries(self, entry_size: usize) -> usize {
        (self.limit as usize + 1) / entry_size
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
pub mod asm {
    //! `sidt`/`lidt`/`sgdt` on a 32-bit CPU.

    use super::TableDescriptor;
    use core::arch::asm;

    /// Operand format of the descriptor table instructions.
    #[repr(C, packed)]
    struct Pseudo {
        limit: u16,
        base: u32,
    }

    /// Read IDTR.
    ///
    /// # Safety
    /// Ring 0 only.
    pub unsafe fn store_idt() -> TableDescriptor {
        let mut p = Pseudo { limit: 0, base: 0 };
        unsafe {
            asm!("sidt [{}]", in(reg) &raw mut p, options(nostack, preserves_flags));
        }
        TableDescriptor::new(p.base, p.limit)
    }

    /// Read GDTR.
    ///
    /// # Safety
    /// Ring 0 only.
    pub unsafe fn store_gdt() -> TableDescriptor {
        let mut p = Pseudo { limit: 0, base: 0 };
        unsafe {
            asm!("sgdt [{}]", in(reg) &raw mut p, options(nostack, preserves_flags));
        }
        TableDescriptor::new(p.base, p.limit)
    }

    /// Load IDTR.
    ///
    /// # Safety
    /// The table must stay valid while loaded and every present gate must
    /// point at valid handler code.
    pub unsafe fn load_idt(desc: TableDescriptor) {
        let p = Pseudo {
            limit: desc.limit,
            base: desc.base,
        };
        unsafe {
            asm!("lidt [{}]", in(reg) &raw const p, options(nostack, preserves_flags, readonly));
        }
    }
}
