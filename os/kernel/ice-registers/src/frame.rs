use crate::Eflags;
use core::fmt;

/// Segment selector plus 32-bit offset.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FarAddress {
    pub selector: u16,
    pub offset: u32,
}

impl FarAddress {
    #[must_use]
    pub const fn new(selector: u16, offset: u32) -> Self {
        Self { selector, offset }
    }

    /// Requested privilege level of the selector.
    #[must_use]
    pub const fn rpl(self) -> u8 {
        (self.selector & 3) as u8
    }
}

impl fmt::Display for FarAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:08X}", self.selector, self.offset)
    }
}

/// Register snapshot pushed by the trap stubs.
///
/// Field order matches the stub: segment registers, then `pushad`, then the
/// vector's error code (zero when the CPU pushes none), then the hardware
/// frame. `esp`/`ss` are only meaningful when the trap crossed privilege
/// levels; stubs fill them with the pre-trap values otherwise.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_pushad: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u32,
}

impl TrapFrame {
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> Eflags {
        Eflags::from_bits(self.eflags)
    }

    #[inline]
    pub const fn set_flags(&mut self, flags: Eflags) {
        self.eflags = flags.into_bits();
    }

    /// Arms or clears the CPU single-step flag for the resume.
    #[inline]
    pub const fn set_single_step(&mut self, on: bool) {
        self.set_flags(self.flags().with_tf_trap(on));
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn code_address(&self) -> FarAddress {
        FarAddress::new(self.cs as u16, self.eip)
    }

    /// Whether the trapped code ran at ring 0.
    #[inline]
    #[must_use]
    pub const fn is_kernel_code(&self) -> bool {
        self.code_address().rpl() == 0
    }
}

impl fmt::Display for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "EAX={:08X} EBX={:08X} ECX={:08X} EDX={:08X} ESI={:08X} EDI={:08X}",
            self.eax, self.ebx, self.ecx, self.edx, self.esi, self.edi
        )?;
        writeln!(
            f,
            "CS:EIP={}  SS:ESP={:04X}:{:08X} EBP={:08X}",
            self.code_address(),
            self.ss,
            self.esp,
            self.ebp
        )?;
        writeln!(
            f,
            "DS={:04X} ES={:04X} FS={:04X} GS={:04X} EFL={:08X}",
            self.ds, self.es, self.fs, self.gs, self.eflags
        )
    }
}
