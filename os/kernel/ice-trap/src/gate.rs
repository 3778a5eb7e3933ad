//! 32-bit protected-mode gate descriptors.

use bitfield_struct::bitfield;

const _: () = assert!(size_of::<Gate>() == 8);

/// Bytes 4 and 5 of a gate.
///
/// - **low byte**: reserved, must be zero
/// - **high byte**: `| P | DPL(2) | S(0) | Type(4) |`
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct GateAttr {
    #[bits(8)]
    __zero0: u8,

    /// **Type** – 0xE = 32-bit interrupt gate, 0xF = 32-bit trap gate.
    #[bits(4)]
    pub typ: u8,

    /// **S** – must be `0` for interrupt/trap gates.
    #[bits(1)]
    pub s: bool,

    /// **DPL** – 3 lets `int n` from ring 3 reach the gate.
    #[bits(2)]
    pub dpl: u8,

    /// **P** – Present bit.
    #[bits(1)]
    pub present: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GateType {
    /// Clears `IF` on entry.
    Interrupt32,
    /// Leaves `IF` unchanged.
    Trap32,
}

/// One 8-byte IDT entry.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Gate {
    offset_lo: u16,
    selector: u16,
    attr: u16,
    offset_hi: u16,
}

impl Default for Gate {
    fn default() -> Self {
        Self::MISSING
    }
}

impl Gate {
    /// A zeroed, non-present entry.
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        attr: GateAttr::new().into_bits(),
        offset_hi: 0,
    };

    /// Point this entry at `handler` and return a builder.
    ///
    /// Resets the attributes to a non-present interrupt gate with DPL 0.
    pub const fn set_handler(&mut self, handler: u32) -> GateBuilder<'_> {
        self.offset_lo = (handler & 0xFFFF) as u16;
        self.offset_hi = (handler >> 16) as u16;
        self.attr = GateAttr::new().with_typ(0xE).into_bits();
        GateBuilder { gate: self }
    }

    /// Handler address.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        (self.offset_hi as u32) << 16 | self.offset_lo as u32
    }

    #[must_use]
    pub const fn selector(&self) -> u16 {
        self.selector
    }

    #[must_use]
    pub const fn attributes(&self) -> GateAttr {
        GateAttr::from_bits(self.attr)
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.attributes().present()
    }

    /// Raw descriptor, as stored in memory (little-endian).
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        (self.offset_hi as u64) << 48
            | (self.attr as u64) << 32
            | (self.selector as u64) << 16
            | self.offset_lo as u64
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            offset_lo: bits as u16,
            selector: (bits >> 16) as u16,
            attr: (bits >> 32) as u16,
            offset_hi: (bits >> 48) as u16,
        }
    }
}

/// Fluent builder for a [`Gate`].
pub struct GateBuilder<'a> {
    gate: &'a mut Gate,
}

impl GateBuilder<'_> {
    #[inline]
    pub const fn present(self, p: bool) -> Self {
        self.gate.attr = GateAttr::from_bits(self.gate.attr)
            .with_present(p)
            .into_bits();
        self
    }

    #[inline]
    pub fn dpl(self, dpl: u8) -> Self {
        debug_assert!(dpl <= 3);
        self.gate.attr = GateAttr::from_bits(self.gate.attr).with_dpl(dpl).into_bits();
        self
    }

    #[inline]
    pub const fn gate_type(self, gate_type: GateType) -> Self {
        let typ = match gate_type {
            GateType::Interrupt32 => 0xE,
            GateType::Trap32 => 0xF,
        };
        self.gate.attr = GateAttr::from_bits(self.gate.attr)
            .with_typ(typ)
            .with_s(false)
            .into_bits();
        self
    }

    #[inline]
    pub const fn selector(self, sel: u16) -> Self {
        self.gate.selector = sel;
        self
    }
}
