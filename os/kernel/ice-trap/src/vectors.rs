//! Vector tables, hook sets and the saved-gates token.

use crate::gate::{Gate, GateType};
use crate::platform::Platform;
use core::ops::{Index, IndexMut};
use ice_registers::TableDescriptor;

/// Vector numbers the dispatcher cares about.
pub mod vector {
    pub const DIVIDE: u8 = 0x00;
    pub const DEBUG: u8 = 0x01;
    pub const BREAKPOINT: u8 = 0x03;
    pub const OVERFLOW: u8 = 0x04;
    pub const INVALID_OPCODE: u8 = 0x06;
    pub const DOUBLE_FAULT: u8 = 0x08;
    pub const INVALID_TSS: u8 = 0x0A;
    pub const SEGMENT_NOT_PRESENT: u8 = 0x0B;
    pub const STACK_FAULT: u8 = 0x0C;
    pub const GENERAL_PROTECTION: u8 = 0x0D;
    pub const PAGE_FAULT: u8 = 0x0E;
    pub const TIMER: u8 = 0x20;
    pub const KEYBOARD: u8 = 0x21;
    pub const COM2: u8 = 0x23;
    pub const COM1: u8 = 0x24;
    pub const MOUSE: u8 = 0x2C;
}

/// Number of gates in a full table.
pub const VECTORS: usize = 256;

const GATE_SIZE: usize = size_of::<Gate>();

/// Indexed gate storage, either in memory or behind the platform.
pub trait GateTable {
    fn gate(&self, vector: u8) -> Gate;
    fn set_gate(&mut self, vector: u8, gate: Gate);
}

/// A full 256-entry table owned by the debugger.
#[repr(C, align(8))]
#[derive(Clone, PartialEq, Eq)]
pub struct VectorTable {
    gates: [Gate; VECTORS],
}

impl Default for VectorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorTable {
    /// All gates not present.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            gates: [Gate::MISSING; VECTORS],
        }
    }

    /// Copy every gate `source` exposes within its limit; the rest stay missing.
    pub fn copy_from(&mut self, source: &impl GateTable, limit: TableDescriptor) {
        let count = limit.entries(GATE_SIZE).min(VECTORS);
        for (i, gate) in self.gates.iter_mut().enumerate() {
            *gate = match u8::try_from(i) {
                Ok(v) if i < count => source.gate(v),
                _ => Gate::MISSING,
            };
        }
    }

    /// Overwrite the gates `hooks` are delivered through without keeping
    /// the old ones. `entry(v)` is the index vector `v` arrives at.
    pub fn hook(
        &mut self,
        hooks: HookSet,
        entry: impl Fn(u8) -> u8,
        mut make: impl FnMut(u8) -> Gate,
    ) {
        for &v in hooks.vectors() {
            self[entry(v)] = make(v);
        }
    }

    /// IDTR value for loading this table where it lies.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn descriptor(&self) -> TableDescriptor {
        TableDescriptor::new(
            core::ptr::from_ref(self) as usize as u32,
            (size_of::<Self>() - 1) as u16,
        )
    }
}

impl Index<u8> for VectorTable {
    type Output = Gate;
    fn index(&self, v: u8) -> &Gate {
        &self.gates[usize::from(v)]
    }
}

impl IndexMut<u8> for VectorTable {
    fn index_mut(&mut self, v: u8) -> &mut Gate {
        &mut self.gates[usize::from(v)]
    }
}

impl GateTable for VectorTable {
    fn gate(&self, vector: u8) -> Gate {
        self[vector]
    }

    fn set_gate(&mut self, vector: u8, gate: Gate) {
        self[vector] = gate;
    }
}

/// The table the CPU is currently using, accessed through the platform.
pub struct LiveTable<'a, P: Platform> {
    platform: &'a P,
    idt: TableDescriptor,
}

impl<'a, P: Platform> LiveTable<'a, P> {
    pub const fn new(platform: &'a P, idt: TableDescriptor) -> Self {
        Self { platform, idt }
    }
}

impl<P: Platform> GateTable for LiveTable<'_, P> {
    fn gate(&self, vector: u8) -> Gate {
        self.platform.read_gate(self.idt, vector)
    }

    fn set_gate(&mut self, vector: u8, gate: Gate) {
        self.platform.write_gate(self.idt, vector, gate);
    }
}

/// A fixed list of vectors to hook.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HookSet(&'static [u8]);

impl HookSet {
    /// Hooked in the shadow table while a session runs.
    pub const SHADOW: Self = Self(&[
        vector::DIVIDE,
        vector::DEBUG,
        vector::BREAKPOINT,
        vector::OVERFLOW,
        vector::INVALID_OPCODE,
        vector::DOUBLE_FAULT,
        vector::INVALID_TSS,
        vector::SEGMENT_NOT_PRESENT,
        vector::STACK_FAULT,
        vector::GENERAL_PROTECTION,
        vector::PAGE_FAULT,
        vector::TIMER,
        vector::KEYBOARD,
        vector::COM2,
        vector::COM1,
        vector::MOUSE,
    ]);

    /// Hooked in the host's table while the host runs. Never page or
    /// protection faults.
    pub const PERMANENT: Self = Self(&[
        vector::DEBUG,
        vector::BREAKPOINT,
        vector::DOUBLE_FAULT,
        vector::TIMER,
    ]);

    #[must_use]
    pub const fn vectors(self) -> &'static [u8] {
        self.0
    }

    #[must_use]
    pub fn contains(self, v: u8) -> bool {
        self.0.contains(&v)
    }

    /// Gate pointing at the platform's stub for `v`.
    pub fn hook_gate<P: Platform>(platform: &P, v: u8) -> Gate {
        let mut gate = Gate::MISSING;
        gate.set_handler(platform.stub_address(v))
            .selector(platform.kernel_cs())
            .dpl(3)
            .gate_type(GateType::Interrupt32)
            .present(true);
        gate
    }
}

const MAX_HOOKS: usize = 16;
const _: () = assert!(HookSet::SHADOW.0.len() <= MAX_HOOKS);

/// Saved gates no longer match what was recorded at install time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SnapshotCorrupted {
    pub expected: u64,
    pub found: u64,
}

/// Proof that hooks were installed into a table, holding the gates they replaced.
///
/// Restoring consumes the token, so a table can only be restored after it
/// was hooked and only once.
#[must_use = "dropping the token leaves the hooks installed with no way back"]
pub struct HookedGates {
    saved: [(u8, Gate); MAX_HOOKS],
    len: usize,
    checksum: u64,
}

impl HookedGates {
    /// Save the gates `hooks` are delivered through and overwrite them with
    /// `make(vector)`. `entry(v)` is the index vector `v` arrives at, so the
    /// saved gates are keyed by table index.
    pub fn install(
        table: &mut impl GateTable,
        hooks: HookSet,
        entry: impl Fn(u8) -> u8,
        mut make: impl FnMut(u8) -> Gate,
    ) -> Self {
        let mut saved = [(0u8, Gate::MISSING); MAX_HOOKS];
        for (slot, &v) in saved.iter_mut().zip(hooks.vectors()) {
            let at = entry(v);
            *slot = (at, table.gate(at));
            table.set_gate(at, make(v));
        }
        let len = hooks.vectors().len().min(MAX_HOOKS);
        let checksum = checksum(&saved[..len]);
        Self {
            saved,
            len,
            checksum,
        }
    }

    /// The gate a hook replaced at table index `at`.
    #[must_use]
    pub fn original(&self, at: u8) -> Option<Gate> {
        self.saved().iter().find(|(sv, _)| *sv == at).map(|&(_, g)| g)
    }

    pub fn saved(&self) -> &[(u8, Gate)] {
        &self.saved[..self.len]
    }

    /// Put the saved gates back.
    ///
    /// # Errors
    /// The saved gates were modified after installation; nothing is written.
    pub fn restore(self, table: &mut impl GateTable) -> Result<(), SnapshotCorrupted> {
        let found = checksum(self.saved());
        if found != self.checksum {
            return Err(SnapshotCorrupted {
                expected: self.checksum,
                found,
            });
        }
        for &(v, gate) in self.saved() {
            table.set_gate(v, gate);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) const fn corrupt_for_test(&mut self) {
        self.saved[0].1 = Gate::from_bits(0xDEAD_BEEF);
    }
}

/// FNV-1a over vector numbers and raw gates.
fn checksum(saved: &[(u8, Gate)]) -> u64 {
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut hash: u64 = 0xCBF2_9CE4_8422_2325;
    for &(v, gate) in saved {
        for byte in core::iter::once(v).chain(gate.to_bits().to_le_bytes()) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}
