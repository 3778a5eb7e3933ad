use crate::error::BreakpointError;
use ice_registers::FarAddress;
use log::{debug, warn};

/// `int3`
const INT3: u8 = 0xCC;

/// Number of sticky breakpoints the registry holds.
pub const MAX_STICKY: usize = 16;

/// Byte access to the debuggee's code.
pub trait CodeMemory {
    /// # Errors
    /// The address is not mapped or the selector is invalid.
    fn read_byte(&self, at: FarAddress) -> Result<u8, BreakpointError>;

    /// # Errors
    /// The address is not mapped, not writable or the selector is invalid.
    fn write_byte(&mut self, at: FarAddress, value: u8) -> Result<(), BreakpointError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BreakpointDescriptor {
    pub address: FarAddress,
    /// Sticky breakpoints survive being hit; the others are consumed.
    pub sticky: bool,
}

/// A breakpoint the registry recognized at a trap address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hit {
    pub address: FarAddress,
    pub sticky: bool,
}

#[derive(Debug, Copy, Clone)]
struct Slot {
    address: FarAddress,
    /// Original byte while the `int3` is in memory.
    saved: Option<u8>,
}

impl Slot {
    const fn new(address: FarAddress) -> Self {
        Self {
            address,
            saved: None,
        }
    }

    fn arm(&mut self, mem: &mut dyn CodeMemory) -> Result<(), BreakpointError> {
        if self.saved.is_some() {
            return Ok(());
        }
        let original = mem.read_byte(self.address)?;
        mem.write_byte(self.address, INT3)?;
        self.saved = Some(original);
        Ok(())
    }

    fn disarm(&mut self, mem: &mut dyn CodeMemory) -> Result<(), BreakpointError> {
        let Some(original) = self.saved else {
            return Ok(());
        };
        mem.write_byte(self.address, original)?;
        self.saved = None;
        Ok(())
    }
}

/// Sticky breakpoints plus at most one pending one-shot.
///
/// Breakpoints are armed (written to memory) only while the debuggee runs.
/// The session disarms everything on entry, before asking [`on_trap`](Self::on_trap)
/// what was hit.
#[derive(Debug)]
pub struct BreakpointRegistry {
    sticky: [Option<Slot>; MAX_STICKY],
    one_shot: Option<Slot>,
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sticky: [None; MAX_STICKY],
            one_shot: None,
        }
    }

    /// Add a sticky breakpoint. Setting one that exists is a no-op.
    ///
    /// # Errors
    /// [`BreakpointError::Full`] when all slots are taken.
    pub fn set_sticky(&mut self, address: FarAddress) -> Result<(), BreakpointError> {
        if self.sticky_slot(address).is_some() {
            return Ok(());
        }
        let free = self
            .sticky
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(BreakpointError::Full)?;
        *free = Some(Slot::new(address));
        Ok(())
    }

    /// # Errors
    /// [`BreakpointError::NotFound`] if there is no sticky breakpoint at `address`.
    pub fn clear_sticky(&mut self, address: FarAddress) -> Result<(), BreakpointError> {
        let slot = self
            .sticky
            .iter_mut()
            .find(|s| s.is_some_and(|s| s.address == address))
            .ok_or(BreakpointError::NotFound(address))?;
        debug_assert!(slot.is_some_and(|s| s.saved.is_none()), "cleared while armed");
        *slot = None;
        Ok(())
    }

    /// Plant the one-shot breakpoint, superseding any pending one.
    ///
    /// Returns the superseded address.
    pub fn set_one_shot(&mut self, address: FarAddress) -> Option<FarAddress> {
        debug_assert!(!self.is_armed(), "one-shot replaced while armed");
        let previous = self.one_shot.replace(Slot::new(address)).map(|s| s.address);
        if let Some(p) = previous {
            debug!("one-shot breakpoint at {p} superseded by {address}");
        }
        previous
    }

    #[must_use]
    pub fn one_shot(&self) -> Option<FarAddress> {
        self.one_shot.map(|s| s.address)
    }

    pub fn sticky(&self) -> impl Iterator<Item = FarAddress> + '_ {
        self.sticky.iter().flatten().map(|s| s.address)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = BreakpointDescriptor> + '_ {
        let sticky = self.sticky().map(|address| BreakpointDescriptor {
            address,
            sticky: true,
        });
        let one_shot = self.one_shot().map(|address| BreakpointDescriptor {
            address,
            sticky: false,
        });
        sticky.chain(one_shot)
    }

    fn sticky_slot(&self, address: FarAddress) -> Option<&Slot> {
        self.sticky.iter().flatten().find(|s| s.address == address)
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.sticky
            .iter()
            .flatten()
            .chain(self.one_shot.iter())
            .any(|s| s.saved.is_some())
    }

    /// Write `int3` at every breakpoint, sticky first.
    ///
    /// A one-shot sharing its address with a sticky breakpoint is not
    /// written twice.
    ///
    /// # Errors
    /// The first inaccessible address. Breakpoints armed before it stay
    /// armed and are undone by [`disarm_all`](Self::disarm_all).
    pub fn arm_all(&mut self, mem: &mut dyn CodeMemory) -> Result<(), BreakpointError> {
        for slot in self.sticky.iter_mut().flatten() {
            slot.arm(mem)?;
        }
        if let Some(address) = self.one_shot()
            && self.sticky_slot(address).is_none()
            && let Some(slot) = self.one_shot.as_mut()
        {
            slot.arm(mem)?;
        }
        Ok(())
    }

    /// Put back every original byte, one-shot first.
    ///
    /// # Errors
    /// The first address that could not be restored; the others are still
    /// attempted.
    pub fn disarm_all(&mut self, mem: &mut dyn CodeMemory) -> Result<(), BreakpointError> {
        let mut first = Ok(());
        for slot in self.one_shot.iter_mut().chain(self.sticky.iter_mut().rev().flatten()) {
            if let Err(e) = slot.disarm(mem) {
                warn!("breakpoint restore failed: {e}");
                if first.is_ok() {
                    first = Err(e);
                }
            }
        }
        first
    }

    /// Breakpoint at `address`, consuming a matching one-shot.
    pub fn on_trap(&mut self, address: FarAddress) -> Option<Hit> {
        debug_assert!(!self.is_armed(), "trap reported while armed");
        let one_shot = self.one_shot.take_if(|s| s.address == address).is_some();
        let sticky = self.sticky_slot(address).is_some();
        (one_shot || sticky).then_some(Hit { address, sticky })
    }
}
