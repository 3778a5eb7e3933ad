use ice_registers::TrapFrame;

use crate::vectors::vector;

/// Sentinel left in `eax` when a probe hit a not-present page.
pub const PROBE_FAULT_PAGE: u32 = 0xFFFF_FF0E;
/// Sentinel left in `eax` when a probe hit a bad selector or protection fault.
pub const PROBE_FAULT_GP: u32 = 0xFFFF_FF0D;

/// Code range of the guarded memory accessors.
///
/// Any page or protection fault raised strictly inside `(start, end)` is
/// turned into a sentinel return value: `eax` gets the fault code and
/// execution continues at `epilogue`, which returns to the accessor's caller.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ProbeRegion {
    pub start: u32,
    pub end: u32,
    pub epilogue: u32,
}

impl ProbeRegion {
    #[must_use]
    pub const fn new(start: u32, end: u32, epilogue: u32) -> Self {
        Self {
            start,
            end,
            epilogue,
        }
    }

    #[must_use]
    pub const fn contains(&self, eip: u32) -> bool {
        eip > self.start && eip < self.end
    }

    /// Redirect a fault raised inside the region.
    ///
    /// Returns `None`, leaving `frame` untouched, for vectors other than page
    /// and protection faults or for faults outside the region.
    pub fn contain(&self, vector: u8, frame: &mut TrapFrame) -> Option<ProbeFault> {
        let fault = match vector {
            vector::PAGE_FAULT => ProbeFault::PageFault,
            vector::GENERAL_PROTECTION => ProbeFault::GeneralProtection,
            _ => return None,
        };
        if !self.contains(frame.eip) {
            return None;
        }
        frame.eax = fault.sentinel();
        frame.eip = self.epilogue;
        Some(fault)
    }
}

/// Typed result of a guarded access that faulted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFault {
    #[error("page not present")]
    PageFault,
    #[error("general protection fault")]
    GeneralProtection,
}

impl ProbeFault {
    #[must_use]
    pub const fn sentinel(self) -> u32 {
        match self {
            Self::PageFault => PROBE_FAULT_PAGE,
            Self::GeneralProtection => PROBE_FAULT_GP,
        }
    }

    /// Decode the value a guarded accessor returned.
    ///
    /// # Errors
    /// The sentinel's fault, if `raw` is one.
    pub const fn check(raw: u32) -> Result<u32, Self> {
        match raw {
            PROBE_FAULT_PAGE => Err(Self::PageFault),
            PROBE_FAULT_GP => Err(Self::GeneralProtection),
            v => Ok(v),
        }
    }
}
