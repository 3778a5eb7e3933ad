/// Entry action of the next session, chosen when the debuggee was resumed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DebuggerState {
    /// Run the command loop.
    #[default]
    Break = 0,
    /// A stepping plan asked to be consulted again.
    DelayedTrace = 1,
    /// Stepped off a sticky breakpoint; put the breakpoints back and run on.
    DelayedArm = 2,
}

impl DebuggerState {
    /// Anything out of range is [`Break`](Self::Break).
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::DelayedTrace,
            2 => Self::DelayedArm,
            _ => Self::Break,
        }
    }

    #[must_use]
    pub const fn into_raw(self) -> u8 {
        self as u8
    }
}
