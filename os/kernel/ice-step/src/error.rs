use ice_registers::FarAddress;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreakpointError {
    #[error("memory at {0} is not accessible")]
    Unreachable(FarAddress),
    #[error("no free breakpoint slot")]
    Full,
    #[error("no breakpoint at {0}")]
    NotFound(FarAddress),
}
