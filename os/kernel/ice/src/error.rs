use ice_step::BreakpointError;
use ice_symbols::LoadError;
use ice_trap::HookError;

/// Status codes returned across the transport boundary.
pub mod status {
    pub const OK: i32 = 0;
    pub const ENOENT: i32 = -2;
    pub const ENOMEM: i32 = -12;
    pub const EFAULT: i32 = -14;
    pub const EBUSY: i32 = -16;
    pub const EEXIST: i32 = -17;
    pub const EINVAL: i32 = -22;
    pub const ENOSPC: i32 = -28;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IceError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Breakpoint(#[from] BreakpointError),
    #[error("could not copy data across the privilege boundary")]
    TransportFault,
    #[error("not found")]
    NotFound,
    #[error("syntax error")]
    SyntaxError,
    #[error("already initialized")]
    AlreadyInitialized,
    #[error("not initialized")]
    NotInitialized,
    #[error("still in use ({holds} holds)")]
    InUse { holds: u32 },
    #[error("end of history")]
    HistoryExhausted,
}

impl IceError {
    /// Negative status code for the transport caller.
    #[must_use]
    pub const fn status(&self) -> i32 {
        match self {
            Self::Load(LoadError::OutOfMemory { .. }) => status::ENOMEM,
            Self::Load(LoadError::TransportFault { .. })
            | Self::TransportFault
            | Self::HistoryExhausted
            | Self::Breakpoint(BreakpointError::Unreachable(_)) => status::EFAULT,
            Self::Load(LoadError::NotFound)
            | Self::NotFound
            | Self::Breakpoint(BreakpointError::NotFound(_)) => status::ENOENT,
            Self::Breakpoint(BreakpointError::Full) => status::ENOSPC,
            Self::Hook(HookError::Busy) | Self::InUse { .. } => status::EBUSY,
            Self::AlreadyInitialized | Self::Hook(HookError::AlreadyInstalled) => status::EEXIST,
            Self::Load(_) | Self::Hook(_) | Self::SyntaxError | Self::NotInitialized => {
                status::EINVAL
            }
        }
    }
}

/// `0` on success, the error's status otherwise.
pub const fn to_status<T>(result: &Result<T, IceError>) -> i32 {
    match result {
        Ok(_) => status::OK,
        Err(e) => e.status(),
    }
}
