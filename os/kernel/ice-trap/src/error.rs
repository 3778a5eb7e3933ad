/// Installing or removing the permanent hooks failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("a debug session is active")]
    Busy,
    #[error("hooks are already installed")]
    AlreadyInstalled,
    #[error("hooks are not installed")]
    NotInstalled,
}
