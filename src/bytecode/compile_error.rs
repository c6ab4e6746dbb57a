use crate::bytecode::Op;
use thiserror::Error;

/// Violations of the assembler's bookkeeping.
///
/// These are compiler defects, never the user's fault: the parser drives the
/// assembler, so a bad patch means a grammar action is wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("jump at {site} patched twice")]
    DoublePatch { site: usize },

    #[error("instruction at {site} is not a jump: {op:?}")]
    NotAJump { site: usize, op: Op },

    #[error("patch site {site} is outside the code buffer")]
    SiteOutOfRange { site: usize },

    #[error("unresolved forward jumps at {sites:?}")]
    UnresolvedJumps { sites: Vec<usize> },

    #[error("repeat block closed with no open loop")]
    NoOpenRepeat,

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(message.into())
    }
}
