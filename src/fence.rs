use clap::ValueEnum;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{compiler_fence, fence};

/// Strength of the ordering barrier placed between each worker's store and
/// the load that follows it. This barrier is the subject of the experiment;
/// everything else in the crate only exists to exercise it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FenceStrength {
    /// Full hardware fence.
    ///
    /// On amd64 this compiles to mfence: the store may not sit in the
    /// store buffer past the following load, on top of the compiler being
    /// forbidden to move memory operations across it. With this selected
    /// the probe must stay silent forever.
    Full,

    /// Compiler-only barrier.
    ///
    /// The optimizer may not reorder memory operations across it, but no
    /// instruction is emitted, so the CPU is still free to let the store
    /// become visible to the other core after the load has already
    /// executed. This is the mode that exposes the anomaly.
    CompilerOnly,
}

impl FenceStrength {
    pub fn apply(self) {
        match self {
            FenceStrength::Full => fence(SeqCst),
            FenceStrength::CompilerOnly => compiler_fence(SeqCst),
        }
    }
}
