use clap::ValueEnum;
use std::io;

/// Where the two workers are allowed to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Affinity {
    /// Pin both workers onto one logical core. With a single store buffer
    /// in play only compiler-level reordering can show up, so this isolates
    /// the compiler from the hardware.
    SingleCore,

    /// Let the scheduler place the workers anywhere. Crossing real cores is
    /// what exposes hardware store-buffer reordering.
    Unconstrained,
}

/// Pin the calling thread to the given logical core.
///
/// sched_setaffinity (2) with pid 0 targets the calling thread. A zeroed
/// cpu_set_t is the empty set, so only the requested core ends up allowed.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core: usize) -> io::Result<()> {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_core: usize) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread pinning is only wired up on Linux",
    ))
}

#[cfg(target_os = "linux")]
#[test]
fn pinning_the_current_thread_succeeds() {
    // Core 0 exists on every machine this can run on.
    pin_current_thread(0).unwrap();
}
