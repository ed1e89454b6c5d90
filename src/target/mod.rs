//! Memory target abstraction.
//!
//! One capability trait covers both backends: the simulated process table
//! and the host OS's real processes. Platform gaps (macOS) surface as
//! `Unsupported` results, never as panics, so callers can treat every
//! variant uniformly.

pub mod sim;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub use linux::RealTarget;

#[cfg(target_os = "windows")]
pub use windows::RealTarget;

#[cfg(target_os = "macos")]
pub use macos::RealTarget;

use crate::error::TargetError;
use std::fmt;

/// Which backend a process or session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Simulated,
    Real,
}

impl TargetKind {
    pub fn name(&self) -> &'static str {
        match self {
            TargetKind::Simulated => "simulated",
            TargetKind::Real => "real",
        }
    }
}

/// Information about an attachable process
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    /// Process ID; opaque string (`sim-N` for simulated, numeric for real)
    pub pid: String,
    /// Process name (executable name)
    pub name: String,
    /// Executable path, when known
    pub path: Option<String>,
    pub kind: TargetKind,
}

/// Memory protection flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Protection {
    pub const RWX: Self = Self { read: true, write: true, execute: true };
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.execute { 'x' } else { '-' },
        )
    }
}

/// Coarse region classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Private,
    Mapped,
    Image,
    Simulated,
}

impl RegionKind {
    pub fn name(&self) -> &'static str {
        match self {
            RegionKind::Private => "private",
            RegionKind::Mapped => "mapped",
            RegionKind::Image => "image",
            RegionKind::Simulated => "simulated",
        }
    }
}

/// One contiguous range of a process's address space.
///
/// A snapshot at enumeration time; never cached.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub base_address: u64,
    pub size: u64,
    pub protection: Protection,
    pub kind: RegionKind,
    pub mapped_file: Option<String>,
}

impl MemoryRegion {
    pub fn end_address(&self) -> u64 {
        self.base_address.wrapping_add(self.size)
    }
}

/// Capability set every backend implements.
///
/// Addresses crossing this boundary are always unsigned integers; hex
/// string forms are parsed at the bridge edge.
pub trait MemoryTarget {
    /// Enumerate attachable processes
    fn list_candidates(&self) -> Vec<ProcessInfo>;

    /// Attach to a process by id. A failed attach leaves the target fully
    /// detached - no partial state.
    fn attach(&mut self, id: &str) -> Result<(), TargetError>;

    /// Release the debug relationship. Idempotent; succeeds when nothing
    /// is attached.
    fn detach(&mut self) -> Result<(), TargetError>;

    fn is_attached(&self) -> bool;

    /// Id of the currently attached process, if any
    fn attached_id(&self) -> Option<String>;

    /// Read `size` bytes at an absolute address
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, TargetError>;

    /// Write bytes at an absolute address, returning the count written
    fn write(&mut self, address: u64, data: &[u8]) -> Result<usize, TargetError>;

    /// Enumerate mapped memory regions (point-in-time snapshot)
    fn regions(&self) -> Vec<MemoryRegion>;
}
