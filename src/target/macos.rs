//! macOS backend.
//!
//! System Integrity Protection blocks task_for_pid for unsigned tools, so
//! memory read/write and region enumeration are unavailable here. Attach
//! verifies process liveness only; the unsupported operations surface as
//! `Unsupported` rather than failing the session. This is a known platform
//! limitation, not an error path.

use super::{MemoryRegion, MemoryTarget, ProcessInfo, TargetKind};
use crate::error::TargetError;

use std::process::Command;

use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Real-process target for macOS (liveness probe only)
pub struct RealTarget {
    attached: Option<i32>,
}

impl RealTarget {
    pub fn new() -> Self {
        Self { attached: None }
    }
}

impl Default for RealTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTarget for RealTarget {
    fn list_candidates(&self) -> Vec<ProcessInfo> {
        // best-effort listing; there is no /proc to walk
        let Ok(output) = Command::new("ps").args(["-axco", "pid=,comm="]).output() else {
            return Vec::new();
        };
        let mut processes: Vec<ProcessInfo> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| {
                let mut parts = line.trim().splitn(2, char::is_whitespace);
                let pid = parts.next()?.trim();
                if !pid.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let name = parts.next().unwrap_or("").trim().to_string();
                Some(ProcessInfo {
                    pid: pid.to_string(),
                    name,
                    path: None,
                    kind: TargetKind::Real,
                })
            })
            .collect();
        processes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        processes
    }

    fn attach(&mut self, id: &str) -> Result<(), TargetError> {
        let raw: i32 = id
            .trim()
            .parse()
            .map_err(|_| TargetError::ProcessNotFound(id.to_string()))?;

        // signal 0 probes existence without delivering anything
        kill(Pid::from_raw(raw), None)
            .map_err(|_| TargetError::ProcessNotFound(id.to_string()))?;

        self.attached = Some(raw);
        log::info!("Attached to process {} (memory access is SIP-restricted)", raw);
        Ok(())
    }

    fn detach(&mut self) -> Result<(), TargetError> {
        if let Some(pid) = self.attached.take() {
            log::info!("Detached from process {}", pid);
        }
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    fn attached_id(&self) -> Option<String> {
        self.attached.map(|pid| pid.to_string())
    }

    fn read(&self, _address: u64, _size: usize) -> Result<Vec<u8>, TargetError> {
        Err(TargetError::Unsupported("memory read on macOS"))
    }

    fn write(&mut self, _address: u64, _data: &[u8]) -> Result<usize, TargetError> {
        Err(TargetError::Unsupported("memory write on macOS"))
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        log::warn!("memory region enumeration is unavailable on macOS");
        Vec::new()
    }
}
