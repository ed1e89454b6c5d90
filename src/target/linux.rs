//! Linux backend: ptrace attach/detach, /proc/<pid>/mem for memory I/O,
//! /proc/<pid>/maps for region enumeration.

use super::{MemoryRegion, MemoryTarget, ProcessInfo, Protection, RegionKind, TargetKind};
use crate::error::TargetError;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;

/// Real-process target for Linux
pub struct RealTarget {
    attached: Option<Pid>,
}

impl RealTarget {
    pub fn new() -> Self {
        Self { attached: None }
    }

    fn attached_pid(&self) -> Result<Pid, TargetError> {
        self.attached.ok_or(TargetError::NotAttached)
    }
}

impl Default for RealTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTarget for RealTarget {
    fn list_candidates(&self) -> Vec<ProcessInfo> {
        let mut processes = Vec::new();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return processes;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(pid_str) = file_name.to_str() else {
                continue;
            };
            if pid_str.is_empty() || !pid_str.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let name = std::fs::read_to_string(entry.path().join("comm"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| format!("<pid {}>", pid_str));
            let path = std::fs::read_link(entry.path().join("exe"))
                .ok()
                .map(|p| p.display().to_string());
            processes.push(ProcessInfo {
                pid: pid_str.to_string(),
                name,
                path,
                kind: TargetKind::Real,
            });
        }
        processes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        processes
    }

    fn attach(&mut self, id: &str) -> Result<(), TargetError> {
        let raw: i32 = id
            .trim()
            .parse()
            .map_err(|_| TargetError::ProcessNotFound(id.to_string()))?;
        if !Path::new(&format!("/proc/{}", raw)).exists() {
            return Err(TargetError::ProcessNotFound(id.to_string()));
        }

        let pid = Pid::from_raw(raw);
        ptrace::attach(pid).map_err(|e| match e {
            Errno::EPERM | Errno::EACCES => TargetError::PermissionDenied(format!(
                "ptrace attach to {} denied: {}",
                raw, e
            )),
            Errno::ESRCH => TargetError::ProcessNotFound(id.to_string()),
            other => TargetError::AttachFailed {
                id: id.to_string(),
                reason: other.to_string(),
            },
        })?;

        // the tracee stops with a SIGSTOP once the attach lands
        if let Err(e) = waitpid(pid, None) {
            // release the trace slot rather than keep half an attachment
            let _ = ptrace::detach(pid, None);
            return Err(TargetError::AttachFailed {
                id: id.to_string(),
                reason: format!("waitpid: {}", e),
            });
        }

        self.attached = Some(pid);
        log::info!("Attached to process {}", raw);
        Ok(())
    }

    fn detach(&mut self) -> Result<(), TargetError> {
        // clear local state first so the slot is never considered held
        // after a failed detach
        let Some(pid) = self.attached.take() else {
            return Ok(());
        };
        ptrace::detach(pid, None).map_err(|e| TargetError::DetachFailed {
            id: pid.to_string(),
            reason: e.to_string(),
        })?;
        log::info!("Detached from process {}", pid);
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    fn attached_id(&self) -> Option<String> {
        self.attached.map(|pid| pid.to_string())
    }

    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, TargetError> {
        let pid = self.attached_pid()?;
        let mem_path = format!("/proc/{}/mem", pid);

        let mut file = File::open(&mem_path).map_err(|e| TargetError::ReadFailed {
            address,
            reason: e.to_string(),
        })?;
        file.seek(SeekFrom::Start(address))
            .map_err(|e| TargetError::ReadFailed { address, reason: e.to_string() })?;

        let mut buffer = vec![0u8; size];
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| TargetError::ReadFailed { address, reason: e.to_string() })?;
        buffer.truncate(bytes_read);
        Ok(buffer)
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<usize, TargetError> {
        let pid = self.attached_pid()?;
        let mem_path = format!("/proc/{}/mem", pid);

        let mut file = OpenOptions::new().write(true).open(&mem_path).map_err(|e| {
            TargetError::WriteFailed { address, reason: e.to_string() }
        })?;
        file.seek(SeekFrom::Start(address))
            .map_err(|e| TargetError::WriteFailed { address, reason: e.to_string() })?;
        file.write(data)
            .map_err(|e| TargetError::WriteFailed { address, reason: e.to_string() })
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        let Some(pid) = self.attached else {
            return Vec::new();
        };
        let Ok(maps) = std::fs::read_to_string(format!("/proc/{}/maps", pid)) else {
            return Vec::new();
        };
        maps.lines().filter_map(parse_maps_line).collect()
    }
}

impl Drop for RealTarget {
    fn drop(&mut self) {
        // never leave a process in a traced/stopped state
        let _ = self.detach();
    }
}

/// Parse one `/proc/<pid>/maps` line:
/// `base-end perms offset dev inode [path]`
fn parse_maps_line(line: &str) -> Option<MemoryRegion> {
    let mut parts = line.split_whitespace();
    let range = parts.next()?;
    let perms = parts.next()?;
    let _offset = parts.next()?;
    let _dev = parts.next()?;
    let _inode = parts.next()?;
    let mapped_file = parts.next().map(|s| s.to_string());

    let (start, end) = range.split_once('-')?;
    let base_address = u64::from_str_radix(start, 16).ok()?;
    let end_address = u64::from_str_radix(end, 16).ok()?;

    let protection = Protection {
        read: perms.contains('r'),
        write: perms.contains('w'),
        execute: perms.contains('x'),
    };
    let kind = match mapped_file.as_deref() {
        Some(path) if path.starts_with('/') => RegionKind::Mapped,
        Some(_) => RegionKind::Private, // [stack], [heap], [vdso], ...
        None => RegionKind::Private,
    };

    Some(MemoryRegion {
        base_address,
        size: end_address.saturating_sub(base_address),
        protection,
        kind,
        mapped_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anonymous_maps_line() {
        let region =
            parse_maps_line("7f1c00000000-7f1c00021000 rw-p 00000000 00:00 0").unwrap();
        assert_eq!(region.base_address, 0x7f1c00000000);
        assert_eq!(region.size, 0x21000);
        assert_eq!(region.protection.to_string(), "rw-");
        assert_eq!(region.kind, RegionKind::Private);
        assert!(region.mapped_file.is_none());
    }

    #[test]
    fn parses_file_backed_maps_line() {
        let region = parse_maps_line(
            "55e3a0000000-55e3a0010000 r-xp 00001000 fd:01 131 /usr/bin/cat",
        )
        .unwrap();
        assert_eq!(region.kind, RegionKind::Mapped);
        assert_eq!(region.mapped_file.as_deref(), Some("/usr/bin/cat"));
        assert!(region.protection.execute);
    }

    #[test]
    fn pseudo_paths_count_as_private() {
        let region = parse_maps_line(
            "7ffd10000000-7ffd10021000 rw-p 00000000 00:00 0 [stack]",
        )
        .unwrap();
        assert_eq!(region.kind, RegionKind::Private);
        assert_eq!(region.mapped_file.as_deref(), Some("[stack]"));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        assert!(parse_maps_line("").is_none());
        assert!(parse_maps_line("garbage").is_none());
    }

    #[test]
    fn attach_to_missing_pid_fails_cleanly() {
        let mut target = RealTarget::new();
        assert!(target.attach("999999999").is_err());
        assert!(!target.is_attached());
        assert!(target.regions().is_empty());
        assert!(target.detach().is_ok());
    }

    #[test]
    fn attach_rejects_non_numeric_ids() {
        let mut target = RealTarget::new();
        assert!(matches!(
            target.attach("sim-1"),
            Err(TargetError::ProcessNotFound(_))
        ));
    }

    #[test]
    fn ops_require_attachment() {
        let mut target = RealTarget::new();
        assert!(matches!(target.read(0x1000, 8), Err(TargetError::NotAttached)));
        assert!(matches!(
            target.write(0x1000, &[0u8; 8]),
            Err(TargetError::NotAttached)
        ));
    }
}
