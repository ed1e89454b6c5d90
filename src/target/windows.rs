//! Windows backend: OpenProcess handle + Read/WriteProcessMemory, with
//! VirtualQueryEx for region enumeration and EnumProcesses for listing.

use super::{MemoryRegion, MemoryTarget, ProcessInfo, Protection, RegionKind, TargetKind};
use crate::error::TargetError;

use windows::Win32::Foundation::{CloseHandle, HANDLE, MAX_PATH};
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Memory::{
    VirtualQueryEx, MEMORY_BASIC_INFORMATION, MEM_COMMIT, MEM_IMAGE, MEM_MAPPED, MEM_PRIVATE,
    PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY,
    PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY,
};
use windows::Win32::System::ProcessStatus::{EnumProcesses, GetModuleBaseNameW, GetModuleFileNameExW};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION, PROCESS_VM_READ,
    PROCESS_VM_WRITE,
};

/// Real-process target for Windows
pub struct RealTarget {
    /// Raw process handle value; HANDLE itself is not Send/hashable-friendly
    handle: Option<isize>,
    pid: Option<u32>,
}

impl RealTarget {
    pub fn new() -> Self {
        Self { handle: None, pid: None }
    }

    fn handle(&self) -> Result<HANDLE, TargetError> {
        let value = self.handle.ok_or(TargetError::NotAttached)?;
        // SAFETY: HANDLE is a repr(transparent) wrapper around isize
        Ok(unsafe { std::mem::transmute(value) })
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
        let mut pids: [u32; 4096] = [0; 4096];
        let mut bytes_returned: u32 = 0;

        unsafe {
            if EnumProcesses(
                pids.as_mut_ptr(),
                (pids.len() * std::mem::size_of::<u32>()) as u32,
                &mut bytes_returned,
            )
            .is_err()
            {
                return processes;
            }

            let count = bytes_returned as usize / std::mem::size_of::<u32>();
            for &pid in pids.iter().take(count) {
                if pid == 0 {
                    continue;
                }
                let handle = match OpenProcess(
                    PROCESS_QUERY_INFORMATION | PROCESS_VM_READ,
                    false,
                    pid,
                ) {
                    Ok(h) => h,
                    Err(_) => continue, // skip processes we can't access
                };

                let name =
                    module_base_name(handle).unwrap_or_else(|| format!("<PID {}>", pid));
                let path = module_file_name(handle);
                let _ = CloseHandle(handle);

                processes.push(ProcessInfo {
                    pid: pid.to_string(),
                    name,
                    path,
                    kind: TargetKind::Real,
                });
            }
        }

        processes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        processes
    }

    fn attach(&mut self, id: &str) -> Result<(), TargetError> {
        let pid: u32 = id
            .trim()
            .parse()
            .map_err(|_| TargetError::ProcessNotFound(id.to_string()))?;

        let handle = unsafe {
            OpenProcess(
                PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_VM_OPERATION
                    | PROCESS_QUERY_INFORMATION,
                false,
                pid,
            )
            .map_err(|e| TargetError::AttachFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?
        };

        self.handle = Some(handle.0 as isize);
        self.pid = Some(pid);
        log::info!("Attached to process {}", pid);
        Ok(())
    }

    fn detach(&mut self) -> Result<(), TargetError> {
        self.pid = None;
        let Some(value) = self.handle.take() else {
            return Ok(());
        };
        // SAFETY: value came from a valid OpenProcess handle
        let handle: HANDLE = unsafe { std::mem::transmute(value) };
        unsafe {
            CloseHandle(handle).map_err(|e| TargetError::DetachFailed {
                id: String::new(),
                reason: e.to_string(),
            })?;
        }
        log::info!("Detached from process");
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    fn attached_id(&self) -> Option<String> {
        self.pid.map(|pid| pid.to_string())
    }

    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, TargetError> {
        let handle = self.handle()?;
        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0usize;

        unsafe {
            ReadProcessMemory(
                handle,
                address as *const std::ffi::c_void,
                buffer.as_mut_ptr() as *mut std::ffi::c_void,
                buffer.len(),
                Some(&mut bytes_read),
            )
            .map_err(|e| TargetError::ReadFailed {
                address,
                reason: e.to_string(),
            })?;
        }

        buffer.truncate(bytes_read);
        Ok(buffer)
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<usize, TargetError> {
        let handle = self.handle()?;
        let mut bytes_written = 0usize;

        unsafe {
            WriteProcessMemory(
                handle,
                address as *const std::ffi::c_void,
                data.as_ptr() as *const std::ffi::c_void,
                data.len(),
                Some(&mut bytes_written),
            )
            .map_err(|e| TargetError::WriteFailed {
                address,
                reason: e.to_string(),
            })?;
        }

        Ok(bytes_written)
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        let Ok(handle) = self.handle() else {
            return Vec::new();
        };
        let mut regions = Vec::new();
        let mut address: u64 = 0;

        loop {
            let mut mbi = MEMORY_BASIC_INFORMATION::default();
            let result = unsafe {
                VirtualQueryEx(
                    handle,
                    Some(address as *const std::ffi::c_void),
                    &mut mbi,
                    std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            if result == 0 {
                break;
            }

            let base = mbi.BaseAddress as u64;
            let size = mbi.RegionSize as u64;

            if mbi.State == MEM_COMMIT {
                let kind = match mbi.Type {
                    MEM_PRIVATE => RegionKind::Private,
                    MEM_MAPPED => RegionKind::Mapped,
                    MEM_IMAGE => RegionKind::Image,
                    _ => RegionKind::Private,
                };
                regions.push(MemoryRegion {
                    base_address: base,
                    size,
                    protection: protection_from_flags(mbi.Protect.0),
                    kind,
                    mapped_file: None,
                });
            }

            let next = base.wrapping_add(size);
            if next <= address {
                break;
            }
            address = next;
        }

        regions
    }
}

impl Drop for RealTarget {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

fn protection_from_flags(protect: u32) -> Protection {
    let read = protect
        & (PAGE_READONLY.0 | PAGE_READWRITE.0 | PAGE_WRITECOPY.0 | PAGE_EXECUTE_READ.0
            | PAGE_EXECUTE_READWRITE.0 | PAGE_EXECUTE_WRITECOPY.0)
        != 0;
    let write = protect
        & (PAGE_READWRITE.0 | PAGE_WRITECOPY.0 | PAGE_EXECUTE_READWRITE.0
            | PAGE_EXECUTE_WRITECOPY.0)
        != 0;
    let execute = protect
        & (PAGE_EXECUTE.0 | PAGE_EXECUTE_READ.0 | PAGE_EXECUTE_READWRITE.0
            | PAGE_EXECUTE_WRITECOPY.0)
        != 0;
    Protection { read, write, execute }
}

/// Get the executable base name for an open process handle
fn module_base_name(handle: HANDLE) -> Option<String> {
    let mut name_buf = [0u16; MAX_PATH as usize];
    unsafe {
        let len = GetModuleBaseNameW(handle, None, &mut name_buf);
        if len == 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&name_buf[..len as usize]))
    }
}

/// Get the full executable path for an open process handle
fn module_file_name(handle: HANDLE) -> Option<String> {
    let mut path_buf = [0u16; MAX_PATH as usize];
    unsafe {
        let len = GetModuleFileNameExW(handle, None, &mut path_buf);
        if len == 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&path_buf[..len as usize]))
    }
}
