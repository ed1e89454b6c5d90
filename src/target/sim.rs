//! Simulated backend: a `MemoryTarget` over the in-memory process table.

use super::{MemoryRegion, MemoryTarget, ProcessInfo, Protection, RegionKind, TargetKind};
use crate::codec::{self, ValueType};
use crate::error::TargetError;
use crate::sim::{CellValue, ProcessSimulator, SimulatedProcess};

/// Memory target backed by the process simulator.
///
/// The target owns the process table; the bridge reaches the table through
/// [`SimulatedTarget::simulator`] for typed operations the raw byte trait
/// cannot express.
pub struct SimulatedTarget {
    pub simulator: ProcessSimulator,
    attached: Option<String>,
}

impl SimulatedTarget {
    pub fn new(simulator: ProcessSimulator) -> Self {
        Self { simulator, attached: None }
    }

    pub fn attached_pid(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    /// Current process, dropping the attachment if the process was deleted
    /// out from under us
    pub fn current(&mut self) -> Option<&SimulatedProcess> {
        self.ensure_alive()?;
        self.simulator.get(self.attached.as_deref()?)
    }

    pub fn current_mut(&mut self) -> Option<&mut SimulatedProcess> {
        self.ensure_alive()?;
        self.simulator.get_mut(self.attached.as_deref()?)
    }

    fn ensure_alive(&mut self) -> Option<()> {
        let pid = self.attached.as_deref()?;
        if self.simulator.contains(pid) {
            Some(())
        } else {
            log::warn!("attached process {} no longer exists; detaching", pid);
            self.attached = None;
            None
        }
    }
}

impl MemoryTarget for SimulatedTarget {
    fn list_candidates(&self) -> Vec<ProcessInfo> {
        self.simulator
            .list()
            .map(|p| ProcessInfo {
                pid: p.pid.clone(),
                name: p.name.clone(),
                path: None,
                kind: TargetKind::Simulated,
            })
            .collect()
    }

    fn attach(&mut self, id: &str) -> Result<(), TargetError> {
        if !self.simulator.contains(id) {
            return Err(TargetError::ProcessNotFound(id.to_string()));
        }
        self.attached = Some(id.to_string());
        log::info!("Attached to simulated process {}", id);
        Ok(())
    }

    fn detach(&mut self) -> Result<(), TargetError> {
        if let Some(pid) = self.attached.take() {
            log::info!("Detached from simulated process {}", pid);
        }
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    fn attached_id(&self) -> Option<String> {
        self.attached.clone()
    }

    fn read(&self, address: u64, _size: usize) -> Result<Vec<u8>, TargetError> {
        let pid = self.attached.as_deref().ok_or(TargetError::NotAttached)?;
        let process = self
            .simulator
            .get(pid)
            .ok_or_else(|| TargetError::ProcessNotFound(pid.to_string()))?;
        let cell = process.read_cell(address).ok_or(TargetError::ReadFailed {
            address,
            reason: "no value at address".to_string(),
        })?;
        Ok(cell.to_bytes())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<usize, TargetError> {
        let process = self.current_mut().ok_or(TargetError::NotAttached)?;

        // raw bytes land as the type already stored at the cell; fresh
        // cells default to int
        let ty = match process.read_cell(address) {
            Some(CellValue::Float(_)) => ValueType::Float,
            Some(CellValue::Text(_)) => ValueType::Text,
            _ => ValueType::Int,
        };
        let decoded = codec::decode(data, ty, codec::DisplayFormat::Decimal);
        let value = match decoded.value {
            codec::Value::Int(v) => CellValue::Int(v),
            codec::Value::Float(v) => CellValue::Float(v),
            codec::Value::Text(s) => CellValue::Text(s),
        };
        process.write_cell(address, value);
        Ok(data.len())
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        let Some(pid) = self.attached.as_deref() else {
            return Vec::new();
        };
        let Some(process) = self.simulator.get(pid) else {
            return Vec::new();
        };
        // one synthetic region spanning the whole simulated footprint
        let base = process.memory.keys().next().copied().unwrap_or(0x1000);
        vec![MemoryRegion {
            base_address: base,
            size: (process.memory.len() as u64) * 8,
            protection: Protection::RWX,
            kind: RegionKind::Simulated,
            mapped_file: None,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn target_with_process() -> (SimulatedTarget, String) {
        let mut sim = ProcessSimulator::new(50);
        let mut mem = BTreeMap::new();
        mem.insert(0x1000, CellValue::Int(42));
        let pid = sim.create_process("demo", Some(mem));
        (SimulatedTarget::new(sim), pid)
    }

    #[test]
    fn attach_requires_existing_pid() {
        let (mut target, pid) = target_with_process();
        assert!(matches!(
            target.attach("sim-999"),
            Err(TargetError::ProcessNotFound(_))
        ));
        assert!(!target.is_attached());

        assert!(target.attach(&pid).is_ok());
        assert!(target.is_attached());
    }

    #[test]
    fn raw_read_write_round_trip() {
        let (mut target, pid) = target_with_process();
        target.attach(&pid).unwrap();

        let bytes = target.read(0x1000, 8).unwrap();
        assert_eq!(bytes, 42i64.to_le_bytes().to_vec());

        target.write(0x1000, &100i64.to_le_bytes()).unwrap();
        assert_eq!(target.read(0x1000, 8).unwrap(), 100i64.to_le_bytes().to_vec());
    }

    #[test]
    fn read_at_unmapped_address_fails() {
        let (mut target, pid) = target_with_process();
        target.attach(&pid).unwrap();
        assert!(matches!(
            target.read(0xdead, 8),
            Err(TargetError::ReadFailed { .. })
        ));
    }

    #[test]
    fn deleting_attached_process_detaches_on_next_use() {
        let (mut target, pid) = target_with_process();
        target.attach(&pid).unwrap();
        target.simulator.delete_process(&pid);

        assert!(target.current_mut().is_none());
        assert!(!target.is_attached());
    }

    #[test]
    fn single_synthetic_region() {
        let (mut target, pid) = target_with_process();
        assert!(target.regions().is_empty());
        target.attach(&pid).unwrap();
        let regions = target.regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].base_address, 0x1000);
        assert_eq!(regions[0].protection.to_string(), "rwx");
        assert_eq!(regions[0].kind, RegionKind::Simulated);
    }

    #[test]
    fn detach_is_idempotent() {
        let (mut target, _) = target_with_process();
        assert!(target.detach().is_ok());
        assert!(target.detach().is_ok());
    }
}
