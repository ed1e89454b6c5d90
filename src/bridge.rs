//! ProcessDebugBridge - session facade over the memory targets.
//!
//! The bridge owns both backends, tracks which one is attached, and exposes
//! the typed operation surface. Addresses arrive and leave as canonical
//! lowercase `0x`-prefixed hex strings; internally everything is `u64`.
//! Fallible operations surface as `bool`/`Option`/empty collections and are
//! logged, so callers never see a panic for bad input.

use crate::codec::{self, DisplayFormat, ValueType};
use crate::config::SessionConfig;
use crate::sim::{Breakpoint, BreakpointKind, CellValue, Instruction, ProcessSimulator};
use crate::target::sim::SimulatedTarget;
use crate::target::{MemoryRegion, MemoryTarget, ProcessInfo, RealTarget, TargetKind};

use std::collections::BTreeMap;

/// Result of a typed read: the value plus everything known about the address
#[derive(Debug, Clone)]
pub struct TypedReadout {
    /// Canonical hex address
    pub address: String,
    pub value: codec::Value,
    pub type_name: &'static str,
    pub hex: String,
    pub formatted: String,
    /// Symbol at this address, if the target knows one
    pub symbol: Option<String>,
    /// Breakpoint kind at this address, if one is set
    pub breakpoint: Option<&'static str>,
}

/// One row of a memory-map view
#[derive(Debug, Clone)]
pub struct MemoryCell {
    pub address: String,
    pub value: String,
    pub type_name: &'static str,
    pub hex: String,
}

/// Session facade holding at most one attached target at a time
pub struct ProcessDebugBridge {
    config: SessionConfig,
    sim: SimulatedTarget,
    real: RealTarget,
    current: Option<TargetKind>,
}

/// Parse a boundary address string; hex with or without the `0x` prefix
pub fn parse_address(s: &str) -> Option<u64> {
    let t = s.trim();
    let digits = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t);
    u64::from_str_radix(digits, 16).ok()
}

/// Canonical lowercase hex form used for display and map keys
pub fn format_address(address: u64) -> String {
    format!("0x{:x}", address)
}

impl ProcessDebugBridge {
    pub fn new(config: SessionConfig) -> Self {
        let simulator = ProcessSimulator::new(config.history_limit);
        Self {
            config,
            sim: SimulatedTarget::new(simulator),
            real: RealTarget::new(),
            current: None,
        }
    }

    // ---- session control ----

    /// Attach to a process. A target of a different kind is detached first;
    /// a failed attach leaves no target attached at all.
    pub fn attach(&mut self, id: &str, kind: TargetKind) -> bool {
        let result = match kind {
            TargetKind::Simulated => {
                if self.real.is_attached() {
                    let _ = self.real.detach();
                }
                self.sim.attach(id)
            }
            TargetKind::Real => {
                if self.sim.is_attached() {
                    let _ = self.sim.detach();
                }
                // re-attach releases the old trace slot first
                if self.real.is_attached() {
                    let _ = self.real.detach();
                }
                self.real.attach(id)
            }
        };

        match result {
            Ok(()) => {
                self.current = Some(kind);
                true
            }
            Err(e) => {
                log::warn!("attach to {} ({}) failed: {}", id, kind.name(), e);
                let _ = self.sim.detach();
                let _ = self.real.detach();
                self.current = None;
                false
            }
        }
    }

    /// Detach from the current target. Succeeds when nothing is attached.
    pub fn detach(&mut self) -> bool {
        match self.current.take() {
            None => true,
            Some(TargetKind::Simulated) => self.sim.detach().is_ok(),
            Some(TargetKind::Real) => match self.real.detach() {
                Ok(()) => true,
                Err(e) => {
                    log::error!("detach failed: {}", e);
                    false
                }
            },
        }
    }

    pub fn current_kind(&self) -> Option<TargetKind> {
        self.current
    }

    pub fn is_attached(&self) -> bool {
        self.current.is_some()
    }

    // ---- process management (simulated backend) ----

    /// Create a simulated process; returns its pid
    pub fn create_process(
        &mut self,
        name: &str,
        initial_memory: Option<BTreeMap<u64, CellValue>>,
    ) -> String {
        self.sim.simulator.create_process(name, initial_memory)
    }

    pub fn delete_process(&mut self, pid: &str) -> bool {
        self.sim.simulator.delete_process(pid)
    }

    /// List attachable processes; `None` lists both backends
    pub fn list_processes(&self, kind: Option<TargetKind>) -> Vec<ProcessInfo> {
        match kind {
            Some(TargetKind::Simulated) => self.sim.list_candidates(),
            Some(TargetKind::Real) => self.real.list_candidates(),
            None => {
                let mut all = self.sim.list_candidates();
                all.extend(self.real.list_candidates());
                all
            }
        }
    }

    /// Identity of the currently attached process
    pub fn process_info(&self) -> Option<ProcessInfo> {
        let kind = self.current?;
        let target: &dyn MemoryTarget = match kind {
            TargetKind::Simulated => &self.sim,
            TargetKind::Real => &self.real,
        };
        let id = target.attached_id()?;
        target.list_candidates().into_iter().find(|p| p.pid == id)
    }

    // ---- typed memory operations ----

    pub fn read_typed(&mut self, address: &str, type_name: &str) -> Option<TypedReadout> {
        let addr = match parse_address(address) {
            Some(a) => a,
            None => {
                log::error!("Invalid address format: {}", address);
                return None;
            }
        };
        let ty: ValueType = match type_name.parse() {
            Ok(t) => t,
            Err(e) => {
                log::error!("{}", e);
                return None;
            }
        };

        match self.current? {
            TargetKind::Simulated => {
                let process = self.sim.current()?;
                let bytes = process.read_cell(addr)?.to_bytes();
                let decoded = codec::decode(&bytes, ty, DisplayFormat::Mixed);
                let symbol = process.symbol_at(addr).map(|s| s.name.clone());
                let breakpoint = process.breakpoints.get(&addr).map(|b| b.kind.name());
                Some(TypedReadout {
                    address: format_address(addr),
                    value: decoded.value,
                    type_name: ty.name(),
                    hex: decoded.hex,
                    formatted: decoded.formatted,
                    symbol,
                    breakpoint,
                })
            }
            TargetKind::Real => {
                let bytes = match self.real.read(addr, ty.byte_width()) {
                    Ok(b) if !b.is_empty() => b,
                    Ok(_) => return None,
                    Err(e) => {
                        log::warn!("read at {} failed: {}", format_address(addr), e);
                        return None;
                    }
                };
                let decoded = codec::decode(&bytes, ty, DisplayFormat::Mixed);
                Some(TypedReadout {
                    address: format_address(addr),
                    value: decoded.value,
                    type_name: ty.name(),
                    hex: decoded.hex,
                    formatted: decoded.formatted,
                    symbol: None,
                    breakpoint: None,
                })
            }
        }
    }

    pub fn write_typed(&mut self, address: &str, value: &str, type_name: &str) -> bool {
        let Some(addr) = parse_address(address) else {
            log::error!("Invalid address format: {}", address);
            return false;
        };
        let Ok(ty) = type_name.parse::<ValueType>() else {
            log::error!("Unknown value type: {}", type_name);
            return false;
        };

        match self.current {
            None => {
                log::error!("Not attached to any process");
                false
            }
            Some(TargetKind::Simulated) => {
                let cell = match ty {
                    ValueType::Int => match codec::parse_int(value) {
                        Ok(v) => CellValue::Int(v),
                        Err(e) => {
                            log::error!("{}", e);
                            return false;
                        }
                    },
                    ValueType::Float => match value.trim().parse::<f64>() {
                        Ok(v) => CellValue::Float(v),
                        Err(_) => {
                            log::error!("Invalid float value: '{}'", value);
                            return false;
                        }
                    },
                    ValueType::Text => CellValue::Text(value.to_string()),
                };
                match self.sim.current_mut() {
                    Some(process) => {
                        process.write_cell(addr, cell);
                        true
                    }
                    None => false,
                }
            }
            Some(TargetKind::Real) => {
                let bytes = match codec::encode(value, ty) {
                    Ok(b) => b,
                    Err(e) => {
                        log::error!("{}", e);
                        return false;
                    }
                };
                match self.real.write(addr, &bytes) {
                    Ok(_) => true,
                    Err(e) => {
                        log::warn!("write at {} failed: {}", format_address(addr), e);
                        false
                    }
                }
            }
        }
    }

    /// Linear scan of the simulated memory map for exact typed equality.
    /// Returns canonical hex addresses of every match.
    pub fn scan(&mut self, value: &str, type_name: &str) -> Vec<String> {
        let Ok(ty) = type_name.parse::<ValueType>() else {
            log::error!("Unknown value type: {}", type_name);
            return Vec::new();
        };
        if self.current != Some(TargetKind::Simulated) {
            log::warn!("scan is only available for simulated targets");
            return Vec::new();
        }

        let needle = match ty {
            ValueType::Int => match codec::parse_int(value) {
                Ok(v) => CellValue::Int(v),
                Err(e) => {
                    log::error!("{}", e);
                    return Vec::new();
                }
            },
            ValueType::Float => match value.trim().parse::<f64>() {
                Ok(v) => CellValue::Float(v),
                Err(_) => {
                    log::error!("Invalid float value: '{}'", value);
                    return Vec::new();
                }
            },
            ValueType::Text => CellValue::Text(value.to_string()),
        };

        let Some(process) = self.sim.current() else {
            return Vec::new();
        };
        let matches: Vec<String> = process
            .memory
            .iter()
            .filter(|(_, v)| **v == needle)
            .map(|(addr, _)| format_address(*addr))
            .collect();
        log::debug!("scan for {} found {} matches", value, matches.len());
        matches
    }

    /// Whole-map view of the attached process. For real targets this
    /// samples the first bytes of up to 50 regions.
    pub fn memory_map(&mut self) -> Vec<MemoryCell> {
        match self.current {
            None => Vec::new(),
            Some(TargetKind::Simulated) => {
                let Some(process) = self.sim.current() else {
                    return Vec::new();
                };
                process
                    .memory
                    .iter()
                    .map(|(addr, value)| MemoryCell {
                        address: format_address(*addr),
                        value: value.to_string(),
                        type_name: value.type_name(),
                        hex: hex::encode(value.to_bytes()),
                    })
                    .collect()
            }
            Some(TargetKind::Real) => {
                let mut cells = Vec::new();
                for region in self.real.regions().into_iter().take(50) {
                    let Ok(bytes) = self.real.read(region.base_address, 8) else {
                        continue;
                    };
                    if bytes.is_empty() {
                        continue;
                    }
                    // printable runs read as text, everything else as int
                    let all_printable = bytes.iter().all(|b| (32..127).contains(b));
                    let ty = if all_printable { ValueType::Text } else { ValueType::Int };
                    let decoded = codec::decode(&bytes, ty, DisplayFormat::Decimal);
                    cells.push(MemoryCell {
                        address: format_address(region.base_address),
                        value: decoded.value.to_string(),
                        type_name: ty.name(),
                        hex: decoded.hex,
                    });
                }
                cells
            }
        }
    }

    // ---- registers ----

    pub fn set_register(&mut self, name: &str, value: u64) -> bool {
        if self.current != Some(TargetKind::Simulated) {
            log::warn!("register access requires a simulated target");
            return false;
        }
        match self.sim.current_mut() {
            Some(process) => process.registers.set(name, value),
            None => false,
        }
    }

    /// Register contents keyed by name; empty for real targets rather than
    /// an error
    pub fn get_registers(&mut self) -> BTreeMap<String, u64> {
        if self.current != Some(TargetKind::Simulated) {
            return BTreeMap::new();
        }
        self.sim
            .current()
            .map(|p| p.registers.as_map())
            .unwrap_or_default()
    }

    // ---- instructions ----

    /// List stored instructions from `start` (default: current rip)
    pub fn list_instructions(&mut self, start: Option<&str>, count: usize) -> Vec<Instruction> {
        if self.current != Some(TargetKind::Simulated) {
            return Vec::new();
        }
        let Some(process) = self.sim.current() else {
            return Vec::new();
        };
        let from = start
            .and_then(parse_address)
            .unwrap_or(process.registers.rip);
        process
            .instructions
            .range(from..)
            .take(count)
            .map(|(_, instr)| instr.clone())
            .collect()
    }

    // ---- breakpoints ----

    pub fn set_breakpoint(&mut self, address: &str, kind: &str, condition: Option<String>) -> bool {
        let Some(addr) = parse_address(address) else {
            log::error!("Invalid address format: {}", address);
            return false;
        };
        let Ok(kind) = kind.parse::<BreakpointKind>() else {
            log::error!("Unknown breakpoint kind: {}", kind);
            return false;
        };
        match self.sim_process() {
            Some(process) => {
                process.set_breakpoint(addr, kind, condition);
                true
            }
            None => false,
        }
    }

    pub fn remove_breakpoint(&mut self, address: &str) -> bool {
        let Some(addr) = parse_address(address) else {
            return false;
        };
        self.sim_process()
            .map(|p| p.remove_breakpoint(addr))
            .unwrap_or(false)
    }

    /// Returns the new enabled state, or None when no breakpoint exists
    pub fn toggle_breakpoint(&mut self, address: &str) -> Option<bool> {
        let addr = parse_address(address)?;
        self.sim_process()?.toggle_breakpoint(addr)
    }

    pub fn list_breakpoints(&mut self) -> Vec<Breakpoint> {
        self.sim_process()
            .map(|p| p.breakpoints.values().cloned().collect())
            .unwrap_or_default()
    }

    // ---- execution control ----

    pub fn step(&mut self) -> bool {
        match self.sim_process() {
            Some(process) => process.step(),
            None => {
                log::warn!("execution control requires a simulated target");
                false
            }
        }
    }

    /// Run until an execution breakpoint or the step budget runs out
    pub fn run(&mut self, max_steps: Option<usize>) -> bool {
        let budget = max_steps.unwrap_or(self.config.default_max_steps);
        match self.sim_process() {
            Some(process) => process.run_until_breakpoint(budget),
            None => {
                log::warn!("execution control requires a simulated target");
                false
            }
        }
    }

    // ---- history ----

    pub fn undo(&mut self) -> bool {
        self.sim_process().map(|p| p.undo()).unwrap_or(false)
    }

    pub fn redo(&mut self) -> bool {
        self.sim_process().map(|p| p.redo()).unwrap_or(false)
    }

    // ---- regions ----

    /// Regions of the attached target; empty when detached or unsupported
    pub fn list_regions(&self) -> Vec<MemoryRegion> {
        match self.current {
            None => Vec::new(),
            Some(TargetKind::Simulated) => self.sim.regions(),
            Some(TargetKind::Real) => self.real.regions(),
        }
    }

    fn sim_process(&mut self) -> Option<&mut crate::sim::SimulatedProcess> {
        if self.current != Some(TargetKind::Simulated) {
            return None;
        }
        self.sim.current_mut()
    }
}

impl Default for ProcessDebugBridge {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
