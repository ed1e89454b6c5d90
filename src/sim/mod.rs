//! Process simulator - an in-memory table of simulated processes.
//!
//! New processes come pre-seeded with demo memory, a small code sequence,
//! and symbols so the execution engine has something to run out of the box.

pub mod exec;
pub mod process;

pub use process::{
    Breakpoint, BreakpointKind, CellValue, Instruction, Opcode, Registers, SimulatedProcess,
    Symbol, SymbolKind,
};

use std::collections::BTreeMap;

/// Base address of seeded data memory
const SEED_DATA_BASE: u64 = 0x1000;
/// Base address of the seeded code sequence (also the initial rip)
const SEED_CODE_BASE: u64 = 0x4000;
/// Initial stack pointer for seeded processes
const SEED_STACK_TOP: u64 = 0x8000;

/// Table of simulated processes keyed by pid
pub struct ProcessSimulator {
    processes: BTreeMap<String, SimulatedProcess>,
    next_id: u64,
    history_limit: usize,
}

impl ProcessSimulator {
    pub fn new(history_limit: usize) -> Self {
        log::debug!("Process simulator initialized");
        Self {
            processes: BTreeMap::new(),
            next_id: 1,
            history_limit,
        }
    }

    /// Create a new simulated process and return its pid.
    ///
    /// When no initial memory is given, a synthetic data segment is seeded;
    /// code and symbols are always seeded.
    pub fn create_process(
        &mut self,
        name: &str,
        initial_memory: Option<BTreeMap<u64, CellValue>>,
    ) -> String {
        let pid = format!("sim-{}", self.next_id);
        self.next_id += 1;

        let memory = initial_memory.unwrap_or_else(seed_memory);
        let mut process = SimulatedProcess::with_history_limit(
            pid.clone(),
            name.to_string(),
            memory,
            self.history_limit,
        );
        seed_code(&mut process);

        log::debug!("Created process {} with pid {}", name, pid);
        self.processes.insert(pid.clone(), process);
        pid
    }

    pub fn delete_process(&mut self, pid: &str) -> bool {
        if self.processes.remove(pid).is_some() {
            log::debug!("Deleted process {}", pid);
            true
        } else {
            log::warn!("Attempted to delete non-existent process {}", pid);
            false
        }
    }

    pub fn list(&self) -> impl Iterator<Item = &SimulatedProcess> {
        self.processes.values()
    }

    pub fn get(&self, pid: &str) -> Option<&SimulatedProcess> {
        self.processes.get(pid)
    }

    pub fn get_mut(&mut self, pid: &str) -> Option<&mut SimulatedProcess> {
        self.processes.get_mut(pid)
    }

    pub fn contains(&self, pid: &str) -> bool {
        self.processes.contains_key(pid)
    }
}

/// Deterministic demo data segment: a spread of int, float, and string cells
fn seed_memory() -> BTreeMap<u64, CellValue> {
    let mut memory = BTreeMap::new();
    for i in 0..10u64 {
        let address = SEED_DATA_BASE + i * 4;
        let value = match i % 3 {
            0 => CellValue::Int((i as i64 + 1) * 7),
            1 => CellValue::Float(i as f64 * 2.5),
            _ => CellValue::Text(format!("String_{}", i)),
        };
        memory.insert(address, value);
    }
    memory
}

/// Seed a small program: count rax up to 42 and fall through to `done`
fn seed_code(process: &mut SimulatedProcess) {
    process.registers.rip = SEED_CODE_BASE;
    process.registers.rsp = SEED_STACK_TOP;

    let program: [(Opcode, &[&str], usize); 7] = [
        (Opcode::Mov, &["rax", "0x0"], 3),
        (Opcode::Mov, &["rbx", "42"], 3),
        (Opcode::Add, &["rax", "rbx"], 2),
        (Opcode::Cmp, &["rax", "42"], 3),
        (Opcode::Je, &["done"], 2),
        (Opcode::Sub, &["rax", "1"], 3),
        (Opcode::Nop, &[], 1),
    ];

    let mut address = SEED_CODE_BASE;
    for (opcode, operands, len) in program {
        process.instructions.insert(
            address,
            Instruction {
                address,
                opcode,
                operands: operands.iter().map(|s| s.to_string()).collect(),
                bytes: vec![0x90; len],
            },
        );
        address += len as u64;
    }

    process.add_symbol(SEED_CODE_BASE, "main", SymbolKind::Function);
    process.add_symbol(address - 1, "done", SymbolKind::Function);
    process.add_symbol(SEED_DATA_BASE, "counter", SymbolKind::Variable);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_assigns_unique_pids_and_seeds_state() {
        let mut sim = ProcessSimulator::new(50);
        let a = sim.create_process("demo_a", None);
        let b = sim.create_process("demo_b", None);
        assert_ne!(a, b);

        let p = sim.get(&a).unwrap();
        assert!(!p.memory.is_empty());
        assert!(!p.instructions.is_empty());
        assert_eq!(p.resolve_symbol("main"), Some(p.registers.rip));
    }

    #[test]
    fn explicit_memory_is_used_verbatim() {
        let mut sim = ProcessSimulator::new(50);
        let mut mem = BTreeMap::new();
        mem.insert(0x1000, CellValue::Int(42));
        let pid = sim.create_process("fixed", Some(mem));
        let p = sim.get(&pid).unwrap();
        assert_eq!(p.memory.len(), 1);
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(42)));
    }

    #[test]
    fn delete_is_final() {
        let mut sim = ProcessSimulator::new(50);
        let pid = sim.create_process("gone", None);
        assert!(sim.delete_process(&pid));
        assert!(!sim.delete_process(&pid));
        assert!(sim.get(&pid).is_none());
    }
}
