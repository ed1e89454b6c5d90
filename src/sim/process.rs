//! Simulated process model.
//!
//! A simulated process carries a typed memory map, a register file, an
//! instruction store, symbols, breakpoints, and a snapshot history for
//! undo/redo. Addresses are plain `u64` everywhere in here; the hex-string
//! form exists only at the bridge boundary.

use std::collections::{BTreeMap, HashMap};

/// Default cap on the number of memory snapshots kept per process
pub const HISTORY_LIMIT: usize = 50;

/// Typed value stored in one simulated memory cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Int(_) => "int",
            CellValue::Float(_) => "float",
            CellValue::Text(_) => "string",
        }
    }

    /// Raw byte form, matching the codec's encoding rules
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            CellValue::Int(v) => v.to_le_bytes().to_vec(),
            CellValue::Float(v) => v.to_le_bytes().to_vec(),
            CellValue::Text(s) => s.as_bytes().to_vec(),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Closed opcode set understood by the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Mov,
    Add,
    Sub,
    Jmp,
    Cmp,
    Je,
    Call,
    Ret,
    Nop,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Jmp => "jmp",
            Opcode::Cmp => "cmp",
            Opcode::Je => "je",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Nop => "nop",
        }
    }
}

/// One stored instruction.
///
/// `bytes` is the raw encoding; only its length matters (it determines how
/// far the instruction pointer advances), the bytes themselves are never
/// decoded.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub address: u64,
    pub opcode: Opcode,
    pub operands: Vec<String>,
    pub bytes: Vec<u8>,
}

impl Instruction {
    pub fn encoded_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.opcode.mnemonic().to_string()
        } else {
            format!("{} {}", self.opcode.mnemonic(), self.operands.join(", "))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Variable,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub address: u64,
    pub name: String,
    pub kind: SymbolKind,
}

/// Breakpoint kinds.
///
/// `Read` can be created but only memory *writes* are instrumented, so a
/// read breakpoint never fires on its own; this mirrors the source behavior
/// rather than silently extending it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    Execution,
    Read,
    Write,
    Access,
}

impl BreakpointKind {
    pub fn name(&self) -> &'static str {
        match self {
            BreakpointKind::Execution => "execution",
            BreakpointKind::Read => "read",
            BreakpointKind::Write => "write",
            BreakpointKind::Access => "access",
        }
    }

    /// Does a memory write at the breakpoint address count as a hit?
    pub fn fires_on_write(&self) -> bool {
        matches!(self, BreakpointKind::Write | BreakpointKind::Access)
    }
}

impl std::str::FromStr for BreakpointKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "execution" | "exec" | "x" => Ok(BreakpointKind::Execution),
            "read" | "r" => Ok(BreakpointKind::Read),
            "write" | "w" => Ok(BreakpointKind::Write),
            "access" | "rw" => Ok(BreakpointKind::Access),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub address: u64,
    pub kind: BreakpointKind,
    /// Condition expression. Metadata only; never evaluated.
    pub condition: Option<String>,
    pub enabled: bool,
    pub hit_count: u64,
}

/// Register file: fixed set of named 64-bit registers plus condition flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registers {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub rip: u64,
    pub carry: bool,
    pub zero: bool,
    pub sign: bool,
    pub overflow: bool,
}

impl Registers {
    pub const NAMES: [&'static str; 9] = [
        "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "rip",
    ];

    pub fn get(&self, name: &str) -> Option<u64> {
        match name {
            "rax" => Some(self.rax),
            "rbx" => Some(self.rbx),
            "rcx" => Some(self.rcx),
            "rdx" => Some(self.rdx),
            "rsi" => Some(self.rsi),
            "rdi" => Some(self.rdi),
            "rbp" => Some(self.rbp),
            "rsp" => Some(self.rsp),
            "rip" => Some(self.rip),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: u64) -> bool {
        match name {
            "rax" => self.rax = value,
            "rbx" => self.rbx = value,
            "rcx" => self.rcx = value,
            "rdx" => self.rdx = value,
            "rsi" => self.rsi = value,
            "rdi" => self.rdi = value,
            "rbp" => self.rbp = value,
            "rsp" => self.rsp = value,
            "rip" => self.rip = value,
            _ => return false,
        }
        true
    }

    /// Register contents plus condition flags, keyed by name
    pub fn as_map(&self) -> BTreeMap<String, u64> {
        let mut map = BTreeMap::new();
        for name in Self::NAMES {
            map.insert(name.to_string(), self.get(name).unwrap_or(0));
        }
        map.insert("cf".to_string(), self.carry as u64);
        map.insert("zf".to_string(), self.zero as u64);
        map.insert("sf".to_string(), self.sign as u64);
        map.insert("of".to_string(), self.overflow as u64);
        map
    }
}

/// A simulated process with memory, code, and debug state
#[derive(Debug, Clone)]
pub struct SimulatedProcess {
    pub pid: String,
    pub name: String,
    pub memory: BTreeMap<u64, CellValue>,
    pub registers: Registers,
    pub instructions: BTreeMap<u64, Instruction>,
    pub symbols: BTreeMap<u64, Symbol>,
    symbol_names: HashMap<String, u64>,
    pub breakpoints: BTreeMap<u64, Breakpoint>,
    history: Vec<BTreeMap<u64, CellValue>>,
    cursor: usize,
    history_limit: usize,
}

impl SimulatedProcess {
    pub fn new(pid: String, name: String, memory: BTreeMap<u64, CellValue>) -> Self {
        Self::with_history_limit(pid, name, memory, HISTORY_LIMIT)
    }

    pub fn with_history_limit(
        pid: String,
        name: String,
        memory: BTreeMap<u64, CellValue>,
        history_limit: usize,
    ) -> Self {
        // seed the history with the initial state so the first undo target
        // always exists
        let history = vec![memory.clone()];
        Self {
            pid,
            name,
            memory,
            registers: Registers::default(),
            instructions: BTreeMap::new(),
            symbols: BTreeMap::new(),
            symbol_names: HashMap::new(),
            breakpoints: BTreeMap::new(),
            history,
            cursor: 0,
            history_limit: history_limit.max(1),
        }
    }

    // ---- symbols ----

    pub fn add_symbol(&mut self, address: u64, name: &str, kind: SymbolKind) {
        if let Some(old) = self.symbols.insert(
            address,
            Symbol { address, name: name.to_string(), kind },
        ) {
            self.symbol_names.remove(&old.name);
        }
        self.symbol_names.insert(name.to_string(), address);
    }

    pub fn resolve_symbol(&self, name: &str) -> Option<u64> {
        self.symbol_names.get(name).copied()
    }

    pub fn symbol_at(&self, address: u64) -> Option<&Symbol> {
        self.symbols.get(&address)
    }

    // ---- breakpoints ----

    pub fn set_breakpoint(
        &mut self,
        address: u64,
        kind: BreakpointKind,
        condition: Option<String>,
    ) {
        self.breakpoints.insert(
            address,
            Breakpoint { address, kind, condition, enabled: true, hit_count: 0 },
        );
    }

    pub fn remove_breakpoint(&mut self, address: u64) -> bool {
        self.breakpoints.remove(&address).is_some()
    }

    /// Flip the enabled flag; returns the new state, or None if no
    /// breakpoint exists at the address
    pub fn toggle_breakpoint(&mut self, address: u64) -> Option<bool> {
        let bp = self.breakpoints.get_mut(&address)?;
        bp.enabled = !bp.enabled;
        Some(bp.enabled)
    }

    /// Count a write-access hit if an enabled write/access breakpoint
    /// covers the address
    pub(crate) fn note_memory_write(&mut self, address: u64) {
        if let Some(bp) = self.breakpoints.get_mut(&address) {
            if bp.enabled && bp.kind.fires_on_write() {
                bp.hit_count += 1;
                log::debug!(
                    "{} breakpoint hit at {:#x} (count {})",
                    bp.kind.name(),
                    address,
                    bp.hit_count
                );
            }
        }
    }

    // ---- memory + history ----

    /// Write a cell and record a snapshot. This is the only mutation path
    /// external callers should use; it keeps undo history and write
    /// breakpoint accounting consistent.
    pub fn write_cell(&mut self, address: u64, value: CellValue) {
        self.memory.insert(address, value);
        self.note_memory_write(address);
        self.snapshot();
    }

    pub fn read_cell(&self, address: u64) -> Option<&CellValue> {
        self.memory.get(&address)
    }

    /// Append the current memory map to the history, truncating any redo
    /// branch and enforcing the snapshot cap
    pub(crate) fn snapshot(&mut self) {
        self.history.truncate(self.cursor + 1);
        self.history.push(self.memory.clone());
        self.cursor = self.history.len() - 1;
        if self.history.len() > self.history_limit {
            self.history.remove(0);
            self.cursor -= 1;
        }
    }

    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.memory = self.history[self.cursor].clone();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.history.len() {
            return false;
        }
        self.cursor += 1;
        self.memory = self.history[self.cursor].clone();
        true
    }

    /// (history length, cursor) - exposed for status displays
    pub fn history_position(&self) -> (usize, usize) {
        (self.history.len(), self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_with(addr: u64, v: i64) -> SimulatedProcess {
        let mut mem = BTreeMap::new();
        mem.insert(addr, CellValue::Int(v));
        SimulatedProcess::new("sim-1".into(), "test".into(), mem)
    }

    #[test]
    fn write_then_undo_restores_prior_map() {
        let mut p = process_with(0x1000, 42);
        p.write_cell(0x1000, CellValue::Int(100));
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(100)));

        assert!(p.undo());
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(42)));

        assert!(p.redo());
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(100)));
    }

    #[test]
    fn undo_at_start_and_redo_at_tail_fail() {
        let mut p = process_with(0x1000, 1);
        assert!(!p.undo());
        assert!(!p.redo());
        p.write_cell(0x1000, CellValue::Int(2));
        assert!(!p.redo());
    }

    #[test]
    fn write_mid_history_truncates_redo_branch() {
        let mut p = process_with(0x1000, 1);
        p.write_cell(0x1000, CellValue::Int(2));
        p.write_cell(0x1000, CellValue::Int(3));
        assert!(p.undo());
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(2)));

        p.write_cell(0x1000, CellValue::Int(9));
        // the old "3" branch is gone
        assert!(!p.redo());
        assert!(p.undo());
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(2)));
    }

    #[test]
    fn history_is_capped_and_oldest_dropped() {
        let mut p = process_with(0x1000, 0);
        for i in 1..=200 {
            p.write_cell(0x1000, CellValue::Int(i));
        }
        let (len, cursor) = p.history_position();
        assert_eq!(len, HISTORY_LIMIT);
        assert_eq!(cursor, HISTORY_LIMIT - 1);

        // undo all the way back; the earliest reachable state is not the
        // original but the oldest retained snapshot
        let mut undos = 0;
        while p.undo() {
            undos += 1;
        }
        assert_eq!(undos, HISTORY_LIMIT - 1);
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(151)));
    }

    #[test]
    fn toggle_twice_restores_enabled_state() {
        let mut p = process_with(0x1000, 1);
        p.set_breakpoint(0x4000, BreakpointKind::Execution, None);
        assert_eq!(p.toggle_breakpoint(0x4000), Some(false));
        assert_eq!(p.toggle_breakpoint(0x4000), Some(true));
        assert!(p.breakpoints[&0x4000].enabled);
        assert_eq!(p.toggle_breakpoint(0x9999), None);
    }

    #[test]
    fn write_breakpoint_counts_hits() {
        let mut p = process_with(0x1000, 1);
        p.set_breakpoint(0x1000, BreakpointKind::Write, None);
        p.write_cell(0x1000, CellValue::Int(2));
        p.write_cell(0x1000, CellValue::Int(3));
        assert_eq!(p.breakpoints[&0x1000].hit_count, 2);

        // access kind fires on writes too
        p.set_breakpoint(0x1000, BreakpointKind::Access, None);
        p.write_cell(0x1000, CellValue::Int(4));
        assert_eq!(p.breakpoints[&0x1000].hit_count, 1);
    }

    #[test]
    fn read_kind_never_fires_on_write() {
        let mut p = process_with(0x1000, 1);
        p.set_breakpoint(0x1000, BreakpointKind::Read, None);
        p.write_cell(0x1000, CellValue::Int(2));
        assert_eq!(p.breakpoints[&0x1000].hit_count, 0);
    }

    #[test]
    fn disabled_breakpoint_does_not_count() {
        let mut p = process_with(0x1000, 1);
        p.set_breakpoint(0x1000, BreakpointKind::Write, None);
        p.toggle_breakpoint(0x1000);
        p.write_cell(0x1000, CellValue::Int(2));
        assert_eq!(p.breakpoints[&0x1000].hit_count, 0);
    }

    #[test]
    fn symbol_index_tracks_renames() {
        let mut p = process_with(0x1000, 1);
        p.add_symbol(0x4000, "main", SymbolKind::Function);
        assert_eq!(p.resolve_symbol("main"), Some(0x4000));

        p.add_symbol(0x4000, "entry", SymbolKind::Function);
        assert_eq!(p.resolve_symbol("entry"), Some(0x4000));
        assert_eq!(p.resolve_symbol("main"), None);
    }

    #[test]
    fn register_file_by_name() {
        let mut r = Registers::default();
        assert!(r.set("rax", 7));
        assert_eq!(r.get("rax"), Some(7));
        assert!(!r.set("xmm0", 1));
        assert_eq!(r.get("xmm0"), None);
        assert_eq!(r.as_map()["rax"], 7);
    }
}
