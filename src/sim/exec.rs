//! Fetch-decode-execute engine for simulated processes.
//!
//! One `step` fetches the instruction under `rip`, executes its side effects
//! on registers/memory/stack, and advances the pointer. Addresses with no
//! stored instruction advance the pointer by one byte; execution walking
//! through non-decoded bytes is not an error.

use super::process::{BreakpointKind, CellValue, Opcode, SimulatedProcess};
use crate::codec;

/// Default step budget for run-to-breakpoint
pub const DEFAULT_MAX_STEPS: usize = 1000;

impl SimulatedProcess {
    /// Execute one instruction at the current instruction pointer
    pub fn step(&mut self) -> bool {
        let rip = self.registers.rip;
        let Some(instr) = self.instructions.get(&rip).cloned() else {
            // unmapped byte: just move on
            self.registers.rip = rip.wrapping_add(1);
            return true;
        };

        let next = rip.wrapping_add(instr.encoded_len());
        let ops = &instr.operands;

        match instr.opcode {
            Opcode::Nop => {
                self.registers.rip = next;
            }
            Opcode::Mov => {
                if let (Some(dst), Some(src)) = (ops.first(), ops.get(1)) {
                    if let Some(value) = self.resolve_operand(src) {
                        self.write_operand(dst, value);
                    }
                }
                self.registers.rip = next;
            }
            Opcode::Add | Opcode::Sub => {
                if let (Some(dst), Some(src)) = (ops.first(), ops.get(1)) {
                    if let (Some(cur), Some(rhs)) =
                        (self.resolve_operand(dst), self.resolve_operand(src))
                    {
                        let result = if instr.opcode == Opcode::Add {
                            cur.wrapping_add(rhs)
                        } else {
                            cur.wrapping_sub(rhs)
                        };
                        self.write_operand(dst, result);
                    }
                }
                self.registers.rip = next;
            }
            Opcode::Cmp => {
                if let (Some(a), Some(b)) = (ops.first(), ops.get(1)) {
                    if let (Some(a), Some(b)) = (self.resolve_operand(a), self.resolve_operand(b)) {
                        // only zero and sign are modeled; carry/overflow stay
                        self.registers.zero = a == b;
                        self.registers.sign = a < b;
                    }
                }
                self.registers.rip = next;
            }
            Opcode::Jmp => {
                self.registers.rip = ops
                    .first()
                    .and_then(|t| self.resolve_jump_target(t))
                    .unwrap_or(next);
            }
            Opcode::Je => {
                let target = ops.first().and_then(|t| self.resolve_jump_target(t));
                self.registers.rip = match target {
                    Some(addr) if self.registers.zero => addr,
                    _ => next,
                };
            }
            Opcode::Call => {
                match ops.first().and_then(|t| self.resolve_jump_target(t)) {
                    Some(target) => {
                        // push the return address at the current stack slot,
                        // then grow the stack downward
                        let rsp = self.registers.rsp;
                        self.write_cell(rsp, CellValue::Int(next as i64));
                        self.registers.rsp = rsp.wrapping_sub(8);
                        self.registers.rip = target;
                    }
                    None => self.registers.rip = next,
                }
            }
            Opcode::Ret => {
                let slot = self.registers.rsp.wrapping_add(8);
                match self.read_cell(slot) {
                    Some(CellValue::Int(ret)) => {
                        self.registers.rip = *ret as u64;
                        self.registers.rsp = slot;
                    }
                    // missing or non-integer slot: documented silent no-op
                    _ => {}
                }
            }
        }

        true
    }

    /// Run until an enabled execution breakpoint sits under rip, checking
    /// *before* each step so a hit never mutates register state.
    ///
    /// Returns true on a breakpoint stop, false when the step budget runs
    /// out. The budget is the only cancellation mechanism.
    pub fn run_until_breakpoint(&mut self, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            let rip = self.registers.rip;
            if let Some(bp) = self.breakpoints.get_mut(&rip) {
                if bp.enabled && bp.kind == BreakpointKind::Execution {
                    bp.hit_count += 1;
                    log::debug!("execution breakpoint hit at {:#x}", rip);
                    return true;
                }
            }
            self.step();
        }
        log::debug!("run stopped after {} steps without a breakpoint", max_steps);
        false
    }

    /// Resolve an operand to an integer value: register, `[addr]` memory
    /// reference, or immediate (decimal or `0x` hex)
    fn resolve_operand(&self, operand: &str) -> Option<i64> {
        if let Some(value) = self.registers.get(operand) {
            return Some(value as i64);
        }
        if let Some(addr) = parse_memory_ref(operand) {
            return match self.read_cell(addr) {
                Some(CellValue::Int(v)) => Some(*v),
                _ => None,
            };
        }
        codec::parse_int(operand).ok()
    }

    /// Write a value to a register or an *existing* memory cell. Writes to
    /// absent cells are dropped so execution never changes the memory map
    /// shape.
    fn write_operand(&mut self, operand: &str, value: i64) {
        if self.registers.set(operand, value as u64) {
            return;
        }
        if let Some(addr) = parse_memory_ref(operand) {
            if self.memory.contains_key(&addr) {
                self.write_cell(addr, CellValue::Int(value));
            }
        }
    }

    /// Jump targets are absolute hex addresses or symbol names; anything
    /// unresolvable means "no jump"
    fn resolve_jump_target(&self, target: &str) -> Option<u64> {
        if let Some(digits) = target.strip_prefix("0x").or_else(|| target.strip_prefix("0X")) {
            return u64::from_str_radix(digits, 16).ok();
        }
        self.resolve_symbol(target)
    }
}

fn parse_memory_ref(operand: &str) -> Option<u64> {
    let inner = operand.strip_prefix('[')?.strip_suffix(']')?;
    if let Some(digits) = inner.strip_prefix("0x").or_else(|| inner.strip_prefix("0X")) {
        u64::from_str_radix(digits, 16).ok()
    } else {
        inner.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::process::{Instruction, SymbolKind};
    use std::collections::BTreeMap;

    fn bare_process() -> SimulatedProcess {
        let mut mem = BTreeMap::new();
        mem.insert(0x1000, CellValue::Int(10));
        let mut p = SimulatedProcess::new("sim-1".into(), "test".into(), mem);
        p.registers.rip = 0x4000;
        p.registers.rsp = 0x8000;
        p
    }

    fn put(p: &mut SimulatedProcess, addr: u64, opcode: Opcode, ops: &[&str], len: usize) {
        p.instructions.insert(
            addr,
            Instruction {
                address: addr,
                opcode,
                operands: ops.iter().map(|s| s.to_string()).collect(),
                bytes: vec![0x90; len],
            },
        );
    }

    #[test]
    fn missing_instruction_advances_one_byte() {
        let mut p = bare_process();
        assert!(p.step());
        assert_eq!(p.registers.rip, 0x4001);
    }

    #[test]
    fn mov_immediate_and_register() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Mov, &["rax", "0x2a"], 3);
        put(&mut p, 0x4003, Opcode::Mov, &["rbx", "rax"], 2);
        p.step();
        p.step();
        assert_eq!(p.registers.rax, 42);
        assert_eq!(p.registers.rbx, 42);
        assert_eq!(p.registers.rip, 0x4005);
    }

    #[test]
    fn mov_to_existing_memory_cell() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Mov, &["[0x1000]", "99"], 3);
        p.step();
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(99)));
    }

    #[test]
    fn writes_to_absent_cells_do_not_create_them() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Mov, &["[0x2000]", "99"], 3);
        put(&mut p, 0x4003, Opcode::Add, &["[0x2000]", "1"], 3);
        p.step();
        p.step();
        assert!(p.read_cell(0x2000).is_none());
        assert_eq!(p.memory.len(), 1);
    }

    #[test]
    fn add_and_sub_on_register_and_memory() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Mov, &["rax", "5"], 3);
        put(&mut p, 0x4003, Opcode::Add, &["rax", "3"], 2);
        put(&mut p, 0x4005, Opcode::Sub, &["rax", "1"], 2);
        put(&mut p, 0x4007, Opcode::Add, &["[0x1000]", "32"], 3);
        for _ in 0..4 {
            p.step();
        }
        assert_eq!(p.registers.rax, 7);
        assert_eq!(p.read_cell(0x1000), Some(&CellValue::Int(42)));
    }

    #[test]
    fn cmp_sets_zero_and_sign_only() {
        let mut p = bare_process();
        p.registers.carry = true;
        p.registers.overflow = true;
        put(&mut p, 0x4000, Opcode::Cmp, &["3", "3"], 2);
        put(&mut p, 0x4002, Opcode::Cmp, &["2", "5"], 2);
        p.step();
        assert!(p.registers.zero);
        assert!(!p.registers.sign);
        p.step();
        assert!(!p.registers.zero);
        assert!(p.registers.sign);
        // untouched by compare
        assert!(p.registers.carry);
        assert!(p.registers.overflow);
    }

    #[test]
    fn jmp_by_address_and_symbol() {
        let mut p = bare_process();
        p.add_symbol(0x4100, "loop_top", SymbolKind::Function);
        put(&mut p, 0x4000, Opcode::Jmp, &["loop_top"], 2);
        put(&mut p, 0x4100, Opcode::Jmp, &["0x4000"], 2);
        p.step();
        assert_eq!(p.registers.rip, 0x4100);
        p.step();
        assert_eq!(p.registers.rip, 0x4000);
    }

    #[test]
    fn unresolved_jump_target_falls_through() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Jmp, &["nowhere"], 2);
        p.step();
        assert_eq!(p.registers.rip, 0x4002);
    }

    #[test]
    fn je_only_taken_on_zero_flag() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Je, &["0x5000"], 2);
        p.step();
        assert_eq!(p.registers.rip, 0x4002);

        p.registers.rip = 0x4000;
        p.registers.zero = true;
        p.step();
        assert_eq!(p.registers.rip, 0x5000);
    }

    #[test]
    fn call_and_ret_round_trip() {
        let mut p = bare_process();
        p.add_symbol(0x5000, "helper", SymbolKind::Function);
        put(&mut p, 0x4000, Opcode::Call, &["helper"], 3);
        put(&mut p, 0x5000, Opcode::Ret, &[], 1);

        p.step();
        assert_eq!(p.registers.rip, 0x5000);
        assert_eq!(p.registers.rsp, 0x8000 - 8);
        assert_eq!(p.read_cell(0x8000), Some(&CellValue::Int(0x4003)));

        p.step();
        assert_eq!(p.registers.rip, 0x4003);
        assert_eq!(p.registers.rsp, 0x8000);
    }

    #[test]
    fn ret_with_missing_slot_is_a_no_op() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Ret, &[], 1);
        p.step();
        assert_eq!(p.registers.rip, 0x4000);
        assert_eq!(p.registers.rsp, 0x8000);
    }

    #[test]
    fn run_stops_on_enabled_execution_breakpoint_without_stepping() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Mov, &["rax", "1"], 3);
        p.set_breakpoint(0x4000, BreakpointKind::Execution, None);

        let before = p.registers.clone();
        assert!(p.run_until_breakpoint(DEFAULT_MAX_STEPS));
        assert_eq!(p.registers, before);
        assert_eq!(p.breakpoints[&0x4000].hit_count, 1);
    }

    #[test]
    fn run_skips_disabled_and_non_execution_breakpoints() {
        let mut p = bare_process();
        put(&mut p, 0x4000, Opcode::Mov, &["rax", "1"], 3);
        p.set_breakpoint(0x4000, BreakpointKind::Write, None);
        p.set_breakpoint(0x4003, BreakpointKind::Execution, None);
        p.toggle_breakpoint(0x4003);

        assert!(!p.run_until_breakpoint(5));
        assert_eq!(p.registers.rax, 1);
    }

    #[test]
    fn run_is_bounded_by_max_steps() {
        let mut p = bare_process();
        // tight loop, no breakpoints
        put(&mut p, 0x4000, Opcode::Jmp, &["0x4000"], 2);
        assert!(!p.run_until_breakpoint(10));
    }
}
