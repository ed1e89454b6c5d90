//! CLI - reedline-based REPL interface
//!
//! Interactive front end over the debug bridge with autocomplete-free but
//! history-enabled line editing.

use crate::bridge::{parse_address, ProcessDebugBridge};
use crate::config::SessionConfig;
use crate::target::TargetKind;

use anyhow::Result;
use colored::Colorize;
use reedline::{
    Prompt, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal,
};
use std::borrow::Cow;

/// Custom prompt showing the attach state
pub struct MemspectPrompt {
    attached: Option<(TargetKind, String)>,
}

impl MemspectPrompt {
    pub fn new() -> Self {
        Self { attached: None }
    }

    pub fn set_attached(&mut self, attached: Option<(TargetKind, String)>) {
        self.attached = attached;
    }
}

impl Default for MemspectPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for MemspectPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        match &self.attached {
            Some((kind, id)) => Cow::Owned(format!("[{}:{}]", kind.name(), id)),
            None => Cow::Borrowed("[---]"),
        }
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("(search: {}{}) ", prefix, history_search.term))
    }
}

/// Command parsing result
#[derive(Debug)]
pub enum ParsedCommand {
    /// List processes: ps [sim|real]
    ListProcesses(Option<TargetKind>),
    /// Create simulated process: new <name>
    CreateProcess(String),
    /// Delete simulated process: del <pid>
    DeleteProcess(String),
    /// Attach: attach <pid> [sim|real]
    Attach(String, TargetKind),
    /// Detach: detach
    Detach,
    /// Read typed value: x <addr> [type]
    Read(String, String),
    /// Write typed value: w <addr> <value> [type]
    Write(String, String, String),
    /// Scan for value: scan <value> [type]
    Scan(String, String),
    /// Show registers: dr
    Registers,
    /// Set register: sr <name> <value>
    SetRegister(String, String),
    /// Print instructions: pd [n]
    PrintInstructions(usize),
    /// Set breakpoint: db <addr> [kind]
    BreakpointSet(String, String),
    /// Delete breakpoint: db- <addr>
    BreakpointDelete(String),
    /// Toggle breakpoint: dbt <addr>
    BreakpointToggle(String),
    /// List breakpoints: dbl
    BreakpointList,
    /// Step one instruction: ds
    Step,
    /// Run to breakpoint: dc [max_steps]
    Run(Option<usize>),
    /// Undo last memory write: undo
    Undo,
    /// Redo undone write: redo
    Redo,
    /// Show memory map: dmm
    MemoryMap,
    /// Show memory regions: dm
    Regions,
    /// Show attached process info: info
    Info,
    /// Help: ? or help
    Help,
    /// Quit: q or exit
    Quit,
    /// Unknown command
    Unknown(String),
}

fn parse_kind(s: Option<&str>) -> Option<TargetKind> {
    match s {
        Some("sim") | Some("simulated") => Some(TargetKind::Simulated),
        Some("real") => Some(TargetKind::Real),
        _ => None,
    }
}

/// Parse a command string into a structured command
pub fn parse_command(input: &str) -> ParsedCommand {
    let input = input.trim();
    let parts: Vec<&str> = input.split_whitespace().collect();
    let cmd = parts.first().copied().unwrap_or("");
    let arg = |i: usize| parts.get(i).copied();

    match cmd {
        "ps" => ParsedCommand::ListProcesses(parse_kind(arg(1))),
        "new" => match arg(1) {
            Some(name) => ParsedCommand::CreateProcess(name.to_string()),
            None => ParsedCommand::Unknown(input.to_string()),
        },
        "del" => match arg(1) {
            Some(pid) => ParsedCommand::DeleteProcess(pid.to_string()),
            None => ParsedCommand::Unknown(input.to_string()),
        },
        "attach" => match arg(1) {
            Some(pid) => {
                let kind = parse_kind(arg(2)).unwrap_or_else(|| {
                    // numeric ids are real processes, sim-* ids are simulated
                    if pid.bytes().all(|b| b.is_ascii_digit()) {
                        TargetKind::Real
                    } else {
                        TargetKind::Simulated
                    }
                });
                ParsedCommand::Attach(pid.to_string(), kind)
            }
            None => ParsedCommand::Unknown(input.to_string()),
        },
        "detach" => ParsedCommand::Detach,

        "x" | "read" => match arg(1) {
            Some(addr) => ParsedCommand::Read(
                addr.to_string(),
                arg(2).unwrap_or("int").to_string(),
            ),
            None => ParsedCommand::Unknown(input.to_string()),
        },
        "w" | "write" => match (arg(1), arg(2)) {
            (Some(addr), Some(value)) => ParsedCommand::Write(
                addr.to_string(),
                value.to_string(),
                arg(3).unwrap_or("int").to_string(),
            ),
            _ => ParsedCommand::Unknown(input.to_string()),
        },
        "scan" => match arg(1) {
            Some(value) => ParsedCommand::Scan(
                value.to_string(),
                arg(2).unwrap_or("int").to_string(),
            ),
            None => ParsedCommand::Unknown(input.to_string()),
        },

        "dr" | "regs" => ParsedCommand::Registers,
        "sr" => match (arg(1), arg(2)) {
            (Some(name), Some(value)) => {
                ParsedCommand::SetRegister(name.to_string(), value.to_string())
            }
            _ => ParsedCommand::Unknown(input.to_string()),
        },
        "pd" => {
            let count = arg(1).and_then(|s| s.parse().ok()).unwrap_or(10);
            ParsedCommand::PrintInstructions(count)
        }

        "db" => match arg(1) {
            Some(addr) => ParsedCommand::BreakpointSet(
                addr.to_string(),
                arg(2).unwrap_or("execution").to_string(),
            ),
            None => ParsedCommand::Unknown(input.to_string()),
        },
        "db-" => match arg(1) {
            Some(addr) => ParsedCommand::BreakpointDelete(addr.to_string()),
            None => ParsedCommand::Unknown(input.to_string()),
        },
        "dbt" => match arg(1) {
            Some(addr) => ParsedCommand::BreakpointToggle(addr.to_string()),
            None => ParsedCommand::Unknown(input.to_string()),
        },
        "dbl" => ParsedCommand::BreakpointList,

        "ds" | "step" => ParsedCommand::Step,
        "dc" | "run" => ParsedCommand::Run(arg(1).and_then(|s| s.parse().ok())),

        "undo" => ParsedCommand::Undo,
        "redo" => ParsedCommand::Redo,

        "dmm" => ParsedCommand::MemoryMap,
        "dm" => ParsedCommand::Regions,
        "info" => ParsedCommand::Info,

        "?" | "help" => ParsedCommand::Help,
        "q" | "quit" | "exit" => ParsedCommand::Quit,

        _ => ParsedCommand::Unknown(input.to_string()),
    }
}

/// Print the help message
fn print_help() {
    println!("{}", "memspect commands".bold().cyan());
    println!("{}", "═".repeat(50).cyan());

    println!("\n{}", "Processes:".bold().yellow());
    println!("  {}   List processes", "ps [sim|real]".green());
    println!("  {}      Create simulated process", "new <name>".green());
    println!("  {}       Delete simulated process", "del <pid>".green());
    println!("  {}  Attach to a process", "attach <pid>".green());
    println!("  {}          Detach", "detach".green());
    println!("  {}            Show attached process info", "info".green());

    println!("\n{}", "Memory:".bold().yellow());
    println!("  {}   Read typed value", "x <addr> [type]".green());
    println!("  {} Write typed value", "w <addr> <val> [type]".green());
    println!("  {}  Scan for value", "scan <val> [type]".green());
    println!("  {}             Show memory map", "dmm".green());
    println!("  {}              Show memory regions", "dm".green());
    println!("  {}            Undo last write", "undo".green());
    println!("  {}            Redo undone write", "redo".green());

    println!("\n{}", "Execution:".bold().yellow());
    println!("  {}              Show registers", "dr".green());
    println!("  {}  Set register", "sr <name> <val>".green());
    println!("  {}          Print instructions", "pd [n]".green());
    println!("  {}  Set breakpoint", "db <addr> [kind]".green());
    println!("  {}       Delete breakpoint", "db- <addr>".green());
    println!("  {}       Toggle breakpoint", "dbt <addr>".green());
    println!("  {}             List breakpoints", "dbl".green());
    println!("  {}              Step one instruction", "ds".green());
    println!("  {}          Run to breakpoint", "dc [steps]".green());

    println!("\n{}", "Other:".bold().yellow());
    println!("  {}               Show this help", "?".green());
    println!("  {}               Quit", "q".green());
}

/// Execute a parsed command; returns false when the REPL should exit
fn execute_command(bridge: &mut ProcessDebugBridge, cmd: ParsedCommand) -> bool {
    match cmd {
        ParsedCommand::ListProcesses(kind) => {
            for info in bridge.list_processes(kind) {
                println!(
                    "  {:>10}  {:<24} {}",
                    info.pid.green(),
                    info.name,
                    info.path.as_deref().unwrap_or("").dimmed()
                );
            }
        }
        ParsedCommand::CreateProcess(name) => {
            let pid = bridge.create_process(&name, None);
            println!("[*] Created simulated process {} ({})", name, pid.green());
        }
        ParsedCommand::DeleteProcess(pid) => {
            if bridge.delete_process(&pid) {
                println!("[*] Deleted process {}", pid);
            } else {
                println!("{} No such process: {}", "[!]".red(), pid);
            }
        }
        ParsedCommand::Attach(pid, kind) => {
            if bridge.attach(&pid, kind) {
                println!("[*] Attached to {} process {}", kind.name(), pid.green());
            } else {
                println!("{} Failed to attach to {}", "[!]".red(), pid);
            }
        }
        ParsedCommand::Detach => {
            bridge.detach();
            println!("[*] Detached");
        }
        ParsedCommand::Read(addr, ty) => match bridge.read_typed(&addr, &ty) {
            Some(readout) => {
                let notes = match (&readout.symbol, &readout.breakpoint) {
                    (Some(sym), Some(bp)) => format!("  <{}> [bp:{}]", sym, bp),
                    (Some(sym), None) => format!("  <{}>", sym),
                    (None, Some(bp)) => format!("  [bp:{}]", bp),
                    (None, None) => String::new(),
                };
                println!(
                    "  {} = {}{}",
                    readout.address.green(),
                    readout.formatted,
                    notes.dimmed()
                );
            }
            None => println!("{} Nothing readable at {}", "[!]".red(), addr),
        },
        ParsedCommand::Write(addr, value, ty) => {
            if bridge.write_typed(&addr, &value, &ty) {
                println!("[*] Wrote {} ({}) to {}", value, ty, addr);
            } else {
                println!("{} Write failed", "[!]".red());
            }
        }
        ParsedCommand::Scan(value, ty) => {
            let matches = bridge.scan(&value, &ty);
            if matches.is_empty() {
                println!("[*] No matches");
            } else {
                println!("[*] {} match(es):", matches.len());
                for addr in matches {
                    println!("    {}", addr.green());
                }
            }
        }
        ParsedCommand::Registers => {
            let regs = bridge.get_registers();
            if regs.is_empty() {
                println!("{} No register state available", "[!]".red());
            } else {
                for (name, value) in regs {
                    println!("    {:>3} = {:#018x}", name.to_uppercase(), value);
                }
            }
        }
        ParsedCommand::SetRegister(name, value) => {
            let parsed = parse_address(&value).or_else(|| value.parse().ok());
            match parsed {
                Some(v) if bridge.set_register(&name, v) => {
                    println!("[*] {} = {:#x}", name, v)
                }
                _ => println!("{} Failed to set register {}", "[!]".red(), name),
            }
        }
        ParsedCommand::PrintInstructions(count) => {
            for instr in bridge.list_instructions(None, count) {
                println!("  {:#010x}  {}", instr.address, instr.text());
            }
        }
        ParsedCommand::BreakpointSet(addr, kind) => {
            if bridge.set_breakpoint(&addr, &kind, None) {
                println!("[*] Breakpoint ({}) set at {}", kind, addr);
            } else {
                println!("{} Failed to set breakpoint", "[!]".red());
            }
        }
        ParsedCommand::BreakpointDelete(addr) => {
            if bridge.remove_breakpoint(&addr) {
                println!("[*] Breakpoint deleted at {}", addr);
            } else {
                println!("{} No breakpoint at {}", "[!]".red(), addr);
            }
        }
        ParsedCommand::BreakpointToggle(addr) => match bridge.toggle_breakpoint(&addr) {
            Some(enabled) => println!(
                "[*] Breakpoint at {} is now {}",
                addr,
                if enabled { "enabled" } else { "disabled" }
            ),
            None => println!("{} No breakpoint at {}", "[!]".red(), addr),
        },
        ParsedCommand::BreakpointList => {
            for bp in bridge.list_breakpoints() {
                println!(
                    "  {:#010x}  {:<9} {}  hits={}{}",
                    bp.address,
                    bp.kind.name(),
                    if bp.enabled { "on " } else { "off" },
                    bp.hit_count,
                    bp.condition
                        .as_deref()
                        .map(|c| format!("  if {}", c))
                        .unwrap_or_default()
                );
            }
        }
        ParsedCommand::Step => {
            if bridge.step() {
                if let Some(rip) = bridge.get_registers().get("rip") {
                    println!("[*] rip = {:#x}", rip);
                }
            } else {
                println!("{} Step failed", "[!]".red());
            }
        }
        ParsedCommand::Run(max_steps) => {
            if bridge.run(max_steps) {
                println!("[*] Stopped at breakpoint");
            } else {
                println!("[*] Step budget exhausted without hitting a breakpoint");
            }
        }
        ParsedCommand::Undo => {
            if bridge.undo() {
                println!("[*] Undone");
            } else {
                println!("{} Nothing to undo", "[!]".red());
            }
        }
        ParsedCommand::Redo => {
            if bridge.redo() {
                println!("[*] Redone");
            } else {
                println!("{} Nothing to redo", "[!]".red());
            }
        }
        ParsedCommand::MemoryMap => {
            for cell in bridge.memory_map() {
                println!(
                    "  {}  {:<8} {:<20} {}",
                    cell.address.green(),
                    cell.type_name,
                    cell.value,
                    cell.hex.dimmed()
                );
            }
        }
        ParsedCommand::Regions => {
            for region in bridge.list_regions() {
                println!(
                    "  {:#014x}  {:>10}  {}  {:<9} {}",
                    region.base_address,
                    region.size,
                    region.protection,
                    region.kind.name(),
                    region.mapped_file.as_deref().unwrap_or("").dimmed()
                );
            }
        }
        ParsedCommand::Info => match bridge.process_info() {
            Some(info) => {
                println!("  pid:  {}", info.pid.green());
                println!("  name: {}", info.name);
                println!("  kind: {}", info.kind.name());
                if let Some(path) = info.path {
                    println!("  path: {}", path);
                }
            }
            None => println!("{} Not attached", "[!]".red()),
        },
        ParsedCommand::Help => print_help(),
        ParsedCommand::Quit => {
            println!("[*] Shutting down...");
            return false;
        }
        ParsedCommand::Unknown(input) => {
            println!("{} Unknown command: '{}'", "[!]".red(), input);
            println!("    Type '?' for help");
        }
    }
    true
}

/// Run the REPL
pub fn run_cli(config: SessionConfig) -> Result<()> {
    let mut bridge = ProcessDebugBridge::new(config);
    let mut line_editor = Reedline::create();
    let mut prompt = MemspectPrompt::new();

    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║  memspect - Type '?' for help, 'q' to quit                   ║".cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝".cyan()
    );

    loop {
        let attached = bridge
            .current_kind()
            .zip(bridge.process_info().map(|i| i.pid));
        prompt.set_attached(attached);

        let sig = line_editor.read_line(&prompt)?;
        match sig {
            Signal::Success(buffer) => {
                let input = buffer.trim();
                if input.is_empty() {
                    continue;
                }
                let cmd = parse_command(input);
                if !execute_command(&mut bridge, cmd) {
                    break;
                }
            }
            Signal::CtrlD | Signal::CtrlC => {
                println!("\n[*] Interrupted");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_defaults_kind_from_pid_shape() {
        match parse_command("attach sim-1") {
            ParsedCommand::Attach(pid, TargetKind::Simulated) => assert_eq!(pid, "sim-1"),
            other => panic!("unexpected: {:?}", other),
        }
        match parse_command("attach 1234") {
            ParsedCommand::Attach(pid, TargetKind::Real) => assert_eq!(pid, "1234"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn read_and_write_default_to_int() {
        match parse_command("x 0x1000") {
            ParsedCommand::Read(addr, ty) => {
                assert_eq!(addr, "0x1000");
                assert_eq!(ty, "int");
            }
            other => panic!("unexpected: {:?}", other),
        }
        match parse_command("w 0x1000 3.5 float") {
            ParsedCommand::Write(addr, value, ty) => {
                assert_eq!((addr.as_str(), value.as_str(), ty.as_str()), ("0x1000", "3.5", "float"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unknown_input_is_preserved() {
        match parse_command("frobnicate everything") {
            ParsedCommand::Unknown(s) => assert_eq!(s, "frobnicate everything"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
