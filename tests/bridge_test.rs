//! Integration tests for the debug bridge session surface.
//!
//! Everything here runs against the simulated backend so the tests are
//! deterministic on any platform.

use memspect::bridge::ProcessDebugBridge;
use memspect::config::SessionConfig;
use memspect::target::TargetKind;

fn attached_bridge() -> (ProcessDebugBridge, String) {
    let mut bridge = ProcessDebugBridge::new(SessionConfig::default());
    let pid = bridge.create_process("session_test", None);
    assert!(bridge.attach(&pid, TargetKind::Simulated));
    (bridge, pid)
}

#[test]
fn full_write_read_undo_session() {
    let (mut bridge, _pid) = attached_bridge();

    // seeded data cell at 0x1000 holds int 7
    let before = bridge.read_typed("0x1000", "int").unwrap();
    assert!(before.formatted.contains('7'));

    assert!(bridge.write_typed("0x1000", "100", "int"));
    let after = bridge.read_typed("0x1000", "int").unwrap();
    assert!(after.formatted.contains("100"));

    assert!(bridge.undo());
    let restored = bridge.read_typed("0x1000", "int").unwrap();
    assert_eq!(restored.formatted, before.formatted);

    assert!(bridge.redo());
    let redone = bridge.read_typed("0x1000", "int").unwrap();
    assert_eq!(redone.formatted, after.formatted);
}

#[test]
fn scan_tracks_writes() {
    let (mut bridge, _pid) = attached_bridge();

    assert!(bridge.write_typed("0x2000", "777", "int"));
    assert!(bridge.write_typed("0x2008", "777", "int"));

    let matches = bridge.scan("777", "int");
    assert_eq!(matches, vec!["0x2000".to_string(), "0x2008".to_string()]);

    // overwrite one and rescan
    assert!(bridge.write_typed("0x2000", "778", "int"));
    assert_eq!(bridge.scan("777", "int"), vec!["0x2008".to_string()]);
}

#[test]
fn breakpoint_halts_run_without_stepping() {
    let (mut bridge, _pid) = attached_bridge();

    let entry = format!("0x{:x}", bridge.get_registers()["rip"]);
    assert!(bridge.set_breakpoint(&entry, "execution", None));

    // breakpoint at the current rip fires before any instruction executes
    assert!(bridge.run(None));
    assert_eq!(format!("0x{:x}", bridge.get_registers()["rip"]), entry);

    let bps = bridge.list_breakpoints();
    assert_eq!(bps.len(), 1);
    assert_eq!(bps[0].hit_count, 1);
}

#[test]
fn disabled_breakpoint_lets_run_finish() {
    let (mut bridge, _pid) = attached_bridge();

    let entry = format!("0x{:x}", bridge.get_registers()["rip"]);
    assert!(bridge.set_breakpoint(&entry, "execution", None));
    assert_eq!(bridge.toggle_breakpoint(&entry), Some(false));

    // seeded program reaches `done` via je; no enabled breakpoint stops it
    assert!(!bridge.run(Some(20)));
    assert_eq!(bridge.list_breakpoints()[0].hit_count, 0);
}

#[test]
fn seeded_program_computes_42() {
    let (mut bridge, _pid) = attached_bridge();

    for _ in 0..5 {
        assert!(bridge.step());
    }
    let regs = bridge.get_registers();
    assert_eq!(regs["rax"], 42);
    assert_eq!(regs["zf"], 1);
}

#[test]
fn detach_clears_typed_surface() {
    let (mut bridge, _pid) = attached_bridge();
    assert!(bridge.detach());

    assert!(bridge.read_typed("0x1000", "int").is_none());
    assert!(!bridge.write_typed("0x1000", "1", "int"));
    assert!(bridge.scan("7", "int").is_empty());
    assert!(bridge.get_registers().is_empty());
    assert!(!bridge.step());

    // detach with nothing attached still succeeds
    assert!(bridge.detach());
}

#[test]
fn deleting_attached_process_detaches_lazily() {
    let (mut bridge, pid) = attached_bridge();
    assert!(bridge.delete_process(&pid));

    assert!(bridge.read_typed("0x1000", "int").is_none());
    assert!(bridge.process_info().is_none());
}

#[test]
fn attach_switches_between_processes() {
    let mut bridge = ProcessDebugBridge::new(SessionConfig::default());
    let a = bridge.create_process("first", None);
    let b = bridge.create_process("second", None);

    assert!(bridge.attach(&a, TargetKind::Simulated));
    assert!(bridge.write_typed("0x3000", "1", "int"));

    assert!(bridge.attach(&b, TargetKind::Simulated));
    // second process has its own memory; the write is not visible
    assert!(bridge.scan("1", "int").is_empty());

    let info = bridge.process_info().unwrap();
    assert_eq!(info.pid, b);
    assert_eq!(info.name, "second");
}

#[test]
fn failed_attach_leaves_session_empty() {
    let (mut bridge, _pid) = attached_bridge();
    assert!(!bridge.attach("sim-999", TargetKind::Simulated));

    assert!(!bridge.is_attached());
    assert!(bridge.current_kind().is_none());
    assert!(bridge.get_registers().is_empty());
    assert!(bridge.list_regions().is_empty());
}

#[test]
fn typed_values_round_trip_through_the_codec() {
    let (mut bridge, _pid) = attached_bridge();

    assert!(bridge.write_typed("0x5000", "3.5", "float"));
    let f = bridge.read_typed("0x5000", "float").unwrap();
    assert!(f.formatted.contains("3.5"));

    assert!(bridge.write_typed("0x5008", "hello", "string"));
    let s = bridge.read_typed("0x5008", "string").unwrap();
    assert!(s.formatted.contains("hello"));
}

#[test]
fn symbols_annotate_reads() {
    let (mut bridge, _pid) = attached_bridge();

    // `counter` is seeded at the data base address
    let readout = bridge.read_typed("0x1000", "int").unwrap();
    assert_eq!(readout.symbol.as_deref(), Some("counter"));
    assert_eq!(readout.address, "0x1000");
}
