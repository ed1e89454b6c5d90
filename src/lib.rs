//! memspect - Process Memory Debugging Engine
//!
//! A typed memory inspection layer over two interchangeable backends: a
//! deterministic simulated process (with its own little CPU, breakpoints,
//! and write history) and real OS processes via the platform debug APIs.
//! The [`bridge::ProcessDebugBridge`] facade is the main entry point.

pub mod bridge;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod sim;
pub mod target;

pub use bridge::{ProcessDebugBridge, TypedReadout};
pub use config::SessionConfig;
pub use error::{ConversionError, TargetError};
pub use target::{MemoryTarget, TargetKind};
