//! jackc — a single-pass compiler from Jack classes to stack-machine VM code.

pub mod config;
pub mod driver;
pub mod jack;
pub mod vm;
