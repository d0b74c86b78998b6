pub mod backend;

pub use backend::{Gate, QuantumBackend};
