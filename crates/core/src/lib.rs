//! Core types shared by every sheetpilot crate: A1 addresses, cell areas and
//! the write gate that keeps server-origin writes out of local delta capture.

pub mod address;
pub mod area;
pub mod gate;

pub use address::{col_to_letters, format_range, parse_address, parse_range, to_address, AddressError};
pub use area::{CellArea, CellPos};
pub use gate::{GateError, GateGuard, GateState, WriteGate, WriteOrigin};
