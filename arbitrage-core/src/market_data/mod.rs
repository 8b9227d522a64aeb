//! Market data normalization and symbol mapping

pub mod normalizers;
pub mod symbol_mapper;

pub use symbol_mapper::{SymbolFormat, SymbolMapper};
