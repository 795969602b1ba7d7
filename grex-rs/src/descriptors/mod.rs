//! Format descriptors shipped with the crate.

mod blte;
mod pak;

pub use blte::BlteDescriptor;
pub use pak::PakDescriptor;
