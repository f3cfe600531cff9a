//! Binary reading and writing on plain byte buffers.

mod read;
mod write;

pub use read::BinaryRead;
pub use write::{size_of_var_u32, size_of_var_u64, BinaryWrite, VarLen};
