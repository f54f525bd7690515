//! LPMP protocol core: frame structure, integrity checking, fragment
//! reassembly and the self-describing parameter walk.

pub mod decoder;
pub mod error;
pub mod frame;
pub mod reassembly;
pub mod registry;
