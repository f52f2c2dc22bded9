#[macro_use]
pub mod macros;
pub mod grid2;
pub mod log_setup;
