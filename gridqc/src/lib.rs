pub mod check;
pub mod config;
pub mod data;
pub mod density;
pub mod geometry;
pub mod runner;
pub mod tiling;
pub mod tvu;

#[cfg(test)]
mod tests;
