//! Text rendering of the session for the terminal.

pub mod render;

pub use render::render;
