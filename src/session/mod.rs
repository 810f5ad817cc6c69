//! The single owner of the process-wide `Session`.

pub mod controller;

pub use controller::SessionController;
