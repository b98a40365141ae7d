//! Terminal output for the shell.
//!
//! - **palette**: Fixed mapping from line colors to terminal colors
//! - **renderer**: Writes received lines and status messages

pub mod palette;
pub mod renderer;

pub use renderer::Renderer;
