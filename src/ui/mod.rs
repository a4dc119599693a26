//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task event processing
//! - `helpers` - Background task spawning
//! - `render` - Layout and size guard
//! - `sidebar` - Scope tree widget
//! - `articles` - Article list widget
//! - `status` - Status bar widget

mod articles;
mod events;
mod helpers;
mod input;
mod loop_runner;
mod render;
mod sidebar;
mod status;

pub use loop_runner::run;
