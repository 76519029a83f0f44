//! Helpers for tests of code that waits on remote state.

mod log;
mod scripted;

pub use log::init_test_logging;
pub use scripted::{ScriptedClient, ScriptedSource, image_doc, vm_doc};
