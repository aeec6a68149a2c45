mod command;
mod handler;

pub use command::{CommandRunner, ShellRunner};
pub use handler::{DispatcherState, EventDispatcher};
