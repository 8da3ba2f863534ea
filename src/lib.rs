pub mod action;
pub mod clipboard;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod journal;
pub mod logging;
pub mod prompt;
pub mod shell;
pub mod view;

pub use action::{Action, Invocation, Slot};
pub use config::{Config, ConfigManager};
pub use dispatch::{AppContext, Dispatcher};
pub use shell::TerminalShell;
