//! Input handling
//!
//! Stdin arrives as raw bytes from the event loop. `LineBuffer` assembles
//! them into lines, `LoginForm` consumes lines while the session gate is
//! closed, and `CommandParser` turns lines into commands once it is open.

pub mod command;
pub mod line_buffer;
pub mod login_form;

pub use command::{create_default_commands, Command, CommandAction, CommandParser, ParseError};
pub use line_buffer::LineBuffer;
pub use login_form::{FormStep, LoginForm};
