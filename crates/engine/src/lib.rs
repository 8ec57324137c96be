//! `holdfast-engine` — runs the reservation engine as a line-oriented
//! process: commands on stdin, replies and change events as JSON lines on
//! stdout, logs on stderr.

pub mod commands;
pub mod session;

pub use commands::{parse_line, Command, ParseError};
pub use session::{ErrorBody, JsonLines, Output, Reply, ReplyBody, Session};
