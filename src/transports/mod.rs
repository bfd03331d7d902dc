//! Concrete transports
//!
//! Each sink embeds a [`TransportBase`](crate::core::TransportBase) and
//! writes the rendered `output` of the record followed by an end-of-line.

#[cfg(feature = "console")]
pub mod console;
#[cfg(feature = "file")]
pub mod file;
pub mod stream;

#[cfg(feature = "console")]
pub use console::ConsoleTransport;
#[cfg(feature = "file")]
pub use file::FileTransport;
pub use stream::{SharedBuffer, StreamTransport};

use crate::core::record::Record;

#[cfg(windows)]
pub const DEFAULT_EOL: &str = "\r\n";
#[cfg(not(windows))]
pub const DEFAULT_EOL: &str = "\n";

pub(crate) fn line_of(record: &Record, eol: &str) -> String {
    let body = record.output.as_deref().unwrap_or(&record.message);
    let mut line = String::with_capacity(body.len() + eol.len());
    line.push_str(body);
    line.push_str(eol);
    line
}
