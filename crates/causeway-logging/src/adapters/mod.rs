//! Built-in log destinations.

mod channel;
mod console;
mod file;
mod memory;

pub use channel::ChannelAdapter;
pub use console::{ConsoleAdapter, ConsoleFormat};
pub use file::FileAdapter;
pub use memory::MemoryAdapter;
