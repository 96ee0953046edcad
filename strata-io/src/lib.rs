//! Random-access input abstraction and bounded producer/consumer plumbing
//! shared by every pass of the carving engine.

pub mod error;
pub mod queue;
pub mod reader;
pub mod window;

pub use error::{IoError, Result};
pub use queue::BoundedQueue;
pub use reader::{FileReader, InputReader, MemoryReader, SharedReader, Whence};
pub use window::{BufferPool, WindowBuffer, DEFAULT_POOL_DEPTH, WINDOW_SIZE};
