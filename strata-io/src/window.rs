//! Fixed-size window buffers and the pool that cycles them between the dig
//! reader and search workers.

use crate::queue::BoundedQueue;

/// Size of a single scan window: 10 MiB.
pub const WINDOW_SIZE: usize = 10 * 1024 * 1024;

/// Default buffer pool depth (20 buffers x 10 MiB = 200 MiB).
pub const DEFAULT_POOL_DEPTH: usize = 20;

/// A fixed-size byte buffer with bookkeeping for the position it was read
/// from. Owned by exactly one side of the pipeline at a time: buffers move
/// by value through [`BoundedQueue`]s, never by shared pointer.
pub struct WindowBuffer {
    pub data: Vec<u8>,
    /// Number of valid bytes in `data` (0 marks the sentinel/end-of-stream
    /// buffer).
    pub bytes_read: usize,
    /// Logical position (already translated through any coverage map) of
    /// `data[0]`.
    pub begin_position: u64,
}

impl WindowBuffer {
    pub fn new() -> Self {
        WindowBuffer {
            data: vec![0u8; WINDOW_SIZE],
            bytes_read: 0,
            begin_position: 0,
        }
    }

    /// The valid slice of this buffer.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.bytes_read]
    }

    /// True for the sentinel buffer the reader enqueues to signal EOF.
    pub fn is_sentinel(&self) -> bool {
        self.bytes_read == 0 && self.begin_position == 0
    }
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns a fixed depth of [`WindowBuffer`]s and the two queues they cycle
/// through: `empty` (available for the reader to fill) and `full` (ready for
/// a search worker to consume). A buffer is never aliased: it is either on
/// a queue or held by exactly one task.
pub struct BufferPool {
    pub empty: BoundedQueue<Box<WindowBuffer>>,
    pub full: BoundedQueue<Box<WindowBuffer>>,
}

impl BufferPool {
    pub fn new(depth: usize) -> Self {
        let empty = BoundedQueue::new(depth);
        for _ in 0..depth {
            empty.put(Box::new(WindowBuffer::new()));
        }
        BufferPool {
            empty,
            full: BoundedQueue::new(depth),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_DEPTH)
    }
}
