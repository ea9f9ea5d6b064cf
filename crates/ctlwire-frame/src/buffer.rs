/// Size of the buffer on first use.
pub const INITIAL_BUFFER_SIZE: usize = 512;

/// Extra room added whenever the buffer has to grow.
pub const GROWTH_SLACK: usize = 32;

/// Reusable byte buffer for payload reads and buffered sends.
///
/// Allocated lazily, grows to `len + GROWTH_SLACK` whenever a request does
/// not fit, and never shrinks until [`release`](Self::release). The whole
/// buffer is zero-filled on every [`prepare`](Self::prepare), so bytes from
/// an earlier, longer message can never show through.
#[derive(Debug)]
pub struct ReceiveBuffer {
    data: Vec<u8>,
    size: usize,
}

impl ReceiveBuffer {
    /// Create an empty buffer; nothing is allocated until first use.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            size: INITIAL_BUFFER_SIZE,
        }
    }

    /// Zero the buffer, growing it first if needed, and hand out `len` bytes.
    pub fn prepare(&mut self, len: usize) -> &mut [u8] {
        if self.size < len {
            self.size = len + GROWTH_SLACK;
            tracing::trace!(size = self.size, "growing receive buffer");
        }
        if self.data.len() == self.size {
            self.data.fill(0);
        } else {
            self.data = vec![0; self.size];
        }
        &mut self.data[..len]
    }

    /// Bytes currently allocated (zero before first use and after release).
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The whole allocated buffer, including bytes past the last request.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Free the allocation. The next `prepare` starts from the initial size.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.size = INITIAL_BUFFER_SIZE;
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}
