/// A fixed-capacity ring of octets.
///
/// Enqueueing never grows the storage, it accepts as much as fits. The number of free octets is
/// the [`window`](#method.window) a receiver may advertise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    read_at: usize,
    length: usize,
}

impl RingBuffer {
    /// Allocate a ring with room for `capacity` octets.
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            storage: vec![0; capacity].into_boxed_slice(),
            read_at: 0,
            length: 0,
        }
    }

    /// The maximum number of octets the ring holds.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The number of octets currently buffered.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether no octets are buffered.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The number of octets that can still be enqueued.
    pub fn window(&self) -> usize {
        self.capacity() - self.length
    }

    /// Discard all buffered octets.
    pub fn clear(&mut self) {
        self.read_at = 0;
        self.length = 0;
    }

    /// Append as much of `data` as fits, returning the number of octets taken.
    pub fn enqueue_slice(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.window());
        let capacity = self.capacity();
        let mut written = 0;
        while written < count {
            let write_at = (self.read_at + self.length) % capacity;
            let contiguous = (capacity - write_at).min(count - written);
            self.storage[write_at..write_at + contiguous]
                .copy_from_slice(&data[written..written + contiguous]);
            self.length += contiguous;
            written += contiguous;
        }
        count
    }

    /// Remove octets from the front into `data`, returning the number of octets copied.
    pub fn dequeue_slice(&mut self, data: &mut [u8]) -> usize {
        let count = data.len().min(self.length);
        let capacity = self.capacity();
        let mut read = 0;
        while read < count {
            let contiguous = (capacity - self.read_at).min(count - read);
            data[read..read + contiguous]
                .copy_from_slice(&self.storage[self.read_at..self.read_at + contiguous]);
            self.read_at = (self.read_at + contiguous) % capacity;
            self.length -= contiguous;
            read += contiguous;
        }
        if self.length == 0 {
            self.read_at = 0;
        }
        count
    }

    /// Remove up to `max` octets from the front into a fresh vector.
    pub fn dequeue_many(&mut self, max: usize) -> Vec<u8> {
        let mut data = vec![0; max.min(self.length)];
        let count = self.dequeue_slice(&mut data);
        data.truncate(count);
        data
    }
}
