//! # Sample FIFO Module
//!
//! A single-producer ring buffer that accumulates variable-length audio
//! blocks into fixed-size analysis frames. The producer side is called from
//! the time-critical audio context, so writes never block: when the buffer
//! saturates, the overflowing tail of a block is dropped rather than
//! stalling the caller.

/// Ring buffer holding up to one analysis frame of samples.
///
/// Storage is one slot larger than the frame size so that the full and
/// empty states stay distinguishable without a separate counter.
pub struct SampleFifo {
    storage: Box<[f32]>,
    read_pos: usize,
    write_pos: usize,
}

impl SampleFifo {
    /// Creates a FIFO sized for frames of `frame_size` samples.
    pub fn new(frame_size: usize) -> Self {
        SampleFifo {
            storage: vec![0.0; frame_size + 1].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Number of samples currently queued.
    pub fn available(&self) -> usize {
        let cap = self.storage.len();
        (self.write_pos + cap - self.read_pos) % cap
    }

    /// Appends samples, truncating at capacity.
    ///
    /// Returns the number of samples actually written. The producer is never
    /// delayed; if the consumer has fallen behind, the excess is skipped.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let cap = self.storage.len();
        let mut written = 0;
        for &sample in samples {
            let next = (self.write_pos + 1) % cap;
            if next == self.read_pos {
                break; // full
            }
            self.storage[self.write_pos] = sample;
            self.write_pos = next;
            written += 1;
        }
        written
    }

    /// Reads exactly one frame into `frame`, marking the samples consumed.
    ///
    /// Returns `false` without touching `frame` if fewer than `frame.len()`
    /// samples are queued.
    pub fn read_frame(&mut self, frame: &mut [f32]) -> bool {
        if self.available() < frame.len() {
            return false;
        }
        let cap = self.storage.len();
        for slot in frame.iter_mut() {
            *slot = self.storage[self.read_pos];
            self.read_pos = (self.read_pos + 1) % cap;
        }
        true
    }

    /// Drains the queue and zero-fills the storage.
    pub fn reset(&mut self) {
        self.storage.fill(0.0);
        self.read_pos = 0;
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::SampleFifo;

    #[test]
    fn accumulates_blocks_into_a_frame() {
        let mut fifo = SampleFifo::new(8);
        assert_eq!(fifo.available(), 0);

        assert_eq!(fifo.push(&[1.0, 2.0, 3.0]), 3);
        assert_eq!(fifo.push(&[4.0, 5.0, 6.0, 7.0, 8.0]), 5);
        assert_eq!(fifo.available(), 8);

        let mut frame = [0.0; 8];
        assert!(fifo.read_frame(&mut frame));
        assert_eq!(frame, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(fifo.available(), 0);
    }

    #[test]
    fn read_fails_until_a_full_frame_is_queued() {
        let mut fifo = SampleFifo::new(4);
        fifo.push(&[1.0, 2.0, 3.0]);

        let mut frame = [9.0; 4];
        assert!(!fifo.read_frame(&mut frame));
        assert_eq!(frame, [9.0; 4]); // untouched
        assert_eq!(fifo.available(), 3);
    }

    #[test]
    fn write_truncates_instead_of_blocking() {
        let mut fifo = SampleFifo::new(4);
        let written = fifo.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(written, 4);
        assert_eq!(fifo.available(), 4);

        let mut frame = [0.0; 4];
        assert!(fifo.read_frame(&mut frame));
        assert_eq!(frame, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn wraps_around_the_storage_boundary() {
        let mut fifo = SampleFifo::new(4);
        let mut frame = [0.0; 4];

        fifo.push(&[1.0, 2.0, 3.0, 4.0]);
        assert!(fifo.read_frame(&mut frame));
        fifo.push(&[5.0, 6.0, 7.0, 8.0]);
        assert!(fifo.read_frame(&mut frame));
        assert_eq!(frame, [5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn reset_drains_everything() {
        let mut fifo = SampleFifo::new(4);
        fifo.push(&[1.0, 2.0, 3.0]);
        fifo.reset();
        assert_eq!(fifo.available(), 0);

        let mut frame = [0.0; 4];
        assert!(!fifo.read_frame(&mut frame));
    }
}
