//! Bounded pre-roll ring buffer.

use std::collections::VecDeque;

use crate::audio::frame::Frame;

/// Holds the most recent frames captured before speech is confirmed.
///
/// Bounded: pushing at capacity evicts the oldest frame, so the buffer
/// never exceeds `preroll_ms / frame_ms` frames and always contains the
/// newest audio in arrival order.
pub struct PrerollBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl PrerollBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a frame, evicting the oldest at capacity. A zero-capacity
    /// buffer stores nothing and hands the frame back to the caller.
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        if self.capacity == 0 {
            return Some(frame);
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
        None
    }

    /// Remove and return all buffered frames, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        self.frames.drain(..)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: i16) -> Frame {
        Frame::new(vec![tag; 4], 16_000)
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = PrerollBuffer::new(3);
        for i in 0..10 {
            buf.push(tagged(i));
            assert!(buf.len() <= 3);
        }
    }

    #[test]
    fn keeps_most_recent_frames_in_order() {
        let mut buf = PrerollBuffer::new(3);
        for i in 0..5 {
            buf.push(tagged(i));
        }
        let tags: Vec<i16> = buf.drain().map(|f| f.samples[0]).collect();
        assert_eq!(tags, vec![2, 3, 4]);
    }

    #[test]
    fn drain_empties_the_buffer() {
        let mut buf = PrerollBuffer::new(3);
        buf.push(tagged(1));
        let _ = buf.drain().count();
        assert!(buf.is_empty());
    }

    #[test]
    fn zero_capacity_hands_the_frame_back() {
        let mut buf = PrerollBuffer::new(0);
        let returned = buf.push(tagged(1));
        assert_eq!(returned.map(|f| f.samples[0]), Some(1));
        assert!(buf.is_empty());
    }

    #[test]
    fn nonzero_capacity_keeps_the_frame() {
        let mut buf = PrerollBuffer::new(2);
        assert!(buf.push(tagged(1)).is_none());
        assert_eq!(buf.len(), 1);
    }
}
