//! Device-side PCM buffer
//!
//! Single-producer single-consumer sample queue between the consumer thread
//! (which writes decoded audio) and the device render callback (which pulls
//! samples at the device rate). Writers block while the buffer is full; this
//! is what paces playback to real time.

use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AudioError;

/// Upper bound on a single wait for space, so a closed buffer is noticed
const SPACE_POLL: Duration = Duration::from_millis(20);

/// Lock-free PCM queue with a blocking write side
pub struct PcmRingBuffer {
    queue: ArrayQueue<i16>,
    space_lock: Mutex<()>,
    space_available: Condvar,
    closed: AtomicBool,
    /// Set when the device behind the reader is lost
    failure: Mutex<Option<String>>,
    written: AtomicU64,
    underrun_count: AtomicU64,
}

impl PcmRingBuffer {
    /// Create a buffer holding `capacity` samples (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            space_lock: Mutex::new(()),
            space_available: Condvar::new(),
            closed: AtomicBool::new(false),
            failure: Mutex::new(None),
            written: AtomicU64::new(0),
            underrun_count: AtomicU64::new(0),
        }
    }

    /// Write all samples, waiting for the reader whenever the buffer is full.
    ///
    /// Returns the number of samples accepted, which is less than
    /// `samples.len()` only if the buffer was closed mid-write.
    pub fn write_blocking(&self, samples: &[i16]) -> usize {
        let mut accepted = 0;
        while accepted < samples.len() {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            match self.queue.push(samples[accepted]) {
                Ok(()) => accepted += 1,
                Err(_) => {
                    let mut guard = self.space_lock.lock();
                    if self.queue.is_full() && !self.closed.load(Ordering::Acquire) {
                        self.space_available.wait_for(&mut guard, SPACE_POLL);
                    }
                }
            }
        }
        self.written.fetch_add(accepted as u64, Ordering::Relaxed);
        accepted
    }

    /// [`write_blocking`](Self::write_blocking) for device front-ends: a lost
    /// reader surfaces as [`AudioError::DeviceUnavailable`] instead of a short
    /// or endless write.
    pub fn write_to_device(&self, samples: &[i16]) -> Result<usize, AudioError> {
        self.check_reader()?;
        let accepted = self.write_blocking(samples);
        self.check_reader()?;
        Ok(accepted)
    }

    fn check_reader(&self) -> Result<(), AudioError> {
        match self.failure() {
            Some(reason) => Err(AudioError::DeviceUnavailable(reason)),
            None => Ok(()),
        }
    }

    /// Write as many samples as fit without waiting
    pub fn try_write(&self, samples: &[i16]) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        let accepted = samples
            .iter()
            .take_while(|s| self.queue.push(**s).is_ok())
            .count();
        self.written.fetch_add(accepted as u64, Ordering::Relaxed);
        accepted
    }

    /// Fill `out` from the buffer. Missing samples are zero-filled and, once
    /// audio has started flowing, counted as an underrun.
    ///
    /// Returns the number of real samples copied.
    pub fn read_into(&self, out: &mut [i16]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            match self.queue.pop() {
                Some(sample) => {
                    out[copied] = sample;
                    copied += 1;
                }
                None => break,
            }
        }

        if copied < out.len() {
            out[copied..].fill(0);
            if self.written.load(Ordering::Relaxed) > 0 {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
            }
        }

        if copied > 0 {
            self.notify_space();
        }
        copied
    }

    /// Discard everything not yet rendered. Returns the number of samples dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.queue.pop().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            self.notify_space();
        }
        dropped
    }

    /// Wake and release any blocked writer; later writes accept nothing
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify_space();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Record that the reader is gone for good and close the buffer. The
    /// first reason wins.
    pub fn fail(&self, reason: impl Into<String>) {
        self.failure.lock().get_or_insert_with(|| reason.into());
        self.close();
    }

    /// Why the reader was lost, if it was
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    fn notify_space(&self) {
        let _guard = self.space_lock.lock();
        self.space_available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Fill level as a fraction of capacity
    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity() as f32
    }

    pub fn underrun_count(&self) -> u64 {
        self.underrun_count.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a PCM buffer
pub type SharedPcmBuffer = Arc<PcmRingBuffer>;
