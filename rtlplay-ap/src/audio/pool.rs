//! Fixed-size frame pool
//!
//! Reuses sample buffers for the capture path so the steady-state read loop
//! does not allocate. Every [`Frame`] handed out has exactly the pool's
//! frame length. A frame goes back to the idle set when it is released or
//! dropped; ownership makes a double release impossible.
//!
//! The idle set is a mutex-guarded stack. The lock is held only for a push
//! or pop, so concurrent acquire/release from several threads never waits on
//! anything longer than that.

use crate::audio::sample::Sample;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Frames allocated up front by [`FramePool::new`]
const DEFAULT_PREALLOCATED: usize = 4;

/// Idle frames kept by [`FramePool::new`]; extra releases are freed
const DEFAULT_MAX_IDLE: usize = 16;

struct PoolInner<T> {
    frame_len: usize,
    max_idle: usize,
    idle: Mutex<Vec<Box<[T]>>>,
    allocated: AtomicUsize,
}

impl<T: Sample> PoolInner<T> {
    fn allocate(&self) -> Box<[T]> {
        self.allocated.fetch_add(1, Ordering::Relaxed);
        vec![T::default(); self.frame_len].into_boxed_slice()
    }

    fn put_back(&self, buffer: Box<[T]>) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buffer);
        } else {
            drop(idle);
            self.allocated.fetch_sub(1, Ordering::Relaxed);
            trace!("Frame pool at idle capacity, freeing frame");
        }
    }
}

/// Shared pool of fixed-length frames. Cloning shares the same idle set.
pub struct FramePool<T: Sample> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Sample> Clone for FramePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Sample> FramePool<T> {
    /// Pool of `frame_len`-sample frames with default sizing.
    pub fn new(frame_len: usize) -> Self {
        Self::with_capacity(frame_len, DEFAULT_PREALLOCATED, DEFAULT_MAX_IDLE)
    }

    /// Pool that allocates `preallocate` frames now and keeps at most
    /// `max_idle` released frames for reuse.
    pub fn with_capacity(frame_len: usize, preallocate: usize, max_idle: usize) -> Self {
        let max_idle = max_idle.max(preallocate);
        let inner = Arc::new(PoolInner {
            frame_len,
            max_idle,
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            allocated: AtomicUsize::new(0),
        });

        let buffers: Vec<_> = (0..preallocate).map(|_| inner.allocate()).collect();
        inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(buffers);

        Self { inner }
    }

    /// Take an idle frame, or allocate one if none is idle.
    ///
    /// Contents of a reused frame are whatever its previous owner left.
    pub fn acquire(&self) -> Frame<T> {
        let reused = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let data = reused.unwrap_or_else(|| self.inner.allocate());
        Frame {
            data: Some(data),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Return a frame for reuse. Same as dropping it.
    pub fn release(&self, frame: Frame<T>) {
        drop(frame);
    }

    pub fn frame_len(&self) -> usize {
        self.inner.frame_len
    }

    /// Frames currently waiting in the idle set
    pub fn idle_count(&self) -> usize {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Frames alive (idle or checked out) that this pool allocated
    pub fn allocated_count(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }
}

/// One buffer's worth of interleaved samples borrowed from a [`FramePool`]
pub struct Frame<T: Sample> {
    data: Option<Box<[T]>>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Sample> Frame<T> {
    pub fn as_slice(&self) -> &[T] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }

    /// Give the frame back to its pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<T: Sample> Deref for Frame<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Sample> DerefMut for Frame<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Sample> std::fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("len", &self.len()).finish()
    }
}

impl<T: Sample> Drop for Frame<T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.put_back(data);
        }
    }
}
