//! Scoped arena allocation.
//!
//! `Pool` is the Rust-native shape of the memory pool described for the Bolt
//! protocol engine: an append-only registry of owned values that can be
//! released back to a given depth in one call. Where the original design
//! tracked raw pointers in fixed "debounce" + block-list storage and called
//! an allocator's `vfree` over each block, ownership here is just `Box<dyn
//! Any + Send>` in a `Vec` — truncating the `Vec` drops every entry above the
//! truncation point in reverse order for free, which is exactly the
//! "drainTo walks blocks ... in reverse order" contract without hand-rolled
//! bookkeeping.
//!
//! A `Pool` is the backing store for one inbound message's worth of
//! PackStream-decoded allocations (`bolt-codec`) and for one `Record`'s row
//! data (`bolt-session`): both want "free everything for this unit of work
//! in one call," which is what `drain_to` gives them.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Depth is just "how many entries have been registered so far."
pub type Depth = usize;

/// Failure mode for pool operations.
///
/// The reference design surfaces allocator failure as a distinct error so
/// pool state stays well-defined after a failed `add`; we do the same via
/// `Vec::try_reserve` rather than letting the global allocator abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    OutOfMemory,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::OutOfMemory => write!(f, "pool allocation failed: out of memory"),
        }
    }
}

impl std::error::Error for PoolError {}

/// A typed reference into a [`Pool`].
///
/// Handles are plain indices, not lifetimes: a handle issued before a
/// `drain_to` that removed its slot becomes dangling and `Pool::get` returns
/// `None` for it rather than panicking. Handles issued to the *source* pool
/// of a `merge` must be shifted by the returned offset to remain valid in
/// the destination pool.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Re-derive a handle that pointed into a pool which was then merged
    /// into another at the given offset (the offset `Pool::merge` returns).
    pub fn shifted(self, offset: usize) -> Self {
        Handle {
            index: self.index + offset,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

// Manual impls: `#[derive(Clone, Copy)]` would require `T: Clone`/`T: Copy`,
// but a handle never stores a `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("index", &self.index).finish()
    }
}

/// An append-only registry of owned values with scoped, depth-based release.
#[derive(Default)]
pub struct Pool {
    entries: Vec<Box<dyn Any + Send>>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("depth", &self.depth()).finish()
    }
}

impl Pool {
    pub fn new() -> Self {
        Pool { entries: Vec::new() }
    }

    /// Current depth: the number of live entries.
    pub fn depth(&self) -> Depth {
        self.entries.len()
    }

    /// Register an owned value, returning the depth after insertion and a
    /// handle that can retrieve it later.
    pub fn add<T: Send + 'static>(&mut self, value: T) -> Result<(Depth, Handle<T>), PoolError> {
        self.entries.try_reserve(1).map_err(|_| {
            tracing::error!(depth = self.entries.len(), "pool allocation failed");
            PoolError::OutOfMemory
        })?;
        self.entries.push(Box::new(value));
        let handle = Handle {
            index: self.entries.len() - 1,
            _marker: PhantomData,
        };
        Ok((self.entries.len(), handle))
    }

    /// Look up a previously-added value. Returns `None` if the slot has
    /// since been drained or the handle does not match the stored type.
    pub fn get<T: 'static>(&self, handle: Handle<T>) -> Option<&T> {
        self.entries.get(handle.index)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: 'static>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.entries.get_mut(handle.index)?.downcast_mut::<T>()
    }

    /// Release every entry added after `depth`, in reverse order of
    /// insertion. Idempotent: draining to a depth at or above the current
    /// depth is a no-op.
    pub fn drain_to(&mut self, depth: Depth) {
        let target = depth.min(self.entries.len());
        tracing::trace!(from = self.entries.len(), to = target, "draining pool");
        self.entries.truncate(target);
    }

    /// Append every entry of `other` onto `self`, consuming `other`.
    ///
    /// Returns `(new_depth, offset)`; `offset` is how far the caller must
    /// shift any `Handle` that pointed into `other` to keep referencing the
    /// same value now that it lives in `self`.
    pub fn merge(&mut self, mut other: Pool) -> Result<(Depth, usize), PoolError> {
        let offset = self.entries.len();
        self.entries
            .try_reserve(other.entries.len())
            .map_err(|_| PoolError::OutOfMemory)?;
        self.entries.append(&mut other.entries);
        Ok((self.entries.len(), offset))
    }
}
