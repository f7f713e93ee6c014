//! Bounded object pools with scoped checkout.
//!
//! Objects are handed out wrapped in a [`Pooled`] guard that puts them back when dropped,
//! so every exit path (early `?` returns and unwinding included) returns the object.

use std::ops::{Deref, DerefMut};

use crossbeam::queue::ArrayQueue;

/// Objects that can be cleaned before being handed out again.
pub trait Recycle {
    fn recycle(&mut self);
}

/// Scratch buffers bigger than this are dropped instead of pooled.
const MAX_POOLED_BUFFER: usize = 1024 * 1024;

impl Recycle for Vec<u8> {
    fn recycle(&mut self) {
        self.clear();
        if self.capacity() > MAX_POOLED_BUFFER {
            self.shrink_to(MAX_POOLED_BUFFER);
        }
    }
}

pub struct Pool<T> {
    idle: ArrayQueue<T>,
    make: fn() -> T,
}

impl<T: Recycle> Pool<T> {
    /// Creates a pool keeping at most `capacity` idle objects.
    /// New objects are built with `make` whenever the pool runs dry.
    pub fn new(capacity: usize, make: fn() -> T) -> Self {
        Self {
            idle: ArrayQueue::new(capacity.max(1)),
            make,
        }
    }

    /// Checks out an object, building a fresh one if none is idle.
    pub fn get(&self) -> Pooled<'_, T> {
        let item = self.idle.pop().unwrap_or_else(self.make);
        Pooled {
            pool: self,
            item: Some(item),
        }
    }

    /// Amount of objects waiting to be checked out
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    fn checkin(&self, mut item: T) {
        item.recycle();
        // a full pool just drops the object
        let _ = self.idle.push(item);
    }
}

/// An object checked out of a [`Pool`], returned to it on drop.
pub struct Pooled<'a, T: Recycle> {
    pool: &'a Pool<T>,
    item: Option<T>,
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // only taken out in `drop`
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.checkin(item);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fallible_encode(pool: &Pool<Vec<u8>>, fail: bool) -> Result<usize, &'static str> {
        let mut buf = pool.get();
        buf.extend_from_slice(b"dogglesworth");
        if fail {
            return Err("encoding failed");
        }
        Ok(buf.len())
    }

    #[test]
    fn objects_are_returned_on_drop() {
        let pool = Pool::new(4, Vec::new);
        assert_eq!(pool.idle(), 0);
        {
            let mut a = pool.get();
            let _b = pool.get();
            a.push(1);
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 2);
        // recycled buffers come back empty
        assert!(pool.get().is_empty());
    }

    #[test]
    fn objects_are_returned_on_error_paths() {
        let pool = Pool::new(2, Vec::new);
        assert_eq!(fallible_encode(&pool, false), Ok(12));
        assert_eq!(fallible_encode(&pool, true), Err("encoding failed"));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn objects_are_returned_on_panic() {
        let pool = Pool::new(2, Vec::new);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _buf = pool.get();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn pool_never_exceeds_capacity() {
        let pool = Pool::new(1, Vec::new);
        {
            let _a = pool.get();
            let _b = pool.get();
        }
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn oversized_buffers_are_shrunk() {
        let pool = Pool::new(1, Vec::new);
        {
            let mut buf = pool.get();
            buf.resize(MAX_POOLED_BUFFER * 2, 0);
        }
        assert!(pool.get().capacity() <= MAX_POOLED_BUFFER);
    }
}
