use parking_lot::Mutex;

/// A typed free-list.
///
/// `get` pops a previously released value or builds a fresh one; `put`
/// releases a value back. Resetting released values is the caller's job and
/// must happen before `put`.
pub(crate) struct Pool<T> {
    items: Mutex<Vec<T>>,
    new: fn() -> T,
}

impl<T> Pool<T> {
    pub(crate) fn new(new: fn() -> T) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            new,
        }
    }

    pub(crate) fn get(&self) -> T {
        self.items.lock().pop().unwrap_or_else(self.new)
    }

    pub(crate) fn put(&self, item: T) {
        self.items.lock().push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reuses_released_values() {
        let pool: Pool<Vec<u8>> = Pool::new(|| Vec::with_capacity(128));
        let mut value = pool.get();
        value.extend_from_slice(b"abc");
        value.clear();
        pool.put(value);

        let reused = pool.get();
        assert!(reused.capacity() >= 128);
        assert!(reused.is_empty());
    }

    #[test]
    fn get_on_empty_pool_builds_fresh_values() {
        let pool: Pool<u32> = Pool::new(|| 7);
        assert_eq!(pool.get(), 7);
    }
}
