//! Fixed-size recycling pool for helper evaluators.

/// Borrowed reference to an item owned by an [`InstancePool`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PoolHandle(usize);

impl PoolHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owns every helper for its whole lifetime and hands out handles.
///
/// Acquire pops the most recently freed helper. Exhaustion is not an error:
/// callers fall back to a hard switch or skip the overlay.
#[derive(Debug)]
pub struct InstancePool<T> {
    items: Vec<T>,
    free: Vec<usize>,
    in_use: Vec<bool>,
}

impl<T> Default for InstancePool<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
            in_use: Vec::new(),
        }
    }
}

impl<T> InstancePool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-built helper; it starts out free.
    pub fn add(&mut self, item: T) -> PoolHandle {
        let index = self.items.len();
        self.items.push(item);
        self.in_use.push(false);
        self.free.push(index);
        PoolHandle(index)
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        !self.free.is_empty()
    }

    pub fn try_acquire(&mut self) -> Option<PoolHandle> {
        let index = self.free.pop()?;
        self.in_use[index] = true;
        Some(PoolHandle(index))
    }

    /// Return a helper to the free list. The caller stops it first.
    pub fn release(&mut self, handle: PoolHandle) {
        match self.in_use.get_mut(handle.0) {
            Some(flag) if *flag => {
                *flag = false;
                self.free.push(handle.0);
            }
            _ => debug_assert!(false, "release of a helper that is not in use"),
        }
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.items.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.items.get_mut(handle.0)
    }

    pub fn is_in_use(&self, handle: PoolHandle) -> bool {
        self.in_use.get(handle.0).copied().unwrap_or(false)
    }

    /// Every helper, free or in use.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.items.len() - self.free.len()
    }
}
