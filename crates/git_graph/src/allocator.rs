/// A free-list over rendering lanes.
///
/// Lanes are small non-negative integers. Reuse is last-in-first-out so that
/// a branch closing and another opening nearby land on the same column,
/// keeping horizontal churn local. Releasing the highest lane shrinks the
/// frontier instead of free-listing, so the frontier never fragments.
#[derive(Debug, Default)]
pub struct ColumnAllocator {
    released: Vec<usize>,
    next_fresh: usize,
    high_water: usize,
}

impl ColumnAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently released lane, or a fresh one.
    pub fn acquire(&mut self) -> usize {
        if let Some(lane) = self.released.pop() {
            lane
        } else {
            let lane = self.next_fresh;
            self.next_fresh += 1;
            self.high_water = self.high_water.max(self.next_fresh);
            lane
        }
    }

    /// Returns `lane` to the pool. Callers only release lanes they acquired
    /// and have not released since.
    pub fn release(&mut self, lane: usize) {
        if lane + 1 == self.next_fresh {
            self.next_fresh -= 1;
        } else {
            self.released.push(lane);
        }
    }

    /// One past the highest lane currently allocated fresh. Every lane held
    /// by a live commit is below this.
    pub fn frontier(&self) -> usize {
        self.next_fresh
    }

    /// The largest number of lanes ever simultaneously allocated.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Clears all state, ready for the next layout pass.
    pub fn reset(&mut self) {
        self.released.clear();
        self.next_fresh = 0;
        self.high_water = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::ColumnAllocator;

    #[test]
    fn fresh_lanes_count_up() {
        let mut allocator = ColumnAllocator::new();
        assert_eq!(allocator.acquire(), 0);
        assert_eq!(allocator.acquire(), 1);
        assert_eq!(allocator.acquire(), 2);
        assert_eq!(allocator.high_water(), 3);
    }

    #[test]
    fn reuse_is_lifo() {
        let mut allocator = ColumnAllocator::new();
        for _ in 0..4 {
            allocator.acquire();
        }
        allocator.release(1);
        allocator.release(2);
        assert_eq!(allocator.acquire(), 2);
        assert_eq!(allocator.acquire(), 1);
        assert_eq!(allocator.high_water(), 4);
    }

    #[test]
    fn releasing_the_frontier_shrinks_instead_of_free_listing() {
        let mut allocator = ColumnAllocator::new();
        allocator.acquire();
        allocator.acquire();
        allocator.release(1);
        assert_eq!(allocator.frontier(), 1);
        // The next acquire mints lane 1 again rather than growing to 2.
        assert_eq!(allocator.acquire(), 1);
        assert_eq!(allocator.high_water(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut allocator = ColumnAllocator::new();
        allocator.acquire();
        allocator.acquire();
        allocator.release(0);
        allocator.reset();
        assert_eq!(allocator.frontier(), 0);
        assert_eq!(allocator.high_water(), 0);
        assert_eq!(allocator.acquire(), 0);
    }
}
