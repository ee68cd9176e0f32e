//! Ordered index pool with "take the k-th remaining element" removal.
//!
//! The pool is a fixed arena over `[0, D)`: a presence bitmap plus a Fenwick
//! tree of presence counts. Removing a node only clears its bit and
//! decrements the tree, so there are no links to repair and nothing is freed
//! until the whole pool is dropped at the end of a matrix build.

#[derive(Debug)]
pub struct NodePool {
    present: Vec<bool>,
    /// 1-indexed Fenwick tree over `present`
    tree: Vec<u32>,
    remaining: usize,
    /// Highest power of two <= len, for the k-th descent
    top_bit: usize,
}

impl NodePool {
    /// Pool holding every index in `[0, size)`.
    pub fn new(size: usize) -> Self {
        let mut tree = vec![0u32; size + 1];
        for i in 1..=size {
            tree[i] += 1;
            let parent = i + (i & i.wrapping_neg());
            if parent <= size {
                tree[parent] += tree[i];
            }
        }
        let top_bit = if size == 0 {
            0
        } else {
            1usize << (usize::BITS - 1 - size.leading_zeros())
        };
        Self {
            present: vec![true; size],
            tree,
            remaining: size,
            top_bit,
        }
    }

    /// Number of indices still in the pool.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Remove and return the `k`-th (0-based, ascending) remaining index.
    pub fn take(&mut self, k: usize) -> Option<usize> {
        if k >= self.remaining {
            return None;
        }
        let index = self.find_kth(k);
        self.present[index] = false;
        let mut i = index + 1;
        while i < self.tree.len() {
            self.tree[i] -= 1;
            i += i & i.wrapping_neg();
        }
        self.remaining -= 1;
        Some(index)
    }

    /// Remove and return the only remaining index.
    pub fn take_last(&mut self) -> Option<usize> {
        if self.remaining == 1 {
            self.take(0)
        } else {
            None
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.present.get(index).copied().unwrap_or(false)
    }

    fn find_kth(&self, k: usize) -> usize {
        // Largest position whose prefix count is <= k; the answer is the next slot.
        let mut pos = 0usize;
        let mut rest = k as u32;
        let mut step = self.top_bit;
        while step > 0 {
            let next = pos + step;
            if next < self.tree.len() && self.tree[next] <= rest {
                pos = next;
                rest -= self.tree[next];
            }
            step >>= 1;
        }
        pos
    }
}
