//! Boundary of the region of a convex cell that is removed by a clipping
//! plane.
//!
//! The vertices clipped away by a plane form a topological disk in the dual
//! triangulation of the cell (each vertex is a triangle of three half
//! spaces). Walking around that disk yields the cyclic sequence of half
//! spaces that will border the new face.

/// A cycle of half space indices, stored as a successor table.
///
/// An index `i` is part of the cycle iff `next[i] != i`.
#[derive(Clone, Debug)]
pub struct SimpleCycle {
    next: Vec<usize>,
    start: usize,
    pub len: usize,
}

impl SimpleCycle {
    pub fn new(capacity: usize) -> Self {
        Self {
            next: (0..capacity).collect(),
            start: 0,
            len: 0,
        }
    }

    /// Make room for one more half space index.
    pub fn grow(&mut self) {
        self.next.push(self.next.len());
    }

    /// Reset the cycle to the triangle `a -> b -> c -> a`.
    pub fn init(&mut self, a: usize, b: usize, c: usize) {
        let mut current = self.start;
        for _ in 0..self.len {
            let next = self.next[current];
            self.next[current] = current;
            current = next;
        }
        self.len = 3;
        self.start = a;
        self.next[a] = b;
        self.next[b] = c;
        self.next[c] = a;
    }

    fn contains(&self, idx: usize) -> bool {
        self.next[idx] != idx
    }

    /// Try to grow the disk bounded by this cycle with the triangle `(a, b, c)`.
    ///
    /// The triangle must share an edge with the cycle. Returns `false` if the
    /// triangle cannot be attached (yet).
    pub fn try_extend(&mut self, a: usize, b: usize, c: usize) -> bool {
        let tri = [a, b, c];
        let contained = [self.contains(a), self.contains(b), self.contains(c)];
        for i in 0..3 {
            let j = (i + 1) % 3;
            let k = (i + 2) % 3;

            //      A                                       A
            //     / \     +                     =         / \
            //    B - C       - E - B - C - D -     - E - B   C - D -
            if !contained[i] && contained[j] && contained[k] && self.next[tri[k]] == tri[j] {
                self.next[tri[k]] = tri[i];
                self.next[tri[i]] = tri[j];
                self.len += 1;
                return true;
            }
            //      A       - D - A             - D - A
            //     / \   +       /           =         \
            //    B - C         B - C - E -             C - E -
            if contained[i]
                && contained[j]
                && contained[k]
                && self.next[tri[k]] == tri[j]
                && self.next[tri[j]] == tri[i]
            {
                self.next[tri[k]] = tri[i];
                self.next[tri[j]] = tri[j];
                if self.start == tri[j] {
                    self.start = tri[i];
                }
                self.len -= 1;
                return true;
            }
        }

        false
    }

    /// Endless iterator over the cycle, starting at an arbitrary element.
    pub fn iter(&self) -> CycleIter<'_> {
        CycleIter {
            cycle: self,
            next: self.start,
        }
    }
}

pub struct CycleIter<'a> {
    cycle: &'a SimpleCycle,
    next: usize,
}

impl Iterator for CycleIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next;
        self.next = self.cycle.next[current];
        Some(current)
    }
}
