use crate::conn::Connection;

enum Slot {
    Free(i64),
    Used(Connection),
}

/// O(1) allocate/free registry of `Connection`s by index, with a free-list
/// threaded through unused slots. Grows on demand rather than preallocating
/// a fixed capacity: this engine has no benchmark-driven reason to
/// preallocate six figures of connection slots up front.
pub struct ConnectionSlab {
    entries: Vec<Slot>,
    head_free: i64,
    active_count: usize,
}

impl Default for ConnectionSlab {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSlab {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            head_free: -1,
            active_count: 0,
        }
    }

    fn grow(&mut self, additional: usize) {
        let start = self.entries.len();
        self.entries.reserve(additional);
        for i in start..start + additional {
            let next = if i + 1 < start + additional {
                (i + 1) as i64
            } else {
                self.head_free
            };
            self.entries.push(Slot::Free(next));
        }
        self.head_free = start as i64;
    }

    /// O(1) allocation: returns the index the connection now lives at.
    pub fn allocate(&mut self, conn: Connection) -> usize {
        if self.head_free == -1 {
            let additional = (self.entries.len() / 2).max(64);
            self.grow(additional);
        }
        let idx = self.head_free as usize;
        let next = match &self.entries[idx] {
            Slot::Free(n) => *n,
            Slot::Used(_) => unreachable!("free list pointed at a used slot"),
        };
        self.head_free = next;
        self.entries[idx] = Slot::Used(conn);
        self.active_count += 1;
        idx
    }

    /// O(1) deallocation. Returns the removed connection, or `None` if
    /// `index` was out of range or already free.
    pub fn free(&mut self, index: usize) -> Option<Connection> {
        if index >= self.entries.len() || matches!(self.entries[index], Slot::Free(_)) {
            return None;
        }
        let old = std::mem::replace(&mut self.entries[index], Slot::Free(self.head_free));
        self.head_free = index as i64;
        self.active_count -= 1;
        match old {
            Slot::Used(conn) => Some(conn),
            Slot::Free(_) => unreachable!(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Connection> {
        match self.entries.get(index) {
            Some(Slot::Used(c)) => Some(c),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Connection> {
        match self.entries.get_mut(index) {
            Some(Slot::Used(c)) => Some(c),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.active_count
    }

    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Connection)> {
        self.entries.iter().enumerate().filter_map(|(i, s)| match s {
            Slot::Used(c) => Some((i, c)),
            Slot::Free(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_free_reuse_the_freed_slot_first() {
        let mut slab = ConnectionSlab::new();

        let idx1 = slab.allocate(Connection::new(100, 0));
        let idx2 = slab.allocate(Connection::new(101, 0));
        assert_ne!(idx1, idx2);
        assert_eq!(slab.len(), 2);

        slab.free(idx1);
        assert_eq!(slab.len(), 1);
        assert!(slab.get(idx1).is_none());

        let idx3 = slab.allocate(Connection::new(102, 0));
        assert_eq!(idx3, idx1, "freed slot should be reused first");
        assert_eq!(slab.get(idx3).unwrap().fd, 102);
    }

    #[test]
    fn double_free_is_a_no_op() {
        let mut slab = ConnectionSlab::new();
        let idx = slab.allocate(Connection::new(1, 0));
        assert!(slab.free(idx).is_some());
        assert!(slab.free(idx).is_none());
        assert_eq!(slab.len(), 0);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut slab = ConnectionSlab::new();
        let mut indices = Vec::new();
        for i in 0..200 {
            indices.push(slab.allocate(Connection::new(i, 0)));
        }
        assert_eq!(slab.len(), 200);
        assert!(slab.capacity() >= 200);
    }
}
