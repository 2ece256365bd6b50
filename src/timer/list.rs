use std::time::Instant;

/// Opaque handle to a timer in a [`TimerList`].
///
/// Handles carry a generation, so a handle whose timer already fired or was
/// removed never refers to a timer inserted later into the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node<T> {
    deadline: Instant,
    payload: T,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    node: Option<Node<T>>,
}

/// Doubly linked list of timers sorted by ascending deadline.
///
/// Nodes live in an arena owned by the list; links are arena indices. Timers
/// with equal deadlines keep their insertion order.
#[derive(Debug)]
pub struct TimerList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> TimerList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Deadline of the earliest timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.head.map(|idx| self.node(idx).deadline)
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.get(id).is_some()
    }

    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.get(id).map(|node| node.deadline)
    }

    /// Adds a timer and returns its handle.
    ///
    /// Prepending an earlier deadline is O(1); otherwise the list is scanned
    /// from the head for the first later deadline.
    pub fn insert(&mut self, deadline: Instant, payload: T) -> TimerId {
        let node = Node {
            deadline,
            payload,
            prev: None,
            next: None,
        };
        let id = self.alloc(node);

        match self.head {
            None => {
                self.head = Some(id.index);
                self.tail = Some(id.index);
            }
            Some(head) if deadline < self.node(head).deadline => self.link_before(id.index, head),
            Some(head) => self.link_after_scan(id.index, head),
        }

        self.len += 1;
        id
    }

    /// Moves a timer to `deadline`.
    ///
    /// Nothing is relinked while the timer still sorts between its
    /// neighbours. A later deadline re-inserts it by scanning forward from
    /// its old successor, an earlier one by scanning from the head.
    /// Returns `false` for a stale handle.
    pub fn reschedule(&mut self, id: TimerId, deadline: Instant) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        node.deadline = deadline;
        let (prev, next) = (node.prev, node.next);

        if let Some(next) = next {
            if deadline > self.node(next).deadline {
                self.unlink(id.index);
                self.link_after_scan(id.index, next);
                return true;
            }
        }

        if let Some(prev) = prev {
            if deadline < self.node(prev).deadline {
                self.unlink(id.index);
                match self.head {
                    Some(head) if deadline >= self.node(head).deadline => {
                        self.link_after_scan(id.index, head);
                    }
                    Some(head) => self.link_before(id.index, head),
                    None => {
                        self.head = Some(id.index);
                        self.tail = Some(id.index);
                    }
                }
            }
        }

        true
    }

    /// Detaches a timer in O(1) and returns its payload.
    ///
    /// Returns `None` for a stale handle. The caller drops its own copy of
    /// the handle.
    pub fn remove(&mut self, id: TimerId) -> Option<T> {
        self.get(id)?;
        self.unlink(id.index);
        self.len -= 1;
        self.release(id.index)
    }

    /// Fires every timer whose deadline is at or before `now`.
    ///
    /// Expired timers are unlinked and freed in ascending deadline order and
    /// their payloads handed to `on_expire`. The walk stops at the first
    /// future deadline; the remaining timers are untouched. Returns the
    /// number of timers fired.
    pub fn sweep<F>(&mut self, now: Instant, mut on_expire: F) -> usize
    where
        F: FnMut(T),
    {
        let mut fired = 0;
        while let Some(head) = self.head {
            if self.node(head).deadline > now {
                break;
            }
            self.unlink(head);
            self.len -= 1;
            if let Some(payload) = self.release(head) {
                on_expire(payload);
                fired += 1;
            }
        }
        fired
    }

    /// Timers in deadline order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn alloc(&mut self, node: Node<T>) -> TimerId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                TimerId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                TimerId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Frees an unlinked node's slot and returns its payload.
    ///
    /// A vacant slot is left alone and yields `None`.
    fn release(&mut self, index: usize) -> Option<T> {
        let slot = &mut self.slots[index];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Some(node.payload)
    }

    fn get(&self, id: TimerId) -> Option<&Node<T>> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: TimerId) -> Option<&mut Node<T>> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    // `head`, `tail` and every `prev`/`next` only ever name occupied slots:
    // a node is unlinked before `release` vacates its slot, and freshly
    // allocated nodes are linked before anything can point at them.
    fn node(&self, index: usize) -> &Node<T> {
        match self.slots[index].node.as_ref() {
            Some(node) => node,
            None => unreachable!("link to a vacant timer slot"),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        match self.slots[index].node.as_mut() {
            Some(node) => node,
            None => unreachable!("link to a vacant timer slot"),
        }
    }

    /// Splices `index` immediately before the linked node `at`.
    fn link_before(&mut self, index: usize, at: usize) {
        let prev = self.node(at).prev;
        {
            let node = self.node_mut(index);
            node.prev = prev;
            node.next = Some(at);
        }
        self.node_mut(at).prev = Some(index);
        match prev {
            Some(prev) => self.node_mut(prev).next = Some(index),
            None => self.head = Some(index),
        }
    }

    /// Splices `index` before the first node after `start` with a later
    /// deadline, or at the tail when there is none.
    ///
    /// `start` must be linked and must not sort after `index`.
    fn link_after_scan(&mut self, index: usize, start: usize) {
        let deadline = self.node(index).deadline;
        let mut prev = start;
        let mut cursor = self.node(start).next;

        while let Some(current) = cursor {
            if deadline < self.node(current).deadline {
                self.link_before(index, current);
                return;
            }
            prev = current;
            cursor = self.node(current).next;
        }

        {
            let node = self.node_mut(index);
            node.prev = Some(prev);
            node.next = None;
        }
        self.node_mut(prev).next = Some(index);
        self.tail = Some(index);
    }

    /// Detaches a linked node, relinking its neighbours.
    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let node = self.node_mut(index);
            (node.prev.take(), node.next.take())
        };

        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
    }
}

impl<T> Default for TimerList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over `(handle, deadline, payload)` in deadline order.
#[derive(Debug)]
pub struct Iter<'a, T> {
    list: &'a TimerList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (TimerId, Instant, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = self.list.node(index);
        self.cursor = node.next;
        let id = TimerId {
            index,
            generation: self.list.slots[index].generation,
        };
        Some((id, node.deadline, &node.payload))
    }
}
