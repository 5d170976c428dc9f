//! Per-core scratch slot ring
//!
//! A [`SlotQueue`] owns `slots` preallocated scratch buffers. A slot moves
//! through `alloc -> enque -> deque -> free`, and each step hands out a
//! move-only token, so a slot cannot be filled twice or read while it is
//! being filled. Dropping a token returns its buffer to the free list, so no
//! slot leaks on an early error return.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use crate::error::{LayoutError, Result};

/// Bounded ring of scratch slots for one core
#[derive(Debug)]
pub struct SlotQueue<T> {
    free: RefCell<VecDeque<Vec<T>>>,
    ready: RefCell<VecDeque<Vec<T>>>,
    slots: usize,
    slot_len: usize,
}

impl<T: Copy + Default> SlotQueue<T> {
    /// Allocate `slots` buffers of `slot_len` elements up front
    #[must_use]
    pub fn new(slots: usize, slot_len: usize) -> Self {
        let slots = slots.max(1);
        let free = (0..slots).map(|_| vec![T::default(); slot_len]).collect();
        Self {
            free: RefCell::new(free),
            ready: RefCell::new(VecDeque::with_capacity(slots)),
            slots,
            slot_len,
        }
    }
}

impl<T> SlotQueue<T> {
    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    pub fn free_slots(&self) -> usize {
        self.free.borrow().len()
    }

    pub fn ready_slots(&self) -> usize {
        self.ready.borrow().len()
    }

    /// Take a free slot for filling
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::SlotExhausted`] when every slot is filled or
    /// waiting to be drained.
    pub fn alloc(&self) -> Result<FillSlot<'_, T>> {
        let buf = self
            .free
            .borrow_mut()
            .pop_front()
            .ok_or(LayoutError::SlotExhausted(self.slots))?;
        Ok(FillSlot {
            queue: self,
            buf: Some(buf),
        })
    }

    /// Take the oldest filled slot for draining
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InnerNull`] when nothing has been enqueued.
    pub fn deque(&self) -> Result<DrainSlot<'_, T>> {
        let buf = self
            .ready
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| LayoutError::InnerNull("deque on empty slot queue".into()))?;
        Ok(DrainSlot {
            queue: self,
            buf: Some(buf),
        })
    }

    fn release(&self, buf: Vec<T>) {
        self.free.borrow_mut().push_back(buf);
    }
}

/// Write access to a slot between `alloc` and `enque`
#[derive(Debug)]
pub struct FillSlot<'q, T> {
    queue: &'q SlotQueue<T>,
    buf: Option<Vec<T>>,
}

impl<T> FillSlot<'_, T> {
    /// Hand the filled slot to the drain side
    pub fn enque(mut self) {
        if let Some(buf) = self.buf.take() {
            self.queue.ready.borrow_mut().push_back(buf);
        }
    }
}

impl<T> Deref for FillSlot<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl<T> DerefMut for FillSlot<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<T> Drop for FillSlot<'_, T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.queue.release(buf);
        }
    }
}

/// Read access to a filled slot; dropping it frees the slot
#[derive(Debug)]
pub struct DrainSlot<'q, T> {
    queue: &'q SlotQueue<T>,
    buf: Option<Vec<T>>,
}

impl<T> Deref for DrainSlot<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl<T> Drop for DrainSlot<'_, T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.queue.release(buf);
        }
    }
}

/// Push `items` through `queue`, filling up to `queue.slots()` ahead of the
/// drain so the load of item *i+1* overlaps the store of item *i*
///
/// Items drain in the order they were filled. The first error stops the
/// pipeline; outstanding slots return to the free list as their tokens drop.
pub fn pipeline<T, I, F, D>(queue: &SlotQueue<T>, items: I, mut fill: F, mut drain: D) -> Result<()>
where
    I: IntoIterator,
    F: FnMut(&I::Item, &mut [T]) -> Result<()>,
    D: FnMut(&I::Item, &[T]) -> Result<()>,
{
    let mut in_flight = VecDeque::with_capacity(queue.slots());
    for item in items {
        if queue.free_slots() == 0 {
            if let Some(oldest) = in_flight.pop_front() {
                let slot = queue.deque()?;
                drain(&oldest, &slot)?;
            }
        }
        let mut slot = queue.alloc()?;
        fill(&item, &mut slot)?;
        slot.enque();
        in_flight.push_back(item);
    }
    while let Some(item) = in_flight.pop_front() {
        let slot = queue.deque()?;
        drain(&item, &slot)?;
    }
    Ok(())
}
