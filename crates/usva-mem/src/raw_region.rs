use core::{
    alloc::Layout,
    marker::PhantomData,
    mem,
    ptr::NonNull,
};

use std::alloc::{alloc, dealloc};

use crate::errors::CapacityError;

use CapacityError::{AllocFailed, MaxCapacityExceeded, ZeroSizedElement};

/// Exclusive owner of uninitialized storage for `capacity` elements.
///
/// The region never knows which slots hold live values. Dropping it only
/// releases the allocation; the owner must have dropped every live element
/// beforehand. There is no clone, duplicating raw bytes without replaying
/// construction would break every typed invariant downstream.
#[derive(Debug)]
pub struct RawRegion<T> {
    data: NonNull<T>,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T> RawRegion<T> {

    pub const fn empty() -> Self {
        Self {
            data: NonNull::dangling(),
            capacity: 0,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Ok(Self::empty())
        }
        if size_of::<T>() == 0 {
            return Err(ZeroSizedElement)
        }
        let layout = Layout::array::<T>(capacity)
            .map_err(|_| MaxCapacityExceeded {
                max_capacity: isize::MAX as usize / size_of::<T>(),
            })?;
        let ptr = unsafe { alloc(layout) };
        let data = NonNull::new(ptr.cast::<T>())
            .ok_or(AllocFailed { new_capacity: capacity })?;
        Ok(Self {
            data,
            capacity,
            _marker: PhantomData,
        })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn as_non_null(&self) -> NonNull<T> {
        self.data
    }

    /// Address of slot `offset`. One past the end is a valid address,
    /// anything further is a contract violation.
    #[inline(always)]
    pub unsafe fn ptr(&self, offset: usize) -> NonNull<T> {
        debug_assert!(offset <= self.capacity);
        unsafe { self.data.add(offset) }
    }

    #[inline(always)]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    #[inline(always)]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::empty())
    }
}

impl<T> Drop for RawRegion<T> {

    fn drop(&mut self) {
        if self.capacity == 0 {
            return
        }
        let layout = match Layout::array::<T>(self.capacity) {
            Ok(l) => l,
            Err(_) => return,
        };
        unsafe { dealloc(self.data.as_ptr().cast::<u8>(), layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_reserves_no_storage() {
        let region = RawRegion::<u64>::with_capacity(0).unwrap();
        assert_eq!(region.capacity(), 0);
    }

    #[test]
    fn zero_sized_elements_are_rejected() {
        let err = RawRegion::<()>::with_capacity(4).unwrap_err();
        assert!(matches!(err, CapacityError::ZeroSizedElement));
    }

    #[test]
    fn slots_are_addressable_through_capacity() {
        let region = RawRegion::<u32>::with_capacity(3).unwrap();
        unsafe {
            for i in 0..3 {
                region.ptr(i).write(i as u32 * 10);
            }
            for i in 0..3 {
                assert_eq!(region.ptr(i).read(), i as u32 * 10);
            }
            // one past the end is a valid address
            let _ = region.ptr(3);
        }
    }

    #[test]
    fn swap_exchanges_ownership() {
        let mut a = RawRegion::<u32>::with_capacity(4).unwrap();
        let mut b = RawRegion::<u32>::empty();
        a.swap(&mut b);
        assert_eq!(a.capacity(), 0);
        assert_eq!(b.capacity(), 4);
    }

    #[test]
    fn take_leaves_the_empty_region() {
        let mut a = RawRegion::<u32>::with_capacity(2).unwrap();
        let b = a.take();
        assert_eq!(a.capacity(), 0);
        assert_eq!(b.capacity(), 2);
    }
}
