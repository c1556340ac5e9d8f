use core::{
    mem::{self, needs_drop},
    ops::{Deref, DerefMut, Index, IndexMut},
    ptr::{self, NonNull},
    slice,
};

use crate::{
    errors::CapacityError,
    raw_region::RawRegion,
};

use super::{Iter, IterMut};

/// Contiguous growable sequence over a [`RawRegion`].
///
/// Slots `[0, len)` hold live values, slots `[len, capacity)` are raw
/// storage. Every operation that can allocate returns a
/// [`CapacityError`] instead of aborting. Growth is transactional: the
/// new state is staged in a fresh region and only adopted once every
/// step has succeeded, so a failed grow leaves the container untouched.
#[derive(Debug)]
pub struct DynArray<T> {
    buf: RawRegion<T>,
    len: usize,
}

const _: () = assert!(size_of::<DynArray<u32>>() == size_of::<Option<DynArray<u32>>>());

impl<T> DynArray<T> {

    pub const fn new() -> Self {
        Self {
            buf: RawRegion::empty(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        Ok(Self {
            buf: RawRegion::with_capacity(capacity)?,
            len: 0,
        })
    }

    pub fn with_len(len: usize) -> Result<Self, CapacityError>
        where
            T: Default,
    {
        Self::with_len_with(len, T::default)
    }

    pub fn with_len_with<F>(len: usize, mut f: F) -> Result<Self, CapacityError>
        where
            F: FnMut() -> T,
    {
        let mut this = Self::with_capacity(len)?;
        for i in 0..len {
            unsafe { this.buf.ptr(i).write(f()) };
            // len tracks constructed slots so an unwinding `f` drops
            // exactly what was built
            this.len += 1;
        }
        Ok(this)
    }

    /// Deep copy with the region sized to `self.len()`. A panicking
    /// clone unwinds with all partial work dropped and the staged
    /// region freed.
    pub fn try_clone(&self) -> Result<Self, CapacityError>
        where
            T: Clone,
    {
        let mut copy = Self::with_capacity(self.len)?;
        unsafe { copy.extend_cloned(self.buf.as_non_null(), self.len) };
        Ok(copy)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> *const T {
        self.buf.as_non_null().as_ptr()
    }

    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buf.as_non_null().as_ptr()
    }

    #[inline(always)]
    pub fn as_non_null(&self) -> NonNull<T> {
        self.buf.as_non_null()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.buf.as_non_null().as_ptr(), self.len) }
    }

    /// Caller guarantees slots `[0, len)` are initialized.
    #[inline(always)]
    pub unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.buf.capacity());
        self.len = len;
    }

    pub fn reserve(&mut self, capacity: usize) -> Result<(), CapacityError> {
        if capacity <= self.buf.capacity() {
            return Ok(())
        }
        let mut new_buf = RawRegion::with_capacity(capacity)?;
        debug_assert!(self.len <= self.buf.capacity());
        unsafe {
            move_elements(self.buf.as_non_null(), new_buf.as_non_null(), self.len);
        }
        // commit point, the old region frees itself on scope exit
        self.buf.swap(&mut new_buf);
        Ok(())
    }

    pub fn resize(&mut self, len: usize) -> Result<(), CapacityError>
        where
            T: Default,
    {
        self.resize_with(len, T::default)
    }

    pub fn resize_with<F>(&mut self, len: usize, mut f: F) -> Result<(), CapacityError>
        where
            F: FnMut() -> T,
    {
        if len > self.buf.capacity() {
            self.reserve(len)?
        }
        if len > self.len {
            while self.len < len {
                unsafe { self.buf.ptr(self.len).write(f()) };
                self.len += 1;
            }
        }
        else if len < self.len {
            unsafe { drop_range(self.buf.ptr(len), self.len - len) };
            self.len = len;
        }
        Ok(())
    }

    #[inline(always)]
    pub fn push(&mut self, value: T) -> Result<&mut T, CapacityError> {
        self.push_with(move || value)
    }

    /// In-place construction from a closure. On the growth path the new
    /// element is written into the staged region before anything else
    /// moves, so a panicking `f` leaves the container exactly as it was.
    pub fn push_with<F>(&mut self, f: F) -> Result<&mut T, CapacityError>
        where
            F: FnOnce() -> T,
    {
        if self.len == self.buf.capacity() {
            return self.grow_push(f)
        }
        let ptr = unsafe { self.buf.ptr(self.len) };
        unsafe { ptr.write(f()) };
        self.len += 1;
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    fn grow_push<F>(&mut self, f: F) -> Result<&mut T, CapacityError>
        where
            F: FnOnce() -> T,
    {
        let mut new_buf = RawRegion::with_capacity(grown_capacity(self.len))?;
        let ptr = unsafe { new_buf.ptr(self.len) };
        unsafe { ptr.write(f()) };
        unsafe {
            move_elements(self.buf.as_non_null(), new_buf.as_non_null(), self.len);
        }
        self.buf.swap(&mut new_buf);
        self.len += 1;
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None
        }
        self.len -= 1;
        Some(unsafe { self.buf.ptr(self.len).read() })
    }

    #[inline(always)]
    pub fn back(&self) -> Option<&T> {
        if self.len == 0 {
            None
        }
        else {
            unsafe { Some(&*self.buf.ptr(self.len - 1).as_ptr()) }
        }
    }

    #[inline(always)]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        if self.len == 0 {
            None
        }
        else {
            unsafe { Some(&mut *self.buf.ptr(self.len - 1).as_ptr()) }
        }
    }

    pub fn insert(&mut self, value: T, index: usize) -> Result<&mut T, CapacityError> {
        if index > self.len {
            panic!("index {} was out of bounds with len {} when inserting", index, self.len)
        }
        if index == self.len {
            return self.push(value)
        }
        if self.len == self.buf.capacity() {
            return self.grow_insert(value, index)
        }
        unsafe {
            let ptr = self.buf.ptr(index);
            // overlapping shift right by one, then overwrite the hole
            ptr::copy(ptr.as_ptr(), ptr.as_ptr().add(1), self.len - index);
            ptr.write(value);
            self.len += 1;
            Ok(&mut *ptr.as_ptr())
        }
    }

    fn grow_insert(&mut self, value: T, index: usize) -> Result<&mut T, CapacityError> {
        let mut new_buf = RawRegion::with_capacity(grown_capacity(self.len))?;
        let ptr = unsafe { new_buf.ptr(index) };
        unsafe {
            ptr.write(value);
            move_elements(self.buf.as_non_null(), new_buf.as_non_null(), index);
            move_elements(self.buf.ptr(index), new_buf.ptr(index + 1), self.len - index);
        }
        self.buf.swap(&mut new_buf);
        self.len += 1;
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            debug_assert!(false, "index {} was out of bounds with len {} when removing", index, self.len);
            return None
        }
        unsafe {
            let ptr = self.buf.ptr(index);
            let removed = ptr.read();
            ptr::copy(ptr.as_ptr().add(1), ptr.as_ptr(), self.len - index - 1);
            self.len -= 1;
            Some(removed)
        }
    }

    #[inline(always)]
    pub fn swap_remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            debug_assert!(false, "index {} was out of bounds with len {} when removing", index, self.len);
            return None
        }
        unsafe {
            let removed = self.buf.ptr(index).read();
            self.len -= 1;
            if index != self.len {
                self.buf.ptr(index).write(self.buf.ptr(self.len).read());
            }
            Some(removed)
        }
    }

    pub fn clear(&mut self) {
        unsafe { drop_range(self.buf.as_non_null(), self.len) };
        self.len = 0;
    }

    /// Reuses existing storage where possible; only a source longer than
    /// the current capacity triggers a full staged copy.
    pub fn clone_from(&mut self, source: &Self) -> Result<(), CapacityError>
        where
            T: Clone,
    {
        if source.len > self.buf.capacity() {
            *self = source.try_clone()?;
            return Ok(())
        }
        let src = source.buf.as_non_null();
        let overlap = self.len.min(source.len);
        for i in 0..overlap {
            unsafe {
                (*self.buf.ptr(i).as_ptr()).clone_from(&*src.add(i).as_ptr());
            }
        }
        if source.len < self.len {
            unsafe { drop_range(self.buf.ptr(source.len), self.len - source.len) };
            self.len = source.len;
        }
        else {
            unsafe { self.extend_cloned(src.add(self.len), source.len - self.len) };
        }
        Ok(())
    }

    /// Moves this container's state out, leaving it at len 0, capacity 0.
    #[inline(always)]
    pub fn take(&mut self) -> Self {
        Self {
            buf: self.buf.take(),
            len: mem::replace(&mut self.len, 0),
        }
    }

    #[inline(always)]
    pub fn swap(&mut self, other: &mut Self) {
        self.buf.swap(&mut other.buf);
        mem::swap(&mut self.len, &mut other.len);
    }

    pub fn contains(&self, value: &T) -> bool
        where
            T: PartialEq,
    {
        self.as_slice().contains(value)
    }

    #[inline(always)]
    pub fn iter(&self) -> Iter<'_, T> {
        unsafe {
            let ptr = self.buf.as_non_null();
            let end = ptr.add(self.len);
            Iter::new(ptr, end)
        }
    }

    #[inline(always)]
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        unsafe {
            let ptr = self.buf.as_non_null();
            let end = ptr.add(self.len);
            IterMut::new(ptr, end)
        }
    }

    // clones `count` elements starting at `from` onto the end of self;
    // caller guarantees spare capacity for them. len is bumped per
    // element so an unwinding clone leaves self valid.
    unsafe fn extend_cloned(&mut self, from: NonNull<T>, count: usize)
        where
            T: Clone,
    {
        for i in 0..count {
            let value = unsafe { (*from.add(i).as_ptr()).clone() };
            unsafe { self.buf.ptr(self.len).write(value) };
            self.len += 1;
        }
    }
}

impl<T> Default for DynArray<T> {

    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for DynArray<T> {

    fn drop(&mut self) {
        unsafe { drop_range(self.buf.as_non_null(), self.len) };
    }
}

impl<T> Index<usize> for DynArray<T> {

    type Output = T;

    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        if index >= self.len {
            panic!("index {} out of bounds for length {}", index, self.len)
        }
        unsafe { &*self.buf.ptr(index).as_ptr() }
    }
}

impl<T> IndexMut<usize> for DynArray<T> {

    #[inline(always)]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        if index >= self.len {
            panic!("index {} out of bounds for length {}", index, self.len)
        }
        unsafe { &mut *self.buf.ptr(index).as_ptr() }
    }
}

impl<T> AsRef<[T]> for DynArray<T> {

    #[inline(always)]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> AsMut<[T]> for DynArray<T> {

    #[inline(always)]
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Deref for DynArray<T> {

    type Target = [T];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for DynArray<T> {

    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<'vec, T> IntoIterator for &'vec DynArray<T> {

    type Item = &'vec T;
    type IntoIter = Iter<'vec, T>;

    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'vec, T> IntoIterator for &'vec mut DynArray<T> {

    type Item = &'vec mut T;
    type IntoIter = IterMut<'vec, T>;

    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[inline(always)]
fn grown_capacity(len: usize) -> usize {
    if len == 0 { 1 } else { len * 2 }
}

// relocation between regions is a bitwise move and cannot fail; failure
// paths exist only where clones run
#[inline(always)]
unsafe fn move_elements<T>(from: NonNull<T>, to: NonNull<T>, len: usize) {
    unsafe { ptr::copy_nonoverlapping(from.as_ptr(), to.as_ptr(), len) };
}

unsafe fn drop_range<T>(ptr: NonNull<T>, len: usize) {
    if !needs_drop::<T>() {
        return
    }
    for i in 0..len {
        unsafe { ptr.add(i).drop_in_place() };
    }
}
