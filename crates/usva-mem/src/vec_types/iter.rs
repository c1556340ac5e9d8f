use core::{
    marker::PhantomData,
    ptr::NonNull,
};

pub struct Iter<'a, T> {
    ptr: NonNull<T>,
    end: NonNull<T>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iter<'a, T> {

    #[inline(always)]
    pub(crate) fn new(ptr: NonNull<T>, end: NonNull<T>) -> Self {
        Self {
            ptr,
            end,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {

    type Item = &'a T;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.ptr == self.end {
            return None
        }
        let item = unsafe { &*self.ptr.as_ptr() };
        self.ptr = unsafe { self.ptr.add(1) };
        Some(item)
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = unsafe { self.end.as_ptr().offset_from(self.ptr.as_ptr()) as usize };
        (len, Some(len))
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}

pub struct IterMut<'a, T> {
    ptr: NonNull<T>,
    end: NonNull<T>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> IterMut<'a, T> {

    #[inline(always)]
    pub(crate) fn new(ptr: NonNull<T>, end: NonNull<T>) -> Self {
        Self {
            ptr,
            end,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {

    type Item = &'a mut T;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.ptr == self.end {
            return None
        }
        let item = unsafe { &mut *self.ptr.as_ptr() };
        self.ptr = unsafe { self.ptr.add(1) };
        Some(item)
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = unsafe { self.end.as_ptr().offset_from(self.ptr.as_ptr()) as usize };
        (len, Some(len))
    }
}

impl<'a, T> ExactSizeIterator for IterMut<'a, T> {}
