//! Arc-based byte storage with explicit ownership for tensor buffers.
//!
//! A storage is shared between a tensor and the views derived from it. Who releases
//! the memory is recorded once, at construction, in an [`Ownership`] tag.

use std::{alloc::Layout, ptr::NonNull, sync::Arc};

use crate::allocator::{TensorAllocator, TensorAllocatorError};

/// Who is responsible for releasing a tensor buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Allocated by this system; released through the allocator on drop.
    Owned,
    /// Caller-provided memory; never released by the tensor.
    Borrowed,
    /// Allocated from an arena; released when the arena is torn down.
    ArenaScoped,
}

/// Inner storage implementation that holds the actual memory.
struct StorageImpl<A: TensorAllocator> {
    /// The pointer to the tensor memory which must be non-null.
    ptr: NonNull<u8>,
    /// The total length of the buffer in bytes.
    len: usize,
    /// The memory layout used for allocation.
    layout: Layout,
    /// The allocator that produced the memory.
    alloc: A,
    /// Release policy of the buffer.
    ownership: Ownership,
}

// SAFETY: the raw buffer is plain data; mutation requires exclusive access to the
// storage (see `TensorStorage::as_bytes_mut`).
unsafe impl<A: TensorAllocator> Send for StorageImpl<A> {}

// SAFETY: shared access only hands out immutable byte slices.
unsafe impl<A: TensorAllocator> Sync for StorageImpl<A> {}

impl<A: TensorAllocator> Drop for StorageImpl<A> {
    fn drop(&mut self) {
        if self.ownership == Ownership::Owned && self.layout.size() > 0 {
            self.alloc.dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

/// Reference-counted byte buffer backing one or more tensors.
///
/// Clones are cheap and share the same memory. Mutable access is only granted to a
/// storage that is not shared with any other handle.
pub struct TensorStorage<A: TensorAllocator> {
    inner: Arc<StorageImpl<A>>,
}

impl<A: TensorAllocator> TensorStorage<A> {
    /// Allocates a zero-filled buffer of `len` bytes aligned to `align`.
    ///
    /// Zero-length buffers perform no allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout is invalid or the allocator fails.
    pub fn new_zeroed(len: usize, align: usize, alloc: A) -> Result<Self, TensorAllocatorError> {
        let layout =
            Layout::from_size_align(len, align).map_err(TensorAllocatorError::LayoutError)?;

        let ptr = if len == 0 {
            NonNull::dangling()
        } else {
            let raw = alloc.alloc(layout)?;
            let ptr = NonNull::new(raw).ok_or(TensorAllocatorError::NullPointer)?;
            // SAFETY: the allocation is `len` bytes long.
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
            ptr
        };

        let ownership = if alloc.is_scoped() {
            Ownership::ArenaScoped
        } else {
            Ownership::Owned
        };

        Ok(Self {
            inner: Arc::new(StorageImpl {
                ptr,
                len,
                layout,
                alloc,
                ownership,
            }),
        })
    }

    /// Allocates a buffer holding a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocation fails.
    pub fn from_bytes(bytes: &[u8], align: usize, alloc: A) -> Result<Self, TensorAllocatorError> {
        let mut storage = Self::new_zeroed(bytes.len(), align, alloc)?;
        if let Some(dst) = storage.as_bytes_mut() {
            dst.copy_from_slice(bytes);
        }
        Ok(storage)
    }

    /// Wraps caller-owned memory without taking ownership of it.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `ptr` is valid for reads and writes of `len` bytes
    /// - `ptr` is aligned to `align`
    /// - the memory outlives the storage and every clone of it
    /// - nothing else accesses the memory while the storage is mutated
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize, align: usize, alloc: A) -> Self {
        let ptr = NonNull::new(ptr).unwrap_or(NonNull::dangling());
        Self {
            inner: Arc::new(StorageImpl {
                ptr,
                len,
                layout: Layout::from_size_align_unchecked(len, align),
                alloc,
                ownership: Ownership::Borrowed,
            }),
        }
    }

    /// Returns the pointer to the buffer.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.inner.ptr.as_ptr()
    }

    /// Returns the buffer as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: ptr is valid for `len` initialized bytes for the storage lifetime.
        unsafe { std::slice::from_raw_parts(self.inner.ptr.as_ptr(), self.inner.len) }
    }

    /// Returns the buffer as a mutable byte slice, or `None` if the storage is
    /// shared with another handle.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> Option<&mut [u8]> {
        if !self.is_unique() {
            return None;
        }
        // SAFETY: the storage is uniquely referenced and borrowed mutably.
        Some(unsafe { std::slice::from_raw_parts_mut(self.inner.ptr.as_ptr(), self.inner.len) })
    }

    /// Returns the number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Returns true if the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Returns the release policy of the buffer.
    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.inner.ownership
    }

    /// Returns the allocator that produced the buffer.
    #[inline]
    pub fn alloc(&self) -> &A {
        &self.inner.alloc
    }

    /// Returns true if no other handle references this storage.
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

impl<A: TensorAllocator> Clone for TensorStorage<A> {
    /// Creates a cheap clone by incrementing the Arc reference count.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: TensorAllocator> std::fmt::Debug for TensorStorage<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorStorage")
            .field("ptr", &self.inner.ptr)
            .field("len", &self.inner.len)
            .field("ownership", &self.inner.ownership)
            .field("is_unique", &self.is_unique())
            .finish()
    }
}
