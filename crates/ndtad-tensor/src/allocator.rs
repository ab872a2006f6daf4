use std::alloc;
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// An error type for tensor allocator operations.
#[derive(Debug, Error, PartialEq)]
pub enum TensorAllocatorError {
    /// The requested size and alignment do not form a valid layout.
    #[error("Invalid tensor layout {0}")]
    LayoutError(core::alloc::LayoutError),

    /// The system allocator returned a null pointer.
    #[error("Null pointer")]
    NullPointer,

    /// A thread panicked while holding the arena bookkeeping lock.
    #[error("Arena bookkeeping lock is poisoned")]
    ArenaPoisoned,
}

/// A trait for allocating and deallocating memory for tensors.
///
/// # Safety
///
/// The tensor allocator must be thread-safe.
///
/// # Methods
///
/// * `alloc` - Allocates memory for a tensor with the given layout.
/// * `dealloc` - Deallocates memory for a tensor with the given layout.
/// * `is_scoped` - Whether memory is released en masse by the allocator itself.
pub trait TensorAllocator: Clone + Send + Sync {
    /// Allocates memory for a tensor with the given layout.
    fn alloc(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError>;

    /// Deallocates memory for a tensor with the given layout.
    fn dealloc(&self, ptr: *mut u8, layout: Layout);

    /// Returns true when individual deallocations are no-ops and the allocator
    /// releases every block at once on teardown.
    fn is_scoped(&self) -> bool {
        false
    }
}

#[derive(Clone, Debug)]
/// A tensor allocator that uses the system allocator.
pub struct CpuAllocator;

/// Implement the `Default` trait for the `CpuAllocator` struct.
impl Default for CpuAllocator {
    fn default() -> Self {
        Self
    }
}

/// Implement the `TensorAllocator` trait for the `CpuAllocator` struct.
impl TensorAllocator for CpuAllocator {
    /// Allocates memory for a tensor with the given layout.
    ///
    /// # Arguments
    ///
    /// * `layout` - The layout of the tensor.
    ///
    /// # Returns
    ///
    /// A non-null pointer to the allocated memory if successful, otherwise an error.
    fn alloc(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError> {
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            Err(TensorAllocatorError::NullPointer)?
        }
        Ok(ptr)
    }

    /// Deallocates memory for a tensor with the given layout.
    ///
    /// # Arguments
    ///
    /// * `ptr` - A non-null pointer to the allocated memory.
    /// * `layout` - The layout of the tensor.
    ///
    /// # Safety
    ///
    /// The pointer must be non-null and the layout must be correct.
    #[allow(clippy::not_unsafe_ptr_arg_deref)]
    fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if !ptr.is_null() {
            unsafe { alloc::dealloc(ptr, layout) }
        }
    }
}

/// Blocks handed out by an arena, released together when the arena goes away.
#[derive(Default)]
struct ArenaBlocks {
    blocks: Vec<(NonNull<u8>, Layout)>,
    allocated: usize,
}

// SAFETY: the block pointers are only dereferenced by the tensors that own them;
// the arena itself only hands them back to the system allocator on drop.
unsafe impl Send for ArenaBlocks {}

impl Drop for ArenaBlocks {
    fn drop(&mut self) {
        log::debug!(
            "releasing arena: {} blocks, {} bytes",
            self.blocks.len(),
            self.allocated
        );
        for (ptr, layout) in self.blocks.drain(..) {
            // SAFETY: every block was obtained from `alloc::alloc` with this layout.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}

/// A workspace-style allocator whose memory is released en masse.
///
/// Cloning the arena produces another handle to the same pool of blocks. Tensors
/// allocated from the arena keep a handle alive, so the memory outlives every tensor
/// that uses it. Individual deallocations are no-ops; all blocks are returned to the
/// system allocator when the last handle is dropped.
///
/// # Example
///
/// ```
/// use ndtad_tensor::{ArenaAllocator, DataType, NdArray, Order, Ownership};
///
/// let arena = ArenaAllocator::new();
/// let t = NdArray::from_shape_in(Order::C, &[2, 3], DataType::F32, arena.clone()).unwrap();
/// assert_eq!(t.ownership(), Ownership::ArenaScoped);
/// assert_eq!(arena.allocated_bytes(), 24);
/// ```
#[derive(Clone, Default)]
pub struct ArenaAllocator {
    inner: Arc<Mutex<ArenaBlocks>>,
}

impl ArenaAllocator {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of bytes handed out by the arena so far.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.lock().map(|b| b.allocated).unwrap_or(0)
    }

    /// Returns the number of live blocks owned by the arena.
    pub fn num_blocks(&self) -> usize {
        self.inner.lock().map(|b| b.blocks.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for ArenaAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("blocks", &self.num_blocks())
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

impl TensorAllocator for ArenaAllocator {
    fn alloc(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError> {
        let ptr = unsafe { alloc::alloc(layout) };
        let block = NonNull::new(ptr).ok_or(TensorAllocatorError::NullPointer)?;
        match self.inner.lock() {
            Ok(mut blocks) => {
                blocks.blocks.push((block, layout));
                blocks.allocated += layout.size();
                Ok(ptr)
            }
            Err(_) => {
                unsafe { alloc::dealloc(ptr, layout) };
                Err(TensorAllocatorError::ArenaPoisoned)
            }
        }
    }

    fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {}

    fn is_scoped(&self) -> bool {
        true
    }
}
