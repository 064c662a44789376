//! GPU buffer management.

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;

use crate::backend::{BufferId, BufferKind};
use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};

/// A fixed-length, typed region of GPU memory.
///
/// The buffer holds exactly [`len`](Self::len) elements for its whole life;
/// it is never resized. Every operation binds the buffer to its target and
/// leaves it bound. Deleted on drop.
pub struct TypedBuffer<'ctx, T: Pod> {
    context: &'ctx GpuContext,
    id: BufferId,
    kind: BufferKind,
    len: usize,
    _marker: PhantomData<T>,
}

impl<'ctx, T: Pod> TypedBuffer<'ctx, T> {
    /// Allocates zeroed storage for `len` elements.
    pub fn new(context: &'ctx GpuContext, kind: BufferKind, len: usize) -> RenderResult<Self> {
        let id = context.backend().create_buffer(kind, len * size_of::<T>())?;
        log::debug!(
            "created {kind:?} buffer {id:?}: {len} x {} ({} bytes)",
            std::any::type_name::<T>(),
            len * size_of::<T>()
        );
        Ok(Self {
            context,
            id,
            kind,
            len,
            _marker: PhantomData,
        })
    }

    /// Allocates a buffer holding `data`.
    pub fn from_slice(context: &'ctx GpuContext, kind: BufferKind, data: &[T]) -> RenderResult<Self> {
        let buffer = Self::new(context, kind, data.len())?;
        buffer.set_data(data)?;
        Ok(buffer)
    }

    /// Uniform buffer holding one value.
    pub fn uniform(context: &'ctx GpuContext, value: &T) -> RenderResult<Self> {
        Self::from_slice(context, BufferKind::Uniform, std::slice::from_ref(value))
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    fn bind(&self) {
        self.context.bind_buffer_target(self.kind, self.id);
    }

    /// Replaces the whole contents.
    ///
    /// Fails with [`RenderError::InvalidLength`] when `data` does not hold
    /// exactly `len` elements; nothing is written in that case.
    pub fn set_data(&self, data: &[T]) -> RenderResult<()> {
        if data.len() != self.len {
            return Err(RenderError::InvalidLength {
                expected: self.len,
                actual: data.len(),
            });
        }
        self.bind();
        self.context
            .backend()
            .write_buffer(self.id, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    /// Writes one element at `offset`.
    ///
    /// The offset is only checked in debug builds; past the allocation the
    /// write is dropped by the backend.
    pub fn set_element(&self, value: &T, offset: usize) {
        debug_assert!(
            offset < self.len,
            "element offset {offset} out of range for buffer of {}",
            self.len
        );
        self.bind();
        self.context
            .backend()
            .write_buffer(self.id, offset * size_of::<T>(), bytemuck::bytes_of(value));
    }

    /// Reads the contents back. Blocks until earlier writes are visible.
    #[must_use]
    pub fn get_data(&self) -> Vec<T> {
        self.bind();
        let bytes = self
            .context
            .backend()
            .read_buffer(self.id, 0, self.len * size_of::<T>());
        bytes
            .chunks_exact(size_of::<T>().max(1))
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

impl<T: Pod> Drop for TypedBuffer<'_, T> {
    fn drop(&mut self) {
        log::debug!("deleting {:?} buffer {:?}", self.kind, self.id);
        self.context.backend().delete_buffer(self.id);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::recording::{Call, RecordingBackend};
    use crate::software::SoftwareBackend;

    fn context() -> GpuContext {
        GpuContext::new(SoftwareBackend::new(1, 1))
    }

    #[test]
    fn test_new_buffer_is_zeroed() {
        let ctx = context();
        let buffer = TypedBuffer::<[f32; 4]>::new(&ctx, BufferKind::Uniform, 3).unwrap();
        assert_eq!(buffer.get_data(), vec![[0.0; 4]; 3]);
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let ctx = context();
        let buffer = TypedBuffer::<u32>::new(&ctx, BufferKind::Storage, 4).unwrap();
        buffer.set_data(&[1, 2, 3, 4]).unwrap();
        buffer.set_element(&9, 2);
        assert_eq!(buffer.get_data(), vec![1, 2, 9, 4]);
    }

    #[test]
    fn test_length_mismatch_rejected_both_ways() {
        let ctx = context();
        let buffer = TypedBuffer::<u32>::new(&ctx, BufferKind::Uniform, 4).unwrap();
        buffer.set_data(&[7, 7, 7, 7]).unwrap();
        for bad in [vec![1, 2, 3], vec![1, 2, 3, 4, 5]] {
            match buffer.set_data(&bad) {
                Err(RenderError::InvalidLength { expected, actual }) => {
                    assert_eq!((expected, actual), (4, bad.len()));
                }
                other => panic!("expected InvalidLength, got {other:?}"),
            }
        }
        // no partial write
        assert_eq!(buffer.get_data(), vec![7, 7, 7, 7]);
    }

    #[test]
    fn test_buffer_deleted_on_drop() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let buffer = TypedBuffer::<f32>::new(&ctx, BufferKind::Uniform, 1).unwrap();
        let id = buffer.id();
        drop(buffer);
        assert_eq!(log.count(|c| *c == Call::DeleteBuffer(id)), 1);
    }

    proptest! {
        #[test]
        fn mismatched_lengths_never_write(len in 1usize..16, delta in -8i64..8) {
            prop_assume!(delta != 0);
            let ctx = context();
            let buffer = TypedBuffer::<u32>::new(&ctx, BufferKind::Storage, len).unwrap();
            let other = usize::try_from(len as i64 + delta).unwrap_or(0);
            prop_assume!(other != len);
            let data = vec![0xDEAD_BEEFu32; other];
            prop_assert!(
                matches!(buffer.set_data(&data), Err(RenderError::InvalidLength { .. })),
                "invalid length must be rejected"
            );
            prop_assert_eq!(buffer.get_data(), vec![0; len]);
        }
    }
}
