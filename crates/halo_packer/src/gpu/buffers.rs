use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::{PackError, Result};

/// Smallest allocation backing an array, so empty arrays still bind.
pub(crate) const MIN_BUFFER_BYTES: u64 = 16;

/// Typed device-resident array: a field, an index list or a communication
/// buffer.
#[derive(Debug)]
pub struct DeviceArray<T> {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> DeviceArray<T> {
    pub(crate) fn new(buffer: wgpu::Buffer, len: usize) -> Self {
        Self {
            buffer,
            len,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn byte_len(&self) -> u64 {
        (self.len as u64).saturating_mul(std::mem::size_of::<T>() as u64)
    }
}

pub(crate) fn padded_size(bytes: u64) -> u64 {
    let aligned = bytes.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
    aligned.max(MIN_BUFFER_BYTES)
}

pub(crate) async fn map_buffer<T: Pod>(buffer: &wgpu::Buffer, device: &wgpu::Device) -> Result<Vec<T>> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    receiver
        .await
        .map_err(|_| PackError::BufferMap("map callback dropped".into()))?
        .map_err(|e| PackError::BufferMap(e.to_string()))?;
    let data = slice.get_mapped_range();
    // The mapped range is not guaranteed to be aligned for f64.
    let result = data
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect();
    drop(data);
    buffer.unmap();
    Ok(result)
}
