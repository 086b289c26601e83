//! Device execution of the pack/unpack kernels through wgpu compute shaders.
//!
//! `GpuPacker` is the kernel registry: it owns the device and one compiled
//! pipeline per (operation, width), built once in `GpuPacker::new`. Callers
//! hold it for the lifetime of the simulation and pass it where halos are
//! exchanged.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::core::{DispatchStats, FieldElement, FloatWidth};
use crate::error::{PackError, Result};

mod buffers;
mod pipelines;
mod scalar;
mod shaders;
mod vector;

pub use buffers::DeviceArray;
use buffers::{map_buffer, padded_size};
use pipelines::{create_kernel_set, Kernel, KernelSet, MAX_STORAGE_BINDINGS};

/// Configuration for the GPU packer.
#[derive(Debug, Clone)]
pub struct GpuPackerConfig {
    /// Units of work per workgroup (0 = auto-detect).
    pub workgroup_size: u32,
    pub power_preference: wgpu::PowerPreference,
    /// Build the f64 kernels when the adapter supports `SHADER_F64`.
    pub enable_f64: bool,
}

impl Default for GpuPackerConfig {
    fn default() -> Self {
        Self {
            workgroup_size: 0,
            power_preference: wgpu::PowerPreference::HighPerformance,
            enable_f64: true,
        }
    }
}

const AUTO_WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct Params {
    pub count_x: u32,
    pub count_y: u32,
    pub offset: u32,
    pub rotate: u32,
}

/// Summary of GPU device limits relevant to packing.
#[derive(Debug, Clone, Copy)]
pub struct GpuLimitsSummary {
    pub max_invocations_per_workgroup: u32,
    pub max_storage_buffers_per_shader_stage: u32,
    pub max_storage_buffer_binding_size: u64,
    pub max_compute_workgroups_per_dimension: u32,
}

impl GpuLimitsSummary {
    fn from_limits(limits: &wgpu::Limits) -> Self {
        Self {
            max_invocations_per_workgroup: limits.max_compute_invocations_per_workgroup,
            max_storage_buffers_per_shader_stage: limits.max_storage_buffers_per_shader_stage,
            max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size as u64,
            max_compute_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
        }
    }

    /// Fails when a kernel would bind more storage buffers than one stage allows.
    pub fn ensure_storage_bindings(&self) -> Result<()> {
        if self.max_storage_buffers_per_shader_stage < MAX_STORAGE_BINDINGS {
            return Err(PackError::StorageBindingLimit {
                required: MAX_STORAGE_BINDINGS,
                max: self.max_storage_buffers_per_shader_stage,
            });
        }
        Ok(())
    }
}

/// What the execution backend can do, reported before any pipeline is built.
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    pub adapter_name: String,
    pub backend: wgpu::Backend,
    pub shader_f64: bool,
    pub limits: GpuLimitsSummary,
}

async fn request_adapter(
    instance: &wgpu::Instance,
    config: &GpuPackerConfig,
) -> Result<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await
        .ok_or(PackError::BackendUnavailable)
}

/// GPU gather/scatter engine for scalar and planar vector halos.
pub struct GpuPacker {
    pub(crate) instance: wgpu::Instance,
    pub(crate) adapter: wgpu::Adapter,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) f32_kernels: KernelSet,
    pub(crate) f64_kernels: Option<KernelSet>,
    pub(crate) workgroup_size: u32,
    pub(crate) limits: GpuLimitsSummary,
}

impl GpuPacker {
    /// Reports whether a GPU is usable, without building any kernels.
    pub async fn probe(config: &GpuPackerConfig) -> Result<BackendCapabilities> {
        let instance = wgpu::Instance::default();
        let adapter = request_adapter(&instance, config).await?;
        let info = adapter.get_info();
        Ok(BackendCapabilities {
            adapter_name: info.name,
            backend: info.backend,
            shader_f64: adapter.features().contains(wgpu::Features::SHADER_F64),
            limits: GpuLimitsSummary::from_limits(&adapter.limits()),
        })
    }

    /// Creates the device and compiles every kernel it supports.
    pub async fn new(config: GpuPackerConfig) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = request_adapter(&instance, &config).await?;
        let info = adapter.get_info();
        let f64_available =
            config.enable_f64 && adapter.features().contains(wgpu::Features::SHADER_F64);
        let required_features = if f64_available {
            wgpu::Features::SHADER_F64
        } else {
            wgpu::Features::empty()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("halo_packer.device"),
                    required_features,
                    required_limits: adapter.limits(),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| PackError::DeviceRequest(e.to_string()))?;
        log::info!(
            "halo_packer using {} ({:?}), f64 kernels {}",
            info.name,
            info.backend,
            if f64_available { "on" } else { "off" }
        );

        let device_limits = device.limits();
        let limits = GpuLimitsSummary::from_limits(&device_limits);
        limits.ensure_storage_bindings()?;
        let max_workgroup_size = limits
            .max_invocations_per_workgroup
            .min(device_limits.max_compute_workgroup_size_x)
            .max(1);
        let workgroup_size = if config.workgroup_size == 0 {
            AUTO_WORKGROUP_SIZE.min(max_workgroup_size)
        } else {
            config.workgroup_size.min(max_workgroup_size)
        };

        let f32_kernels = create_kernel_set(&device, FloatWidth::F32, workgroup_size).await?;
        let f64_kernels = if f64_available {
            Some(create_kernel_set(&device, FloatWidth::F64, workgroup_size).await?)
        } else {
            None
        };

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            f32_kernels,
            f64_kernels,
            workgroup_size,
            limits,
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    pub fn limits_summary(&self) -> GpuLimitsSummary {
        self.limits
    }

    /// Whether kernels for `T`'s width were built on this device.
    pub fn supports<T: FieldElement>(&self) -> bool {
        self.kernels::<T>().is_ok()
    }

    pub(crate) fn kernels<T: FieldElement>(&self) -> Result<&KernelSet> {
        let set = match T::WIDTH {
            FloatWidth::F32 => &self.f32_kernels,
            FloatWidth::F64 => self
                .f64_kernels
                .as_ref()
                .ok_or(PackError::UnsupportedWidth(FloatWidth::F64))?,
        };
        debug_assert_eq!(set.width, T::WIDTH);
        Ok(set)
    }

    fn ensure_storage_fits(&self, bytes: u64, label: &'static str) -> Result<()> {
        if bytes > self.limits.max_storage_buffer_binding_size {
            return Err(PackError::StorageLimit {
                label,
                bytes,
                max: self.limits.max_storage_buffer_binding_size,
            });
        }
        Ok(())
    }

    /// Shapes `units` into a grid of workgroups, folding into a second
    /// dimension past the per-dimension limit.
    pub(crate) fn plan_grid(&self, units: u32, label: &'static str) -> Result<[u32; 2]> {
        let workgroup_size = self.workgroup_size as u64;
        let max = self.limits.max_compute_workgroups_per_dimension as u64;
        let groups = (units as u64).div_ceil(workgroup_size);
        let (columns, rows) = if groups <= max {
            (groups, 1)
        } else {
            (max, groups.div_ceil(max))
        };
        // Thread ids are linearised in u32 inside the shader.
        let threads = columns * rows * workgroup_size;
        if rows > max || threads > u32::MAX as u64 {
            return Err(PackError::WorkgroupLimit {
                label,
                workgroups: groups,
                max: self.limits.max_compute_workgroups_per_dimension,
            });
        }
        Ok([columns as u32, rows as u32])
    }

    /// Records one kernel launch into `encoder`. `buffers` are bound in order,
    /// followed by the params uniform.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn encode_kernel(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        kernel: &Kernel,
        buffers: &[&wgpu::Buffer],
        params: Params,
        elements: u32,
        units: u32,
        label: &'static str,
    ) -> Result<DispatchStats> {
        debug_assert_eq!(buffers.len() as u32, kernel.storage_bindings);
        let workgroups = self.plan_grid(units, label)?;
        let stats = DispatchStats {
            elements,
            units,
            workgroups: Some(workgroups),
        };
        if units == 0 {
            return Ok(stats);
        }

        let params_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("halo_packer.params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let mut entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: kernel.storage_bindings,
            resource: params_buf.as_entire_binding(),
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &kernel.bind_group_layout,
            entries: &entries,
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups[0], workgroups[1], 1);
        }
        log::trace!(
            "{label}: {elements} elements, {units} units, workgroups {}x{}",
            workgroups[0],
            workgroups[1]
        );
        Ok(stats)
    }

    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("halo_packer.encoder"),
        })
    }

    /// Submits recorded launches and blocks until the queue has drained, so
    /// every packed buffer is complete on return.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit([encoder.finish()]);
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Encodes with `record`, submits, waits, and reports validation errors
    /// instead of letting them reach the device's uncaptured error handler.
    pub(crate) async fn run(
        &self,
        record: impl FnOnce(&mut wgpu::CommandEncoder) -> Result<DispatchStats>,
    ) -> Result<DispatchStats> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self.create_encoder();
        let recorded = record(&mut encoder);
        if recorded.is_ok() {
            self.submit(encoder);
        }
        let validation = self.device.pop_error_scope().await;
        let stats = recorded?;
        if let Some(err) = validation {
            return Err(PackError::PipelineValidation(err.to_string()));
        }
        Ok(stats)
    }

    /// Copies host data into a new device array.
    pub fn upload<T: Pod>(&self, data: &[T]) -> Result<DeviceArray<T>> {
        if data.is_empty() {
            return self.zeroed(0);
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.ensure_storage_fits(bytes.len() as u64, "upload")?;
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("halo_packer.array"),
            contents: bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });
        Ok(DeviceArray::new(buffer, data.len()))
    }

    /// Allocates a zero-filled device array of `len` elements.
    pub fn zeroed<T: Pod>(&self, len: usize) -> Result<DeviceArray<T>> {
        let bytes = (len as u64).saturating_mul(std::mem::size_of::<T>() as u64);
        self.ensure_storage_fits(bytes, "zeroed")?;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("halo_packer.array"),
            size: padded_size(bytes),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(DeviceArray::new(buffer, len))
    }

    /// Overwrites the whole of `array` with `data`.
    pub fn write<T: Pod>(&self, array: &DeviceArray<T>, data: &[T]) -> Result<()> {
        if data.len() != array.len() {
            return Err(PackError::RangeOutOfBounds {
                label: "write",
                start: 0,
                end: data.len() as u64,
                len: array.len(),
            });
        }
        if !data.is_empty() {
            self.queue
                .write_buffer(&array.buffer, 0, bytemuck::cast_slice(data));
        }
        Ok(())
    }

    /// Reads a device array back to the host.
    pub async fn read<T: Pod>(&self, array: &DeviceArray<T>) -> Result<Vec<T>> {
        if array.is_empty() {
            return Ok(Vec::new());
        }
        let size = padded_size(array.byte_len());
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("halo_packer.readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.create_encoder();
        encoder.copy_buffer_to_buffer(&array.buffer, 0, &staging, 0, array.byte_len());
        self.submit(encoder);

        let mut values = map_buffer::<T>(&staging, &self.device).await?;
        values.truncate(array.len());
        Ok(values)
    }
}
