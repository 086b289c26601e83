use crate::core::FloatWidth;
use crate::error::{PackError, Result};

use super::shaders::{
    kernel_source, PACK_SCALAR_WGSL, PACK_VECTOR_WGSL, UNPACK_SCALAR_WGSL, UNPACK_VECTOR_WGSL,
};

pub struct Kernel {
    pub pipeline: wgpu::ComputePipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Number of storage bindings; the params uniform follows them.
    pub storage_bindings: u32,
}

/// The four kernels instantiated for one width.
pub struct KernelSet {
    pub width: FloatWidth,
    pub pack_scalar: Kernel,
    pub unpack_scalar: Kernel,
    pub pack_vector: Kernel,
    pub unpack_vector: Kernel,
}

/// Most storage buffers any kernel binds (the vector kernels).
pub const MAX_STORAGE_BINDINGS: u32 = 5;

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// `read_only` lists the storage bindings in order; the uniform comes last.
fn create_kernel(
    device: &wgpu::Device,
    width: FloatWidth,
    name: &str,
    body: &str,
    read_only: &[bool],
    workgroup_size: u32,
) -> Kernel {
    let label = format!("halo_packer.{name}.{width}");
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(kernel_source(width, workgroup_size, body).into()),
    });

    let mut entries: Vec<_> = read_only
        .iter()
        .enumerate()
        .map(|(binding, &read_only)| storage_entry(binding as u32, read_only))
        .collect();
    entries.push(uniform_entry(read_only.len() as u32));

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&label),
        entries: &entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: "main",
        compilation_options: Default::default(),
        cache: None,
    });

    Kernel {
        pipeline,
        bind_group_layout,
        storage_bindings: read_only.len() as u32,
    }
}

pub async fn create_kernel_set(
    device: &wgpu::Device,
    width: FloatWidth,
    workgroup_size: u32,
) -> Result<KernelSet> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pack_scalar = create_kernel(
        device,
        width,
        "pack_scalar",
        PACK_SCALAR_WGSL,
        &[true, true, false],
        workgroup_size,
    );
    let unpack_scalar = create_kernel(
        device,
        width,
        "unpack_scalar",
        UNPACK_SCALAR_WGSL,
        &[true, true, false],
        workgroup_size,
    );
    let pack_vector = create_kernel(
        device,
        width,
        "pack_vector",
        PACK_VECTOR_WGSL,
        &[true, true, true, true, false],
        workgroup_size,
    );
    let unpack_vector = create_kernel(
        device,
        width,
        "unpack_vector",
        UNPACK_VECTOR_WGSL,
        &[true, true, true, false, false],
        workgroup_size,
    );
    if let Some(err) = device.pop_error_scope().await {
        return Err(PackError::PipelineValidation(format!("{width} kernels: {err}")));
    }
    log::debug!("built {width} pack/unpack pipelines (workgroup size {workgroup_size})");

    Ok(KernelSet {
        width,
        pack_scalar,
        unpack_scalar,
        pack_vector,
        unpack_vector,
    })
}
