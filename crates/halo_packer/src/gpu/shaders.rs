//! WGSL bodies of the four kernels.
//!
//! Each body is written against the `Real` alias and the `WORKGROUP_SIZE`
//! constant; `kernel_source` prepends both for the requested width and device,
//! so one body serves both f32 and f64.

use crate::core::FloatWidth;

const COMMON_WGSL: &str = r#"
struct Params {
  count_x: u32,
  count_y: u32,
  offset: u32,
  rotate: u32,
};

// Grids wider than the per-dimension workgroup limit fold into rows.
fn thread_id(gid: vec3<u32>, groups: vec3<u32>) -> u32 {
  return gid.x + gid.y * groups.x * WORKGROUP_SIZE;
}
"#;

pub const PACK_SCALAR_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> src_field: array<Real>;
@group(0) @binding(1) var<storage, read> indexes: array<u32>;
@group(0) @binding(2) var<storage, read_write> dst_buffer: array<Real>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let tid = thread_id(gid, groups);
  if (tid >= params.count_x) {
    return;
  }
  dst_buffer[params.offset + tid] = src_field[indexes[tid]];
}
"#;

pub const UNPACK_SCALAR_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> src_buffer: array<Real>;
@group(0) @binding(1) var<storage, read> indexes: array<u32>;
@group(0) @binding(2) var<storage, read_write> dst_field: array<Real>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let tid = thread_id(gid, groups);
  if (tid >= params.count_x) {
    return;
  }
  dst_field[indexes[tid]] = src_buffer[params.offset + tid];
}
"#;

pub const PACK_VECTOR_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> src_x: array<Real>;
@group(0) @binding(1) var<storage, read> src_y: array<Real>;
@group(0) @binding(2) var<storage, read> indexes_x: array<u32>;
@group(0) @binding(3) var<storage, read> indexes_y: array<u32>;
@group(0) @binding(4) var<storage, read_write> dst_buffer: array<Real>;
@group(0) @binding(5) var<uniform> params: Params;

fn gather_x(i: u32) -> Real {
  return src_x[indexes_x[i]];
}

fn gather_y(i: u32) -> Real {
  return src_y[indexes_y[i]];
}

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let tid = thread_id(gid, groups);
  let n_x = params.count_x;
  let n_y = params.count_y;
  if (tid >= n_x + n_y) {
    return;
  }

  var value: Real;
  switch params.rotate {
    // (x, y) -> (y, -x)
    case 1u: {
      if (tid < n_y) {
        value = gather_y(tid);
      } else {
        value = -gather_x(tid - n_y);
      }
    }
    // (x, y) -> (-x, -y)
    case 2u: {
      if (tid < n_x) {
        value = -gather_x(tid);
      } else {
        value = -gather_y(tid - n_x);
      }
    }
    // (x, y) -> (-y, x)
    case 3u: {
      if (tid < n_y) {
        value = -gather_y(tid);
      } else {
        value = gather_x(tid - n_y);
      }
    }
    default: {
      if (tid < n_x) {
        value = gather_x(tid);
      } else {
        value = gather_y(tid - n_x);
      }
    }
  }
  dst_buffer[params.offset + tid] = value;
}
"#;

pub const UNPACK_VECTOR_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> src_buffer: array<Real>;
@group(0) @binding(1) var<storage, read> indexes_x: array<u32>;
@group(0) @binding(2) var<storage, read> indexes_y: array<u32>;
@group(0) @binding(3) var<storage, read_write> dst_x: array<Real>;
@group(0) @binding(4) var<storage, read_write> dst_y: array<Real>;
@group(0) @binding(5) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let tid = thread_id(gid, groups);
  let n_x = params.count_x;
  if (tid < n_x) {
    dst_x[indexes_x[tid]] = src_buffer[params.offset + tid];
  } else if (tid < n_x + params.count_y) {
    dst_y[indexes_y[tid - n_x]] = src_buffer[params.offset + tid];
  }
}
"#;

pub fn wgsl_scalar(width: FloatWidth) -> &'static str {
    match width {
        FloatWidth::F32 => "f32",
        FloatWidth::F64 => "f64",
    }
}

/// `@workgroup_size` only takes const expressions here, so the size is baked
/// into the source rather than passed as a pipeline-overridable constant.
pub fn kernel_source(width: FloatWidth, workgroup_size: u32, body: &str) -> String {
    format!(
        "alias Real = {};\nconst WORKGROUP_SIZE: u32 = {workgroup_size}u;\n{COMMON_WGSL}{body}",
        wgsl_scalar(width)
    )
}
