//! Scalar pack/unpack launches.

use crate::core::{check_index_count, check_range, DispatchStats, FieldElement, Launch};
use crate::error::Result;

use super::{DeviceArray, GpuPacker, Params};

impl GpuPacker {
    /// Records `destination[offset + i] = source[indexes[i]]` for `i < count`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_pack_scalar<T: FieldElement>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        launch: Launch,
        source: &DeviceArray<T>,
        indexes: &DeviceArray<u32>,
        count: u32,
        offset: u32,
        destination: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        check_index_count("pack_scalar indexes", count, indexes.len())?;
        check_range("pack_scalar destination", offset, count, destination.len())?;
        let units = launch.resolve(count)?;
        let kernels = self.kernels::<T>()?;

        self.encode_kernel(
            encoder,
            &kernels.pack_scalar,
            &[&source.buffer, &indexes.buffer, &destination.buffer],
            Params {
                count_x: count,
                count_y: 0,
                offset,
                rotate: 0,
            },
            count,
            units,
            "halo_packer.pack_scalar",
        )
    }

    /// Records `destination[indexes[i]] = source[offset + i]` for `i < count`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_unpack_scalar<T: FieldElement>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        launch: Launch,
        source: &DeviceArray<T>,
        indexes: &DeviceArray<u32>,
        count: u32,
        offset: u32,
        destination: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        check_index_count("unpack_scalar indexes", count, indexes.len())?;
        check_range("unpack_scalar source", offset, count, source.len())?;
        let units = launch.resolve(count)?;
        let kernels = self.kernels::<T>()?;

        self.encode_kernel(
            encoder,
            &kernels.unpack_scalar,
            &[&source.buffer, &indexes.buffer, &destination.buffer],
            Params {
                count_x: count,
                count_y: 0,
                offset,
                rotate: 0,
            },
            count,
            units,
            "halo_packer.unpack_scalar",
        )
    }

    /// Packs a scalar halo and waits for it to land in `destination`.
    pub async fn pack_scalar<T: FieldElement>(
        &self,
        launch: Launch,
        source: &DeviceArray<T>,
        indexes: &DeviceArray<u32>,
        count: u32,
        offset: u32,
        destination: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        self.run(|encoder| {
            self.encode_pack_scalar(encoder, launch, source, indexes, count, offset, destination)
        })
        .await
    }

    /// Unpacks a scalar halo and waits for `destination` to be updated.
    pub async fn unpack_scalar<T: FieldElement>(
        &self,
        launch: Launch,
        source: &DeviceArray<T>,
        indexes: &DeviceArray<u32>,
        count: u32,
        offset: u32,
        destination: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        self.run(|encoder| {
            self.encode_unpack_scalar(encoder, launch, source, indexes, count, offset, destination)
        })
        .await
    }
}
