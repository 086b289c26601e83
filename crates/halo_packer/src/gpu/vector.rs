//! Vector (X/Y) pack/unpack launches.

use crate::core::{
    check_index_count, check_range, vector_count, DispatchStats, FieldElement, Launch, Rotation,
};
use crate::error::Result;

use super::{DeviceArray, GpuPacker, Params};

impl GpuPacker {
    /// Records a rotated pack of both components into
    /// `destination[offset .. offset + count_x + count_y]`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_pack_vector<T: FieldElement>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        launch: Launch,
        source_x: &DeviceArray<T>,
        source_y: &DeviceArray<T>,
        indexes_x: &DeviceArray<u32>,
        indexes_y: &DeviceArray<u32>,
        count_x: u32,
        count_y: u32,
        offset: u32,
        rotation: Rotation,
        destination: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        check_index_count("pack_vector indexes_x", count_x, indexes_x.len())?;
        check_index_count("pack_vector indexes_y", count_y, indexes_y.len())?;
        let count = vector_count(count_x, count_y)?;
        check_range("pack_vector destination", offset, count, destination.len())?;
        let units = launch.resolve(count)?;
        let kernels = self.kernels::<T>()?;

        self.encode_kernel(
            encoder,
            &kernels.pack_vector,
            &[
                &source_x.buffer,
                &source_y.buffer,
                &indexes_x.buffer,
                &indexes_y.buffer,
                &destination.buffer,
            ],
            Params {
                count_x,
                count_y,
                offset,
                rotate: rotation.code(),
            },
            count,
            units,
            "halo_packer.pack_vector",
        )
    }

    /// Records the scatter of `source[offset ..]` into X then Y. Rotation is
    /// never applied on this side.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_unpack_vector<T: FieldElement>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        launch: Launch,
        source: &DeviceArray<T>,
        indexes_x: &DeviceArray<u32>,
        indexes_y: &DeviceArray<u32>,
        count_x: u32,
        count_y: u32,
        offset: u32,
        destination_x: &DeviceArray<T>,
        destination_y: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        check_index_count("unpack_vector indexes_x", count_x, indexes_x.len())?;
        check_index_count("unpack_vector indexes_y", count_y, indexes_y.len())?;
        let count = vector_count(count_x, count_y)?;
        check_range("unpack_vector source", offset, count, source.len())?;
        let units = launch.resolve(count)?;
        let kernels = self.kernels::<T>()?;

        self.encode_kernel(
            encoder,
            &kernels.unpack_vector,
            &[
                &source.buffer,
                &indexes_x.buffer,
                &indexes_y.buffer,
                &destination_x.buffer,
                &destination_y.buffer,
            ],
            Params {
                count_x,
                count_y,
                offset,
                rotate: 0,
            },
            count,
            units,
            "halo_packer.unpack_vector",
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn pack_vector<T: FieldElement>(
        &self,
        launch: Launch,
        source_x: &DeviceArray<T>,
        source_y: &DeviceArray<T>,
        indexes_x: &DeviceArray<u32>,
        indexes_y: &DeviceArray<u32>,
        count_x: u32,
        count_y: u32,
        offset: u32,
        rotation: Rotation,
        destination: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        self.run(|encoder| {
            self.encode_pack_vector(
                encoder,
                launch,
                source_x,
                source_y,
                indexes_x,
                indexes_y,
                count_x,
                count_y,
                offset,
                rotation,
                destination,
            )
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn unpack_vector<T: FieldElement>(
        &self,
        launch: Launch,
        source: &DeviceArray<T>,
        indexes_x: &DeviceArray<u32>,
        indexes_y: &DeviceArray<u32>,
        count_x: u32,
        count_y: u32,
        offset: u32,
        destination_x: &DeviceArray<T>,
        destination_y: &DeviceArray<T>,
    ) -> Result<DispatchStats> {
        self.run(|encoder| {
            self.encode_unpack_vector(
                encoder,
                launch,
                source,
                indexes_x,
                indexes_y,
                count_x,
                count_y,
                offset,
                destination_x,
                destination_y,
            )
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use rand::{Rng, SeedableRng};

    use crate::core::{FieldElement, Launch, Rotation};
    use crate::gpu::test_support::packer;
    use crate::gpu::GpuPacker;
    use crate::reference_cpu;

    /// Packs each rotation, then unpacks the wire and checks both sides.
    fn check_rotation_table<T: FieldElement + From<f32>>(packer: &GpuPacker) {
        let real = |values: &[f32]| values.iter().map(|&v| T::from(v)).collect::<Vec<T>>();
        let x = packer.upload(&real(&[1.0, 2.0])).expect("x");
        let y = packer.upload(&real(&[3.0, 4.0])).expect("y");
        let idx = packer.upload(&[0u32, 1]).expect("idx");

        let expected = [
            (Rotation::Identity, [1.0, 2.0, 3.0, 4.0]),
            (Rotation::Quarter, [3.0, 4.0, -1.0, -2.0]),
            (Rotation::Half, [-1.0, -2.0, -3.0, -4.0]),
            (Rotation::ThreeQuarter, [-3.0, -4.0, 1.0, 2.0]),
        ];
        for (rotation, values) in expected {
            let values = real(&values);
            let buffer = packer.zeroed::<T>(4).expect("buffer");
            block_on(packer.pack_vector(
                Launch::covering(),
                &x,
                &y,
                &idx,
                &idx,
                2,
                2,
                0,
                rotation,
                &buffer,
            ))
            .expect("pack");
            assert_eq!(block_on(packer.read(&buffer)).expect("read"), values, "{rotation:?}");

            let out_x = packer.zeroed::<T>(2).expect("out x");
            let out_y = packer.zeroed::<T>(2).expect("out y");
            block_on(packer.unpack_vector(
                Launch::covering(),
                &buffer,
                &idx,
                &idx,
                2,
                2,
                0,
                &out_x,
                &out_y,
            ))
            .expect("unpack");
            assert_eq!(block_on(packer.read(&out_x)).expect("x"), values[..2].to_vec());
            assert_eq!(block_on(packer.read(&out_y)).expect("y"), values[2..].to_vec());
        }
    }

    #[test]
    fn rotation_table_on_device() {
        let Some(packer) = packer() else { return };
        check_rotation_table::<f32>(&packer);
    }

    #[test]
    fn rotation_table_on_device_f64() {
        let Some(packer) = packer() else { return };
        if !packer.supports::<f64>() {
            return;
        }
        check_rotation_table::<f64>(&packer);
    }

    #[test]
    fn uneven_components_match_reference() {
        let Some(packer) = packer() else { return };
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let x: Vec<f32> = (0..300).map(|_| rng.gen_range(-5.0..5.0)).collect();
        let y: Vec<f32> = (0..300).map(|_| rng.gen_range(-5.0..5.0)).collect();
        let idx_x: Vec<u32> = (0..97).map(|_| rng.gen_range(0..300)).collect();
        let idx_y: Vec<u32> = (0..41).map(|_| rng.gen_range(0..300)).collect();
        let (nx, ny) = (idx_x.len() as u32, idx_y.len() as u32);
        let offset = 7;
        let len = (offset + nx + ny + 3) as usize;

        let dx = packer.upload(&x).expect("x");
        let dy = packer.upload(&y).expect("y");
        let dix = packer.upload(&idx_x).expect("idx x");
        let diy = packer.upload(&idx_y).expect("idx y");

        for rotation in Rotation::ALL {
            let mut expected = vec![0.0f32; len];
            reference_cpu::pack_vector(
                Launch::covering(),
                &x,
                &y,
                &idx_x,
                &idx_y,
                nx,
                ny,
                offset,
                rotation,
                &mut expected,
            )
            .expect("cpu");

            let buffer = packer.zeroed::<f32>(len).expect("buffer");
            block_on(packer.pack_vector(
                Launch::units(nx + ny + 1000),
                &dx,
                &dy,
                &dix,
                &diy,
                nx,
                ny,
                offset,
                rotation,
                &buffer,
            ))
            .expect("gpu");
            assert_eq!(block_on(packer.read(&buffer)).expect("read"), expected);
        }
    }

    #[test]
    fn unpack_fills_y_segment_with_padded_launch() {
        let Some(packer) = packer() else { return };
        let wire = packer.upload(&[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0]).expect("wire");
        let idx_x = packer.upload(&[3u32, 0]).expect("idx x");
        let idx_y = packer.upload(&[1u32, 2, 3]).expect("idx y");
        let dst_x = packer.zeroed::<f32>(4).expect("x");
        let dst_y = packer.zeroed::<f32>(4).expect("y");

        let stats = block_on(packer.unpack_vector(
            Launch::units(200),
            &wire,
            &idx_x,
            &idx_y,
            2,
            3,
            1,
            &dst_x,
            &dst_y,
        ))
        .expect("unpack");
        assert_eq!(stats.elements, 5);
        assert_eq!(stats.units, 200);

        assert_eq!(block_on(packer.read(&dst_x)).expect("x"), vec![2.0, 0.0, 0.0, 1.0]);
        assert_eq!(block_on(packer.read(&dst_y)).expect("y"), vec![0.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn quarter_then_three_quarter_restores_vector() {
        let Some(packer) = packer() else { return };
        let x = [0.5f32, -1.5, 2.5];
        let y = [4.0f32, 5.0, -6.0];
        let dx = packer.upload(&x).expect("x");
        let dy = packer.upload(&y).expect("y");
        let idx = packer.upload(&[0u32, 1, 2]).expect("idx");
        let wire = packer.zeroed::<f32>(6).expect("wire");
        let rx = packer.zeroed::<f32>(3).expect("rx");
        let ry = packer.zeroed::<f32>(3).expect("ry");
        let wire_back = packer.zeroed::<f32>(6).expect("wire back");

        let mut encoder = packer.create_encoder();
        packer
            .encode_pack_vector(
                &mut encoder,
                Launch::covering(),
                &dx,
                &dy,
                &idx,
                &idx,
                3,
                3,
                0,
                Rotation::Quarter,
                &wire,
            )
            .expect("pack");
        packer
            .encode_unpack_vector(&mut encoder, Launch::covering(), &wire, &idx, &idx, 3, 3, 0, &rx, &ry)
            .expect("unpack");
        packer
            .encode_pack_vector(
                &mut encoder,
                Launch::covering(),
                &rx,
                &ry,
                &idx,
                &idx,
                3,
                3,
                0,
                Rotation::ThreeQuarter,
                &wire_back,
            )
            .expect("repack");
        packer.submit(encoder);

        assert_eq!(
            block_on(packer.read(&wire_back)).expect("read"),
            [x.as_slice(), y.as_slice()].concat()
        );
    }
}
