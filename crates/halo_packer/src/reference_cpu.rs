//! CPU rendition of the pack/unpack kernels.
//!
//! Each kernel is written per unit of work, exactly as the WGSL shaders are,
//! and driven by a sequential loop over the thread identifiers of a launch.
//! Results are therefore bit-identical to the device path and this module is
//! the oracle the GPU tests compare against.

use crate::core::{
    check_index_count, check_range, vector_count, DispatchStats, FieldElement, Launch, Rotation,
};
use crate::error::Result;

fn run_grid(units: u32, mut unit: impl FnMut(u32)) {
    for tid in 0..units {
        unit(tid);
    }
}

#[inline]
fn pack_scalar_unit<T: FieldElement>(
    tid: u32,
    source: &[T],
    indexes: &[u32],
    count: u32,
    offset: u32,
    destination: &mut [T],
) {
    if tid >= count {
        return;
    }
    destination[(offset + tid) as usize] = source[indexes[tid as usize] as usize];
}

#[inline]
fn unpack_scalar_unit<T: FieldElement>(
    tid: u32,
    source: &[T],
    indexes: &[u32],
    count: u32,
    offset: u32,
    destination: &mut [T],
) {
    if tid >= count {
        return;
    }
    destination[indexes[tid as usize] as usize] = source[(offset + tid) as usize];
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn pack_vector_unit<T: FieldElement>(
    tid: u32,
    source_x: &[T],
    source_y: &[T],
    indexes_x: &[u32],
    indexes_y: &[u32],
    count_x: u32,
    count_y: u32,
    offset: u32,
    rotation: Rotation,
    destination: &mut [T],
) {
    if tid >= count_x + count_y {
        return;
    }
    let x = |i: u32| source_x[indexes_x[i as usize] as usize];
    let y = |i: u32| source_y[indexes_y[i as usize] as usize];

    let value = match rotation {
        Rotation::Identity => {
            if tid < count_x {
                x(tid)
            } else {
                y(tid - count_x)
            }
        }
        Rotation::Quarter => {
            if tid < count_y {
                y(tid)
            } else {
                -x(tid - count_y)
            }
        }
        Rotation::Half => {
            if tid < count_x {
                -x(tid)
            } else {
                -y(tid - count_x)
            }
        }
        Rotation::ThreeQuarter => {
            if tid < count_y {
                -y(tid)
            } else {
                x(tid - count_y)
            }
        }
    };
    destination[(offset + tid) as usize] = value;
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn unpack_vector_unit<T: FieldElement>(
    tid: u32,
    source: &[T],
    indexes_x: &[u32],
    indexes_y: &[u32],
    count_x: u32,
    count_y: u32,
    offset: u32,
    destination_x: &mut [T],
    destination_y: &mut [T],
) {
    if tid < count_x {
        destination_x[indexes_x[tid as usize] as usize] = source[(offset + tid) as usize];
    } else if tid < count_x + count_y {
        destination_y[indexes_y[(tid - count_x) as usize] as usize] =
            source[(offset + tid) as usize];
    }
}

fn stats(elements: u32, units: u32) -> DispatchStats {
    DispatchStats {
        elements,
        units,
        workgroups: None,
    }
}

/// Gathers `source[indexes[i]]` into `destination[offset + i]` for `i < count`.
pub fn pack_scalar<T: FieldElement>(
    launch: Launch,
    source: &[T],
    indexes: &[u32],
    count: u32,
    offset: u32,
    destination: &mut [T],
) -> Result<DispatchStats> {
    check_index_count("pack_scalar indexes", count, indexes.len())?;
    check_range("pack_scalar destination", offset, count, destination.len())?;
    let units = launch.resolve(count)?;

    run_grid(units, |tid| {
        pack_scalar_unit(tid, source, indexes, count, offset, destination)
    });
    Ok(stats(count, units))
}

/// Scatters `source[offset + i]` into `destination[indexes[i]]` for `i < count`.
///
/// With duplicate indexes the surviving value is unspecified.
pub fn unpack_scalar<T: FieldElement>(
    launch: Launch,
    source: &[T],
    indexes: &[u32],
    count: u32,
    offset: u32,
    destination: &mut [T],
) -> Result<DispatchStats> {
    check_index_count("unpack_scalar indexes", count, indexes.len())?;
    check_range("unpack_scalar source", offset, count, source.len())?;
    let units = launch.resolve(count)?;

    run_grid(units, |tid| {
        unpack_scalar_unit(tid, source, indexes, count, offset, destination)
    });
    Ok(stats(count, units))
}

/// Packs both components of a vector field into
/// `destination[offset .. offset + count_x + count_y]`, rotated by `rotation`.
///
/// Rotations that swap components put the Y-derived segment first.
#[allow(clippy::too_many_arguments)]
pub fn pack_vector<T: FieldElement>(
    launch: Launch,
    source_x: &[T],
    source_y: &[T],
    indexes_x: &[u32],
    indexes_y: &[u32],
    count_x: u32,
    count_y: u32,
    offset: u32,
    rotation: Rotation,
    destination: &mut [T],
) -> Result<DispatchStats> {
    check_index_count("pack_vector indexes_x", count_x, indexes_x.len())?;
    check_index_count("pack_vector indexes_y", count_y, indexes_y.len())?;
    let count = vector_count(count_x, count_y)?;
    check_range("pack_vector destination", offset, count, destination.len())?;
    let units = launch.resolve(count)?;

    run_grid(units, |tid| {
        pack_vector_unit(
            tid,
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
    });
    Ok(stats(count, units))
}

/// Scatters `source[offset ..]` into X (first `count_x`) then Y. No rotation.
#[allow(clippy::too_many_arguments)]
pub fn unpack_vector<T: FieldElement>(
    launch: Launch,
    source: &[T],
    indexes_x: &[u32],
    indexes_y: &[u32],
    count_x: u32,
    count_y: u32,
    offset: u32,
    destination_x: &mut [T],
    destination_y: &mut [T],
) -> Result<DispatchStats> {
    check_index_count("unpack_vector indexes_x", count_x, indexes_x.len())?;
    check_index_count("unpack_vector indexes_y", count_y, indexes_y.len())?;
    let count = vector_count(count_x, count_y)?;
    check_range("unpack_vector source", offset, count, source.len())?;
    let units = launch.resolve(count)?;

    run_grid(units, |tid| {
        unpack_vector_unit(
            tid,
            source,
            indexes_x,
            indexes_y,
            count_x,
            count_y,
            offset,
            destination_x,
            destination_y,
        )
    });
    Ok(stats(count, units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackError;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn pack_xy(rotation: Rotation) -> Vec<f64> {
        let x = [1.0, 2.0];
        let y = [3.0, 4.0];
        let idx = [0, 1];
        let mut buffer = vec![0.0; 4];
        pack_vector(
            Launch::covering(),
            &x,
            &y,
            &idx,
            &idx,
            2,
            2,
            0,
            rotation,
            &mut buffer,
        )
        .expect("pack");
        buffer
    }

    #[test]
    fn vector_pack_rotation_table() {
        assert_eq!(pack_xy(Rotation::Identity), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(pack_xy(Rotation::Quarter), vec![3.0, 4.0, -1.0, -2.0]);
        assert_eq!(pack_xy(Rotation::Half), vec![-1.0, -2.0, -3.0, -4.0]);
        assert_eq!(pack_xy(Rotation::ThreeQuarter), vec![-3.0, -4.0, 1.0, 2.0]);
    }

    #[test]
    fn scalar_round_trip_restores_indexed_slots() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let field: Vec<f32> = (0..257).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut indexes: Vec<u32> = (0..field.len() as u32).collect();
        indexes.shuffle(&mut rng);
        indexes.truncate(60);
        let offset = 13;

        let mut buffer = vec![0.0f32; offset as usize + indexes.len()];
        let n = indexes.len() as u32;
        pack_scalar(Launch::covering(), &field, &indexes, n, offset, &mut buffer).expect("pack");

        let mut restored = vec![0.0f32; field.len()];
        unpack_scalar(Launch::covering(), &buffer, &indexes, n, offset, &mut restored)
            .expect("unpack");

        for (i, value) in restored.iter().enumerate() {
            if indexes.contains(&(i as u32)) {
                assert_eq!(*value, field[i]);
            } else {
                assert_eq!(*value, 0.0);
            }
        }
    }

    #[test]
    fn extra_units_are_inert() {
        let x: Vec<f64> = (0..10).map(|v| v as f64).collect();
        let y: Vec<f64> = (0..10).map(|v| 100.0 + v as f64).collect();
        let idx_x = [9, 3, 5];
        let idx_y = [1, 2];

        for rotation in Rotation::ALL {
            let mut exact = vec![-9.0; 8];
            let mut padded = vec![-9.0; 8];
            pack_vector(Launch::covering(), &x, &y, &idx_x, &idx_y, 3, 2, 1, rotation, &mut exact)
                .expect("exact");
            pack_vector(Launch::units(64), &x, &y, &idx_x, &idx_y, 3, 2, 1, rotation, &mut padded)
                .expect("padded");
            assert_eq!(exact, padded);
            assert_eq!(exact[0], -9.0);
            assert_eq!(&exact[6..], &[-9.0, -9.0]);
        }

        let mut exact = vec![0.0; 10];
        let mut padded = vec![0.0; 10];
        let buffer = [5.0, 6.0, 7.0];
        unpack_scalar(Launch::covering(), &buffer, &[4, 0, 8], 3, 0, &mut exact).expect("exact");
        unpack_scalar(Launch::units(1000), &buffer, &[4, 0, 8], 3, 0, &mut padded)
            .expect("padded");
        assert_eq!(exact, padded);
    }

    #[test]
    fn segment_split_follows_rotation() {
        // X values are positive and Y values are large so the origin of every
        // packed slot can be read back off its magnitude.
        let x = [1.0f32, 2.0, 3.0];
        let y = [10.0f32, 20.0];
        let idx_x = [0, 1, 2];
        let idx_y = [0, 1];
        for rotation in Rotation::ALL {
            let mut buffer = vec![0.0f32; 5];
            pack_vector(Launch::covering(), &x, &y, &idx_x, &idx_y, 3, 2, 0, rotation, &mut buffer)
                .expect("pack");
            let (first, second) = if rotation.swaps_components() {
                buffer.split_at(2)
            } else {
                buffer.split_at(3)
            };
            let from_y = |v: &f32| v.abs() >= 10.0;
            if rotation.swaps_components() {
                assert!(first.iter().all(from_y));
                assert!(!second.iter().any(from_y));
            } else {
                assert!(!first.iter().any(from_y));
                assert!(second.iter().all(from_y));
            }
        }
    }

    #[test]
    fn vector_unpack_covers_y_segment() {
        let buffer = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let mut x = vec![0.0f64; 4];
        let mut y = vec![0.0f64; 4];
        unpack_vector(
            Launch::units(32),
            &buffer,
            &[3, 0],
            &[1, 2, 3],
            2,
            3,
            1,
            &mut x,
            &mut y,
        )
        .expect("unpack");
        assert_eq!(x, vec![2.0, 0.0, 0.0, 1.0]);
        assert_eq!(y, vec![0.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn unpack_of_repack_undoes_rotation() {
        let x = [0.5f64, -1.5, 2.5];
        let y = [4.0f64, 5.0, -6.0];
        let idx = [0, 1, 2];

        for (there, back) in [
            (Rotation::Quarter, Rotation::ThreeQuarter),
            (Rotation::Half, Rotation::Half),
        ] {
            let mut wire = vec![0.0; 6];
            pack_vector(Launch::covering(), &x, &y, &idx, &idx, 3, 3, 0, there, &mut wire)
                .expect("pack");
            let mut rx = vec![0.0; 3];
            let mut ry = vec![0.0; 3];
            unpack_vector(Launch::covering(), &wire, &idx, &idx, 3, 3, 0, &mut rx, &mut ry)
                .expect("unpack");

            let mut wire_back = vec![0.0; 6];
            pack_vector(Launch::covering(), &rx, &ry, &idx, &idx, 3, 3, 0, back, &mut wire_back)
                .expect("repack");
            assert_eq!(wire_back, [x.as_slice(), y.as_slice()].concat());
        }
    }

    #[test]
    fn disjoint_ranges_do_not_interfere() {
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let b = [10.0f32, 20.0, 30.0];
        let mut buffer = vec![0.0f32; 5];
        pack_scalar(Launch::units(8), &a, &[3, 1], 2, 0, &mut buffer).expect("first");
        pack_scalar(Launch::units(8), &b, &[0, 2, 1], 3, 2, &mut buffer).expect("second");
        assert_eq!(buffer, vec![4.0, 2.0, 10.0, 30.0, 20.0]);
    }

    #[test]
    fn structural_errors_are_reported_before_launch() {
        let mut buffer = vec![0.0f32; 2];
        let err = pack_scalar(Launch::covering(), &[1.0, 2.0, 3.0], &[0, 1, 2], 3, 0, &mut buffer)
            .unwrap_err();
        assert!(matches!(err, PackError::RangeOutOfBounds { .. }));
        assert_eq!(buffer, vec![0.0, 0.0]);

        let err = pack_scalar(Launch::covering(), &[1.0f32], &[0], 2, 0, &mut [0.0; 4]).unwrap_err();
        assert!(matches!(err, PackError::IndexCountMismatch { declared: 2, .. }));

        let err = unpack_vector(
            Launch::units(3),
            &[0.0f32; 4],
            &[0, 1],
            &[0, 1],
            2,
            2,
            0,
            &mut [0.0; 2],
            &mut [0.0; 2],
        )
        .unwrap_err();
        assert!(matches!(err, PackError::LaunchTooSmall { units: 3, count: 4 }));
    }

    #[test]
    fn empty_transfers_are_noops() {
        let mut buffer: Vec<f64> = Vec::new();
        let stats = pack_vector(
            Launch::units(64),
            &[1.0],
            &[2.0],
            &[],
            &[],
            0,
            0,
            0,
            Rotation::Half,
            &mut buffer,
        )
        .expect("pack");
        assert_eq!(stats.elements, 0);
        assert_eq!(stats.units, 64);
    }
}
