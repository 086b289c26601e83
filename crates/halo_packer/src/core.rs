use std::fmt;
use std::ops::Neg;

use bytemuck::Pod;
use glam::{Mat2, Vec2};

use crate::error::{PackError, Result};

/// Numeric width a set of kernels is instantiated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub const fn bytes(self) -> u64 {
        match self {
            FloatWidth::F32 => 4,
            FloatWidth::F64 => 8,
        }
    }
}

impl fmt::Display for FloatWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatWidth::F32 => f.write_str("f32"),
            FloatWidth::F64 => f.write_str("f64"),
        }
    }
}

/// Element type of field arrays and communication buffers.
///
/// Implemented for `f32` and `f64` only; the width is resolved at compile time
/// so no kernel ever branches on it.
pub trait FieldElement:
    Pod + Default + PartialEq + Neg<Output = Self> + fmt::Debug + Send + Sync + 'static
{
    const WIDTH: FloatWidth;
}

impl FieldElement for f32 {
    const WIDTH: FloatWidth = FloatWidth::F32;
}

impl FieldElement for f64 {
    const WIDTH: FloatWidth = FloatWidth::F64;
}

/// Quarter-turn rotation applied to a planar vector while packing.
///
/// The discriminant is the wire code handed to the vector pack kernel.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// `(x, y) -> (x, y)`
    #[default]
    Identity = 0,
    /// `(x, y) -> (y, -x)`
    Quarter = 1,
    /// `(x, y) -> (-x, -y)`
    Half = 2,
    /// `(x, y) -> (-y, x)`
    ThreeQuarter = 3,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Identity,
        Rotation::Quarter,
        Rotation::Half,
        Rotation::ThreeQuarter,
    ];

    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Builds a rotation from a signed number of quarter turns, in the same
    /// direction as `Quarter`.
    pub fn from_quarter_turns(turns: i32) -> Self {
        Self::ALL[turns.rem_euclid(4) as usize]
    }

    /// True when the packed buffer leads with the Y-derived segment.
    pub const fn swaps_components(self) -> bool {
        matches!(self, Rotation::Quarter | Rotation::ThreeQuarter)
    }

    pub fn apply<T: Neg<Output = T>>(self, x: T, y: T) -> (T, T) {
        match self {
            Rotation::Identity => (x, y),
            Rotation::Quarter => (y, -x),
            Rotation::Half => (-x, -y),
            Rotation::ThreeQuarter => (-y, x),
        }
    }

    /// `self` applied after `first`.
    pub fn compose(self, first: Rotation) -> Rotation {
        Self::ALL[((self.code() + first.code()) % 4) as usize]
    }

    pub fn inverse(self) -> Rotation {
        Self::ALL[((4 - self.code()) % 4) as usize]
    }

    pub fn as_mat2(self) -> Mat2 {
        let (x_axis, y_axis) = match self {
            Rotation::Identity => (Vec2::X, Vec2::Y),
            Rotation::Quarter => (Vec2::NEG_Y, Vec2::X),
            Rotation::Half => (Vec2::NEG_X, Vec2::NEG_Y),
            Rotation::ThreeQuarter => (Vec2::Y, Vec2::NEG_X),
        };
        Mat2::from_cols(x_axis, y_axis)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = PackError;

    fn try_from(code: u32) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(PackError::InvalidRotation(code))
    }
}

/// Number of units of work a launch provides.
///
/// Units past the element count are inert, so any launch at least as large as
/// the count produces the same result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Launch {
    units: Option<u32>,
}

impl Launch {
    /// Exactly as many units as there are elements.
    pub const fn covering() -> Self {
        Self { units: None }
    }

    pub const fn units(units: u32) -> Self {
        Self { units: Some(units) }
    }

    pub fn resolve(self, count: u32) -> Result<u32> {
        match self.units {
            None => Ok(count),
            Some(units) if units >= count => Ok(units),
            Some(units) => Err(PackError::LaunchTooSmall { units, count }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    pub elements: u32,
    pub units: u32,
    /// Device grid shape; `None` for the CPU reference path.
    pub workgroups: Option<[u32; 2]>,
}

pub(crate) fn vector_count(count_x: u32, count_y: u32) -> Result<u32> {
    count_x
        .checked_add(count_y)
        .ok_or(PackError::LayoutOverflow)
}

pub(crate) fn check_index_count(label: &'static str, declared: u32, available: usize) -> Result<()> {
    if declared as usize > available {
        return Err(PackError::IndexCountMismatch {
            label,
            declared,
            available,
        });
    }
    Ok(())
}

/// Buffer positions `offset + i` are computed in u32, so the last one must
/// not pass `u32::MAX` even when the buffer itself is longer.
pub(crate) fn check_range(label: &'static str, offset: u32, count: u32, len: usize) -> Result<()> {
    let start = offset as u64;
    let end = start + count as u64;
    if end > len as u64 || end > u32::MAX as u64 + 1 {
        return Err(PackError::RangeOutOfBounds {
            label,
            start,
            end,
            len,
        });
    }
    Ok(())
}
