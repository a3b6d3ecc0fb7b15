
//! The in-place residual transform of one hypercube.
//!
//! A forward pass rotates every element left by one bit, moving the
//! ordering bit out of the most significant position, and then replaces
//! each element by the XOR difference with its neighbor along every axis.
//! Smooth data collapses to residuals with mostly zero bitplanes,
//! which the chunk encoder then drops.

use crate::profile::{Profile, ResidualBits, Value};


/// Transform the loaded hypercube into residuals, in place.
pub(crate) fn forward<T: Value, const D: usize>(cube: &mut [T::Bits]) {
    for element in cube.iter_mut() {
        *element = element.rotate_left_one();
    }

    // difference the fastest-varying axis first
    for axis in (0 .. D).rev() {
        for line in lines::<T, D>(axis, cube.len()) {
            line.difference(cube);
        }
    }
}

/// Reconstruct the loaded hypercube from residuals, in place.
/// The exact inverse of `forward`.
pub(crate) fn inverse<T: Value, const D: usize>(cube: &mut [T::Bits]) {
    for axis in 0 .. D {
        for line in lines::<T, D>(axis, cube.len()) {
            line.prefix_scan(cube);
        }
    }

    for element in cube.iter_mut() {
        *element = element.rotate_right_one();
    }
}


/// One axis-aligned run of `side_length` elements inside the cube buffer.
struct Line {
    start: usize,
    stride: usize,
    length: usize,
}

impl Line {

    /// Replace each element except the first by the XOR with its predecessor.
    /// Walks backwards so every XOR still reads the original predecessor.
    fn difference<B: ResidualBits>(&self, cube: &mut [B]) {
        for position in (1 .. self.length).rev() {
            let here = self.start + position * self.stride;
            let predecessor = cube[here - self.stride];
            cube[here] ^= predecessor;
        }
    }

    /// Undo `difference` by a front-to-back prefix XOR scan.
    fn prefix_scan<B: ResidualBits>(&self, cube: &mut [B]) {
        for position in 1 .. self.length {
            let here = self.start + position * self.stride;
            let predecessor = cube[here - self.stride];
            cube[here] ^= predecessor;
        }
    }
}

/// All lines of the cube that run along the specified axis.
/// Along axis `a`, consecutive line elements are `side^(D-1-a)` apart
/// in the row-major cube buffer.
fn lines<T: Value, const D: usize>(axis: usize, num_elements: usize) -> impl Iterator<Item = Line> {
    let side_length = Profile::<T, D>::HYPERCUBE_SIDE_LENGTH;

    let mut stride = 1;
    for _ in axis + 1 .. D {
        stride *= side_length;
    }

    let num_slices = num_elements / (side_length * stride);

    (0 .. num_slices).flat_map(move |slice| {
        (0 .. stride).map(move |offset| Line {
            start: slice * side_length * stride + offset,
            stride,
            length: side_length,
        })
    })
}
