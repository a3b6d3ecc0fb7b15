
//! Round-trip testing with randomized extents and contents.
//! Contents are generated as random bit patterns, which includes
//! NaN payloads, infinities, subnormals and signed zeros,
//! so equality is always checked on the bits.

extern crate ndzip;

use ndzip::prelude::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::convert::TryInto;


fn random_f32_bits(random: &mut StdRng, count: usize) -> Vec<f32> {
    (0 .. count).map(|_| f32::from_bits(random.random())).collect()
}

fn random_f64_bits(random: &mut StdRng, count: usize) -> Vec<f64> {
    (0 .. count).map(|_| f64::from_bits(random.random())).collect()
}

/// Compress sequentially, check the bound, decompress, compare bits.
/// Returns the compressed stream for further inspection.
fn roundtrip<T: Value, const D: usize>(values: &[T], extent: Extent<D>) -> Vec<u8> {
    let data = Slice::new(values, extent).unwrap();

    let bound = ndzip::compressed_size_bound::<T, D>(extent).unwrap();
    let mut stream = vec![0_u8; bound];
    let length = sequential::compress(data, &mut stream).unwrap();
    assert!(length <= bound, "compressed length exceeds the bound");
    stream.truncate(length);

    let mut decoded = vec![T::default(); values.len()];
    let consumed = sequential::decompress(&stream, SliceMut::new(&mut decoded, extent).unwrap()).unwrap();
    assert_eq!(consumed, length, "a well-formed stream is consumed completely");

    for (original, decoded) in values.iter().zip(&decoded) {
        assert_eq!(original.to_residual_bits(), decoded.to_residual_bits());
    }

    stream
}


#[test]
fn random_contents_of_one_dimension() {
    let mut random = StdRng::seed_from_u64(1);

    for &extent in &[1, 2, 100, 4095, 4096, 4097, 3 * 4096 + 17] {
        let values = random_f32_bits(&mut random, extent);
        roundtrip(&values, Extent::new([extent]));

        let values = random_f64_bits(&mut random, extent);
        roundtrip(&values, Extent::new([extent]));
    }
}

#[test]
fn random_contents_of_two_dimensions() {
    let mut random = StdRng::seed_from_u64(2);

    for &extent in &[[1, 1], [64, 64], [64, 65], [65, 64], [5, 1000], [130, 70], [192, 200]] {
        let count = extent[0] * extent[1];

        let values = random_f32_bits(&mut random, count);
        roundtrip(&values, Extent::new(extent));

        let values = random_f64_bits(&mut random, count);
        roundtrip(&values, Extent::new(extent));
    }
}

#[test]
fn random_contents_of_three_dimensions() {
    let mut random = StdRng::seed_from_u64(3);

    for &extent in &[[1, 1, 1], [16, 16, 16], [16, 16, 17], [17, 33, 50], [40, 40, 5]] {
        let count = extent[0] * extent[1] * extent[2];

        let values = random_f32_bits(&mut random, count);
        roundtrip(&values, Extent::new(extent));

        let values = random_f64_bits(&mut random, count);
        roundtrip(&values, Extent::new(extent));
    }
}

#[test]
fn random_extents_roundtrip() {
    let mut random = StdRng::seed_from_u64(4);

    for _ in 0 .. 20 {
        let extent = [
            random.random_range(1 ..= 80_usize),
            random.random_range(1 ..= 80_usize),
            random.random_range(1 ..= 80_usize),
        ];

        let values = random_f32_bits(&mut random, extent[0] * extent[1] * extent[2]);
        roundtrip(&values, Extent::new(extent));
    }
}

#[test]
fn smooth_contents_compress_and_roundtrip() {
    // smooth data is the intended use case: the stream should come out
    // noticeably smaller than the input
    let extent = Extent::new([128, 128]);
    let values: Vec<f32> = (0 .. 128 * 128)
        .map(|index| ((index % 128) as f32 * 0.01).sin() + (index / 128) as f32)
        .collect();

    let stream = roundtrip(&values, extent);
    assert!(stream.len() < 128 * 128 * 4, "smooth data should actually compress");
}

#[test]
fn special_values_roundtrip() {
    let mut values = vec![0.0_f32; 4096 + 77];
    values[0] = -0.0;
    values[1] = f32::NAN;
    values[2] = -f32::NAN;
    values[3] = f32::from_bits(0x7f80_0001); // signalling NaN payload
    values[4] = f32::INFINITY;
    values[5] = f32::NEG_INFINITY;
    values[6] = f32::MIN_POSITIVE;
    values[7] = -f32::MIN_POSITIVE;
    values[4100] = f32::from_bits(0xffff_ffff); // NaN in the border region

    roundtrip(&values, Extent::new([4096 + 77]));
}

#[test]
fn multiple_superblocks_roundtrip() {
    let mut random = StdRng::seed_from_u64(5);

    // 65 hypercubes: one full superblock plus one with a single hypercube
    let count = 65 * 4096 + 100;
    let values = random_f32_bits(&mut random, count);
    let stream = roundtrip(&values, Extent::new([count]));

    // the file offset table has two superblock entries, the last one
    // being the border position
    let entries: Vec<u64> = stream[.. 16].chunks_exact(8)
        .map(|bytes| u64::from_le_bytes(bytes.try_into().unwrap()))
        .collect();

    assert!(16 < entries[0] && entries[0] < entries[1]);
    assert_eq!(entries[1] as usize, stream.len() - 100 * 4);
}

#[test]
fn decompression_is_idempotent() {
    let mut random = StdRng::seed_from_u64(6);

    let extent = Extent::new([70, 70]);
    let values = random_f64_bits(&mut random, 70 * 70);
    let stream = roundtrip(&values, extent);

    let mut first = vec![0.0_f64; 70 * 70];
    let mut second = vec![0.0_f64; 70 * 70];
    sequential::decompress(&stream, SliceMut::new(&mut first, extent).unwrap()).unwrap();
    sequential::decompress(&stream, SliceMut::new(&mut second, extent).unwrap()).unwrap();

    for (first, second) in first.iter().zip(&second) {
        assert_eq!(first.to_bits(), second.to_bits());
    }
}

#[test]
fn invalid_extents_are_rejected_before_any_work() {
    assert!(ndzip::compressed_size_bound::<f32, 2>(Extent::new([0, 10])).is_err());
    assert!(ndzip::compressed_size_bound::<f64, 3>(Extent::new([usize::MAX, 2, 2])).is_err());

    // a slice cannot even be constructed over a mismatched extent
    assert!(Slice::new(&[1.0_f32; 10], Extent::new([11])).is_err());
}

#[test]
fn compressing_into_a_tiny_buffer_fails_cleanly() {
    let values = vec![1.5_f32; 4096];
    let data = Slice::new(&values, Extent::new([4096])).unwrap();

    let mut stream = vec![0_u8; 64];
    assert_eq!(
        sequential::compress(data, &mut stream),
        Err(Error::InsufficientBuffer)
    );
}
