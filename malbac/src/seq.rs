use rand::Rng;
use rand_distr::{Distribution, Poisson};
const fn complement_table() -> [u8; 256] {
    let mut table = [b'N'; 256];
    table[b'A' as usize] = b'T';
    table[b'C' as usize] = b'G';
    table[b'G' as usize] = b'C';
    table[b'T' as usize] = b'A';
    table[b'a' as usize] = b't';
    table[b'c' as usize] = b'g';
    table[b'g' as usize] = b'c';
    table[b't' as usize] = b'a';
    table
}
const COMPLEMENT: [u8; 256] = complement_table();

/// Complement of a base. Anything other than A,C,G,T (either case) becomes N.
pub fn complement_base(base: u8) -> u8 {
    COMPLEMENT[base as usize]
}

/// Complement of a sequence, without reversing it.
pub fn complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| complement_base(b)).collect()
}

/// Reverse complement of a sequence.
pub fn revcmp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

pub fn is_gc(base: u8) -> bool {
    base == b'G' || base == b'C'
}

/// The number of G and C in the (uppercase) sequence.
pub fn gc_count(seq: &[u8]) -> usize {
    bytecount::count(seq, b'G') + bytecount::count(seq, b'C')
}

/// Draw from Poisson(lambda). Non-positive lambda always gives zero.
pub fn poisson<R: Rng>(rng: &mut R, lambda: f64) -> u64 {
    if !(0f64 < lambda && lambda.is_finite()) {
        return 0;
    }
    match Poisson::new(lambda) {
        Ok(dist) => dist.sample(rng) as u64,
        Err(_) => 0,
    }
}
