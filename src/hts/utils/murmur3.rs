/// 32-bit murmur3, used where a stable hash is needed across runs and machines (the std hasher
/// is randomly seeded per process).
#[derive(Clone, Copy, Debug)]
pub(crate) struct Murmur3 {
    seed: u32,
}

impl Murmur3 {
    /** Constructs a Murmur3 hash with the given seed. */
    pub(crate) const fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Hashes bytes two at a time, the way a UTF-16 string of the same ASCII text is hashed.
    pub(crate) fn hash_bytes(&self, bytes: &[u8]) -> u32 {
        let mut h1 = self.seed;

        let mut chunks = bytes.chunks_exact(2);
        for c in &mut chunks {
            let k1 = Self::mix_k1(c[0] as u32 | ((c[1] as u32) << 16));
            h1 = Self::mix_h1(h1, k1);
        }

        // deal with any remaining bytes
        if let [last] = chunks.remainder() {
            h1 ^= Self::mix_k1(*last as u32);
        }

        Self::fmix(h1, 2 * bytes.len() as u32)
    }

    /// Hashes a sequence of 32-bit words.
    pub(crate) fn hash_ints(&self, values: &[i32]) -> u32 {
        let mut h1 = self.seed;

        for v in values {
            h1 = Self::mix_h1(h1, Self::mix_k1(*v as u32));
        }

        Self::fmix(h1, 4 * values.len() as u32)
    }

    fn mix_k1(mut k1: u32) -> u32 {
        const C1: u32 = 0xcc9e2d51;
        const C2: u32 = 0x1b873593;

        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1.wrapping_mul(C2)
    }

    fn mix_h1(mut h1: u32, k1: u32) -> u32 {
        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1.wrapping_mul(5).wrapping_add(0xe6546b64)
    }

    fn fmix(mut h1: u32, length: u32) -> u32 {
        h1 ^= length;
        h1 ^= h1 >> 16;
        h1 = h1.wrapping_mul(0x85ebca6b);
        h1 ^= h1 >> 13;
        h1 = h1.wrapping_mul(0xc2b2ae35);
        h1 ^= h1 >> 16;

        h1
    }
}
