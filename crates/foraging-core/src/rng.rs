use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

const STREAM_DERIVATION_PRIME: u64 = 0x9E37_79B9_7F4A_7C15;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive an independent stream for one arena of a batch run.
pub fn derive_stream(base_seed: u64, stream: usize) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(
        base_seed.wrapping_add((stream as u64).wrapping_mul(STREAM_DERIVATION_PRIME)),
    )
}
