//! Random data helpers, mostly for tests and software authenticators.

use rand::RngCore;

/// Generate random data of specific length from the thread local RNG.
pub fn random_vec(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}
