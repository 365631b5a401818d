//! Deterministic 64-bit fingerprints for Cap'n Proto type and file IDs.
//!
//! The mixing function is the 33-to-64 byte case of LLVM's `hash_value`
//! (itself derived from CityHash), applied to fixed 64-byte blocks. Unlike
//! `std::hash`, the output never depends on the process or platform.

/// Version of the generated schemas. Part of every type ID, so bumping it
/// changes all of them.
pub const ESI_COSIM_SCHEMA_VERSION: u64 = 1;

/// Cap'n Proto IDs always have the high bit set.
pub const CAPNP_ID_TAG: u64 = 0x8000_0000_0000_0000;

const K0: u64 = 0xc3a5_c85c_97cb_3127;
const K2: u64 = 0x9ae1_6a3b_2f90_404f;

const BLOCK: usize = 64;

fn fetch64(s: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&s[at..at + 8]);
    u64::from_le_bytes(word)
}

fn shift_mix(v: u64) -> u64 {
    v ^ (v >> 47)
}

/// Hash 33 to 64 bytes of `s`.
fn hash_33to64_bytes(s: &[u8], seed: u64) -> u64 {
    let len = s.len();
    debug_assert!((33..=64).contains(&len));
    let f = |at: usize| fetch64(s, at);

    let mut z = f(24);
    let mut a = f(0).wrapping_add(
        (len as u64)
            .wrapping_add(f(len - 16))
            .wrapping_mul(K0),
    );
    let mut b = a.wrapping_add(z).rotate_right(52);
    let mut c = a.rotate_right(37);
    a = a.wrapping_add(f(8));
    c = c.wrapping_add(a.rotate_right(7));
    a = a.wrapping_add(f(16));
    let vf = a.wrapping_add(z);
    let vs = b.wrapping_add(a.rotate_right(31)).wrapping_add(c);

    a = f(16).wrapping_add(f(len - 32));
    z = f(len - 8);
    b = a.wrapping_add(z).rotate_right(52);
    c = a.rotate_right(37);
    a = a.wrapping_add(f(len - 24));
    c = c.wrapping_add(a.rotate_right(7));
    a = a.wrapping_add(f(len - 16));
    let wf = a.wrapping_add(z);
    let ws = b.wrapping_add(a.rotate_right(31)).wrapping_add(c);

    let r = shift_mix(
        vf.wrapping_add(ws)
            .wrapping_mul(K2)
            .wrapping_add(wf.wrapping_add(vs).wrapping_mul(K0)),
    );
    shift_mix((seed ^ r.wrapping_mul(K0)).wrapping_add(vs)).wrapping_mul(K2)
}

/// Fingerprint `text` as a Cap'n Proto ID.
///
/// The text is padded with spaces to a multiple of 64 bytes and each block is
/// folded into a running hash seeded with [ESI_COSIM_SCHEMA_VERSION]. The
/// high bit of the result is always set.
pub fn fingerprint(text: &str) -> u64 {
    let mut bytes = text.as_bytes().to_vec();
    let overhang = bytes.len() % BLOCK;
    if overhang != 0 {
        bytes.resize(bytes.len() + BLOCK - overhang, b' ');
    }
    let hash = bytes
        .chunks_exact(BLOCK)
        .fold(ESI_COSIM_SCHEMA_VERSION, |seed, block| {
            hash_33to64_bytes(block, seed)
        });
    hash | CAPNP_ID_TAG
}
