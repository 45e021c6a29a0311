//! SRP-6a primitive operations over a safe-prime group, with BLAKE2b-512 as
//! the protocol hash.
//!
//! All byte serializations of integers are big-endian and minimal-length
//! unless a `pad_to` width is stated. `PAD_N(x)` left-pads `x` to the byte
//! length of the group modulus.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::crypto::hash::blake2b512;

/// Left-pad the big-endian bytes of `value` to `len` bytes.
///
/// Values longer than `len` are returned unpadded; callers reduce mod N
/// before padding, so that case does not arise on the protocol path.
pub fn pad_to(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= len {
        return bytes;
    }
    let mut padded = vec![0u8; len - bytes.len()];
    padded.extend_from_slice(&bytes);
    padded
}

fn modulus_len(n: &BigUint) -> usize {
    (n.bits() as usize + 7) / 8
}

/// SRP-6a multiplier `k = H(N ‖ PAD_N(g))`.
pub fn calc_k(n: &BigUint, g: &BigUint) -> BigUint {
    let digest = blake2b512(&[&n.to_bytes_be(), &pad_to(g, modulus_len(n))]);
    BigUint::from_bytes_be(&digest)
}

/// Scrambling parameter `u = H(PAD_N(A) ‖ PAD_N(B))`.
pub fn calc_u(a_pub: &BigUint, b_pub: &BigUint, n: &BigUint) -> BigUint {
    let len = modulus_len(n);
    let digest = blake2b512(&[&pad_to(a_pub, len), &pad_to(b_pub, len)]);
    BigUint::from_bytes_be(&digest)
}

/// Private key `x = H(s ‖ H(I ‖ ':' ‖ p))`.
pub fn calc_x(salt: &BigUint, identity: &[u8], password: &[u8]) -> BigUint {
    let inner = blake2b512(&[identity, b":", password]);
    let digest = blake2b512(&[&salt.to_bytes_be(), &inner]);
    BigUint::from_bytes_be(&digest)
}

/// Password verifier `v = g^x mod N`.
pub fn calc_v(
    identity: &[u8],
    password: &[u8],
    salt: &BigUint,
    n: &BigUint,
    g: &BigUint,
) -> BigUint {
    let x = calc_x(salt, identity, password);
    g.modpow(&x, n)
}

/// Server public ephemeral `B = (k·v + g^b) mod N`.
pub fn calc_b_pub(b: &BigUint, n: &BigUint, g: &BigUint, v: &BigUint) -> BigUint {
    let k = calc_k(n, g);
    let kv = (k * v) % n;
    (kv + g.modpow(b, n)) % n
}

/// Server shared secret `S = (A · v^u)^b mod N`.
pub fn calc_server_key(
    a_pub: &BigUint,
    v: &BigUint,
    u: &BigUint,
    b: &BigUint,
    n: &BigUint,
) -> BigUint {
    let base = (a_pub * v.modpow(u, n)) % n;
    base.modpow(b, n)
}

/// Client shared secret `S = (B − k·g^x)^(a + u·x) mod N`, the dual of
/// [`calc_server_key`].
pub fn calc_client_key(
    b_pub: &BigUint,
    g: &BigUint,
    x: &BigUint,
    a: &BigUint,
    u: &BigUint,
    k: &BigUint,
    n: &BigUint,
) -> BigUint {
    let kgx = (k * g.modpow(x, n)) % n;
    // (B - k·g^x) kept non-negative by adding N before subtracting.
    let base = ((b_pub % n) + n - kgx) % n;
    let exp = a + u * x;
    base.modpow(&exp, n)
}

/// Safeguard against a malicious `A`: reject `A ≡ 0 (mod N)`.
pub fn verify_a_mod_n(a_pub: &BigUint, n: &BigUint) -> bool {
    !(a_pub % n).is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random::random_bytes;
    use crate::srp::groups;

    fn biguint(bytes: &[u8]) -> BigUint {
        BigUint::from_bytes_be(bytes)
    }

    #[test]
    fn pad_to_widths() {
        let v = BigUint::from(0x0102u32);
        assert_eq!(pad_to(&v, 4), vec![0, 0, 1, 2]);
        assert_eq!(pad_to(&v, 2), vec![1, 2]);
        // Already wider than requested: returned unpadded.
        assert_eq!(pad_to(&v, 1), vec![1, 2]);
    }

    #[test]
    fn bytes_roundtrip_trims_leading_zeros() {
        let v = biguint(&[0, 0, 9, 8, 7]);
        assert_eq!(v.to_bytes_be(), vec![9, 8, 7]);
        assert_eq!(biguint(&v.to_bytes_be()), v);
    }

    #[test]
    fn shared_secret_law() {
        // Server and client compute the same secret from opposite halves of
        // the exchange, for every group in the table.
        for id in [1024u32, 2048, 3072] {
            let group = groups::by_id(id).unwrap();
            let (n, g) = (&group.n, &group.g);

            let identity = b"alice";
            let password = b"password123";
            let salt = biguint(&random_bytes(64));
            let v = calc_v(identity, password, &salt, n, g);

            let a = biguint(&random_bytes(128));
            let b = biguint(&random_bytes(128));
            let a_pub = g.modpow(&a, n);
            let b_pub = calc_b_pub(&b, n, g, &v);

            let u = calc_u(&a_pub, &b_pub, n);
            let k = calc_k(n, g);
            let x = calc_x(&salt, identity, password);

            let server = calc_server_key(&a_pub, &v, &u, &b, n);
            let client = calc_client_key(&b_pub, g, &x, &a, &u, &k, n);
            assert_eq!(server, client, "group {id}");
        }
    }

    #[test]
    fn wrong_password_diverges() {
        let group = groups::by_id(2048).unwrap();
        let (n, g) = (&group.n, &group.g);

        let salt = biguint(&random_bytes(64));
        let v = calc_v(b"alice", b"right", &salt, n, g);

        let a = biguint(&random_bytes(128));
        let b = biguint(&random_bytes(128));
        let a_pub = g.modpow(&a, n);
        let b_pub = calc_b_pub(&b, n, g, &v);
        let u = calc_u(&a_pub, &b_pub, n);
        let k = calc_k(n, g);

        let server = calc_server_key(&a_pub, &v, &u, &b, n);
        let x_wrong = calc_x(&salt, b"alice", b"wrong");
        let client = calc_client_key(&b_pub, g, &x_wrong, &a, &u, &k, n);
        assert_ne!(server, client);
    }

    #[test]
    fn rejects_a_multiple_of_n() {
        let group = groups::by_id(2048).unwrap();
        let n = &group.n;
        assert!(!verify_a_mod_n(&BigUint::zero(), n));
        assert!(!verify_a_mod_n(n, n));
        assert!(!verify_a_mod_n(&(n * 2u32), n));
        assert!(verify_a_mod_n(&BigUint::from(1u8), n));
    }

    #[test]
    fn u_depends_on_padding() {
        // PAD_N makes u sensitive to the group width, not just the values.
        let g2048 = groups::by_id(2048).unwrap();
        let g3072 = groups::by_id(3072).unwrap();
        let a = BigUint::from(12345u32);
        let b = BigUint::from(67890u32);
        assert_ne!(calc_u(&a, &b, &g2048.n), calc_u(&a, &b, &g3072.n));
    }

    #[test]
    fn verifier_is_deterministic() {
        let group = groups::by_id(3072).unwrap();
        let salt = biguint(b"fixed salt bytes");
        let v1 = calc_v(b"bob", b"hunter2", &salt, &group.n, &group.g);
        let v2 = calc_v(b"bob", b"hunter2", &salt, &group.n, &group.g);
        assert_eq!(v1, v2);
        let v3 = calc_v(b"bob", b"hunter3", &salt, &group.n, &group.g);
        assert_ne!(v1, v3);
    }
}
