//! CPU workload: Miller–Rabin primality testing with random witnesses.

use rand::Rng;
use serde_json::Value;

/// Number of random witnesses tried per candidate.
///
/// Each witness lets a composite slip through with probability at most 1/4, so a composite is
/// reported as prime with probability at most `4^-8`.
pub const WITNESS_COUNT: usize = 8;

/// Decodes a prime task and tests the candidate.
///
/// Integers, integral floats and numeric strings are accepted. Anything else, including negative
/// or fractional numbers, is treated as definitely not prime.
pub fn check(task: &Value) -> bool {
    match candidate(task) {
        Some(n) => is_probable_prime(n),
        None => {
            tracing::debug!(?task, "prime candidate is not a non-negative integer");
            false
        }
    }
}

/// Extracts an integer candidate from a task value.
pub fn candidate(task: &Value) -> Option<u64> {
    match task {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Returns `false` if `n` is certainly composite, `true` if it is very likely prime.
pub fn is_probable_prime(n: u64) -> bool {
    is_probable_prime_with(&mut rand::rng(), n)
}

/// Same as [`is_probable_prime`], drawing witnesses from the given RNG.
pub fn is_probable_prime_with<R: Rng + ?Sized>(rng: &mut R, n: u64) -> bool {
    match n {
        0 | 1 | 4 | 6 | 8 | 9 => return false,
        2 | 3 | 5 | 7 => return true,
        n if n % 2 == 0 => return false,
        _ => {}
    }

    // n - 1 = d * 2^s with d odd
    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;

    for _ in 0..WITNESS_COUNT {
        let witness = rng.random_range(2..n - 1);
        if proves_composite(witness, d, s, n) {
            return false;
        }
    }

    true
}

fn proves_composite(witness: u64, d: u64, s: u32, n: u64) -> bool {
    let mut x = pow_mod(witness, d, n);
    if x == 1 || x == n - 1 {
        return false;
    }

    for _ in 1..s {
        x = mul_mod(x, x, n);
        if x == n - 1 {
            return false;
        }
    }

    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}
