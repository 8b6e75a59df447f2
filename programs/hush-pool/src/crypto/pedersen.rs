//! Baby Jubjub Pedersen hash, circomlib layout
//!
//! The deposit and withdraw circuits hash notes with circomlib's Pedersen
//! hash and keep the x-coordinate of the resulting point:
//! ```text
//! commitment = Pedersen(secret_le31 || nonce_le31).x
//! nullifier  = Pedersen(secret_le31 || index_le31).x
//! ```
//!
//! # Encoding
//! The message is read as little-endian bits and cut into 200-bit
//! segments. Each segment is cut into 4-bit windows: three magnitude bits
//! and a sign bit, giving a digit in `±[1, 8]`. Window `w` is weighted by
//! `32^w`, and segment `s` multiplies generator `s`.
//!
//! Generators are circomlib's `PedersenGenerator_{s}_{try}` points (blake256
//! try-and-increment), already multiplied by the cofactor. Only the first
//! three are pinned: a note hash is 62 bytes and fits in three segments.

use ark_bn254::Fr;
use ark_ff::{Field, MontFp};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};

use crate::crypto::field::{FieldElement, RANDOM_BYTES};
use crate::crypto::poseidon::{CircomPoseidon, PoolHasher};
use crate::error::{PoolError, Result};

/// Twisted Edwards `a` of Baby Jubjub (circomlib form).
const COEFF_A: Fr = MontFp!("168700");
/// Twisted Edwards `d` of Baby Jubjub (circomlib form).
const COEFF_D: Fr = MontFp!("168696");

const FR_ZERO: Fr = MontFp!("0");
const FR_ONE: Fr = MontFp!("1");

/// Order of the prime subgroup the generators span.
const SUBGROUP_ORDER: &str =
    "2736030358979909402780800718157159386076813972158567259200215660948447373041";

const WINDOW_BITS: usize = 4;
const WINDOWS_PER_SEGMENT: usize = 50;
const SEGMENT_BITS: usize = WINDOW_BITS * WINDOWS_PER_SEGMENT;

const GENERATORS: [Point; 3] = [
    Point {
        x: MontFp!("10457101036533406547632367118273992217979173478358440826365724437999023779287"),
        y: MontFp!("19824078218392094440610104313265183977899662750282163392862422243483260492317"),
    },
    Point {
        x: MontFp!("2671756056509184035029146175565761955751135805354291559563293617232983272177"),
        y: MontFp!("2663205510731142763556352975002641716101654201788071096152948830924149045094"),
    },
    Point {
        x: MontFp!("5802099305472655231388284418920769829666717045250560929368476121199858275951"),
        y: MontFp!("5980429700218124965372158798884772646841287887664001482443826541541529227896"),
    },
];

/// Longest message the pinned generators cover.
pub const MAX_MESSAGE_BYTES: usize = GENERATORS.len() * SEGMENT_BITS / 8;

/// Affine Baby Jubjub point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Point {
    x: Fr,
    y: Fr,
}

impl Point {
    const IDENTITY: Point = Point {
        x: FR_ZERO,
        y: FR_ONE,
    };

    fn add(&self, other: &Point) -> Result<Point> {
        let tau = COEFF_D * self.x * other.x * self.y * other.y;
        let x_den = (FR_ONE + tau)
            .inverse()
            .ok_or_else(|| PoolError::Hash("baby jubjub addition hit a pole".to_string()))?;
        let y_den = (FR_ONE - tau)
            .inverse()
            .ok_or_else(|| PoolError::Hash("baby jubjub addition hit a pole".to_string()))?;

        Ok(Point {
            x: (self.x * other.y + self.y * other.x) * x_den,
            y: (self.y * other.y - COEFF_A * self.x * other.x) * y_den,
        })
    }

    /// Double-and-add, least significant bit first.
    fn mul(&self, scalar: &BigUint) -> Result<Point> {
        let mut acc = Point::IDENTITY;
        let mut base = *self;
        for byte in scalar.to_bytes_le() {
            for bit in 0..8 {
                if (byte >> bit) & 1 == 1 {
                    acc = acc.add(&base)?;
                }
                base = base.add(&base)?;
            }
        }
        Ok(acc)
    }

    #[cfg(test)]
    fn on_curve(&self) -> bool {
        let (x2, y2) = (self.x.square(), self.y.square());
        COEFF_A * x2 + y2 == FR_ONE + COEFF_D * x2 * y2
    }
}

fn subgroup_order() -> Result<BigInt> {
    BigInt::parse_bytes(SUBGROUP_ORDER.as_bytes(), 10)
        .ok_or_else(|| PoolError::Hash("bad subgroup order constant".to_string()))
}

/// Signed scalar of one segment.
fn segment_scalar(bits: &[bool], order: &BigInt) -> Result<BigUint> {
    let mut scalar = BigInt::zero();
    let mut weight = BigInt::one();

    for window in bits.chunks(WINDOW_BITS) {
        let mut digit: i64 = 1;
        for (shift, bit) in window.iter().take(WINDOW_BITS - 1).enumerate() {
            if *bit {
                digit += 1 << shift;
            }
        }
        // A short trailing window carries no sign bit
        if window.len() == WINDOW_BITS && window[WINDOW_BITS - 1] {
            digit = -digit;
        }
        scalar += BigInt::from(digit) * &weight;
        weight <<= WINDOW_BITS + 1;
    }

    if scalar.sign() == Sign::Minus {
        scalar += order;
    }
    scalar
        .to_biguint()
        .ok_or_else(|| PoolError::Hash("negative pedersen scalar".to_string()))
}

/// circomlib `pedersenHash(message)`, returning the point's x-coordinate.
pub fn pedersen_hash(message: &[u8]) -> Result<FieldElement> {
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(PoolError::Hash(format!(
            "pedersen message of {} bytes exceeds {MAX_MESSAGE_BYTES}",
            message.len()
        )));
    }

    let bits: Vec<bool> = message
        .iter()
        .flat_map(|byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .collect();
    let order = subgroup_order()?;

    let mut acc = Point::IDENTITY;
    for (generator, segment) in GENERATORS.iter().zip(bits.chunks(SEGMENT_BITS)) {
        let scalar = segment_scalar(segment, &order)?;
        acc = acc.add(&generator.mul(&scalar)?)?;
    }

    Ok(FieldElement::from_fr(acc.x))
}

/// 31-byte little-endian encoding used for note material.
fn le31(value: &FieldElement) -> Result<[u8; RANDOM_BYTES]> {
    let be = value.to_be_bytes();
    if be[0] != 0 {
        return Err(PoolError::InvalidFieldElement(format!(
            "{value} does not fit in {RANDOM_BYTES} bytes"
        )));
    }

    let mut le = [0u8; RANDOM_BYTES];
    for (dst, src) in le.iter_mut().zip(be[1..].iter().rev()) {
        *dst = *src;
    }
    Ok(le)
}

/// The pool's circuit hashes: Poseidon tree nodes, Pedersen note hashes.
///
/// Note inputs must fit in 31 bytes; secrets and nonces drawn by
/// [`FieldElement::random`] always do.
#[derive(Clone, Copy, Debug, Default)]
pub struct CircomPedersen;

impl PoolHasher for CircomPedersen {
    fn hash_two_to_one(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement> {
        CircomPoseidon.hash_two_to_one(left, right)
    }

    fn hash_commitment(&self, x: &FieldElement, y: &FieldElement) -> Result<FieldElement> {
        let mut message = [0u8; 2 * RANDOM_BYTES];
        message[..RANDOM_BYTES].copy_from_slice(&le31(x)?);
        message[RANDOM_BYTES..].copy_from_slice(&le31(y)?);
        pedersen_hash(&message)
    }
}
