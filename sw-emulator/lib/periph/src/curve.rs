/*++

Licensed under the Apache-2.0 license.

File Name:

    curve.rs

Abstract:

    File contains affine short Weierstrass arithmetic over a prime field,
    used by the IPECC model to compute point operation results.

--*/

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

/// Curve `y^2 = x^3 + a*x + b` over `GF(p)` with subgroup order `q`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Curve {
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    pub q: BigUint,
}

/// Affine point, or the point at infinity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    /// Coordinates, with the point at infinity mapped to `(0, 0)`.
    pub fn coords(&self) -> (BigUint, BigUint) {
        match self {
            Point::Infinity => (BigUint::zero(), BigUint::zero()),
            Point::Affine { x, y } => (x.clone(), y.clone()),
        }
    }
}

impl Curve {
    fn reduce(&self, v: &BigUint) -> BigUint {
        if self.p.is_zero() {
            return BigUint::zero();
        }
        v.mod_floor(&self.p)
    }

    fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        self.reduce(&(self.reduce(a) + &self.p - self.reduce(b)))
    }

    fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        self.reduce(&(a * b))
    }

    /// Inverse through Fermat's little theorem; zero maps to zero.
    fn inv(&self, a: &BigUint) -> BigUint {
        if self.p <= BigUint::one() {
            return BigUint::zero();
        }
        let e = &self.p - BigUint::from(2u32);
        self.reduce(a).modpow(&e, &self.p)
    }

    pub fn is_on_curve(&self, pt: &Point) -> bool {
        match pt {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                if self.p.is_zero() || x >= &self.p || y >= &self.p {
                    return false;
                }
                let lhs = self.mul(y, y);
                let rhs = self.reduce(&(self.mul(&self.mul(x, x), x) + self.mul(&self.a, x) + &self.b));
                lhs == rhs
            }
        }
    }

    pub fn neg(&self, pt: &Point) -> Point {
        match pt {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::Affine {
                x: x.clone(),
                y: self.sub(&BigUint::zero(), y),
            },
        }
    }

    pub fn double(&self, pt: &Point) -> Point {
        match pt {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => {
                if self.reduce(y).is_zero() {
                    return Point::Infinity;
                }
                let three_x2 = self.mul(&BigUint::from(3u32), &self.mul(x, x));
                let num = self.reduce(&(three_x2 + &self.a));
                let den = self.inv(&self.mul(&BigUint::from(2u32), y));
                let lambda = self.mul(&num, &den);
                let x3 = self.sub(&self.mul(&lambda, &lambda), &self.mul(&BigUint::from(2u32), x));
                let y3 = self.sub(&self.mul(&lambda, &self.sub(x, &x3)), y);
                Point::Affine { x: x3, y: y3 }
            }
        }
    }

    pub fn add(&self, p1: &Point, p2: &Point) -> Point {
        match (p1, p2) {
            (Point::Infinity, _) => p2.clone(),
            (_, Point::Infinity) => p1.clone(),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => {
                if self.reduce(x1) == self.reduce(x2) {
                    if self.reduce(y1) == self.reduce(y2) {
                        return self.double(p1);
                    }
                    return Point::Infinity;
                }
                let lambda = self.mul(&self.sub(y2, y1), &self.inv(&self.sub(x2, x1)));
                let x3 = self.sub(&self.sub(&self.mul(&lambda, &lambda), x1), x2);
                let y3 = self.sub(&self.mul(&lambda, &self.sub(x1, &x3)), y1);
                Point::Affine { x: x3, y: y3 }
            }
        }
    }

    /// One Montgomery ladder iteration on `(r0, r1)` for scalar bit `bit`.
    /// Returns the intermediate pair after the addition, then the pair after
    /// the doubling.
    pub fn ladder_step(&self, r0: &Point, r1: &Point, bit: bool) -> [(Point, Point); 2] {
        let sum = self.add(r0, r1);
        if bit {
            let after_add = (sum.clone(), r1.clone());
            let after_dbl = (sum, self.double(r1));
            [after_add, after_dbl]
        } else {
            let after_add = (r0.clone(), sum.clone());
            let after_dbl = (self.double(r0), sum);
            [after_add, after_dbl]
        }
    }

    /// `[k]pt` over the `nbits` low bits of `k`, most significant first.
    pub fn scalar_mul(&self, k: &BigUint, pt: &Point, nbits: u32) -> Point {
        let mut r0 = Point::Infinity;
        let mut r1 = pt.clone();
        for j in (0..nbits).rev() {
            let [_, (n0, n1)] = self.ladder_step(&r0, &r1, k.bit(u64::from(j)));
            r0 = n0;
            r1 = n1;
        }
        r0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hex_literal::hex;

    pub(crate) fn p256() -> (Curve, Point) {
        let curve = Curve {
            p: BigUint::from_bytes_be(&hex!(
                "ffffffff00000001000000000000000000000000ffffffffffffffffffffffff"
            )),
            a: BigUint::from_bytes_be(&hex!(
                "ffffffff00000001000000000000000000000000fffffffffffffffffffffffc"
            )),
            b: BigUint::from_bytes_be(&hex!(
                "5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b"
            )),
            q: BigUint::from_bytes_be(&hex!(
                "ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551"
            )),
        };
        let g = Point::Affine {
            x: BigUint::from_bytes_be(&hex!(
                "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"
            )),
            y: BigUint::from_bytes_be(&hex!(
                "4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"
            )),
        };
        (curve, g)
    }

    #[test]
    fn test_generator_on_curve() {
        let (curve, g) = p256();
        assert!(curve.is_on_curve(&g));
        assert!(curve.is_on_curve(&curve.double(&g)));
        let (x, y) = g.coords();
        assert!(!curve.is_on_curve(&Point::Affine { x, y: y + 1u32 }));
    }

    #[test]
    fn test_double_matches_add() {
        let (curve, g) = p256();
        assert_eq!(curve.double(&g), curve.add(&g, &g));
        assert_eq!(curve.add(&g, &curve.neg(&g)), Point::Infinity);
        assert_eq!(curve.add(&g, &Point::Infinity), g);
    }

    #[test]
    fn test_scalar_mul() {
        let (curve, g) = p256();
        let three_g = curve.add(&curve.double(&g), &g);
        assert_eq!(curve.scalar_mul(&BigUint::from(3u32), &g, 256), three_g);
        assert_eq!(curve.scalar_mul(&BigUint::zero(), &g, 256), Point::Infinity);
        assert_eq!(curve.scalar_mul(&curve.q, &g, 256), Point::Infinity);

        // [2]G, from the P-256 test vectors
        let (x, y) = curve.scalar_mul(&BigUint::from(2u32), &g, 256).coords();
        assert_eq!(
            x.to_bytes_be(),
            hex!("7cf27b188d034f7e8a52380304b51ac3c08969e277f21b35a60b48fc47669978")
        );
        assert_eq!(
            y.to_bytes_be(),
            hex!("07775510db8ed040293d9ac69f7430dbba7dade63ce982299e04b79d227873d1")
        );
    }
}
