use crate::traits::Scalar;
use num_traits::{One, Zero};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Truncated Taylor series for forward mode AD.
/// coeffs[i]: i-th Taylor coefficient with respect to the seeded variable,
/// so a `Jet<N>` carries derivatives up to order `N - 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet<const N: usize> {
    coeffs: [f64; N],
}

impl<const N: usize> Jet<N> {
    pub fn constant(value: f64) -> Self {
        let mut coeffs = [0.0; N];
        if N > 0 {
            coeffs[0] = value;
        }
        Self { coeffs }
    }

    /// Seeds the independent variable at `value`.
    pub fn variable(value: f64) -> Self {
        let mut jet = Self::constant(value);
        if N > 1 {
            jet.coeffs[1] = 1.0;
        }
        jet
    }

    pub fn coefficients(&self) -> &[f64; N] {
        &self.coeffs
    }

    /// The `k`-th derivative with respect to the seeded variable (`k! * c_k`).
    /// Orders beyond the truncation are reported as zero.
    pub fn derivative(&self, k: usize) -> f64 {
        if k >= N {
            return 0.0;
        }
        let factorial: f64 = (1..=k).map(|i| i as f64).product();
        self.coeffs[k] * factorial
    }

    pub fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::one();
        }
        let mut base = if n < 0 { self.recip() } else { self };
        let mut exp = n.unsigned_abs();
        let mut acc = Self::one();
        while exp > 0 {
            if exp & 1 == 1 {
                acc *= base;
            }
            base = base * base;
            exp >>= 1;
        }
        acc
    }

    pub fn recip(self) -> Self {
        Self::one() / self
    }

    pub fn sqrt(self) -> Self {
        // s*s = a  =>  2 s0 s_k = a_k - sum_{j=1}^{k-1} s_j s_{k-j}
        let mut out = [0.0; N];
        if N == 0 {
            return Self { coeffs: out };
        }
        out[0] = self.coeffs[0].sqrt();
        for k in 1..N {
            let mut acc = self.coeffs[k];
            for j in 1..k {
                acc -= out[j] * out[k - j];
            }
            out[k] = acc / (2.0 * out[0]);
        }
        Self { coeffs: out }
    }

    pub fn exp(self) -> Self {
        // e' = a' e  =>  k e_k = sum_{j=1}^{k} j a_j e_{k-j}
        let mut out = [0.0; N];
        if N == 0 {
            return Self { coeffs: out };
        }
        out[0] = self.coeffs[0].exp();
        for k in 1..N {
            let mut acc = 0.0;
            for j in 1..=k {
                acc += j as f64 * self.coeffs[j] * out[k - j];
            }
            out[k] = acc / k as f64;
        }
        Self { coeffs: out }
    }

    pub fn ln(self) -> Self {
        // a l' = a'  =>  k a0 l_k = k a_k - sum_{j=1}^{k-1} j l_j a_{k-j}
        let mut out = [0.0; N];
        if N == 0 {
            return Self { coeffs: out };
        }
        let a0 = self.coeffs[0];
        out[0] = a0.ln();
        for k in 1..N {
            let mut acc = k as f64 * self.coeffs[k];
            for j in 1..k {
                acc -= j as f64 * out[j] * self.coeffs[k - j];
            }
            out[k] = acc / (k as f64 * a0);
        }
        Self { coeffs: out }
    }

    /// Returns `(sin, cos)`, which share one recurrence.
    pub fn sin_cos(self) -> (Self, Self) {
        let mut sin = [0.0; N];
        let mut cos = [0.0; N];
        if N == 0 {
            return (Self { coeffs: sin }, Self { coeffs: cos });
        }
        sin[0] = self.coeffs[0].sin();
        cos[0] = self.coeffs[0].cos();
        for k in 1..N {
            let mut s_acc = 0.0;
            let mut c_acc = 0.0;
            for j in 1..=k {
                let w = j as f64 * self.coeffs[j];
                s_acc += w * cos[k - j];
                c_acc -= w * sin[k - j];
            }
            sin[k] = s_acc / k as f64;
            cos[k] = c_acc / k as f64;
        }
        (Self { coeffs: sin }, Self { coeffs: cos })
    }

    pub fn sin(self) -> Self {
        self.sin_cos().0
    }

    pub fn cos(self) -> Self {
        self.sin_cos().1
    }
}

impl<const N: usize> Scalar for Jet<N> {
    fn value(&self) -> f64 {
        if N == 0 {
            0.0
        } else {
            self.coeffs[0]
        }
    }
}

impl<const N: usize> Zero for Jet<N> {
    fn zero() -> Self {
        Self::constant(0.0)
    }
    fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|c| *c == 0.0)
    }
}

impl<const N: usize> One for Jet<N> {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl<const N: usize> Add for Jet<N> {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        for (a, b) in self.coeffs.iter_mut().zip(rhs.coeffs) {
            *a += b;
        }
        self
    }
}

impl<const N: usize> Sub for Jet<N> {
    type Output = Self;
    fn sub(mut self, rhs: Self) -> Self {
        for (a, b) in self.coeffs.iter_mut().zip(rhs.coeffs) {
            *a -= b;
        }
        self
    }
}

impl<const N: usize> Mul for Jet<N> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = [0.0; N];
        for k in 0..N {
            for j in 0..=k {
                out[k] += self.coeffs[j] * rhs.coeffs[k - j];
            }
        }
        Self { coeffs: out }
    }
}

impl<const N: usize> Div for Jet<N> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        // q*b = a  =>  q_k = (a_k - sum_{j=1}^{k} b_j q_{k-j}) / b_0
        let mut out = [0.0; N];
        if N == 0 {
            return Self { coeffs: out };
        }
        let b0 = rhs.coeffs[0];
        for k in 0..N {
            let mut acc = self.coeffs[k];
            for j in 1..=k {
                acc -= rhs.coeffs[j] * out[k - j];
            }
            out[k] = acc / b0;
        }
        Self { coeffs: out }
    }
}

impl<const N: usize> Neg for Jet<N> {
    type Output = Self;
    fn neg(mut self) -> Self {
        for c in self.coeffs.iter_mut() {
            *c = -*c;
        }
        self
    }
}

impl<const N: usize> Add<f64> for Jet<N> {
    type Output = Self;
    fn add(mut self, rhs: f64) -> Self {
        if N > 0 {
            self.coeffs[0] += rhs;
        }
        self
    }
}

impl<const N: usize> Sub<f64> for Jet<N> {
    type Output = Self;
    fn sub(mut self, rhs: f64) -> Self {
        if N > 0 {
            self.coeffs[0] -= rhs;
        }
        self
    }
}

impl<const N: usize> Mul<f64> for Jet<N> {
    type Output = Self;
    fn mul(mut self, rhs: f64) -> Self {
        for c in self.coeffs.iter_mut() {
            *c *= rhs;
        }
        self
    }
}

impl<const N: usize> Div<f64> for Jet<N> {
    type Output = Self;
    fn div(mut self, rhs: f64) -> Self {
        for c in self.coeffs.iter_mut() {
            *c /= rhs;
        }
        self
    }
}

impl<const N: usize> Add<Jet<N>> for f64 {
    type Output = Jet<N>;
    fn add(self, rhs: Jet<N>) -> Jet<N> {
        rhs + self
    }
}

impl<const N: usize> Sub<Jet<N>> for f64 {
    type Output = Jet<N>;
    fn sub(self, rhs: Jet<N>) -> Jet<N> {
        -rhs + self
    }
}

impl<const N: usize> Mul<Jet<N>> for f64 {
    type Output = Jet<N>;
    fn mul(self, rhs: Jet<N>) -> Jet<N> {
        rhs * self
    }
}

impl<const N: usize> Div<Jet<N>> for f64 {
    type Output = Jet<N>;
    fn div(self, rhs: Jet<N>) -> Jet<N> {
        Jet::constant(self) / rhs
    }
}

impl<const N: usize> AddAssign for Jet<N> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl<const N: usize> SubAssign for Jet<N> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl<const N: usize> MulAssign for Jet<N> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::Jet;
    use crate::traits::Scalar;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn variable_seeds_unit_first_derivative() {
        let x = Jet::<3>::variable(2.5);
        assert_eq!(x.value(), 2.5);
        assert_eq!(x.derivative(1), 1.0);
        assert_eq!(x.derivative(2), 0.0);
        assert_eq!(x.derivative(7), 0.0);
        assert_eq!(x.coefficients(), &[2.5, 1.0, 0.0]);
    }

    #[test]
    fn product_follows_leibniz_rule() {
        // f(x) = x^3 at x = 2: f' = 12, f'' = 12, f''' = 6
        let x = Jet::<4>::variable(2.0);
        let f = x * x * x;
        assert_close(f.derivative(0), 8.0, 1e-12);
        assert_close(f.derivative(1), 12.0, 1e-12);
        assert_close(f.derivative(2), 12.0, 1e-12);
        assert_close(f.derivative(3), 6.0, 1e-12);
    }

    #[test]
    fn quotient_matches_closed_form() {
        // f(x) = 1 / (1 + x) at x = 1: f' = -1/4, f'' = 2/8
        let x = Jet::<3>::variable(1.0);
        let f = 1.0 / (x + 1.0);
        assert_close(f.value(), 0.5, 1e-12);
        assert_close(f.derivative(1), -0.25, 1e-12);
        assert_close(f.derivative(2), 0.25, 1e-12);
    }

    #[test]
    fn mixed_scalar_arithmetic_keeps_derivatives() {
        let x = Jet::<2>::variable(3.0);
        let f = 2.0 - x * 4.0 + 1.0;
        assert_close(f.value(), -9.0, 1e-12);
        assert_close(f.derivative(1), -4.0, 1e-12);
        let g = (x - 1.0) / 2.0;
        assert_close(g.derivative(1), 0.5, 1e-12);
    }

    #[test]
    fn elementary_functions_match_closed_forms() {
        let x0 = 0.7;
        let x = Jet::<3>::variable(x0);

        let e = x.exp();
        assert_close(e.derivative(2), x0.exp(), 1e-12);

        let l = x.ln();
        assert_close(l.derivative(1), 1.0 / x0, 1e-12);
        assert_close(l.derivative(2), -1.0 / (x0 * x0), 1e-12);

        let s = x.sqrt();
        assert_close(s.derivative(1), 0.5 / x0.sqrt(), 1e-12);

        let (sin, cos) = x.sin_cos();
        assert_close(sin.derivative(1), x0.cos(), 1e-12);
        assert_close(sin.derivative(2), -x0.sin(), 1e-12);
        assert_close(cos.derivative(1), -x0.sin(), 1e-12);
    }

    #[test]
    fn powi_handles_negative_exponents() {
        let x = Jet::<2>::variable(2.0);
        let f = x.powi(-2);
        assert_close(f.value(), 0.25, 1e-12);
        assert_close(f.derivative(1), -0.25, 1e-12);
        assert_eq!(x.powi(0).value(), 1.0);
    }
}
