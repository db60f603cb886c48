use crate::error::{Error, Result};
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Real roots of a low-order polynomial: at most two entries, in no
/// particular order. Empty when no real roots exist; a double root is
/// collapsed to a single entry.
pub type RootSet = SmallVec<[f64; 2]>;

/// A real-coefficient polynomial of runtime order, coefficients stored
/// lowest-order first.
///
/// The coefficient vector is never empty; the zero polynomial is `[0.0]`.
/// Values are immutable once constructed and cheap to copy (coefficients
/// live inline up to order 4).
///
/// Arithmetic preserves order: addition/subtraction yield the larger of the
/// operand orders, multiplication the sum. Order is only lowered by
/// [`Polynomial::reduced`], which requires the dropped leading coefficients
/// to be exactly zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: SmallVec<[f64; 5]>,
}

impl Polynomial {
    /// Build from coefficients, lowest order first. An empty slice yields
    /// the zero polynomial.
    pub fn new(coeffs: &[f64]) -> Self {
        if coeffs.is_empty() {
            return Self {
                coeffs: smallvec![0.0],
            };
        }
        Self {
            coeffs: SmallVec::from_slice(coeffs),
        }
    }

    /// The constant polynomial `c`.
    pub fn constant(c: f64) -> Self {
        Self::new(&[c])
    }

    /// Polynomial order (number of coefficients minus one).
    #[inline]
    pub fn order(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Coefficient of `x^i`, or 0 beyond the stored order.
    #[inline]
    pub fn coeff(&self, i: usize) -> f64 {
        self.coeffs.get(i).copied().unwrap_or(0.0)
    }

    /// All coefficients, lowest order first.
    #[inline]
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Evaluate at `x` by Horner's method, highest to lowest order.
    pub fn eval(&self, x: f64) -> f64 {
        let mut sum = self.coeffs[self.order()];
        for i in (0..self.order()).rev() {
            sum = sum * x + self.coeffs[i];
        }
        sum
    }

    /// Derivative: one order lower, coefficient `i = (i+1) * c[i+1]`.
    /// The derivative of a constant is the zero polynomial.
    pub fn derivative(&self) -> Polynomial {
        if self.order() == 0 {
            return Polynomial::constant(0.0);
        }
        let mut coeffs: SmallVec<[f64; 5]> = SmallVec::with_capacity(self.order());
        for i in 0..self.order() {
            coeffs.push(self.coeffs[i + 1] * (i + 1) as f64);
        }
        Polynomial { coeffs }
    }

    /// Drop leading coefficients that are exactly zero, lowering the stored
    /// order. Never drops a non-zero leading term and never empties the
    /// polynomial.
    pub fn reduced(&self) -> Polynomial {
        let mut end = self.coeffs.len();
        while end > 1 && self.coeffs[end - 1] == 0.0 {
            end -= 1;
        }
        Polynomial {
            coeffs: SmallVec::from_slice(&self.coeffs[..end]),
        }
    }

    /// Real roots in closed form for effective orders 0 through 2.
    ///
    /// The polynomial is reduced first, so an order-2 input with `c2 == 0`
    /// is solved as order 1 rather than reported rootless. Orders above 2
    /// have no closed form and return [`Error::UnsupportedOrder`]; a
    /// numerical fallback would substitute here.
    pub fn solve_roots(&self) -> Result<RootSet> {
        let p = self.reduced();
        match p.order() {
            // A nonzero constant has no roots; the zero polynomial is
            // treated the same way (no isolated roots to report).
            0 => Ok(RootSet::new()),
            1 => {
                let mut roots = RootSet::new();
                roots.push(-p.coeffs[0] / p.coeffs[1]);
                Ok(roots)
            }
            2 => Ok(solve_quadratic(p.coeffs[0], p.coeffs[1], p.coeffs[2])),
            n => Err(Error::UnsupportedOrder(n)),
        }
    }

    /// Maximum absolute value attained over the closed interval
    /// `[tmin, tmax]`, for effective orders 0 through 2.
    ///
    /// For order 2 the vertex `-c1 / (2 c2)` is tested when it lies strictly
    /// inside the interval; otherwise the extremum is at an endpoint.
    pub fn max_abs_val(&self, tmin: f64, tmax: f64) -> Result<f64> {
        let p = self.reduced();
        match p.order() {
            0 => Ok(p.coeffs[0].abs()),
            1 => Ok(p.eval(tmin).abs().max(p.eval(tmax).abs())),
            2 => {
                let vertex = -p.coeffs[1] / (2.0 * p.coeffs[2]);
                let mut max = p.eval(tmin).abs().max(p.eval(tmax).abs());
                if vertex > tmin && vertex < tmax {
                    max = max.max(p.eval(vertex).abs());
                }
                Ok(max)
            }
            n => Err(Error::UnsupportedOrder(n)),
        }
    }
}

/// Roots of `c2 x^2 + c1 x + c0` with `c2 != 0`, using the sign-stabilized
/// form of the quadratic formula: the root with the same sign as `-c1` is
/// computed directly and the other is recovered from the product of roots
/// `c0 / c2`, avoiding catastrophic cancellation when `c1^2 >> 4 c2 c0`.
fn solve_quadratic(c0: f64, c1: f64, c2: f64) -> RootSet {
    let mut roots = RootSet::new();
    let disc = c1 * c1 - 4.0 * c2 * c0;
    if disc < 0.0 {
        return roots;
    }
    if disc == 0.0 {
        // Double root, collapsed to one entry.
        roots.push(-c1 / (2.0 * c2));
        return roots;
    }
    let root1 = -(c1 + disc.sqrt().copysign(c1)) / (2.0 * c2);
    let root2 = c0 / (c2 * root1);
    roots.push(root1);
    roots.push(root2);
    roots
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coeffs[0])?;
        for (i, &c) in self.coeffs.iter().enumerate().skip(1) {
            if c == 0.0 {
                continue;
            }
            if c == 1.0 {
                write!(f, "+x")?;
            } else if c == -1.0 {
                write!(f, "-x")?;
            } else if c > 0.0 {
                write!(f, "+{c}*x")?;
            } else {
                write!(f, "{c}*x")?;
            }
            if i > 1 {
                write!(f, "^{i}")?;
            }
        }
        Ok(())
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        Polynomial {
            coeffs: self.coeffs.iter().map(|c| -c).collect(),
        }
    }
}

impl Neg for Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        -&self
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    /// Result order is the larger of the operand orders.
    fn add(self, rhs: &Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let mut coeffs: SmallVec<[f64; 5]> = SmallVec::with_capacity(n);
        for i in 0..n {
            coeffs.push(self.coeff(i) + rhs.coeff(i));
        }
        Polynomial { coeffs }
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: &Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let mut coeffs: SmallVec<[f64; 5]> = SmallVec::with_capacity(n);
        for i in 0..n {
            coeffs.push(self.coeff(i) - rhs.coeff(i));
        }
        Polynomial { coeffs }
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    /// Full convolution of coefficients; result order is the sum of the
    /// operand orders.
    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let n = self.order() + rhs.order();
        let mut coeffs: SmallVec<[f64; 5]> = smallvec![0.0; n + 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Polynomial { coeffs }
    }
}

macro_rules! forward_owned_binop {
    ($($op:ident :: $method:ident),*) => {$(
        impl $op for Polynomial {
            type Output = Polynomial;
            fn $method(self, rhs: Polynomial) -> Polynomial {
                (&self).$method(&rhs)
            }
        }
    )*};
}

forward_owned_binop!(Add::add, Sub::sub, Mul::mul);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn addition_takes_max_order() {
        let linear = Polynomial::new(&[0.0, 2.5]);
        let constant = Polynomial::constant(0.3);
        let sum = &linear + &constant;
        assert_eq!(sum.order(), 1);
        assert_eq!(sum.coeff(0), 0.3);
        assert_eq!(sum.coeff(1), 2.5);
    }

    #[test]
    fn multiplication_convolves() {
        // (2 - x + x^2) * -2 = -4 + 2x - 2x^2
        let p = Polynomial::new(&[2.0, -1.0, 1.0]);
        let scale = Polynomial::constant(-2.0);
        let q = &p * &scale;
        assert_eq!(q.coeffs(), &[-4.0, 2.0, -2.0]);

        // (1 + x)^2 = 1 + 2x + x^2, order = sum of orders
        let r = Polynomial::new(&[1.0, 1.0]);
        let sq = &r * &r;
        assert_eq!(sq.order(), 2);
        assert_eq!(sq.coeffs(), &[1.0, 2.0, 1.0]);
    }

    #[test]
    fn evaluation_matches_horner_expansion() {
        let p = Polynomial::new(&[2.0, -1.0, 1.0]);
        assert_relative_eq!(p.eval(3.0), 2.0 - 3.0 + 9.0);
        assert_relative_eq!(p.eval(0.0), 2.0);
    }

    #[test]
    fn derivative_coefficients() {
        // d/dx (x + x^2 + x^3 + x^4) = 1 + 2x + 3x^2 + 4x^3
        let p = Polynomial::new(&[0.0, 1.0, 1.0, 1.0, 1.0]);
        let d = p.derivative();
        assert_eq!(d.coeffs(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn derivative_of_constant_is_zero() {
        let c = Polynomial::constant(5.0);
        let d = c.derivative();
        assert_eq!(d.order(), 0);
        assert_eq!(d.coeff(0), 0.0);
        // And differentiating again stays zero.
        assert_eq!(d.derivative().coeff(0), 0.0);
    }

    #[test]
    fn reduction_drops_only_exact_zeros() {
        let p = Polynomial::new(&[2.0, -1.0, 1.0, 0.0]);
        let r = p.reduced();
        assert_eq!(r.order(), 2);
        assert_relative_eq!(p.eval(123.0), r.eval(123.0));

        let q = Polynomial::new(&[2.0, -1.0, 1e-300]);
        assert_eq!(q.reduced().order(), 2);
    }

    #[test]
    fn constant_has_no_roots() -> Result<()> {
        let roots = Polynomial::constant(-9.0).solve_roots()?;
        assert!(roots.is_empty());
        Ok(())
    }

    #[test]
    fn linear_root() -> Result<()> {
        // 12x - 9 = 0 at x = 0.75
        let roots = Polynomial::new(&[-9.0, 12.0]).solve_roots()?;
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0], 0.75);
        Ok(())
    }

    #[test]
    fn quadratic_without_real_roots() -> Result<()> {
        // x^2 - 3x + 4, disc = 9 - 16 < 0
        let roots = Polynomial::new(&[4.0, -3.0, 1.0]).solve_roots()?;
        assert!(roots.is_empty());
        Ok(())
    }

    #[test]
    fn quadratic_double_root_collapsed() -> Result<()> {
        // -4x^2 + 12x - 9 has the double root x = 1.5
        let roots = Polynomial::new(&[-9.0, 12.0, -4.0]).solve_roots()?;
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0], 1.5, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn quadratic_cancellation_stable() -> Result<()> {
        // x^2 + 712345.12 x + 1.25: naive evaluation of the small root loses
        // all precision to cancellation.
        let p = Polynomial::new(&[1.25, 712345.12, 1.0]);
        let mut roots = p.solve_roots()?;
        assert_eq!(roots.len(), 2);
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(roots[0], -712345.1199985961, max_relative = 1e-12);
        assert_relative_eq!(roots[1], -1.754767408250742e-6, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn degenerate_quadratic_downgrades_to_linear() -> Result<()> {
        let quad = Polynomial::new(&[-9.0, 12.0, 0.0]);
        let lin = Polynomial::new(&[-9.0, 12.0]);
        let rq = quad.solve_roots()?;
        let rl = lin.solve_roots()?;
        assert_eq!(rq.len(), 1);
        assert_eq!(rq[0], rl[0]);

        // Fully degenerate: constant in quadratic clothing.
        let flat = Polynomial::new(&[-9.0, 0.0, 0.0]);
        assert!(flat.solve_roots()?.is_empty());
        Ok(())
    }

    #[test]
    fn cubic_roots_are_unsupported() {
        let p = Polynomial::new(&[1.0, 0.0, 0.0, 1.0]);
        let err = p.solve_roots().unwrap_err();
        assert!(err.to_string().contains("order 3"));
    }

    #[test]
    fn interval_bound_checks_vertex() -> Result<()> {
        // f = (x-1)^2 - 4 has vertex value -4 at x = 1.
        let p = Polynomial::new(&[-3.0, -2.0, 1.0]);
        assert_relative_eq!(p.max_abs_val(0.0, 2.0)?, 4.0);
        // Vertex outside the interval: endpoints only.
        assert_relative_eq!(p.max_abs_val(3.0, 5.0)?, 12.0);
        Ok(())
    }

    #[test]
    fn display_renders_terms() {
        let p = Polynomial::new(&[2.0, -1.0, 1.0]);
        assert_eq!(format!("{p}"), "2-x+x^2");
    }
}
