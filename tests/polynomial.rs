use approx::assert_abs_diff_eq;
use edmd::error::Result;
use edmd::math::Polynomial;

/// Every root returned by the closed-form solver must evaluate to ~0, for
/// all solvable orders.
#[test]
fn returned_roots_are_roots() -> Result<()> {
    let cases: Vec<Polynomial> = vec![
        Polynomial::constant(7.0),
        Polynomial::new(&[-9.0, 12.0]),
        Polynomial::new(&[3.0, -4.0, 1.0]),
        Polynomial::new(&[-1.0, 0.0, 4.0]),
        Polynomial::new(&[1.25, 712345.12, 1.0]),
        Polynomial::new(&[2.25, -3.0, 1.0]), // double root at 1.5
    ];
    for poly in &cases {
        for &root in &poly.solve_roots()? {
            // Residual scaled to the coefficient magnitude at the root.
            let scale = poly
                .coeffs()
                .iter()
                .enumerate()
                .map(|(i, c)| (c * root.powi(i as i32)).abs())
                .fold(1.0_f64, f64::max);
            assert_abs_diff_eq!(poly.eval(root) / scale, 0.0, epsilon = 1e-9);
        }
    }
    Ok(())
}

/// Vieta's formulas guard the cancellation-safe quadratic: for distinct
/// real roots, sum = -c1/c2 and product = c0/c2.
#[test]
fn vieta_holds_for_distinct_roots() -> Result<()> {
    let cases = [
        [6.0, -5.0, 1.0],
        [1.25, 712345.12, 1.0], // c1^2 >> 4 c2 c0
        [-20.0, 1.0, 3.0],
        [1e-8, 1e4, 2.0],
    ];
    for [c0, c1, c2] in cases {
        let roots = Polynomial::new(&[c0, c1, c2]).solve_roots()?;
        assert_eq!(roots.len(), 2, "expected distinct roots for {c0},{c1},{c2}");
        let sum = roots[0] + roots[1];
        let product = roots[0] * roots[1];
        assert_abs_diff_eq!(sum / (-c1 / c2) - 1.0, 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(product / (c0 / c2) - 1.0, 0.0, epsilon = 1e-10);
    }
    Ok(())
}

/// An order-2 polynomial whose leading coefficient is exactly zero is the
/// order-1 problem, never "no roots".
#[test]
fn degenerate_quadratic_is_solved_linearly() -> Result<()> {
    let degenerate = Polynomial::new(&[-9.0, 12.0, 0.0]);
    let linear = Polynomial::new(&[-9.0, 12.0]);
    let rd = degenerate.solve_roots()?;
    let rl = linear.solve_roots()?;
    assert_eq!(rd.len(), 1);
    assert_eq!(rd[0], rl[0]);
    Ok(())
}

/// Arithmetic order rules: add takes the max, multiply the sum, derivative
/// drops one.
#[test]
fn order_arithmetic() {
    let a = Polynomial::new(&[1.0, 2.0]);
    let b = Polynomial::new(&[0.5, 0.0, 3.0]);
    assert_eq!((&a + &b).order(), 2);
    assert_eq!((&a - &b).order(), 2);
    assert_eq!((&a * &b).order(), 3);
    assert_eq!(b.derivative().order(), 1);
}
