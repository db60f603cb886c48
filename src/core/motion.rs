use crate::core::particle::DIM;
use crate::error::{Error, Result};
use crate::math::Polynomial;

#[inline]
pub(crate) fn dot(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Boundary-condition transform applied to separations and positions.
///
/// Only the *effect* of a boundary condition lives here; `Walled` domains
/// additionally produce global boundary events (see
/// [`earliest_wall_crossing`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Unbounded space: no wrap, no walls.
    Open,
    /// Periodic box with minimum-image separations.
    Periodic { size: [f64; DIM] },
    /// Axis-aligned box with reflecting walls. Wall `2k` is the minimum
    /// plane on axis `k` (at 0), wall `2k+1` the maximum (at `size[k]`).
    Walled { size: [f64; DIM] },
}

impl Domain {
    /// Periodic box, validating edge lengths.
    pub fn periodic(size: [f64; DIM]) -> Result<Self> {
        Self::check_size(&size)?;
        Ok(Domain::Periodic { size })
    }

    /// Reflecting box, validating edge lengths.
    pub fn walled(size: [f64; DIM]) -> Result<Self> {
        Self::check_size(&size)?;
        Ok(Domain::Walled { size })
    }

    fn check_size(size: &[f64; DIM]) -> Result<()> {
        if !size.iter().all(|&l| l.is_finite() && l > 0.0) {
            return Err(Error::InvalidParam(
                "domain edge lengths must be finite and > 0".into(),
            ));
        }
        Ok(())
    }

    /// Shortest representation of a separation vector under this domain's
    /// boundary condition (minimum-image for periodic domains, identity
    /// otherwise).
    pub fn minimum_image(&self, mut dr: [f64; DIM]) -> [f64; DIM] {
        if let Domain::Periodic { size } = self {
            for (d, &l) in dr.iter_mut().zip(size) {
                *d -= l * (*d / l).round();
            }
        }
        dr
    }

    /// Map a position back into the primary cell (periodic domains only;
    /// walled and open domains leave positions untouched).
    pub fn wrap_position(&self, mut r: [f64; DIM]) -> [f64; DIM] {
        if let Domain::Periodic { size } = self {
            for (x, &l) in r.iter_mut().zip(size) {
                *x = x.rem_euclid(l);
            }
        }
        r
    }

    /// Box edge lengths when the domain has them.
    pub fn size(&self) -> Option<&[f64; DIM]> {
        match self {
            Domain::Open => None,
            Domain::Periodic { size } | Domain::Walled { size } => Some(size),
        }
    }
}

/// Direction of relative motion required for a root to be admissible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approach {
    /// Separation must be shrinking at the root (collision).
    Approaching,
    /// Separation must be growing at the root (capture release).
    Receding,
}

/// Builds the polynomial whose non-negative roots are candidate event
/// times for a pair of participants, together with the direction a root
/// must satisfy to be admissible.
///
/// Implementations receive co-timed positions: both participants' state at
/// the same reference time. This seam never streams; callers co-time first.
/// Non-quadratic regimes (accelerating motion) substitute here.
pub trait InteractionGeometry {
    /// Candidate-time polynomial in relative time for the co-timed pair.
    fn event_polynomial(
        &self,
        ri: &[f64; DIM],
        vi: &[f64; DIM],
        rj: &[f64; DIM],
        vj: &[f64; DIM],
        domain: &Domain,
    ) -> Polynomial;

    /// Required relative-motion direction at an admissible root.
    fn approach(&self) -> Approach;
}

impl<G: InteractionGeometry + ?Sized> InteractionGeometry for Box<G> {
    fn event_polynomial(
        &self,
        ri: &[f64; DIM],
        vi: &[f64; DIM],
        rj: &[f64; DIM],
        vj: &[f64; DIM],
        domain: &Domain,
    ) -> Polynomial {
        (**self).event_polynomial(ri, vi, rj, vj, domain)
    }

    fn approach(&self) -> Approach {
        (**self).approach()
    }
}

/// Fixed-separation contact geometry: the event fires when the pair's
/// separation equals `diameter` while approaching.
#[derive(Debug, Clone, Copy)]
pub struct HardSphere {
    pub diameter: f64,
}

impl InteractionGeometry for HardSphere {
    /// `|dr + dv t|^2 - diameter^2`, with minimum image applied to `dr`:
    /// `c0 = dr.dr - d^2`, `c1 = 2 dr.dv`, `c2 = dv.dv`.
    fn event_polynomial(
        &self,
        ri: &[f64; DIM],
        vi: &[f64; DIM],
        rj: &[f64; DIM],
        vj: &[f64; DIM],
        domain: &Domain,
    ) -> Polynomial {
        let mut dr = [0.0_f64; DIM];
        let mut dv = [0.0_f64; DIM];
        for k in 0..DIM {
            dr[k] = rj[k] - ri[k];
            dv[k] = vj[k] - vi[k];
        }
        let dr = domain.minimum_image(dr);
        Polynomial::new(&[
            dot(&dr, &dr) - self.diameter * self.diameter,
            2.0 * dot(&dr, &dv),
            dot(&dv, &dv),
        ])
    }

    fn approach(&self) -> Approach {
        Approach::Approaching
    }
}

/// Earliest admissible root of a candidate-time polynomial, in relative
/// time, or `None` when no root qualifies (a normal outcome).
///
/// A root is admissible when it is non-negative and the polynomial's slope
/// there strictly matches the required direction (shrinking separation for
/// `Approaching`, growing for `Receding`). The strict inequality makes a
/// root at exactly t = 0 admissible only on a genuine future approach, so
/// the event just resolved cannot re-fire, and rejects grazing (double
/// root, zero slope) contacts, which exchange no momentum.
pub fn earliest_admissible_root(poly: &Polynomial, approach: Approach) -> Result<Option<f64>> {
    let roots = poly.solve_roots()?;
    let slope = poly.derivative();
    let mut best: Option<f64> = None;
    for &t in &roots {
        if t < 0.0 || !t.is_finite() {
            continue;
        }
        let s = slope.eval(t);
        let admissible = match approach {
            Approach::Approaching => s < 0.0,
            Approach::Receding => s > 0.0,
        };
        if admissible && best.is_none_or(|b| t < b) {
            best = Some(t);
        }
    }
    Ok(best)
}

/// Earliest wall contact for a sphere of radius `radius` at co-timed
/// position `r` with velocity `v` inside a reflecting box of edge lengths
/// `size`. Returns the relative contact time and the wall id, or `None`
/// when the particle is at rest or moving parallel to every wall.
pub fn earliest_wall_crossing(
    r: &[f64; DIM],
    v: &[f64; DIM],
    radius: f64,
    size: &[f64; DIM],
) -> Option<(f64, u32)> {
    let mut best_t = f64::INFINITY;
    let mut best_wall: Option<u32> = None;

    for (k, ((&x, &vk), &l)) in r.iter().zip(v).zip(size).enumerate() {
        if vk < 0.0 {
            // Contact with the minimum wall when x + v t = radius.
            let t = (radius - x) / vk;
            if t > 0.0 && t < best_t {
                best_t = t;
                best_wall = Some((2 * k) as u32);
            }
        } else if vk > 0.0 {
            // Contact with the maximum wall when x + v t = l - radius.
            let t = (l - radius - x) / vk;
            if t > 0.0 && t < best_t {
                best_t = t;
                best_wall = Some((2 * k + 1) as u32);
            }
        }
    }

    best_wall.map(|w| (best_t, w))
}

/// Decompose a wall id into (axis, is_max_side).
#[inline]
pub fn wall_axis_side(wall: u32) -> (usize, bool) {
    ((wall / 2) as usize, wall % 2 == 1)
}
