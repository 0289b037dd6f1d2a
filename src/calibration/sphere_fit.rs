//! Iterative least-squares sphere fit.
//!
//! The fit minimizes the squared difference between each point's squared
//! distance to the center and the squared radius. All statistics needed by the
//! refinement loop are gathered in a single pass over the point cloud (see
//! [`Moments`]), after which every iteration works on a handful of scalars.

#[allow(unused_imports)]
use num_traits::Float;
use nalgebra::Vector3;

/// Sample moments of a point cloud, each divided by the number of points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub count: usize,

    pub x: f32,
    pub y: f32,
    pub z: f32,

    pub x2: f32,
    pub y2: f32,
    pub z2: f32,

    pub x3: f32,
    pub y3: f32,
    pub z3: f32,

    pub xy: f32,
    pub xz: f32,
    pub yz: f32,

    pub x2y: f32,
    pub x2z: f32,
    pub y2x: f32,
    pub y2z: f32,
    pub z2x: f32,
    pub z2y: f32,
}

impl Moments {
    /// Accumulate all moments in one pass. Returns `None` for an empty point cloud.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vector3<f32>>,
    {
        let mut sum = Self::default();

        for point in points {
            let [x, y, z] = <[f32; 3]>::from(point);
            let (x2, y2, z2) = (x * x, y * y, z * z);

            sum.x += x;
            sum.x2 += x2;
            sum.x3 += x2 * x;

            sum.y += y;
            sum.y2 += y2;
            sum.y3 += y2 * y;

            sum.z += z;
            sum.z2 += z2;
            sum.z3 += z2 * z;

            sum.xy += x * y;
            sum.xz += x * z;
            sum.yz += y * z;

            sum.x2y += x2 * y;
            sum.x2z += x2 * z;
            sum.y2x += y2 * x;
            sum.y2z += y2 * z;
            sum.z2x += z2 * x;
            sum.z2y += z2 * y;

            sum.count += 1;
        }

        if sum.count == 0 {
            return None;
        }

        let n = sum.count as f32;
        Some(Self {
            count: sum.count,
            x: sum.x / n,
            y: sum.y / n,
            z: sum.z / n,
            x2: sum.x2 / n,
            y2: sum.y2 / n,
            z2: sum.z2 / n,
            x3: sum.x3 / n,
            y3: sum.y3 / n,
            z3: sum.z3 / n,
            xy: sum.xy / n,
            xz: sum.xz / n,
            yz: sum.yz / n,
            x2y: sum.x2y / n,
            x2z: sum.x2z / n,
            y2x: sum.y2x / n,
            y2z: sum.y2z / n,
            z2x: sum.z2x / n,
            z2y: sum.z2y / n,
        })
    }
}

/// Result of a sphere fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereFit {
    /// Center of the sphere, the hard-iron offset.
    pub center: Vector3<f32>,
    /// Radius of the sphere, the expected field strength.
    pub radius: f32,
    /// Number of refinement iterations that were run.
    pub iterations: u32,
}

/// Current center estimate together with the scalars derived from it.
#[derive(Debug, Clone, Copy)]
struct Estimate {
    a: f32,
    b: f32,
    c: f32,
    a2: f32,
    b2: f32,
    c2: f32,
    rsq: f32,
    q0: f32,
    q1: f32,
    q2: f32,
}

impl Estimate {
    fn new(a: f32, b: f32, c: f32, m: &Moments, f0: f32, f1: f32) -> Self {
        let (a2, b2, c2) = (a * a, b * b, c * c);
        let qs = a2 + b2 + c2;
        let qb = -2.0 * (a * m.x + b * m.y + c * m.z);
        let rsq = f0 + qb + qs;
        let q0 = 0.5 * (qs - rsq);
        let q1 = f1 + q0;
        let q2 = 8.0 * (qs - rsq + qb + f0);

        Self {
            a,
            b,
            c,
            a2,
            b2,
            c2,
            rsq,
            q0,
            q1,
            q2,
        }
    }
}

/// Substitute denominators that are indistinguishable from zero.
fn guard(denominator: f32) -> f32 {
    if denominator.abs() < f32::EPSILON {
        1.0
    } else {
        denominator
    }
}

impl SphereFit {
    /// Fit a sphere to `points`.
    ///
    /// Refinement stops when the squared length of an update step is at most
    /// `delta`, or after `max_iterations` steps. Running out of iterations is
    /// not a failure, the latest estimate is returned. Returns `None` only if
    /// `points` is empty.
    pub fn fit<I>(points: I, max_iterations: u32, delta: f32) -> Option<Self>
    where
        I: IntoIterator<Item = Vector3<f32>>,
    {
        let moments = Moments::from_points(points)?;
        Some(Self::fit_moments(&moments, max_iterations, delta))
    }

    /// Fit a sphere to a point cloud described by its precomputed moments.
    pub fn fit_moments(m: &Moments, max_iterations: u32, delta: f32) -> Self {
        let f0 = m.x2 + m.y2 + m.z2;
        let f1 = 0.5 * f0;
        let f2 = -8.0 * (m.x3 + m.y2x + m.z2x);
        let f3 = -8.0 * (m.x2y + m.y3 + m.z2y);
        let f4 = -8.0 * (m.x2z + m.y2z + m.z3);

        // Start from the centroid of the point cloud
        let mut est = Estimate::new(m.x, m.y, m.z, m, f0, f1);
        let mut iterations = 0;

        while iterations < max_iterations {
            iterations += 1;

            let Estimate {
                a,
                b,
                c,
                a2,
                b2,
                c2,
                q0,
                q1,
                q2,
                ..
            } = est;

            let den_a = guard(q2 + 16.0 * (a2 - 2.0 * a * m.x + m.x2));
            let den_b = guard(q2 + 16.0 * (b2 - 2.0 * b * m.y + m.y2));
            let den_c = guard(q2 + 16.0 * (c2 - 2.0 * c * m.z + m.z2));

            let next_a = a
                - (f2 + 16.0 * (b * m.xy + c * m.xz + m.x * (-a2 - q0) + a * (m.x2 + q1 - c * m.z - b * m.y)))
                    / den_a;
            let next_b = b
                - (f3 + 16.0 * (a * m.xy + c * m.yz + m.y * (-b2 - q0) + b * (m.y2 + q1 - a * m.x - c * m.z)))
                    / den_b;
            let next_c = c
                - (f4 + 16.0 * (a * m.xz + b * m.yz + m.z * (-c2 - q0) + c * (m.z2 + q1 - a * m.x - b * m.y)))
                    / den_c;

            let (step_a, step_b, step_c) = (next_a - a, next_b - b, next_c - c);
            if step_a * step_a + step_b * step_b + step_c * step_c <= delta {
                break;
            }

            est = Estimate::new(next_a, next_b, next_c, m, f0, f1);
        }

        SphereFit {
            center: Vector3::new(est.a, est.b, est.c),
            radius: est.rsq.sqrt(),
            iterations,
        }
    }
}
