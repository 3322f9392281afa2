//! Planar cubic Bezier segments and arc-length parametrization.

use nalgebra::Vector2;

/// Samples used to tabulate arc length along a segment.
pub const ARC_LENGTH_SAMPLES: usize = 128;

/// A cubic Bezier curve in the world plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    /// Start point.
    pub p0: Vector2<f64>,
    /// Handle leaving the start point.
    pub p1: Vector2<f64>,
    /// Handle entering the end point.
    pub p2: Vector2<f64>,
    /// End point.
    pub p3: Vector2<f64>,
}

impl CubicBezier {
    /// Segment from `start` to `end` leaving along `start_tangent` and arriving
    /// along `end_tangent`, with both handles `handle` long.
    ///
    /// Tangents are expected to be unit vectors.
    pub fn with_tangents(
        start: Vector2<f64>,
        start_tangent: Vector2<f64>,
        end: Vector2<f64>,
        end_tangent: Vector2<f64>,
        handle: f64,
    ) -> Self {
        CubicBezier {
            p0: start,
            p1: start + start_tangent * handle,
            p2: end - end_tangent * handle,
            p3: end,
        }
    }

    /// Point at parameter `t` in `[0, 1]`.
    pub fn point(&self, t: f64) -> Vector2<f64> {
        let u = 1.0 - t;
        self.p0 * (u * u * u)
            + self.p1 * (3.0 * u * u * t)
            + self.p2 * (3.0 * u * t * t)
            + self.p3 * (t * t * t)
    }

    /// First derivative with respect to `t`.
    pub fn derivative(&self, t: f64) -> Vector2<f64> {
        let u = 1.0 - t;
        (self.p1 - self.p0) * (3.0 * u * u)
            + (self.p2 - self.p1) * (6.0 * u * t)
            + (self.p3 - self.p2) * (3.0 * t * t)
    }

    /// Second derivative with respect to `t`.
    pub fn second_derivative(&self, t: f64) -> Vector2<f64> {
        let u = 1.0 - t;
        (self.p2 - self.p1 * 2.0 + self.p0) * (6.0 * u) + (self.p3 - self.p2 * 2.0 + self.p1) * (6.0 * t)
    }

    /// Unsigned curvature (1/m) at `t`. A vanishing derivative is a cusp and
    /// reports infinite curvature.
    pub fn curvature(&self, t: f64) -> f64 {
        let d1 = self.derivative(t);
        let speed = d1.norm();
        if speed < 1e-12 {
            return f64::INFINITY;
        }
        let d2 = self.second_derivative(t);
        (d1.x * d2.y - d1.y * d2.x).abs() / (speed * speed * speed)
    }

    /// Largest curvature over `samples + 1` evenly spaced parameters.
    pub fn max_curvature(&self, samples: usize) -> f64 {
        let samples = samples.max(1);
        (0..=samples)
            .map(|i| self.curvature(i as f64 / samples as f64))
            .fold(0.0, f64::max)
    }
}

/// Cumulative arc length of a curve, for constant-speed travel along it.
#[derive(Debug, Clone)]
pub struct ArcLengthTable {
    params: Vec<f64>,
    lengths: Vec<f64>,
}

impl ArcLengthTable {
    /// Tabulate `curve` with `samples` chords.
    pub fn new(curve: &CubicBezier, samples: usize) -> Self {
        let samples = samples.max(1);
        let mut params = Vec::with_capacity(samples + 1);
        let mut lengths = Vec::with_capacity(samples + 1);
        let mut prev = curve.p0;
        let mut total = 0.0;
        for i in 0..=samples {
            let t = i as f64 / samples as f64;
            let p = curve.point(t);
            total += (p - prev).norm();
            prev = p;
            params.push(t);
            lengths.push(total);
        }
        ArcLengthTable { params, lengths }
    }

    /// Total length (m).
    pub fn total_length(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// Curve parameter at which `fraction` of the length has been covered.
    pub fn param_at_fraction(&self, fraction: f64) -> f64 {
        let fraction = fraction.clamp(0.0, 1.0);
        let total = self.total_length();
        if total <= 0.0 || fraction == 0.0 || fraction == 1.0 {
            return fraction;
        }
        let target = fraction * total;
        let i = self.lengths.partition_point(|&l| l < target);
        if i == 0 {
            return 0.0;
        }
        if i >= self.lengths.len() {
            return 1.0;
        }
        let (l0, l1) = (self.lengths[i - 1], self.lengths[i]);
        let (t0, t1) = (self.params[i - 1], self.params[i]);
        if l1 - l0 <= f64::EPSILON {
            return t1;
        }
        t0 + (t1 - t0) * (target - l0) / (l1 - l0)
    }
}
