//! Speed-timing profiles.
//!
//! A profile decides how far along a span of motion the chassis is at each
//! frame. All profiles share a trapezoidal velocity shape (ramp up, cruise,
//! ramp down); they differ in ramp shape and in whether the ramps apply to
//! each span or once to the whole timeline.

use std::f64::consts::PI;

/// How motion is distributed over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedProfile {
    /// Linear acceleration over `ramp_frames` at both ends of every segment, constant cruise between.
    Constant {
        /// Frames spent accelerating (and decelerating).
        ramp_frames: u32,
    },
    /// Ease-in/ease-out applied once over the whole timeline.
    GlobalEase {
        /// Frames spent easing at each end of the timeline.
        ease_frames: u32,
    },
    /// Symmetric ease-in/ease-out inside every keyframe segment.
    PerSegmentEase {
        /// Frames spent easing at each end of a segment.
        ease_frames: u32,
    },
}

impl Default for SpeedProfile {
    fn default() -> Self {
        SpeedProfile::Constant { ramp_frames: 12 }
    }
}

/// Velocity shape during a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampShape {
    /// Velocity grows linearly.
    Linear,
    /// Velocity follows a half cosine, starting and ending with zero acceleration.
    Sine,
}

/// Fraction of a span covered after `t` of `span` frames.
///
/// The velocity ramps up over `ramp` frames, cruises, and ramps down over the
/// last `ramp` frames. Ramps longer than half the span are shortened to half.
/// The result is monotone in `t`, 0 at `t = 0` and 1 at `t = span`.
pub fn ramped_progress(t: f64, span: f64, ramp: f64, shape: RampShape) -> f64 {
    if !(span > 0.0) {
        return 1.0;
    }
    let t = t.clamp(0.0, span);
    let ramp = ramp.clamp(0.0, span / 2.0);
    if ramp <= 0.0 {
        return t / span;
    }

    let cruise_speed = 1.0 / (span - ramp);
    let ramp_area = |u: f64| match shape {
        RampShape::Linear => cruise_speed * u * u / (2.0 * ramp),
        RampShape::Sine => cruise_speed * (u / 2.0 - ramp / (2.0 * PI) * (PI * u / ramp).sin()),
    };

    let s = if t < ramp {
        ramp_area(t)
    } else if t <= span - ramp {
        cruise_speed * ramp / 2.0 + cruise_speed * (t - ramp)
    } else {
        1.0 - ramp_area(span - t)
    };
    s.clamp(0.0, 1.0)
}

/// A speed profile bound to the timeline it runs on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    profile: SpeedProfile,
    frame_start: i32,
    frame_end: i32,
}

impl Timing {
    /// Bind `profile` to the timeline `[frame_start, frame_end]`.
    pub fn new(profile: SpeedProfile, frame_start: i32, frame_end: i32) -> Self {
        Timing {
            profile,
            frame_start,
            frame_end,
        }
    }

    /// The bound profile.
    pub fn profile(&self) -> SpeedProfile {
        self.profile
    }

    /// Fraction of the span `[start, end]` covered at `frame`.
    ///
    /// Returns 0 at `start` and 1 at `end` for every profile, so span endpoints
    /// are never moved in time.
    pub fn progress(&self, start: i32, end: i32, frame: i32) -> f64 {
        if end <= start {
            return 1.0;
        }
        let span = f64::from(end - start);
        let t = f64::from(frame - start);
        match self.profile {
            SpeedProfile::Constant { ramp_frames } => {
                ramped_progress(t, span, f64::from(ramp_frames), RampShape::Linear)
            }
            SpeedProfile::PerSegmentEase { ease_frames } => {
                ramped_progress(t, span, f64::from(ease_frames), RampShape::Sine)
            }
            SpeedProfile::GlobalEase { ease_frames } => {
                let (w0, w1) = (self.warp(start, ease_frames), self.warp(end, ease_frames));
                if w1 - w0 <= f64::EPSILON {
                    return ramped_progress(t, span, 0.0, RampShape::Linear);
                }
                ((self.warp(frame, ease_frames) - w0) / (w1 - w0)).clamp(0.0, 1.0)
            }
        }
    }

    /// Eased timeline clock: equals the frame at both timeline ends, slowed near them.
    fn warp(&self, frame: i32, ease_frames: u32) -> f64 {
        let span = f64::from(self.frame_end - self.frame_start);
        let t = f64::from(frame - self.frame_start);
        span * ramped_progress(t, span, f64::from(ease_frames), RampShape::Sine)
    }
}
