use roboanim_kinematics::{ForwardAxis, WheelLimits, WheelSigns};
use roboanim_path::*;

fn main() {
    let fps = 24.0;
    let chassis = ObjectId::new("Scene", "Chassis");

    // Keyed to slide half a metre sideways while driving forward one metre.
    let mut curves = KeyframeCurves::new();
    curves.insert_key(ChannelKey::LOCATION_X, 1, 0.0);
    curves.insert_key(ChannelKey::LOCATION_X, 48, 1.0);
    curves.insert_key(ChannelKey::LOCATION_Y, 1, 0.0);
    curves.insert_key(ChannelKey::LOCATION_Y, 48, 0.5);

    let mut store = TrajectoryStore::new();
    store.insert(chassis.clone(), curves);

    let config = ReconstructConfig {
        strategy: Strategy::SmoothCurve { tangent_scale: 0.35 },
        speed_profile: SpeedProfile::default(),
        axis: ForwardAxis::PosX,
        track_width: 0.25,
        lateral_tolerance: 0.02,
    };

    match autocorrect(&mut store, &chassis, 1, 48, fps, &config) {
        Ok(outcome) => {
            println!(
                "Violations before: {}, after: {}",
                outcome.before.violations, outcome.after.violations
            );
            println!(
                "Autocorrect baked {} frames (max curvature {:.2} 1/m)",
                outcome.frames_baked, outcome.max_curvature
            );
        }
        Err(e) => {
            eprintln!("Autocorrect failed: {}", e);
            return;
        }
    }

    let Some(curves) = store.working(&chassis) else {
        eprintln!("Chassis disappeared from the store");
        return;
    };
    let mut sampler = CurveSampler::new(curves, fps);
    let trajectory = match sample_trajectory(&mut sampler, 1, 48) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Sampling failed: {}", e);
            return;
        }
    };

    let geometry = WheelGeometry {
        track_width: 0.25,
        wheel_radius: 0.06,
        axis: ForwardAxis::PosX,
        signs: WheelSigns::FORWARD,
    };
    match WheelKinematicsCache::build(&trajectory, geometry, WheelLimits::default()) {
        Ok(cache) => {
            let (l, r) = cache.max_rpm();
            println!("Max RPM L/R: {:.1}/{:.1}", l, r);
            if let Ok(rows) = cache.rows(Sampling::FixedRate(10), ExportUnits::default()) {
                for row in rows {
                    println!(
                        "t={:>5.2}s  x={:>6.3}  y={:>6.3}  yaw={:>6.3}  rateL={:>6.1}  rateR={:>6.1}",
                        row.t, row.x, row.y, row.yaw, row.rate_l, row.rate_r
                    );
                }
            }
        }
        Err(e) => eprintln!("Wheel cache failed: {}", e),
    }
}
