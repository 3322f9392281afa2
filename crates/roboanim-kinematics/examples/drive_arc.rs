use roboanim_kinematics::*;

fn main() {
    let wheel_radius = 0.06;
    let track_width = 0.25;
    let kinematics_result = DifferentialDrive::new(wheel_radius, track_width);

    let fps = 24.0;
    let dt = 1.0 / fps;
    let wheel_speeds = WheelSpeeds::new(6.0, 9.0); // right wheel faster: gentle left arc
    let num_steps = 24;

    match kinematics_result {
        Ok(kinematics) => {
            println!("Differential drive: {}", kinematics);
            println!("  Wheel Speeds:   {}", wheel_speeds);
            println!("  Chassis Speeds: {}", kinematics.forward_kinematics(wheel_speeds));
            println!("  Frame Rate:     {} fps", fps);

            let mut poses = vec![Pose::default()];
            for _ in 0..num_steps {
                let last = poses[poses.len() - 1];
                match kinematics.update_pose_from_wheel_speeds(last, wheel_speeds, dt) {
                    Ok(pose) => poses.push(pose),
                    Err(e) => {
                        eprintln!("Odometry failed: {}", e);
                        return;
                    }
                }
            }

            let limits = WheelLimits {
                max_rpm: 80.0,
                max_ang_accel_rpm_per_s: 0.0,
            };
            match kinematics.wheel_motion(&poses, dt, ForwardAxis::PosX, WheelSigns::FORWARD, limits) {
                Ok(motion) => {
                    for (i, pose) in poses.iter().enumerate() {
                        println!(
                            "Frame {:>2}: {}  θL={:>6.2} rad  θR={:>6.2} rad",
                            i, pose, motion.theta_l[i], motion.theta_r[i]
                        );
                    }
                    println!(
                        "Max RPM L/R: {:.1}/{:.1} ({} step(s) capped at {} RPM)",
                        motion.max_rpm_l, motion.max_rpm_r, motion.speed_clamped_steps, limits.max_rpm
                    );
                }
                Err(e) => eprintln!("Wheel integration failed: {}", e),
            }
        }
        Err(e) => {
            eprintln!("Failed to initialize kinematics: {:?}", e);
        }
    }
}
