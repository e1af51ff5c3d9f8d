//! End-to-end lifecycle: config -> seeded domain -> runner -> frame limit.

use orchestrator::{create_from_config, RunnerState, SimulationConfig};
use solver::Injection;
use std::thread;
use std::time::Duration;

fn test_config() -> SimulationConfig {
    let json = r#"{
        "name": "lifecycle test",
        "particle_count": 512,
        "num_buckets": 1024,
        "group_width": 64,
        "max_frames": 20
    }"#;
    serde_json::from_str(json).unwrap()
}

fn wait_until_finished(runner: &orchestrator::SimulationRunner) {
    for _ in 0..1000 {
        if runner.state() == RunnerState::Finished {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("runner did not finish in time");
}

#[test]
fn runs_to_frame_limit() {
    let config = test_config();
    let runner = create_from_config(&config).unwrap();
    assert_eq!(runner.state(), RunnerState::Created);

    runner.start();
    wait_until_finished(&runner);

    assert_eq!(runner.frame_count(), 20);
    let snapshot = runner.snapshot();
    assert_eq!(snapshot.len(), 512);
    // Gravity acted on the clusters; they are falling.
    let mean_vy: f32 = snapshot.iter().map(|p| p.vel[1]).sum::<f32>() / 512.0;
    assert!(mean_vy < 0.0, "mean vy = {mean_vy}");

    runner.join().unwrap();
}

#[test]
fn injection_reaches_the_solver() {
    let mut config = test_config();
    config.max_frames = Some(5);
    let runner = create_from_config(&config).unwrap();

    runner.inject_motion(Injection {
        center: [0.0, 5.0, 0.0],
    });
    runner.start();
    wait_until_finished(&runner);

    // The injected block fell much faster than gravity alone allows.
    let snapshot = runner.snapshot();
    let fast = snapshot.iter().filter(|p| p.vel[1] < -50.0).count();
    assert!(fast > 0, "no injected particles found");
    runner.join().unwrap();
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = test_config();
    config.num_buckets = 1024 * 1024 + 1;
    config.group_width = 1024;
    assert!(config.validate().is_err());
}
