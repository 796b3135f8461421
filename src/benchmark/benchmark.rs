use std::time::Instant;

use crate::configuration::config::ForceMode;
use crate::simulation::driver::Simulation;
use crate::simulation::engine::Engine;
use crate::simulation::forces::{Acceleration, BarnesHutGravity, DirectGravity, GravityLaw};
use crate::simulation::params::{Parameters, SimulationConfig};
use crate::simulation::states::{NVec2, ParticleStore};

// deterministic positions, no rand needed
fn spiral_position(i: usize) -> NVec2 {
    let i_f = i as f32;
    NVec2::new((i_f * 0.37).sin() * 500.0, (i_f * 0.13).cos() * 500.0)
}

fn spiral_store(n: usize) -> ParticleStore {
    let mut store = ParticleStore::new(n);
    store.reserve(n);
    for i in 0..n {
        store.add_particle(spiral_position(i), 1.0);
    }
    store
}

/// Time one acceleration evaluation, exact sum vs Barnes–Hut, for growing N
pub fn bench_gravity() {
    let ns = [200, 400, 800, 1600, 3200, 6400, 12800];
    let config = SimulationConfig::default();
    let law = GravityLaw::from_config(&config);

    let direct = DirectGravity { law };
    let bh = BarnesHutGravity { law, settings: config.engine.tree };

    for n in ns {
        let store = spiral_store(n);
        let mut out = vec![NVec2::zeros(); n];

        // Warm up
        direct.acceleration(store.view(), &mut out);
        bh.acceleration(store.view(), &mut out);

        let t0 = Instant::now();
        direct.acceleration(store.view(), &mut out);
        let dt_direct = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        bh.acceleration(store.view(), &mut out);
        let dt_bh = t1.elapsed().as_secs_f64();

        println!("N = {n:6}, direct = {dt_direct:8.6} s, BH = {dt_bh:8.6} s");
    }
}

/// Mean wall time of a full step in each force mode, as CSV on stdout
pub fn bench_step_curve() {
    let ns = [1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000];
    let steps = 5;

    println!("n,gravity_s_per_step,bounded_s_per_step");
    for n in ns {
        let mut per_step = [0.0f64; 2];
        for (k, mode) in [ForceMode::Gravity, ForceMode::Bounded].into_iter().enumerate() {
            let parameters = Parameters { max_particles: n, ..Parameters::default() };
            let engine = Engine { mode, ..Engine::default() };
            let mut sim = Simulation::new(SimulationConfig::new(engine, parameters, None));
            for i in 0..n {
                if let Some(idx) = sim.add_particle(spiral_position(i), 1.0) {
                    sim.set_type(idx, (i % 5) as u32);
                }
            }

            // Warm-up
            sim.tick();

            let t0 = Instant::now();
            for _ in 0..steps {
                sim.tick();
            }
            per_step[k] = t0.elapsed().as_secs_f64() / steps as f64;
        }
        println!("{n},{:.6},{:.6}", per_step[0], per_step[1]);
    }
}
