mod collide;

use std::sync::mpsc::Sender;
use std::thread;

use eframe::egui::Vec2;

use collide::accumulate_collisions;

pub const DEFAULT_COLLIDE_STRENGTH: f32 = 0.035;
pub const DEFAULT_ORIGIN_STRENGTH: f32 = 0.1;
pub const ALPHA_MIN: f32 = 0.001;
pub const TICK_CAP: usize = 300;

const VELOCITY_DECAY: f32 = 0.6;

#[derive(Clone, Copy, Debug)]
pub struct LayoutPoint {
    pub pos: Vec2,
    pub origin: Vec2,
    pub radius: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct LayoutParams {
    pub collide_strength: f32,
    pub origin_strength: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            collide_strength: DEFAULT_COLLIDE_STRENGTH,
            origin_strength: DEFAULT_ORIGIN_STRENGTH,
        }
    }
}

type SimulationCallback = Box<dyn FnMut(&[LayoutPoint]) + Send>;

pub struct Simulation {
    points: Vec<LayoutPoint>,
    velocities: Vec<Vec2>,
    pushes: Vec<Vec2>,
    params: LayoutParams,
    alpha: f32,
    alpha_decay: f32,
    ticks: usize,
    ended: bool,
    on_tick: Option<SimulationCallback>,
    on_end: Option<SimulationCallback>,
}

impl Simulation {
    pub fn new(points: Vec<LayoutPoint>, params: LayoutParams) -> Self {
        let count = points.len();
        Self {
            points,
            velocities: vec![Vec2::ZERO; count],
            pushes: vec![Vec2::ZERO; count],
            params,
            alpha: 1.0,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / TICK_CAP as f32),
            ticks: 0,
            ended: false,
            on_tick: None,
            on_end: None,
        }
    }

    pub fn on_tick(&mut self, callback: impl FnMut(&[LayoutPoint]) + Send + 'static) {
        self.on_tick = Some(Box::new(callback));
    }

    pub fn on_end(&mut self, callback: impl FnMut(&[LayoutPoint]) + Send + 'static) {
        self.on_end = Some(Box::new(callback));
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn points(&self) -> &[LayoutPoint] {
        &self.points
    }

    pub fn step(&mut self) -> bool {
        if self.ended || self.points.is_empty() {
            self.finish();
            return false;
        }

        self.alpha += (0.0 - self.alpha) * self.alpha_decay;
        self.ticks += 1;

        let positions = self
            .points
            .iter()
            .map(|point| point.pos)
            .collect::<Vec<_>>();
        let radii = self
            .points
            .iter()
            .map(|point| point.radius)
            .collect::<Vec<_>>();

        self.pushes.fill(Vec2::ZERO);
        accumulate_collisions(
            &positions,
            &radii,
            self.params.collide_strength.clamp(0.0, 1.0),
            &mut self.pushes,
        );

        for (index, point) in self.points.iter_mut().enumerate() {
            let origin_pull =
                (point.origin - point.pos) * self.params.origin_strength.clamp(0.0, 1.0) * self.alpha;
            self.velocities[index] =
                (self.velocities[index] + origin_pull + self.pushes[index]) * VELOCITY_DECAY;
            point.pos += self.velocities[index];
        }

        if let Some(on_tick) = self.on_tick.as_mut() {
            on_tick(&self.points);
        }

        if self.alpha < ALPHA_MIN || self.ticks >= TICK_CAP {
            self.finish();
            return false;
        }

        true
    }

    fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        if let Some(mut on_end) = self.on_end.take() {
            on_end(&self.points);
        }
    }

    pub fn run(mut self) -> Vec<LayoutPoint> {
        while self.step() {}
        self.points
    }
}

pub struct LayoutOutcome {
    pub generation: u64,
    pub positions: Vec<Vec2>,
}

pub struct LayoutRunner {
    generation: u64,
}

impl LayoutRunner {
    pub fn new() -> Self {
        Self { generation: 0 }
    }

    pub fn update_simulation(
        &mut self,
        points: Vec<LayoutPoint>,
        params: LayoutParams,
        outcomes: Sender<LayoutOutcome>,
    ) -> u64 {
        self.generation += 1;
        let generation = self.generation;

        thread::spawn(move || {
            let relaxed = Simulation::new(points, params).run();
            let _ = outcomes.send(LayoutOutcome {
                generation,
                positions: relaxed.iter().map(|point| point.pos).collect(),
            });
        });

        generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use eframe::egui::vec2;

    use super::*;

    fn overlapping_pair() -> Vec<LayoutPoint> {
        vec![
            LayoutPoint {
                pos: vec2(0.0, 0.0),
                origin: vec2(0.0, 0.0),
                radius: 2.0,
            },
            LayoutPoint {
                pos: vec2(0.5, 0.0),
                origin: vec2(0.5, 0.0),
                radius: 2.0,
            },
        ]
    }

    #[test]
    fn terminates_within_tick_cap() {
        let mut sim = Simulation::new(overlapping_pair(), LayoutParams::default());
        let mut ticks = 0usize;
        while sim.step() {
            ticks += 1;
            assert!(ticks <= TICK_CAP);
        }
        assert!(sim.ticks() <= TICK_CAP);
        assert!(sim.alpha() < ALPHA_MIN || sim.ticks() == TICK_CAP);
    }

    #[test]
    fn relaxation_separates_overlapping_points() {
        let relaxed = Simulation::new(
            overlapping_pair(),
            LayoutParams {
                collide_strength: 0.5,
                origin_strength: DEFAULT_ORIGIN_STRENGTH,
            },
        )
        .run();

        let gap = (relaxed[0].pos - relaxed[1].pos).length();
        assert!(gap > 0.5, "points should spread, gap = {gap}");
    }

    #[test]
    fn origin_pull_keeps_isolated_point_in_place() {
        let points = vec![LayoutPoint {
            pos: vec2(3.0, -4.0),
            origin: vec2(3.0, -4.0),
            radius: 1.0,
        }];
        let relaxed = Simulation::new(points, LayoutParams::default()).run();
        assert!((relaxed[0].pos - vec2(3.0, -4.0)).length() < 1e-3);
    }

    #[test]
    fn on_end_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let mut sim = Simulation::new(overlapping_pair(), LayoutParams::default());
        sim.on_end(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        while sim.step() {}
        assert!(!sim.step());
        assert!(!sim.step());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn later_callback_registration_replaces_earlier() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut sim = Simulation::new(overlapping_pair(), LayoutParams::default());
        let counter = Arc::clone(&first);
        sim.on_end(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        sim.on_end(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        while sim.step() {}
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_tick_observes_every_step() {
        let ticks_seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks_seen);

        let mut sim = Simulation::new(overlapping_pair(), LayoutParams::default());
        sim.on_tick(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        while sim.step() {}
        assert_eq!(ticks_seen.load(Ordering::SeqCst), sim.ticks());
    }

    #[test]
    fn empty_point_set_ends_immediately() {
        let mut sim = Simulation::new(Vec::new(), LayoutParams::default());
        assert!(!sim.step());
    }

    #[test]
    fn superseded_run_outcome_is_stale() {
        let (tx, rx) = mpsc::channel();
        let mut runner = LayoutRunner::new();

        let first = runner.update_simulation(overlapping_pair(), LayoutParams::default(), tx.clone());
        let second = runner.update_simulation(overlapping_pair(), LayoutParams::default(), tx);

        assert!(!runner.is_current(first));
        assert!(runner.is_current(second));

        let mut current_outcomes = 0usize;
        for _ in 0..2 {
            let outcome = rx
                .recv_timeout(std::time::Duration::from_secs(10))
                .expect("both runs complete");
            if runner.is_current(outcome.generation) {
                current_outcomes += 1;
            }
        }
        assert_eq!(current_outcomes, 1);
    }
}
