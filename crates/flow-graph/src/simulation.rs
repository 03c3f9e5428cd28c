//! Force-directed layout engine.
//!
//! Velocity Verlet integration with three forces, matching the behaviour of
//! the d3-force defaults the viewer is tuned for:
//!
//! - **link**: spring toward `link_distance`, keyed by node position in the
//!   graph, strength `1 / min(degree(source), degree(target))`
//! - **charge**: many-body repulsion (exact pairwise sum, `theta = 0`)
//! - **centering**: mean shift to a point, or an axis pull toward it
//!
//! Energy (`alpha`) decays toward `alpha_target` every tick. The simulation
//! stops once `alpha` falls below `alpha_min`; a drag raises
//! `alpha_target` so the rest of the graph keeps reacting while a node is
//! pinned.

use std::f64::consts::PI;

use thiserror::Error;

use crate::builder::BlockGraph;

/// Hard stop for [`Simulation::run`] while a drag holds the simulation warm.
pub const MAX_TICKS: usize = 3_000;

/// `alpha_target` while at least one drag gesture is active.
pub const DRAG_ALPHA_TARGET: f64 = 0.3;

const INITIAL_RADIUS: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Centering {
    /// Translate every node so the layout's mean sits on `(x, y)`.
    Center { x: f64, y: f64 },
    /// Pull each node toward `x` and `y` independently.
    Axis { x: f64, y: f64, strength: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForceConfig {
    pub link_distance: f64,
    /// Fixed spring strength; `None` derives it from endpoint degrees.
    pub link_strength: Option<f64>,
    pub link_iterations: usize,
    pub charge_strength: f64,
    pub charge_distance_min: f64,
    pub charge_distance_max: Option<f64>,
    pub centering: Centering,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
}

impl ForceConfig {
    /// d3-force defaults centred on `(x, y)`.
    pub fn d3_default(x: f64, y: f64) -> Self {
        let alpha_min = 0.001;
        Self {
            link_distance: 30.0,
            link_strength: None,
            link_iterations: 1,
            charge_strength: -30.0,
            charge_distance_min: 1.0,
            charge_distance_max: None,
            centering: Centering::Center { x, y },
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            velocity_decay: 0.4,
        }
    }

    /// Viewer layout: stronger repulsion so dense blocks stay readable.
    pub fn viewer(width: f64, height: f64) -> Self {
        Self {
            charge_strength: -150.0,
            ..Self::d3_default(width / 2.0, height / 2.0)
        }
    }

    /// Viewer layout with per-axis centering instead of a mean shift.
    pub fn viewer_axis(width: f64, height: f64) -> Self {
        Self {
            centering: Centering::Axis {
                x: width / 2.0,
                y: height / 2.0,
                strength: 0.1,
            },
            ..Self::viewer(width, height)
        }
    }
}

/// Position, velocity and optional pin of one node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no node at index {0}")]
pub struct UnknownNode(pub usize);

/// Deterministic LCG used to nudge coincident nodes apart.
#[derive(Clone, Debug)]
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        f64::from(self.0) / 4_294_967_296.0
    }

    fn jiggle(&mut self) -> f64 {
        (self.next() - 0.5) * 1e-6
    }
}

#[derive(Clone, Debug)]
struct Spring {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

#[derive(Clone, Debug)]
pub struct Simulation {
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    config: ForceConfig,
    alpha: f64,
    alpha_target: f64,
    running: bool,
    active_drags: usize,
    random: Lcg,
    ticks: usize,
}

impl Simulation {
    /// Seed a simulation for `graph`, placing nodes on a phyllotaxis spiral.
    pub fn new(graph: &BlockGraph, config: ForceConfig) -> Self {
        let initial_angle = PI * (3.0 - 5f64.sqrt());
        let bodies = (0..graph.node_count())
            .map(|i| {
                let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
                let angle = i as f64 * initial_angle;
                Body {
                    x: radius * angle.cos(),
                    y: radius * angle.sin(),
                    ..Body::default()
                }
            })
            .collect::<Vec<_>>();

        let endpoints = graph.link_endpoints();
        let mut degree = vec![0_usize; bodies.len()];
        for &(source, target) in &endpoints {
            degree[source] += 1;
            degree[target] += 1;
        }

        let springs = endpoints
            .into_iter()
            .map(|(source, target)| {
                let (ds, dt) = (degree[source] as f64, degree[target] as f64);
                Spring {
                    source,
                    target,
                    strength: config.link_strength.unwrap_or(1.0 / ds.min(dt)),
                    bias: ds / (ds + dt),
                }
            })
            .collect();

        Self {
            bodies,
            springs,
            config,
            alpha: 1.0,
            alpha_target: 0.0,
            running: true,
            active_drags: 0,
            random: Lcg(1),
            ticks: 0,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// True once the simulation has cooled and stopped.
    pub fn is_settled(&self) -> bool {
        !self.running
    }

    /// Resume ticking without changing `alpha`.
    pub fn restart(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advance one step: cool, apply forces, integrate.
    pub fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;

        for _ in 0..self.config.link_iterations {
            self.apply_links();
        }
        self.apply_charge();
        self.apply_centering();

        let keep = 1.0 - self.config.velocity_decay;
        for body in &mut self.bodies {
            match body.fx {
                Some(fx) => {
                    body.x = fx;
                    body.vx = 0.0;
                }
                None => {
                    body.vx *= keep;
                    body.x += body.vx;
                }
            }
            match body.fy {
                Some(fy) => {
                    body.y = fy;
                    body.vy = 0.0;
                }
                None => {
                    body.vy *= keep;
                    body.y += body.vy;
                }
            }
        }
        self.ticks += 1;
    }

    /// Tick until cooled, calling `on_tick` after every step.
    ///
    /// Returns the number of ticks taken. Stops after [`MAX_TICKS`] even if
    /// an active drag keeps `alpha` above `alpha_min`.
    pub fn run(&mut self, mut on_tick: impl FnMut(&Simulation)) -> usize {
        let mut taken = 0;
        while self.running && taken < MAX_TICKS {
            self.tick();
            taken += 1;
            on_tick(self);
            if self.alpha < self.config.alpha_min {
                self.running = false;
            }
        }
        taken
    }

    /// Tick exactly `n` times regardless of `alpha`.
    pub fn run_ticks(&mut self, n: usize, mut on_tick: impl FnMut(&Simulation)) {
        for _ in 0..n {
            self.tick();
            on_tick(self);
        }
    }

    /// Begin dragging a node: pin it where it is and warm the simulation.
    pub fn drag_start(&mut self, index: usize) -> Result<(), UnknownNode> {
        let body = self.bodies.get_mut(index).ok_or(UnknownNode(index))?;
        body.fx = Some(body.x);
        body.fy = Some(body.y);
        if self.active_drags == 0 {
            self.alpha_target = DRAG_ALPHA_TARGET;
            self.restart();
        }
        self.active_drags += 1;
        Ok(())
    }

    /// Move the pin of a dragged node.
    pub fn drag_to(&mut self, index: usize, x: f64, y: f64) -> Result<(), UnknownNode> {
        let body = self.bodies.get_mut(index).ok_or(UnknownNode(index))?;
        body.fx = Some(x);
        body.fy = Some(y);
        Ok(())
    }

    /// Release a dragged node; the last release lets the simulation cool.
    pub fn drag_end(&mut self, index: usize) -> Result<(), UnknownNode> {
        let body = self.bodies.get_mut(index).ok_or(UnknownNode(index))?;
        body.fx = None;
        body.fy = None;
        self.active_drags = self.active_drags.saturating_sub(1);
        if self.active_drags == 0 {
            self.alpha_target = 0.0;
        }
        Ok(())
    }

    fn apply_links(&mut self) {
        let alpha = self.alpha;
        let distance = self.config.link_distance;

        for spring in &self.springs {
            if spring.source == spring.target {
                continue;
            }
            let s = self.bodies[spring.source];
            let t = self.bodies[spring.target];

            let mut x = t.x + t.vx - s.x - s.vx;
            if x == 0.0 {
                x = self.random.jiggle();
            }
            let mut y = t.y + t.vy - s.y - s.vy;
            if y == 0.0 {
                y = self.random.jiggle();
            }

            let l = (x * x + y * y).sqrt();
            let l = (l - distance) / l * alpha * spring.strength;
            let (x, y) = (x * l, y * l);

            let target = &mut self.bodies[spring.target];
            target.vx -= x * spring.bias;
            target.vy -= y * spring.bias;
            let source = &mut self.bodies[spring.source];
            source.vx += x * (1.0 - spring.bias);
            source.vy += y * (1.0 - spring.bias);
        }
    }

    fn apply_charge(&mut self) {
        let strength = self.config.charge_strength * self.alpha;
        let min2 = self.config.charge_distance_min.powi(2);
        let max2 = self.config.charge_distance_max.map(|d| d * d);

        for i in 0..self.bodies.len() {
            let (xi, yi) = (self.bodies[i].x, self.bodies[i].y);
            let (mut dvx, mut dvy) = (0.0, 0.0);

            for j in 0..self.bodies.len() {
                if i == j {
                    continue;
                }
                let mut x = self.bodies[j].x - xi;
                let mut y = self.bodies[j].y - yi;
                let mut l = x * x + y * y;
                if max2.is_some_and(|max2| l >= max2) {
                    continue;
                }
                if x == 0.0 {
                    x = self.random.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.random.jiggle();
                    l += y * y;
                }
                if l < min2 {
                    l = (min2 * l).sqrt();
                }
                dvx += x * strength / l;
                dvy += y * strength / l;
            }

            self.bodies[i].vx += dvx;
            self.bodies[i].vy += dvy;
        }
    }

    fn apply_centering(&mut self) {
        if self.bodies.is_empty() {
            return;
        }
        match self.config.centering {
            Centering::Center { x, y } => {
                let n = self.bodies.len() as f64;
                let (sx, sy) = self
                    .bodies
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
                let (dx, dy) = (x - sx / n, y - sy / n);
                for body in &mut self.bodies {
                    body.x += dx;
                    body.y += dy;
                }
            }
            Centering::Axis { x, y, strength } => {
                let k = strength * self.alpha;
                for body in &mut self.bodies {
                    body.vx += (x - body.x) * k;
                    body.vy += (y - body.y) * k;
                }
            }
        }
    }
}
