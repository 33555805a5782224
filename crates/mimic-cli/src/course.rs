//! A ring-shaped steering course used to evaluate agents.
//!
//! The track is the annulus between two concentric walls. Checkpoints sit
//! on the middle of the ring and are reached in counterclockwise order,
//! lap after lap. Obstacles block the track: low ones can be jumped, tall
//! ones must be steered around. Hazards end the run unless the agent is
//! airborne while crossing them.
//!
//! Sensors follow the layout of [`mimic_imitation::demonstration::sensor`].

use std::{
    collections::HashSet,
    f32::consts::{FRAC_PI_2, PI, TAU},
};

use mimic_imitation::demonstration::{ACTION_ACTIVE, action, sensor};
use mimic_network::NetworkWeights;

const CENTER: [f32; 2] = [10.0, 10.0];
const INNER_RADIUS: f32 = 5.0;
const OUTER_RADIUS: f32 = 9.0;
const MID_RADIUS: f32 = 7.0;
const AGENT_RADIUS: f32 = 0.3;

/// Ray directions relative to the heading, far-left first.
const RAY_ANGLES: [f32; 5] = [0.8, 0.4, 0.0, -0.4, -0.8];
const RAY_RANGE: f32 = 6.0;
pub(crate) const MAX_OBSTACLE_HEIGHT: f32 = 2.0;
/// Tallest obstacle an airborne agent passes over.
pub(crate) const JUMP_CLEARANCE: f32 = 1.0;
const CHECKPOINT_COUNT: u8 = 8;
const CHECKPOINT_RADIUS: f32 = 1.2;
const CHECKPOINT_RANGE: f32 = 8.0;
const HAZARD_RANGE: f32 = 3.0;

const SPEED: f32 = 0.35;
pub(crate) const TURN_RATE: f32 = 0.3;
pub(crate) const STEP_SECONDS: f32 = 0.1;

const CHECKPOINT_REWARD: f32 = 10.0;
const COLLISION_PENALTY: f32 = 0.05;
const JUMP_COST: f32 = 0.02;
const EXPLORATION_CELL: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Circle {
    pub center: [f32; 2],
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Obstacle {
    pub circle: Circle,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct Course {
    checkpoints: Vec<[f32; 2]>,
    obstacles: Vec<Obstacle>,
    hazards: Vec<Circle>,
}

impl Course {
    pub fn new(checkpoints: Vec<[f32; 2]>, obstacles: Vec<Obstacle>, hazards: Vec<Circle>) -> Self {
        Self {
            checkpoints,
            obstacles,
            hazards,
        }
    }

    /// The fixed course used by the `simulate` and `record` commands.
    pub fn standard() -> Self {
        let checkpoints = (1..=CHECKPOINT_COUNT)
            .map(|k| polar(f32::from(k) * TAU / f32::from(CHECKPOINT_COUNT), MID_RADIUS))
            .collect();
        let obstacle = |angle, radius, size, height| Obstacle {
            circle: Circle {
                center: polar(angle, radius),
                radius: size,
            },
            height,
        };
        let obstacles = vec![
            obstacle(0.6, MID_RADIUS, 0.5, 0.8),
            obstacle(1.6, 6.0, 0.8, 2.0),
            obstacle(2.9, 7.5, 0.5, 0.6),
            obstacle(4.0, 7.9, 0.8, 2.0),
            obstacle(5.3, MID_RADIUS, 0.5, 0.9),
        ];
        let hazard = |angle, radius, size| Circle {
            center: polar(angle, radius),
            radius: size,
        };
        let hazards = vec![
            hazard(2.2, 8.1, 0.6),
            hazard(3.5, 6.0, 0.6),
            hazard(4.7, MID_RADIUS, 0.5),
        ];
        Self::new(checkpoints, obstacles, hazards)
    }

    /// Starts a run at angle 0 on the middle of the ring, facing
    /// counterclockwise.
    pub fn start(&self) -> Run<'_> {
        self.start_at(polar(0.0, MID_RADIUS), FRAC_PI_2)
    }

    pub fn start_at(&self, position: [f32; 2], heading: f32) -> Run<'_> {
        Run {
            course: self,
            position,
            heading,
            next_checkpoint: 0,
            checkpoints_reached: 0,
            alive: true,
            steps: 0,
            jumps: 0,
            cleared_jumps: 0,
            collisions: 0,
            visited: HashSet::from([cell_of(position)]),
        }
    }

    /// Lets `controller` drive a fresh run for at most `max_steps` steps.
    pub fn run<C>(&self, controller: &mut C, max_steps: usize) -> Episode
    where
        C: Controller + ?Sized,
    {
        let mut run = self.start();
        for _ in 0..max_steps {
            if !run.is_alive() {
                break;
            }
            let sensors = run.sensors();
            let actions = controller.act(&run, &sensors);
            run.step(&actions);
        }
        run.episode()
    }
}

/// Anything that turns sensor readings into actions.
pub(crate) trait Controller {
    fn act(&mut self, run: &Run<'_>, sensors: &[f32]) -> Vec<f32>;
}

/// Drives with a network's feedforward output.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NetworkController<'a>(pub &'a NetworkWeights);

impl Controller for NetworkController<'_> {
    fn act(&mut self, _run: &Run<'_>, sensors: &[f32]) -> Vec<f32> {
        self.0
            .forward(sensors)
            .unwrap_or_else(|_| vec![0.0; action::WIDTH])
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Episode {
    pub fitness: f32,
    pub alive: bool,
    /// Share of jumps that cleared an obstacle or hazard; `None` without jumps.
    pub task_efficiency: Option<f32>,
    pub exploration: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct Run<'a> {
    course: &'a Course,
    position: [f32; 2],
    heading: f32,
    next_checkpoint: usize,
    checkpoints_reached: usize,
    alive: bool,
    steps: usize,
    jumps: usize,
    cleared_jumps: usize,
    collisions: usize,
    visited: HashSet<(i32, i32)>,
}

impl Run<'_> {
    /// Position lifted onto the ground plane, `y` up.
    pub fn position_3d(&self) -> [f32; 3] {
        [self.position[0], 0.0, self.position[1]]
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn checkpoints_reached(&self) -> usize {
        self.checkpoints_reached
    }

    #[expect(clippy::cast_precision_loss)]
    pub fn elapsed(&self) -> f32 {
        self.steps as f32 * STEP_SECONDS
    }

    /// Heading that follows the ring counterclockwise while pulling back
    /// toward its middle.
    pub fn track_heading(&self) -> f32 {
        let dx = self.position[0] - CENTER[0];
        let dy = self.position[1] - CENTER[1];
        let half_width = (OUTER_RADIUS - INNER_RADIUS) / 2.0;
        let radial_error = ((dx.hypot(dy) - MID_RADIUS) / half_width).clamp(-1.0, 1.0);
        dy.atan2(dx) + FRAC_PI_2 + 0.6 * radial_error
    }

    pub fn sensors(&self) -> Vec<f32> {
        let mut sensors = vec![0.0; sensor::WIDTH];
        for (slot, offset) in sensor::RAYS.zip(RAY_ANGLES) {
            let (distance, _) = self.cast(self.heading + offset);
            sensors[slot] = distance / RAY_RANGE;
        }
        let (_, height) = self.cast(self.heading);
        sensors[sensor::OBSTACLE_HEIGHT] = height.map_or(0.0, |h| h / MAX_OBSTACLE_HEIGHT);
        sensors[sensor::CHECKPOINT_PROXIMITY] =
            1.0 - (distance(self.position, self.checkpoint()) / CHECKPOINT_RANGE).min(1.0);
        sensors[sensor::HAZARD_PROXIMITY] = self
            .course
            .hazards
            .iter()
            .map(|h| {
                let edge = (distance(self.position, h.center) - h.radius).max(0.0);
                1.0 - (edge / HAZARD_RANGE).min(1.0)
            })
            .fold(0.0, f32::max);
        sensors
    }

    /// Advances the run by one step. Does nothing once the agent is dead.
    pub fn step(&mut self, actions: &[f32]) {
        if !self.alive {
            return;
        }
        let act = |i: usize| actions.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
        self.steps += 1;
        self.heading =
            wrap_angle(self.heading + (act(action::TURN_LEFT) - act(action::TURN_RIGHT)) * TURN_RATE);
        let airborne = act(action::JUMP) > ACTION_ACTIVE;
        if airborne {
            self.jumps += 1;
        }

        let speed = act(action::FORWARD) * SPEED;
        let next = [
            self.position[0] + self.heading.cos() * speed,
            self.position[1] + self.heading.sin() * speed,
        ];
        let radius = distance(next, CENTER);
        let mut blocked =
            radius < INNER_RADIUS + AGENT_RADIUS || radius > OUTER_RADIUS - AGENT_RADIUS;
        let mut cleared = false;
        for obstacle in &self.course.obstacles {
            if distance(next, obstacle.circle.center) < obstacle.circle.radius + AGENT_RADIUS {
                if airborne && obstacle.height <= JUMP_CLEARANCE {
                    cleared = true;
                } else {
                    blocked = true;
                }
            }
        }
        if blocked {
            self.collisions += 1;
        } else {
            self.position = next;
        }

        for hazard in &self.course.hazards {
            if distance(self.position, hazard.center) < hazard.radius {
                if airborne {
                    cleared = true;
                } else {
                    self.alive = false;
                }
            }
        }
        if cleared {
            self.cleared_jumps += 1;
        }
        self.visited.insert(cell_of(self.position));

        if !self.course.checkpoints.is_empty()
            && distance(self.position, self.checkpoint()) < CHECKPOINT_RADIUS
        {
            self.checkpoints_reached += 1;
            self.next_checkpoint = (self.next_checkpoint + 1) % self.course.checkpoints.len();
        }
    }

    /// Checkpoint rewards plus partial progress toward the next one, minus
    /// collision and jump costs.
    #[expect(clippy::cast_precision_loss)]
    pub fn fitness(&self) -> f32 {
        let progress = if self.course.checkpoints.is_empty() {
            0.0
        } else {
            let previous = if self.checkpoints_reached == 0 {
                polar(0.0, MID_RADIUS)
            } else {
                let n = self.course.checkpoints.len();
                self.course.checkpoints[(self.next_checkpoint + n - 1) % n]
            };
            let segment = distance(previous, self.checkpoint()).max(f32::EPSILON);
            1.0 - (distance(self.position, self.checkpoint()) / segment).min(1.0)
        };
        (self.checkpoints_reached as f32 + progress) * CHECKPOINT_REWARD
            - self.collisions as f32 * COLLISION_PENALTY
            - self.jumps as f32 * JUMP_COST
    }

    #[expect(clippy::cast_precision_loss)]
    pub fn episode(&self) -> Episode {
        let ring_cells = PI * (OUTER_RADIUS.powi(2) - INNER_RADIUS.powi(2))
            / (EXPLORATION_CELL * EXPLORATION_CELL);
        Episode {
            fitness: self.fitness(),
            alive: self.alive,
            task_efficiency: (self.jumps > 0)
                .then(|| self.cleared_jumps as f32 / self.jumps as f32),
            exploration: (self.visited.len() as f32 / ring_cells).min(1.0),
        }
    }

    fn checkpoint(&self) -> [f32; 2] {
        self.course
            .checkpoints
            .get(self.next_checkpoint)
            .copied()
            .unwrap_or(self.position)
    }

    /// Distance to the nearest wall or obstacle along `angle`, capped at the
    /// ray range, and the height of the obstacle hit, if any.
    fn cast(&self, angle: f32) -> (f32, Option<f32>) {
        let direction = [angle.cos(), angle.sin()];
        let mut nearest = RAY_RANGE;
        let mut height = None;
        for wall in [INNER_RADIUS, OUTER_RADIUS] {
            if let Some(t) = ray_circle(self.position, direction, CENTER, wall) {
                if t < nearest {
                    nearest = t;
                    height = None;
                }
            }
        }
        for obstacle in &self.course.obstacles {
            let Circle { center, radius } = obstacle.circle;
            if let Some(t) = ray_circle(self.position, direction, center, radius) {
                if t < nearest {
                    nearest = t;
                    height = Some(obstacle.height);
                }
            }
        }
        (nearest, height)
    }
}

fn polar(angle: f32, radius: f32) -> [f32; 2] {
    [
        CENTER[0] + radius * angle.cos(),
        CENTER[1] + radius * angle.sin(),
    ]
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Wraps an angle into `(-π, π]`.
pub(crate) fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

#[expect(clippy::cast_possible_truncation)]
fn cell_of(position: [f32; 2]) -> (i32, i32) {
    (
        (position[0] / EXPLORATION_CELL).floor() as i32,
        (position[1] / EXPLORATION_CELL).floor() as i32,
    )
}

/// Smallest positive `t` with `|origin + t * direction - center| = radius`.
fn ray_circle(origin: [f32; 2], direction: [f32; 2], center: [f32; 2], radius: f32) -> Option<f32> {
    let ox = origin[0] - center[0];
    let oy = origin[1] - center[1];
    let b = ox * direction[0] + oy * direction[1];
    let c = ox * ox + oy * oy - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    [-b - root, -b + root].into_iter().find(|t| *t > 0.0)
}
