use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const CIRCLE_ANGLE_STEP: f32 = 0.02;
pub const RANDOM_REROLL_INTERVAL_MS: u64 = 2_000;
pub const GRID_TOLERANCE: f32 = 0.1;

const DIRECTION_PROBABILITY: f64 = 0.5;
const SPRINT_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// 위치와 방향. 방향의 y 성분이 yaw 이다.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputSample {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub jump: bool,
    pub primary_action: bool,
    pub secondary_action: bool,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPattern {
    #[default]
    Random,
    Circle,
    Grid,
}

impl MovementPattern {
    pub const ALL: [MovementPattern; 3] = [
        MovementPattern::Random,
        MovementPattern::Circle,
        MovementPattern::Grid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementPattern::Random => "random",
            MovementPattern::Circle => "circle",
            MovementPattern::Grid => "grid",
        }
    }
}

impl fmt::Display for MovementPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementPattern {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(MovementPattern::Random),
            "circle" => Ok(MovementPattern::Circle),
            "grid" => Ok(MovementPattern::Grid),
            other => Err(ConfigurationError::UnknownPattern(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementSettings {
    pub circle_radius: f32,
    pub grid_size: u32,
    pub grid_cell_size: f32,
    /// 틱당 이동 거리
    pub move_speed: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            circle_radius: 10.0,
            grid_size: 10,
            grid_cell_size: 2.0,
            move_speed: 0.1,
        }
    }
}

/// 패턴별 내부 상태. 패턴을 바꿔도 초기화하지 않는다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternState {
    pub angle: f32,
    /// (column, row)
    pub grid_cursor: (u32, u32),
    pub last_randomized_ms: Option<u64>,
}

/// Per-bot movement generator.
///
/// Each call to [`MovementSimulator::step`] advances one simulation tick for the
/// selected pattern. Wall-clock time only enters through `now_ms`, and randomness only
/// through the seeded RNG, so a simulator is fully reproducible in tests.
pub struct MovementSimulator {
    settings: MovementSettings,
    rng: ChaCha20Rng,
}

impl MovementSimulator {
    pub fn new(settings: MovementSettings, rng: ChaCha20Rng) -> Self {
        Self { settings, rng }
    }

    pub fn step(
        &mut self,
        pattern: MovementPattern,
        state: &mut PatternState,
        pose: &mut Pose,
        input: &mut InputSample,
        now_ms: u64,
    ) {
        match pattern {
            MovementPattern::Random => self.step_random(state, pose, input, now_ms),
            MovementPattern::Circle => self.step_circle(state, pose, input),
            MovementPattern::Grid => self.step_grid(state, pose, input),
        }
    }

    fn step_random(
        &mut self,
        state: &mut PatternState,
        pose: &mut Pose,
        input: &mut InputSample,
        now_ms: u64,
    ) {
        let due = state
            .last_randomized_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= RANDOM_REROLL_INTERVAL_MS);

        if due {
            input.forward = self.rng.gen_bool(DIRECTION_PROBABILITY);
            input.backward = self.rng.gen_bool(DIRECTION_PROBABILITY);
            input.left = self.rng.gen_bool(DIRECTION_PROBABILITY);
            input.right = self.rng.gen_bool(DIRECTION_PROBABILITY);
            input.sprint = self.rng.gen_bool(SPRINT_PROBABILITY);
            input.sequence += 1;
            state.last_randomized_ms = Some(now_ms);
        }

        // 재추첨 사이에는 입력을 유지하고 그 방향으로만 흘러간다
        let speed = if input.sprint {
            self.settings.move_speed * 2.0
        } else {
            self.settings.move_speed
        };
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;
        pose.position.z += speed * axis(input.forward, input.backward);
        pose.position.x += speed * axis(input.right, input.left);
    }

    fn step_circle(&mut self, state: &mut PatternState, pose: &mut Pose, input: &mut InputSample) {
        state.angle += CIRCLE_ANGLE_STEP;
        let angle = state.angle;
        let radius = self.settings.circle_radius;

        pose.position.x = radius * angle.cos();
        pose.position.z = radius * angle.sin();
        pose.rotation.y = angle + FRAC_PI_2;

        // 반 바퀴 단위의 거친 조향 신호
        let first_half = angle.rem_euclid(TAU) < PI;
        input.forward = true;
        input.backward = false;
        input.left = first_half;
        input.right = !first_half;
        input.sequence += 1;
    }

    fn step_grid(&mut self, state: &mut PatternState, pose: &mut Pose, input: &mut InputSample) {
        let (mut target_x, mut target_z) = self.grid_target(state.grid_cursor);

        if (pose.position.x - target_x).abs() < GRID_TOLERANCE
            && (pose.position.z - target_z).abs() < GRID_TOLERANCE
        {
            state.grid_cursor = self.next_cell(state.grid_cursor);
            (target_x, target_z) = self.grid_target(state.grid_cursor);
        }

        let dx = target_x - pose.position.x;
        let dz = target_z - pose.position.z;
        pose.rotation.y = dx.atan2(dz);

        let distance = (dx * dx + dz * dz).sqrt();
        if distance <= self.settings.move_speed {
            pose.position.x = target_x;
            pose.position.z = target_z;
        } else if distance > 0.0 {
            pose.position.x += dx / distance * self.settings.move_speed;
            pose.position.z += dz / distance * self.settings.move_speed;
        }

        input.forward = true;
        input.backward = false;
        input.left = false;
        input.right = false;
        input.sequence += 1;
    }

    /// 원점 중심 N×N 격자에서 (column, row) 셀의 목표 좌표
    pub fn grid_target(&self, (column, row): (u32, u32)) -> (f32, f32) {
        let half = self.settings.grid_size as f32 / 2.0;
        let cell = self.settings.grid_cell_size;
        ((column as f32 - half) * cell, (row as f32 - half) * cell)
    }

    fn next_cell(&self, (column, row): (u32, u32)) -> (u32, u32) {
        let n = self.settings.grid_size.max(1);
        if column + 1 < n {
            (column + 1, row)
        } else if row + 1 < n {
            (0, row + 1)
        } else {
            (0, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::rng_for;

    fn simulator() -> MovementSimulator {
        MovementSimulator::new(MovementSettings::default(), rng_for(42, "movement-test"))
    }

    #[test]
    fn test_grid_first_target_is_bottom_left_corner() {
        let sim = simulator();
        assert_eq!(sim.grid_target((0, 0)), (-10.0, -10.0));
        assert_eq!(sim.grid_target((9, 9)), (8.0, 8.0));
    }

    #[test]
    fn test_grid_cursor_advances_once_position_converges() {
        let mut sim = simulator();
        let mut state = PatternState::default();
        let mut pose = Pose::default();
        let mut input = InputSample::default();

        pose.position = Vec3::new(-10.05, 0.0, -9.95);
        sim.step(MovementPattern::Grid, &mut state, &mut pose, &mut input, 0);

        assert_eq!(state.grid_cursor, (1, 0));
        assert!(input.forward);
        assert!(!input.backward && !input.left && !input.right);
    }

    #[test]
    fn test_grid_walks_from_origin_to_first_cell() {
        let mut sim = simulator();
        let mut state = PatternState::default();
        let mut pose = Pose::default();
        let mut input = InputSample::default();

        for tick in 0..1_000 {
            sim.step(MovementPattern::Grid, &mut state, &mut pose, &mut input, tick);
            if state.grid_cursor != (0, 0) {
                break;
            }
        }

        assert_eq!(state.grid_cursor, (1, 0));
        assert!((pose.position.x + 10.0).abs() < 0.2);
        assert!((pose.position.z + 10.0).abs() < 0.2);
    }

    #[test]
    fn test_grid_faces_next_cell() {
        let mut sim = simulator();
        let mut state = PatternState::default();
        let mut pose = Pose::default();
        let mut input = InputSample::default();

        // 목표 (-10, -10) 은 원점 기준 남서쪽
        sim.step(MovementPattern::Grid, &mut state, &mut pose, &mut input, 0);
        let expected = (-10.0f32).atan2(-10.0);
        assert!((pose.rotation.y - expected).abs() < 1e-5);
    }

    #[test]
    fn test_grid_cursor_wraps_at_last_cell() {
        let mut sim = simulator();
        let mut state = PatternState {
            grid_cursor: (9, 9),
            ..Default::default()
        };
        let mut pose = Pose::default();
        pose.position = Vec3::new(8.0, 0.0, 8.0);
        let mut input = InputSample::default();

        sim.step(MovementPattern::Grid, &mut state, &mut pose, &mut input, 0);
        assert_eq!(state.grid_cursor, (0, 0));

        state.grid_cursor = (9, 3);
        pose.position = Vec3::new(8.0, 0.0, -4.0);
        sim.step(MovementPattern::Grid, &mut state, &mut pose, &mut input, 0);
        assert_eq!(state.grid_cursor, (0, 4));
    }

    #[test]
    fn test_circle_yaw_tracks_angle() {
        let mut sim = simulator();
        let mut state = PatternState::default();
        let mut pose = Pose::default();
        let mut input = InputSample::default();

        let k = 25;
        for _ in 0..k {
            sim.step(MovementPattern::Circle, &mut state, &mut pose, &mut input, 0);
        }

        let expected = 0.02 * k as f32 + FRAC_PI_2;
        assert!((pose.rotation.y - expected).abs() < 1e-4);
        assert_eq!(input.sequence, k as u64);
        assert!(input.forward && !input.backward);
        // 첫 반 바퀴
        assert!(input.left && !input.right);
        assert!((pose.position.x - 10.0 * state.angle.cos()).abs() < 1e-4);
    }

    #[test]
    fn test_circle_steers_right_in_second_half_turn() {
        let mut sim = simulator();
        let mut state = PatternState {
            angle: PI + 0.5,
            ..Default::default()
        };
        let mut pose = Pose::default();
        let mut input = InputSample::default();

        sim.step(MovementPattern::Circle, &mut state, &mut pose, &mut input, 0);
        assert!(input.right && !input.left);
    }

    #[test]
    fn test_random_holds_sample_between_rerolls() {
        let mut sim = simulator();
        let mut state = PatternState::default();
        let mut pose = Pose::default();
        let mut input = InputSample::default();

        sim.step(MovementPattern::Random, &mut state, &mut pose, &mut input, 10_000);
        assert_eq!(input.sequence, 1);
        let rolled = input.clone();

        sim.step(MovementPattern::Random, &mut state, &mut pose, &mut input, 11_999);
        assert_eq!(input, rolled);

        sim.step(MovementPattern::Random, &mut state, &mut pose, &mut input, 12_000);
        assert_eq!(input.sequence, 2);
        assert_eq!(state.last_randomized_ms, Some(12_000));
    }

    #[test]
    fn test_random_is_reproducible_with_same_seed() {
        let run = || {
            let mut sim = simulator();
            let mut state = PatternState::default();
            let mut pose = Pose::default();
            let mut input = InputSample::default();
            for t in 0..10 {
                sim.step(MovementPattern::Random, &mut state, &mut pose, &mut input, t * 2_000);
            }
            (input, pose)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_pattern_parsing() {
        assert_eq!("grid".parse::<MovementPattern>(), Ok(MovementPattern::Grid));
        assert_eq!(" Circle ".parse::<MovementPattern>(), Ok(MovementPattern::Circle));
        assert_eq!(
            "zigzag".parse::<MovementPattern>(),
            Err(ConfigurationError::UnknownPattern("zigzag".to_string()))
        );
    }
}
