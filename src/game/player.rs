use glam::Vec3;

use crate::world::sector::{sector_centroid, SectorId};
use crate::world::store::SectorStore;

/// Held movement and look intents for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    pub fly_up: bool,
    pub fly_down: bool,
    pub look_up: bool,
    pub look_down: bool,
}

impl ActionState {
    #[cfg(test)]
    pub fn any(&self) -> bool {
        *self != Self::default()
    }

    /// Union of two snapshots, e.g. keyboard and gamepad.
    pub fn merge(self, other: Self) -> Self {
        Self {
            up: self.up || other.up,
            down: self.down || other.down,
            left: self.left || other.left,
            right: self.right || other.right,
            turn_left: self.turn_left || other.turn_left,
            turn_right: self.turn_right || other.turn_right,
            fly_up: self.fly_up || other.fly_up,
            fly_down: self.fly_down || other.fly_down,
            look_up: self.look_up || other.look_up,
            look_down: self.look_down || other.look_down,
        }
    }
}

/// Reciprocal speeds: milliseconds per world unit and per degree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Movement {
    pub player_speed: f64,
    pub player_turn_speed: f64,
}

impl Default for Movement {
    fn default() -> Self {
        Self {
            player_speed: 10.0,
            player_turn_speed: 0.25,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    /// Flight offset above the eye height.
    pub z: f64,
    /// Yaw in degrees, kept in [0, 360).
    pub facing: f64,
    /// Pitch in degrees.
    pub tilt: f64,
    pub height: f64,
    /// Traversal root. Not checked against the polygon the player is in.
    pub current_sector: SectorId,
    pub last_tick: u32,
}

impl PlayerState {
    /// Place the player at the centroid of `sector`, or the origin if the
    /// sector is missing.
    pub fn spawn(store: &SectorStore, sector: SectorId, facing: f64, height: f64, now: u32) -> Self {
        let center = match store.get(sector).and_then(sector_centroid) {
            Some(c) => c,
            None => {
                log::warn!("start sector {sector} missing or empty, spawning at origin");
                glam::Vec2::ZERO
            }
        };
        Self {
            x: center.x as f64,
            y: center.y as f64,
            z: 0.0,
            facing: wrap_degrees(facing),
            tilt: 0.0,
            height,
            current_sector: sector,
            last_tick: now,
        }
    }

    /// Camera position: the world plane maps to x/z, height to y.
    pub fn eye(&self) -> Vec3 {
        Vec3::new(self.x as f32, (self.height + self.z) as f32, self.y as f32)
    }

    /// Unit view direction from facing and tilt.
    pub fn look_dir(&self) -> Vec3 {
        let yaw = self.facing.to_radians();
        let pitch = self.tilt.to_radians();
        Vec3::new(
            (yaw.sin() * pitch.cos()) as f32,
            pitch.sin() as f32,
            (yaw.cos() * pitch.cos()) as f32,
        )
    }
}

/// Milliseconds between two wrapping tick readings. A reading that went
/// backwards counts as zero.
pub fn elapsed_ms(last: u32, now: u32) -> f64 {
    (now.wrapping_sub(last) as i32).max(0) as f64
}

/// Fold degrees into [0, 360).
pub fn wrap_degrees(deg: f64) -> f64 {
    let d = deg % 360.0;
    if d >= 0.0 {
        return d;
    }
    // tiny negatives round up to exactly 360
    let w = d + 360.0;
    if w >= 360.0 {
        0.0
    } else {
        w
    }
}

/// Advance the player by the time since its last tick.
///
/// Intents compose additively, so forward plus strafe moves faster than
/// either alone. There is no collision against sector walls.
pub fn integrate(state: PlayerState, act: &ActionState, now: u32, movement: &Movement) -> PlayerState {
    let elapsed = elapsed_ms(state.last_tick, now);
    let theta = state.facing.to_radians();
    let r = elapsed / movement.player_speed;
    let turn = elapsed / movement.player_turn_speed;

    // forward is (sin, cos); left is a quarter turn anticlockwise of it
    let (fx, fy) = (r * theta.sin(), r * theta.cos());
    let (lx, ly) = (r * theta.cos(), -r * theta.sin());

    let mut next = state;
    if act.up {
        next.x += fx;
        next.y += fy;
    }
    if act.down {
        next.x -= fx;
        next.y -= fy;
    }
    if act.left {
        next.x += lx;
        next.y += ly;
    }
    if act.right {
        next.x -= lx;
        next.y -= ly;
    }
    if act.turn_left {
        next.facing += turn;
    }
    if act.turn_right {
        next.facing -= turn;
    }
    if act.fly_up {
        next.z += r;
    }
    if act.fly_down {
        next.z -= r;
    }
    if act.look_up {
        next.tilt += turn;
    }
    if act.look_down {
        next.tilt -= turn;
    }

    next.facing = wrap_degrees(next.facing);
    next.last_tick = now;
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(facing: f64) -> PlayerState {
        PlayerState {
            x: 1.0,
            y: 2.0,
            z: 0.0,
            facing,
            tilt: 0.0,
            height: 1.0,
            current_sector: 0,
            last_tick: 1000,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn idle_only_advances_clock() {
        let start = player(180.0);
        let next = integrate(start, &ActionState::default(), 1500, &Movement::default());
        assert_eq!(next, PlayerState { last_tick: 1500, ..start });
    }

    #[test]
    fn turning_wraps_past_360() {
        let act = ActionState { turn_left: true, ..Default::default() };
        let mv = Movement::default();
        // 0.25 ms per degree is 4 degrees per 1 ms step
        let mut s = player(350.0);
        for t in 1..=5 {
            s = integrate(s, &act, 1000 + t, &mv);
        }
        assert!(close(s.facing, 10.0), "facing {}", s.facing);
    }

    #[test]
    fn turning_right_below_zero_wraps() {
        let act = ActionState { turn_right: true, ..Default::default() };
        let s = integrate(player(2.0), &act, 1001, &Movement::default());
        assert!(close(s.facing, 358.0));
    }

    #[test]
    fn forward_follows_facing() {
        let act = ActionState { up: true, ..Default::default() };
        let mv = Movement::default();
        let s = integrate(player(0.0), &act, 1100, &mv);
        assert!(close(s.x, 1.0) && close(s.y, 12.0));

        let s = integrate(player(90.0), &act, 1100, &mv);
        assert!(close(s.x, 11.0) && close(s.y, 2.0));

        let back = ActionState { down: true, ..Default::default() };
        let s = integrate(player(90.0), &back, 1100, &mv);
        assert!(close(s.x, -9.0) && close(s.y, 2.0));
    }

    #[test]
    fn strafe_is_perpendicular() {
        let mv = Movement::default();
        let left = ActionState { left: true, ..Default::default() };
        let right = ActionState { right: true, ..Default::default() };
        let l = integrate(player(0.0), &left, 1010, &mv);
        let r = integrate(player(0.0), &right, 1010, &mv);
        assert!(close(l.x, 2.0) && close(l.y, 2.0));
        assert!(close(r.x, 0.0) && close(r.y, 2.0));
    }

    #[test]
    fn diagonal_is_not_normalized() {
        let act = ActionState { up: true, left: true, ..Default::default() };
        let s = integrate(player(0.0), &act, 1010, &Movement::default());
        let dist = ((s.x - 1.0).powi(2) + (s.y - 2.0).powi(2)).sqrt();
        assert!(close(dist, 2.0_f64.sqrt()));
    }

    #[test]
    fn fly_and_look() {
        let act = ActionState { fly_up: true, look_down: true, ..Default::default() };
        let s = integrate(player(0.0), &act, 1020, &Movement::default());
        assert!(close(s.z, 2.0));
        assert!(close(s.tilt, -80.0));
    }

    #[test]
    fn clock_going_backwards_is_ignored() {
        let act = ActionState { up: true, turn_left: true, ..Default::default() };
        let start = player(45.0);
        let s = integrate(start, &act, 900, &Movement::default());
        assert_eq!(s.x, start.x);
        assert_eq!(s.facing, start.facing);
        assert_eq!(s.last_tick, 900);
    }

    #[test]
    fn tick_wraparound_is_small_step() {
        assert_eq!(elapsed_ms(u32::MAX - 4, 5), 10.0);
        assert_eq!(elapsed_ms(10, 5), 0.0);
    }

    #[test]
    fn wrap_degrees_range() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(0.0), 0.0);
    }

    #[test]
    fn wrap_degrees_tiny_negative_stays_below_360() {
        for d in [-1e-14, -1e-300, -f64::MIN_POSITIVE, -360.0 - 1e-13] {
            let w = wrap_degrees(d);
            assert!((0.0..360.0).contains(&w), "{d} -> {w}");
        }
    }

    #[test]
    fn fractional_turn_speed_keeps_facing_in_range() {
        let mv = Movement { player_speed: 10.0, player_turn_speed: 0.3 };
        let act = ActionState { turn_right: true, ..Default::default() };
        let mut s = player(0.0);
        for t in 1..=2000 {
            s = integrate(s, &act, 1000 + t, &mv);
            assert!((0.0..360.0).contains(&s.facing), "step {t}: {}", s.facing);
        }
    }

    #[test]
    fn spawn_at_centroid() {
        let store = SectorStore::demo();
        let p = PlayerState::spawn(&store, 1, 180.0, 1.0, 0);
        // (8+10+1+5)/4, (6+1+2+7)/4
        assert!(close(p.x, 6.0) && close(p.y, 4.0));
        assert_eq!(p.current_sector, 1);
        assert_eq!(p.eye(), Vec3::new(6.0, 1.0, 4.0));

        let lost = PlayerState::spawn(&store, 77, 0.0, 1.0, 0);
        assert_eq!((lost.x, lost.y), (0.0, 0.0));
    }

    #[test]
    fn look_dir_matches_forward() {
        let p = player(90.0);
        assert!((p.look_dir() - Vec3::X).length() < 1e-6);
        let up = PlayerState { tilt: 90.0, ..player(0.0) };
        assert!((up.look_dir() - Vec3::Y).length() < 1e-6);
    }
}
