use glam::{Mat4, Vec3};

use crate::game::player::PlayerState;

pub const NEAR: f32 = 0.125;
pub const FAR: f32 = 1000.0;

/// Vertical field of view for a frustum whose horizontal half-extent at the
/// near plane is `NEAR * sqrt(aspect)` and vertical half-extent is
/// `NEAR / sqrt(aspect)`.
pub fn fov_y(aspect: f32) -> f32 {
    2.0 * (1.0 / aspect.max(f32::EPSILON).sqrt()).atan()
}

pub fn projection(aspect: f32) -> Mat4 {
    let aspect = aspect.max(f32::EPSILON);
    Mat4::perspective_rh(fov_y(aspect), aspect, NEAR, FAR)
}

/// Up vector that stays perpendicular to the view at any tilt.
fn camera_up(player: &PlayerState) -> Vec3 {
    let yaw = player.facing.to_radians();
    let pitch = player.tilt.to_radians();
    Vec3::new(
        (-yaw.sin() * pitch.sin()) as f32,
        pitch.cos() as f32,
        (-yaw.cos() * pitch.sin()) as f32,
    )
}

pub fn view(player: &PlayerState) -> Mat4 {
    Mat4::look_to_rh(player.eye(), player.look_dir(), camera_up(player))
}

pub fn view_proj(player: &PlayerState, aspect: f32) -> Mat4 {
    projection(aspect) * view(player)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(facing: f64, tilt: f64) -> PlayerState {
        PlayerState {
            x: 2.0,
            y: 3.0,
            z: 0.0,
            facing,
            tilt,
            height: 1.0,
            current_sector: 0,
            last_tick: 0,
        }
    }

    fn to_ndc(m: Mat4, p: Vec3) -> Vec3 {
        m.project_point3(p)
    }

    #[test]
    fn looking_ahead_hits_screen_center() {
        for facing in [0.0, 90.0, 180.0, 275.0] {
            let p = player(facing, 0.0);
            let target = p.eye() + p.look_dir() * 10.0;
            let ndc = to_ndc(view_proj(&p, 16.0 / 9.0), target);
            assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "facing {facing}: {ndc:?}");
            assert!(ndc.z > 0.0 && ndc.z < 1.0);
        }
    }

    #[test]
    fn left_strafe_direction_is_screen_left() {
        let p = player(30.0, 0.0);
        let yaw = p.facing.to_radians();
        let left = Vec3::new(yaw.cos() as f32, 0.0, -yaw.sin() as f32);
        let ndc = to_ndc(view_proj(&p, 1.0), p.eye() + p.look_dir() * 5.0 + left);
        assert!(ndc.x < 0.0);
    }

    #[test]
    fn tilting_up_moves_horizon_down() {
        let level = player(0.0, 0.0);
        let ahead = level.eye() + Vec3::new(0.0, 0.0, 10.0);
        let ndc = to_ndc(view_proj(&player(0.0, 20.0), 1.0), ahead);
        assert!(ndc.y < 0.0);
    }

    #[test]
    fn straight_up_is_not_degenerate() {
        let m = view_proj(&player(45.0, 90.0), 1.0);
        assert!(m.is_finite());
    }

    #[test]
    fn frustum_extents_follow_sqrt_aspect() {
        let aspect = 4.0_f32;
        let proj = projection(aspect);
        // half extents at the near plane: 0.125 * 2 wide, 0.125 / 2 tall
        let corner = proj.project_point3(Vec3::new(NEAR * 2.0, NEAR * 0.5, -NEAR));
        assert!((corner.x - 1.0).abs() < 1e-4);
        assert!((corner.y - 1.0).abs() < 1e-4);
        assert!(corner.z.abs() < 1e-4);
    }
}
