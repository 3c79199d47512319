//! Built-in components.

use std::fmt;

use arms_component::{Component, Entity};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Move along the transform's own axes. Scale does not affect the
    /// distance travelled.
    pub fn translate_local(&mut self, offset: Vec3) {
        self.position += self.rotation * offset;
    }

    /// Move along the world axes.
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// The local forward axis (`-Z`) in world space.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }
}

/// Constant-velocity movement in the owner's local space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ContinuousMovement {
    pub direction: Vec3,
    /// Units per second.
    pub speed: f32,
}

impl ContinuousMovement {
    #[must_use]
    pub fn new(direction: Vec3, speed: f32) -> Self {
        Self { direction, speed }
    }

    /// Local-space displacement over `delta_seconds`.
    #[must_use]
    pub fn displacement(&self, delta_seconds: f32) -> Vec3 {
        self.direction * self.speed * delta_seconds
    }
}

impl Component for ContinuousMovement {
    fn type_name() -> &'static str {
        "ContinuousMovement"
    }
}

/// Destroys `target` (the owner when unset) once `time_remaining` runs out.
#[derive(Debug, Clone)]
pub struct Expirable {
    pub time_remaining: f32,
    pub target: Option<Entity>,
}

impl Expirable {
    /// Expire the owner after `seconds`.
    #[must_use]
    pub fn after(seconds: f32) -> Self {
        Self {
            time_remaining: seconds,
            target: None,
        }
    }

    /// Expire `target` instead of the owner.
    #[must_use]
    pub fn targeting(mut self, target: Entity) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.time_remaining <= 0.0
    }
}

impl Component for Expirable {
    fn type_name() -> &'static str {
        "Expirable"
    }
}

/// Callback run every tick while a [`DelayedAction`] counts down.
pub type UpdateCallback = Box<dyn FnMut()>;

/// Callback run once when a [`DelayedAction`] completes.
pub type CompleteCallback = Box<dyn FnOnce()>;

/// Runs `on_update` every tick for `delay` seconds, then `on_complete` once,
/// after which the component detaches itself.
pub struct DelayedAction {
    pub delay: f32,
    /// Paused while `false`.
    pub running: bool,
    pub on_update: Option<UpdateCallback>,
    pub on_complete: Option<CompleteCallback>,
}

impl DelayedAction {
    #[must_use]
    pub fn new(delay: f32) -> Self {
        Self {
            delay,
            running: true,
            on_update: None,
            on_complete: None,
        }
    }

    #[must_use]
    pub fn on_update(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_update = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn paused(mut self) -> Self {
        self.running = false;
        self
    }
}

impl fmt::Debug for DelayedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedAction")
            .field("delay", &self.delay)
            .field("running", &self.running)
            .field("has_on_update", &self.on_update.is_some())
            .field("has_on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl Component for DelayedAction {
    fn type_name() -> &'static str {
        "DelayedAction"
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn assert_close(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a} != {b}");
    }

    #[test]
    fn test_translate_local_follows_rotation() {
        let mut transform = Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2));
        transform.translate_local(Vec3::X);
        assert_close(transform.position, Vec3::NEG_Z);
    }

    #[test]
    fn test_translate_local_ignores_scale() {
        let mut transform = Transform {
            scale: Vec3::splat(3.0),
            ..Transform::IDENTITY
        };
        transform.translate_local(Vec3::new(1.0, 2.0, 0.0));
        assert_close(transform.position, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_displacement() {
        let movement = ContinuousMovement::new(Vec3::Y, 4.0);
        assert_close(movement.displacement(0.5), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_transform_serde() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let json = serde_json::to_string(&transform).unwrap();
        let back: Transform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, transform);
    }

    #[test]
    fn test_delayed_action_builder() {
        let action = DelayedAction::new(2.0).on_complete(|| {}).paused();
        assert!(!action.running);
        assert!(action.on_update.is_none());
        assert!(action.on_complete.is_some());
        assert!(format!("{action:?}").contains("has_on_complete: true"));
    }

    #[test]
    fn test_type_names_are_distinct() {
        let ids = [
            Transform::component_type_id(),
            ContinuousMovement::component_type_id(),
            Expirable::component_type_id(),
            DelayedAction::component_type_id(),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
