//! World-space positions. The vertical axis is `y`; ground distance ignores it.

pub use glam::Vec3;

/// Straight-line distance on the horizontal (XZ) plane.
pub fn ground_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 100.0, 4.0);
        assert!((ground_distance(a, b) - 5.0).abs() < 1e-5);
    }
}
