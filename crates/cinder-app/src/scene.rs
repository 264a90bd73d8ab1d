// SPDX-License-Identifier: CEPL-1.0
use std::f32::consts::PI;

use cinder_render::{DrawObject, MeshId, SceneProvider, SceneSnapshot, Transform2d};
use cinder_render_vk::Vertex;
use glam::{Vec2, Vec3};

pub const COPIES: usize = 4;

pub fn triangle() -> [Vertex; 3] {
    [
        Vertex {
            position: [0.0, -0.5],
            color: [1.0, 0.0, 0.0],
        },
        Vertex {
            position: [0.5, 0.5],
            color: [0.0, 1.0, 0.0],
        },
        Vertex {
            position: [-0.5, 0.5],
            color: [0.0, 0.0, 1.0],
        },
    ]
}

/// Four copies of one mesh, stacked vertically and swaying with the tick.
pub struct DemoScene {
    pub mesh: MeshId,
}

fn sway(tick: u64, j: usize) -> f32 {
    ((tick as f32 * 0.001 + j as f32 * 0.2).sin() / PI).clamp(-1.0, 1.0)
}

impl SceneProvider for DemoScene {
    fn snapshot(&mut self, tick: u64) -> SceneSnapshot {
        let objects = (0..COPIES)
            .map(|j| {
                let v = sway(tick, j);
                DrawObject {
                    mesh: self.mesh,
                    transform: Transform2d {
                        translation: Vec2::new(v, -0.4 + j as f32 * 0.25),
                        ..Transform2d::default()
                    },
                    color: Vec3::new(0.0, v, 0.2 + j as f32 * 0.2),
                }
            })
            .collect();
        SceneSnapshot { tick, objects }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_objects_in_row_order() {
        let mut scene = DemoScene { mesh: MeshId(0) };
        let snap = scene.snapshot(0);
        assert_eq!(snap.tick, 0);
        assert_eq!(snap.objects.len(), COPIES);
        for (j, obj) in snap.objects.iter().enumerate() {
            let y = -0.4 + j as f32 * 0.25;
            assert!((obj.transform.translation.y - y).abs() < 1e-6);
            assert!((obj.color.z - (0.2 + j as f32 * 0.2)).abs() < 1e-6);
        }
    }

    #[test]
    fn sway_stays_in_unit_range() {
        for tick in [0, 1_000, 1_570, 4_712, 1_000_000] {
            for j in 0..COPIES {
                let v = sway(tick, j);
                assert!((-1.0..=1.0).contains(&v));
                assert!(v.abs() <= 1.0 / PI + 1e-6);
            }
        }
    }

    #[test]
    fn same_tick_same_snapshot() {
        let mut scene = DemoScene { mesh: MeshId(3) };
        assert_eq!(scene.snapshot(42).objects, scene.snapshot(42).objects);
        assert_ne!(scene.snapshot(42).objects, scene.snapshot(1_042).objects);
    }
}
