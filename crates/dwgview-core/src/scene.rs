//! In-memory scene graph produced by the loader

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::bounds::Extent;

/// Local TRS transform of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Apply a world-space uniform scale and offset on top of this transform:
    /// the result maps `p` to `factor * (self(p) + offset)`.
    pub fn recentered(&self, offset: Vec3, factor: f32) -> Transform {
        Transform {
            translation: (self.translation + offset) * factor,
            rotation: self.rotation,
            scale: self.scale * factor,
        }
    }
}

/// Renderable geometry attached to a node, reduced to what framing needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Bounds in the node's local space
    pub bounds: Extent,
    pub vertex_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: Option<String>,
    /// Linear RGBA
    pub base_color: [f32; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Transform,
    pub geometry: Option<Geometry>,
    pub material: Option<Material>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Leaf node carrying an axis-aligned box of geometry
    pub fn with_box(name: impl Into<String>, center: Vec3, size: Vec3) -> Self {
        Self {
            name: Some(name.into()),
            geometry: Some(Geometry {
                bounds: Extent::from_center_size(center, size),
                vertex_count: 8,
            }),
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first walk with each node's world matrix
    pub fn visit(&self, parent: &Mat4, f: &mut impl FnMut(&Node, &Mat4)) {
        let world = *parent * self.transform.matrix();
        f(self, &world);
        for child in &self.children {
            child.visit(&world, f);
        }
    }
}

/// Ownership root of one loaded model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Where the scene was loaded from, for logging
    pub source: Option<String>,
    pub root: Node,
}

impl Scene {
    pub fn new(root: Node) -> Self {
        Self { source: None, root }
    }

    /// Union of the world bounds of every geometry-bearing node.
    /// Nodes without geometry do not contribute.
    pub fn world_extent(&self) -> Extent {
        let mut extent = Extent::EMPTY;
        self.root.visit(&Mat4::IDENTITY, &mut |node, world| {
            if let Some(geometry) = &node.geometry {
                extent = extent.union(&geometry.bounds.transformed(world));
            }
        });
        extent
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&Mat4::IDENTITY, &mut |node, _| {
            if node.geometry.is_some() {
                count += 1;
            }
        });
        count
    }

    /// Distinct materials in depth-first order
    pub fn materials(&self) -> Vec<Material> {
        let mut materials: Vec<Material> = Vec::new();
        self.root.visit(&Mat4::IDENTITY, &mut |node, _| {
            if let Some(material) = &node.material {
                if !materials.contains(material) {
                    materials.push(material.clone());
                }
            }
        });
        materials
    }

    pub fn vertex_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&Mat4::IDENTITY, &mut |node, _| {
            if let Some(geometry) = &node.geometry {
                count += geometry.vertex_count;
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_extent_applies_parent_transforms() {
        let mut parent = Node::named("group");
        parent.transform = Transform::from_translation(Vec3::new(10.0, 0.0, 0.0));
        parent.transform.scale = Vec3::splat(2.0);
        let scene = Scene::new(parent.with_child(Node::with_box("box", Vec3::ZERO, Vec3::ONE)));

        let extent = scene.world_extent();
        assert_eq!(extent.min, Vec3::new(9.0, -1.0, -1.0));
        assert_eq!(extent.max, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn test_nodes_without_geometry_are_ignored() {
        let mut empty = Node::named("marker");
        empty.transform = Transform::from_translation(Vec3::splat(1000.0));
        let scene = Scene::new(
            Node::named("root")
                .with_child(empty)
                .with_child(Node::with_box("a", Vec3::ZERO, Vec3::splat(2.0))),
        );

        assert_eq!(scene.world_extent().max, Vec3::ONE);
        assert_eq!(scene.mesh_count(), 1);
        assert_eq!(scene.vertex_count(), 8);
    }

    #[test]
    fn test_materials_are_deduplicated() {
        let red = Material {
            name: Some("walls".into()),
            base_color: [1.0, 0.0, 0.0, 1.0],
        };
        let mut a = Node::with_box("a", Vec3::ZERO, Vec3::ONE);
        a.material = Some(red.clone());
        let mut b = Node::with_box("b", Vec3::X, Vec3::ONE);
        b.material = Some(red.clone());
        let mut c = Node::with_box("c", Vec3::Y, Vec3::ONE);
        c.material = Some(Material::default());
        let scene = Scene::new(Node::named("root").with_child(a).with_child(b).with_child(c));

        assert_eq!(scene.materials(), vec![red, Material::default()]);
    }

    #[test]
    fn test_recentered_transform() {
        let t = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let r = t.recentered(Vec3::new(-1.0, -2.0, -3.0), 2.0);
        assert_eq!(r.matrix().transform_point3(Vec3::X), Vec3::new(2.0, 0.0, 0.0));
    }
}
