//! Hard-coded colored cube geometry.

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// A cube vertex: position and face color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    const fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    /// Vertex buffer binding description.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Vertex attribute descriptions: position at location 0, color at
    /// location 1.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(0),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::size_of::<[f32; 3]>() as u32),
        ]
    }
}

const RED: [f32; 3] = [0.9, 0.1, 0.1];
const GREEN: [f32; 3] = [0.1, 0.8, 0.2];
const BLUE: [f32; 3] = [0.15, 0.3, 0.9];
const YELLOW: [f32; 3] = [0.9, 0.85, 0.1];
const CYAN: [f32; 3] = [0.1, 0.8, 0.8];
const MAGENTA: [f32; 3] = [0.8, 0.15, 0.8];

/// Unit cube centered at the origin, one color per face, two triangles
/// per face, counter-clockwise winding viewed from outside.
pub const CUBE_VERTICES: [Vertex; 36] = [
    // +Z face
    Vertex::new([-0.5, -0.5, 0.5], RED),
    Vertex::new([0.5, -0.5, 0.5], RED),
    Vertex::new([0.5, 0.5, 0.5], RED),
    Vertex::new([-0.5, -0.5, 0.5], RED),
    Vertex::new([0.5, 0.5, 0.5], RED),
    Vertex::new([-0.5, 0.5, 0.5], RED),
    // -Z face
    Vertex::new([0.5, -0.5, -0.5], GREEN),
    Vertex::new([-0.5, -0.5, -0.5], GREEN),
    Vertex::new([-0.5, 0.5, -0.5], GREEN),
    Vertex::new([0.5, -0.5, -0.5], GREEN),
    Vertex::new([-0.5, 0.5, -0.5], GREEN),
    Vertex::new([0.5, 0.5, -0.5], GREEN),
    // +X face
    Vertex::new([0.5, -0.5, 0.5], BLUE),
    Vertex::new([0.5, -0.5, -0.5], BLUE),
    Vertex::new([0.5, 0.5, -0.5], BLUE),
    Vertex::new([0.5, -0.5, 0.5], BLUE),
    Vertex::new([0.5, 0.5, -0.5], BLUE),
    Vertex::new([0.5, 0.5, 0.5], BLUE),
    // -X face
    Vertex::new([-0.5, -0.5, -0.5], YELLOW),
    Vertex::new([-0.5, -0.5, 0.5], YELLOW),
    Vertex::new([-0.5, 0.5, 0.5], YELLOW),
    Vertex::new([-0.5, -0.5, -0.5], YELLOW),
    Vertex::new([-0.5, 0.5, 0.5], YELLOW),
    Vertex::new([-0.5, 0.5, -0.5], YELLOW),
    // +Y face
    Vertex::new([-0.5, 0.5, 0.5], CYAN),
    Vertex::new([0.5, 0.5, 0.5], CYAN),
    Vertex::new([0.5, 0.5, -0.5], CYAN),
    Vertex::new([-0.5, 0.5, 0.5], CYAN),
    Vertex::new([0.5, 0.5, -0.5], CYAN),
    Vertex::new([-0.5, 0.5, -0.5], CYAN),
    // -Y face
    Vertex::new([-0.5, -0.5, -0.5], MAGENTA),
    Vertex::new([0.5, -0.5, -0.5], MAGENTA),
    Vertex::new([0.5, -0.5, 0.5], MAGENTA),
    Vertex::new([-0.5, -0.5, -0.5], MAGENTA),
    Vertex::new([0.5, -0.5, 0.5], MAGENTA),
    Vertex::new([-0.5, -0.5, 0.5], MAGENTA),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn cube_is_twelve_triangles() {
        assert_eq!(CUBE_VERTICES.len(), 36);
        assert_eq!(CUBE_VERTICES.len() % 3, 0);
    }

    #[test]
    fn each_face_has_one_color() {
        let mut by_color: HashMap<[u32; 3], usize> = HashMap::new();
        for v in &CUBE_VERTICES {
            *by_color.entry(v.color.map(f32::to_bits)).or_default() += 1;
        }
        assert_eq!(by_color.len(), 6);
        assert!(by_color.values().all(|&count| count == 6));
    }

    #[test]
    fn vertices_lie_on_the_unit_cube() {
        for v in &CUBE_VERTICES {
            for coord in v.position {
                assert!(coord == 0.5 || coord == -0.5);
            }
        }
    }

    #[test]
    fn vertex_layout_matches_attributes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(Vertex::binding_description().stride, 24);

        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
    }
}
