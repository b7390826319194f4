//! Shader compilation for monocube.
//!
//! This crate contains the GLSL shaders for the cube pass and their
//! compiled SPIR-V bytecode. Shaders are compiled at build time using
//! shaderc.

use std::sync::OnceLock;

/// Embedded SPIR-V shader bytecode (raw bytes, may not be aligned).
mod spirv_bytes {
    /// Cube vertex shader (compiled SPIR-V).
    pub static CUBE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/cube_vert.spv"));
    /// Cube fragment shader (compiled SPIR-V).
    pub static CUBE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/cube_frag.spv"));
}

/// Convert byte slice to aligned u32 Vec (SPIR-V requires 4-byte alignment).
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    assert!(
        bytes.len() % 4 == 0,
        "SPIR-V bytecode must be 4-byte aligned"
    );
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

static CUBE_VERT_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static CUBE_FRAG_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();

/// Get the cube vertex shader as a u32 slice for Vulkan.
pub fn cube_vertex_shader() -> &'static [u32] {
    CUBE_VERT_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::CUBE_VERT))
}

/// Get the cube fragment shader as a u32 slice for Vulkan.
pub fn cube_fragment_shader() -> &'static [u32] {
    CUBE_FRAG_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::CUBE_FRAG))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_shader_loads() {
        let shader = cube_vertex_shader();
        assert_eq!(shader[0], 0x0723_0203, "Invalid SPIR-V magic number");
        assert!(shader.len() > 20, "Shader too small");
    }

    #[test]
    fn fragment_shader_loads() {
        let shader = cube_fragment_shader();
        assert_eq!(shader[0], 0x0723_0203, "Invalid SPIR-V magic number");
        assert!(shader.len() > 20, "Shader too small");
    }
}
