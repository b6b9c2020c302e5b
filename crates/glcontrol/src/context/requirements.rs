//! Context capability requirements

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Desired capabilities of a GPU rendering context
///
/// Owned by a control and handed to the platform driver at context
/// creation. Mutating a requirement after the context is initialized has
/// no effect on the live context; capabilities the control itself depends
/// on (double buffering) are snapshotted at initialization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRequirements {
    /// Request a back buffer and buffer swapping
    pub double_buffer: bool,

    /// Color buffer depth in bits; 0 picks the platform default
    pub color_bits: u32,

    /// Alpha channel bits
    pub alpha_bits: u32,

    /// Depth buffer bits
    pub depth_bits: u32,

    /// Stencil buffer bits
    pub stencil_bits: u32,

    /// Auxiliary buffer count
    pub aux_buffers: u32,

    /// Multisampling sample count; 1 disables multisampling
    pub multisampling: u32,

    /// Request a stereo (quad-buffered) context
    pub stereo: bool,
}

impl Default for ContextRequirements {
    fn default() -> Self {
        Self {
            double_buffer: true,
            color_bits: 0,
            alpha_bits: 0,
            depth_bits: 24,
            stencil_bits: 0,
            aux_buffers: 0,
            multisampling: 1,
            stereo: false,
        }
    }
}

impl Config for ContextRequirements {}
