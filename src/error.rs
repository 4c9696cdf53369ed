//! Error types for plume.
//!
//! Only construction can fail: acquiring an adapter, compiling a kernel,
//! loading a sprite texture, opening the demo window. Per-frame operations
//! never return errors; they degrade (drop spawns, sample zero flow, keep the
//! previous snapshot) and log.

use std::fmt;

/// Device acquisition and resource setup failures.
///
/// Any of these makes [`SmokeSystem::gpu`](crate::SmokeSystem::gpu) fall back
/// to host simulation.
#[derive(Debug)]
pub enum GpuError {
    /// The window surface could not be created.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No adapter matched the requested backends and surface.
    NoAdapter,
    /// The adapter refused the device request.
    DeviceCreation(wgpu::RequestDeviceError),
    /// A read-back buffer could not be mapped.
    BufferMapping(String),
    /// The particle pool does not fit the device limits.
    CapacityExceeded {
        requested: u32,
        limit: u32,
    },
    /// A WGSL kernel or shader failed validation.
    ShaderCompilation {
        /// Pipeline label the failure belongs to.
        label: String,
        /// Validation message reported by the device.
        message: String,
    },
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "surface creation failed: {}", e),
            GpuError::NoAdapter => write!(f, "no suitable GPU adapter"),
            GpuError::DeviceCreation(e) => write!(f, "device request failed: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "read-back mapping failed: {}", msg),
            GpuError::CapacityExceeded { requested, limit } => {
                write!(f, "particle pool of {} exceeds the device limit of {}", requested, limit)
            }
            GpuError::ShaderCompilation { label, message } => {
                write!(f, "kernel '{}' failed validation: {}", label, message)
            }
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Sprite image loading failures.
#[derive(Debug)]
pub enum TextureError {
    /// The file was read but is not a decodable image.
    ImageLoad(image::ImageError),
    /// The file could not be read.
    Io(std::io::Error),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::ImageLoad(e) => write!(f, "sprite image decode failed: {}", e),
            TextureError::Io(e) => write!(f, "sprite file unreadable: {}", e),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::ImageLoad(e) => Some(e),
            TextureError::Io(e) => Some(e),
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        TextureError::ImageLoad(e)
    }
}

impl From<std::io::Error> for TextureError {
    fn from(e: std::io::Error) -> Self {
        TextureError::Io(e)
    }
}

/// Startup failures of the demo viewer.
#[derive(Debug)]
pub enum DemoError {
    EventLoop(winit::error::EventLoopError),
    Window(winit::error::OsError),
    Gpu(GpuError),
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoError::EventLoop(e) => write!(f, "event loop: {}", e),
            DemoError::Window(e) => write!(f, "window: {}", e),
            DemoError::Gpu(e) => write!(f, "gpu: {}", e),
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DemoError::EventLoop(e) => Some(e),
            DemoError::Window(e) => Some(e),
            DemoError::Gpu(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for DemoError {
    fn from(e: winit::error::EventLoopError) -> Self {
        DemoError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for DemoError {
    fn from(e: winit::error::OsError) -> Self {
        DemoError::Window(e)
    }
}

impl From<GpuError> for DemoError {
    fn from(e: GpuError) -> Self {
        DemoError::Gpu(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_compilation_display() {
        let err = GpuError::ShaderCompilation {
            label: "physics".into(),
            message: "unknown identifier".into(),
        };
        assert_eq!(
            err.to_string(),
            "kernel 'physics' failed validation: unknown identifier"
        );
    }

    #[test]
    fn test_demo_error_wraps_gpu_error() {
        let err: DemoError = GpuError::NoAdapter.into();
        assert_eq!(err.to_string(), "gpu: no suitable GPU adapter");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_capacity_exceeded_display() {
        let err = GpuError::CapacityExceeded {
            requested: 5_000_000,
            limit: 2_796_202,
        };
        assert_eq!(
            err.to_string(),
            "particle pool of 5000000 exceeds the device limit of 2796202"
        );
    }
}
