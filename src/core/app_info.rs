//! Exposes all structs needed to store engine configuration.

use std::time::Duration;

use ash::vk;

/// Default number of frames in flight. With two frames in flight, we can prepare a frame on the CPU
/// while one frame is rendering on the GPU.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Default timeout used when waiting for a frame fence or a surface image.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings used to initialize an [`ExecutionEngine`](crate::ExecutionEngine).
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Application name. Used in log output.
    pub name: String,
    /// Number of frames that may be in flight at once. Per-frame buffers get one backing slot per frame in flight.
    pub frames_in_flight: usize,
    /// Maximum time to block on a frame fence or on surface image acquisition. Exceeding this is fatal.
    pub timeout: Duration,
    /// Extent of the render surface at startup. Surface-relative resources are sized against this.
    pub surface_extent: vk::Extent2D,
    /// Name of the resource that is blitted onto the surface image at the end of each frame.
    /// If this is `None`, the surface image is only transitioned for presentation.
    pub composite_source: Option<String>,
    /// Wrap each pass in begin and end debug labels. Requires the `debug-markers` feature.
    pub debug_labels: bool,
}

/// The engine builder is a convenience struct to easily create [`EngineSettings`].
///
/// For information about each of the fields, see [`EngineSettings`]
/// # Example
/// ```
/// # use strata::prelude::*;
/// let settings = EngineBuilder::new()
///     .name("My renderer")
///     .frames_in_flight(2)
///     .surface_extent(1280, 720)
///     .composite_source("final_color")
///     .build();
/// assert_eq!(settings.frames_in_flight, 2);
/// ```
pub struct EngineBuilder {
    inner: EngineSettings,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Create a new engine builder with default settings.
    pub fn new() -> Self {
        EngineBuilder {
            inner: EngineSettings {
                name: String::from(""),
                frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
                timeout: DEFAULT_TIMEOUT,
                surface_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                composite_source: None,
                debug_labels: cfg!(feature = "debug-markers"),
            },
        }
    }

    /// Sets the application name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Sets the number of frames in flight.
    pub fn frames_in_flight(mut self, count: usize) -> Self {
        self.inner.frames_in_flight = count;
        self
    }

    /// Sets the fence and acquire timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = timeout;
        self
    }

    /// Sets the initial surface extent.
    pub fn surface_extent(mut self, width: u32, height: u32) -> Self {
        self.inner.surface_extent = vk::Extent2D {
            width,
            height,
        };
        self
    }

    /// Sets the resource that is composited onto the surface.
    pub fn composite_source(mut self, name: impl Into<String>) -> Self {
        self.inner.composite_source = Some(name.into());
        self
    }

    /// Enable or disable per-pass debug labels.
    pub fn debug_labels(mut self, enabled: bool) -> Self {
        self.inner.debug_labels = enabled;
        self
    }

    /// Build the resulting engine settings.
    pub fn build(self) -> EngineSettings {
        self.inner
    }
}
