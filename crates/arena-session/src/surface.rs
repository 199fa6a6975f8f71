//! Render surfaces and the host view that resolves them.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};

/// Default mount selector used by the experiment view.
pub const DEFAULT_MOUNT: &str = "#scene-container";

/// Shared handle to a mounted surface. The surface outlives any session bound to it.
pub type SurfaceRef = Rc<RenderSurface>;

/// A mountable visual region that engines and widgets attach to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSurface {
    id: String,
    width: u32,
    height: u32,
    fullscreen_capable: bool,
}

impl RenderSurface {
    /// Create a surface with the given element id and pixel size.
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            fullscreen_capable: true,
        }
    }

    /// Mark whether the platform can present this surface fullscreen.
    #[must_use]
    pub fn with_fullscreen(mut self, capable: bool) -> Self {
        self.fullscreen_capable = capable;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fullscreen_capable(&self) -> bool {
        self.fullscreen_capable
    }

    /// Check that the surface can host a session.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Precondition("render surface has no id".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Precondition(format!(
                "render surface '{}' has zero area ({}x{})",
                self.id, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// The hosting view: a set of addressable containers.
#[derive(Debug, Default)]
pub struct HostView {
    surfaces: HashMap<String, SurfaceRef>,
}

impl HostView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a surface, replacing any previous surface with the same id.
    pub fn mount(&mut self, surface: RenderSurface) -> SurfaceRef {
        let surface = Rc::new(surface);
        self.surfaces
            .insert(surface.id().to_string(), Rc::clone(&surface));
        surface
    }

    /// Remove a surface from the view. Sessions already holding it keep their handle.
    pub fn unmount(&mut self, id: &str) -> Option<SurfaceRef> {
        self.surfaces.remove(id)
    }

    /// Resolve an `#id` selector (the leading `#` is optional).
    pub fn query(&self, selector: &str) -> Option<SurfaceRef> {
        let id = selector.strip_prefix('#').unwrap_or(selector);
        self.surfaces.get(id).cloned()
    }

    /// Resolve a selector, failing with a precondition error if nothing is mounted there.
    pub fn resolve(&self, selector: &str) -> Result<SurfaceRef> {
        self.query(selector)
            .ok_or_else(|| Error::Precondition(format!("no surface mounted at '{selector}'")))
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}
