//! Fullscreen presentation toggle.

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::surface::SurfaceRef;

/// Presentation state of a surface. Unrelated to the session lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresentationMode {
    #[default]
    Windowed,
    Fullscreen,
}

impl fmt::Display for PresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windowed => write!(f, "windowed"),
            Self::Fullscreen => write!(f, "fullscreen"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("surface '{0}' cannot be presented fullscreen")]
    Unsupported(String),

    #[error("presentation control is not available for this session")]
    Unavailable,
}

/// A control that requests or exits fullscreen presentation of a surface.
pub trait PresentationToggle {
    fn mode(&self) -> PresentationMode;

    fn request(&mut self) -> Result<(), PresentationError>;

    fn exit(&mut self) -> Result<(), PresentationError>;

    /// Flip between windowed and fullscreen, returning the new mode.
    fn toggle(&mut self) -> Result<PresentationMode, PresentationError> {
        match self.mode() {
            PresentationMode::Windowed => self.request()?,
            PresentationMode::Fullscreen => self.exit()?,
        }
        Ok(self.mode())
    }
}

/// Fullscreen button bound to a render surface.
#[derive(Debug)]
pub struct FullScreener {
    surface: SurfaceRef,
    mode: PresentationMode,
}

impl FullScreener {
    /// Bind to `surface`. Fails if the platform cannot present it fullscreen.
    pub fn new(surface: SurfaceRef) -> Result<Self, PresentationError> {
        if !surface.fullscreen_capable() {
            return Err(PresentationError::Unsupported(surface.id().to_string()));
        }
        Ok(Self {
            surface,
            mode: PresentationMode::Windowed,
        })
    }
}

impl PresentationToggle for FullScreener {
    fn mode(&self) -> PresentationMode {
        self.mode
    }

    fn request(&mut self) -> Result<(), PresentationError> {
        if self.mode != PresentationMode::Fullscreen {
            self.mode = PresentationMode::Fullscreen;
            info!(surface = self.surface.id(), "Entered fullscreen");
        }
        Ok(())
    }

    fn exit(&mut self) -> Result<(), PresentationError> {
        if self.mode != PresentationMode::Windowed {
            self.mode = PresentationMode::Windowed;
            info!(surface = self.surface.id(), "Left fullscreen");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RenderSurface;
    use std::rc::Rc;

    #[test]
    fn toggle_flips_mode() {
        let surface = Rc::new(RenderSurface::new("scene-container", 640, 480));
        let mut toggle = FullScreener::new(surface).unwrap();

        assert_eq!(toggle.mode(), PresentationMode::Windowed);
        assert_eq!(toggle.toggle().unwrap(), PresentationMode::Fullscreen);
        assert_eq!(toggle.toggle().unwrap(), PresentationMode::Windowed);
    }

    #[test]
    fn incapable_surface_is_rejected() {
        let surface = Rc::new(RenderSurface::new("scene-container", 640, 480).with_fullscreen(false));
        assert!(matches!(
            FullScreener::new(surface),
            Err(PresentationError::Unsupported(_))
        ));
    }
}
