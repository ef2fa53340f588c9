use crate::core::{bounds::Bounds, geo::Point};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// What the map currently shows, as supplied by the camera.
///
/// World coordinates are pixels at level 0 with `y` growing downwards; level
/// `L` pixels are world coordinates times `2^L`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// The continuous map zoom
    pub zoom: f64,
    /// The visible region in world coordinates
    pub bounds: Bounds,
    /// Shared reference point for tile placement (keeps placement numbers small)
    pub origin: Point,
}

impl View {
    pub fn new(zoom: f64, bounds: Bounds) -> Self {
        Self {
            zoom,
            bounds,
            origin: Point::default(),
        }
    }

    /// Builds the view of a `width` x `height` screen centred on a world point
    pub fn centered(center: Point, zoom: f64, width: f64, height: f64) -> Self {
        let scale = 2f64.powf(-zoom);
        Self::new(
            zoom,
            Bounds::from_center_and_size(center, width * scale, height * scale),
        )
    }

    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    /// Rejects views that cannot produce a tile range.
    pub fn validate(&self) -> Result<()> {
        if !self.zoom.is_finite() {
            return Err(Error::InvalidView(format!("zoom {} is not finite", self.zoom)));
        }
        if !self.bounds.min.is_finite() || !self.bounds.max.is_finite() || !self.origin.is_finite()
        {
            return Err(Error::InvalidView("bounds must be finite".to_string()));
        }
        if self.bounds.width() <= 0.0 || self.bounds.height() <= 0.0 {
            return Err(Error::InvalidView(format!(
                "bounds must have positive size, got {} x {}",
                self.bounds.width(),
                self.bounds.height()
            )));
        }
        Ok(())
    }
}

/// The view rectangle in pixels of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBounds {
    /// Level the edges are expressed in
    pub level: u32,
    /// Display scale of that level (`2^(zoom - level)`)
    pub scale: f64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl ViewBounds {
    /// Expresses world bounds in pixels of `level`.
    pub fn at_level(bounds: &Bounds, zoom: f64, level: u32) -> Self {
        let factor = 2f64.powi(level as i32);
        let corners = bounds.corners().map(|corner| corner.multiply(factor));
        Self {
            level,
            scale: 2f64.powf(zoom - level as f64),
            left: corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min),
            right: corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max),
            top: corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min),
            bottom: corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_degenerate_views() {
        let ok = View::new(2.0, Bounds::from_coords(0.0, 0.0, 10.0, 10.0));
        assert!(ok.validate().is_ok());

        let flat = View::new(2.0, Bounds::from_coords(0.0, 0.0, 10.0, 0.0));
        assert!(matches!(flat.validate(), Err(Error::InvalidView(_))));

        let inverted = View::new(2.0, Bounds::from_coords(10.0, 0.0, 0.0, 10.0));
        assert!(inverted.validate().is_err());

        let nan_zoom = View::new(f64::NAN, Bounds::from_coords(0.0, 0.0, 10.0, 10.0));
        assert!(nan_zoom.validate().is_err());
    }

    #[test]
    fn test_centered_view_size() {
        let view = View::centered(Point::new(128.0, 128.0), 1.0, 512.0, 256.0);
        assert_eq!(view.bounds.width(), 256.0);
        assert_eq!(view.bounds.height(), 128.0);
        assert_eq!(view.bounds.center(), Point::new(128.0, 128.0));
    }

    #[test]
    fn test_view_bounds_at_level() {
        let bounds = Bounds::from_coords(10.0, 20.0, 30.0, 40.0);
        let vb = ViewBounds::at_level(&bounds, 2.5, 2);
        assert_eq!(vb.left, 40.0);
        assert_eq!(vb.right, 120.0);
        assert_eq!(vb.top, 80.0);
        assert_eq!(vb.bottom, 160.0);
        assert!((vb.scale - 2f64.sqrt()).abs() < 1e-12);
    }
}
