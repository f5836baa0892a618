use brigade_common::{LatLng, UnitMeta};

/// Seam to whichever map widget draws the markers.
///
/// Implementations only draw; ordering and interpolation are handled by the
/// caller.
pub trait MapRenderer: Send {
    /// Draw a marker for a unit that was not on the map.
    fn place(&mut self, unit_id: &str, position: LatLng, meta: &UnitMeta);

    /// Move an existing marker.
    fn move_marker(&mut self, unit_id: &str, position: LatLng);

    /// Take a marker off the map.
    fn remove(&mut self, unit_id: &str);
}

/// Renderer that writes marker changes to the log. Handy for headless runs.
#[derive(Debug, Default)]
pub struct TracingRenderer {
    frames: u64,
}

impl TracingRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapRenderer for TracingRenderer {
    fn place(&mut self, unit_id: &str, position: LatLng, meta: &UnitMeta) {
        tracing::info!(
            "Marker {} ({}) placed at {}",
            unit_id,
            meta.display_name.as_deref().unwrap_or("unnamed"),
            position
        );
    }

    fn move_marker(&mut self, unit_id: &str, position: LatLng) {
        self.frames += 1;
        tracing::trace!("Marker {} at {} (frame {})", unit_id, position, self.frames);
    }

    fn remove(&mut self, unit_id: &str) {
        tracing::info!("Marker {} removed", unit_id);
    }
}
