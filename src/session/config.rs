use crate::{
    foundation::core::TrackWindow,
    foundation::error::{AnnotrackError, AnnotrackResult},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
/// Tunables of an annotation session. Every field has a default, so `{}` is a valid config.
pub struct SessionConfig {
    /// Frames of trajectory shown before the current frame. `None` shows all.
    #[serde(default)]
    pub trailing: Option<u64>,
    /// Frames of trajectory shown after the current frame. `None` shows all.
    #[serde(default)]
    pub leading: Option<u64>,
    /// Track clicks continue the nearest open track instead of starting a new one.
    #[serde(default)]
    pub connect_nearest: bool,
    /// Distance cap for detection assignment.
    #[serde(default = "default_assign_max_distance")]
    pub assign_max_distance: f64,
    /// Pointer distance within which an entity counts as hit.
    #[serde(default = "default_hit_tolerance")]
    pub hit_tolerance: f64,
    /// Clicking this close to the first vertex closes a polygon.
    #[serde(default = "default_polygon_close_radius")]
    pub polygon_close_radius: f64,
    /// Flush to the backend whenever the current frame changes.
    #[serde(default = "default_true")]
    pub autosave_on_frame_change: bool,
}

fn default_assign_max_distance() -> f64 {
    50.0
}

fn default_hit_tolerance() -> f64 {
    8.0
}

fn default_polygon_close_radius() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trailing: None,
            leading: None,
            connect_nearest: false,
            assign_max_distance: default_assign_max_distance(),
            hit_tolerance: default_hit_tolerance(),
            polygon_close_radius: default_polygon_close_radius(),
            autosave_on_frame_change: true,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(s: &str) -> AnnotrackResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnnotrackResult<()> {
        for (name, v) in [
            ("assign_max_distance", self.assign_max_distance),
            ("hit_tolerance", self.hit_tolerance),
            ("polygon_close_radius", self.polygon_close_radius),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(AnnotrackError::validation(format!(
                    "{name} must be a finite non-negative number, got {v}"
                )));
            }
        }
        Ok(())
    }

    pub fn window(&self) -> TrackWindow {
        TrackWindow {
            trailing: self.trailing,
            leading: self.leading,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
