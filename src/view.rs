//! Camera state and gesture damping.
//!
//! Raw input never writes the view directly: every proposed update goes
//! through `apply`, which pins the camera during zoom, damps drag deltas,
//! and lets everything else pass through. Arc animation and user
//! interaction run on the same frame loop, so without the damping the
//! two fight over the camera.

use crate::config::ViewTuning;

/// Camera state plus the active-gesture flags.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Camera tilt, degrees, clamped to +-90.
    pub latitude: f32,
    /// Camera pan, degrees.
    pub longitude: f32,
    pub zoom: f32,
    /// Idle spin angle, degrees.
    pub orbit: f32,
    pub dragging: bool,
    pub zooming: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            latitude: 15.0,
            longitude: 0.0,
            zoom: 1.0,
            orbit: 0.0,
            dragging: false,
            zooming: false,
        }
    }
}

pub struct ViewStateController {
    state: ViewState,
    /// Snapshot taken at gesture start; zoom pins lat/lon/orbit to it.
    anchor: ViewState,
    tuning: ViewTuning,
}

impl ViewStateController {
    pub fn new(initial: ViewState, tuning: ViewTuning) -> Self {
        Self {
            state: initial,
            anchor: initial,
            tuning,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Apply a proposed update through the damping rules.
    pub fn apply(&mut self, proposed: ViewState) {
        // Gesture rising edge: remember where the camera was.
        if (proposed.zooming && !self.state.zooming) || (proposed.dragging && !self.state.dragging)
        {
            self.anchor = self.state;
        }

        if proposed.zooming {
            // Scroll must not recenter the camera.
            self.state = ViewState {
                latitude: self.anchor.latitude,
                longitude: self.anchor.longitude,
                orbit: self.anchor.orbit,
                zoom: self.clamp_zoom(proposed.zoom),
                dragging: false,
                zooming: true,
            };
        } else if proposed.dragging {
            let s = self.tuning.drag_sensitivity;
            self.state = ViewState {
                latitude: clamp_lat(self.state.latitude + (proposed.latitude - self.state.latitude) * s),
                longitude: self.state.longitude + (proposed.longitude - self.state.longitude) * s,
                orbit: self.state.orbit,
                // Zoom held for the duration of the drag.
                zoom: self.state.zoom,
                dragging: true,
                zooming: false,
            };
        } else {
            self.state = ViewState {
                latitude: clamp_lat(proposed.latitude),
                longitude: proposed.longitude,
                orbit: proposed.orbit,
                zoom: self.clamp_zoom(proposed.zoom),
                dragging: false,
                zooming: false,
            };
        }
    }

    /// Per-frame idle spin; suppressed while any gesture is active.
    pub fn idle_tick(&mut self, dt_secs: f32) {
        if !self.state.dragging && !self.state.zooming {
            self.state.orbit = (self.state.orbit + self.tuning.auto_rotate_deg * dt_secs) % 360.0;
        }
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        zoom.clamp(self.tuning.zoom_min, self.tuning.zoom_max)
    }
}

fn clamp_lat(lat: f32) -> f32 {
    lat.clamp(-90.0, 90.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ViewStateController {
        ViewStateController::new(ViewState::default(), ViewTuning::default())
    }

    #[test]
    fn zoom_pins_camera() {
        let mut ctl = controller();
        let before = *ctl.state();
        ctl.apply(ViewState {
            latitude: 80.0,
            longitude: 120.0,
            orbit: 45.0,
            zoom: 2.0,
            zooming: true,
            dragging: false,
        });
        let after = ctl.state();
        assert_eq!(after.latitude, before.latitude);
        assert_eq!(after.longitude, before.longitude);
        assert_eq!(after.orbit, before.orbit);
        assert_eq!(after.zoom, 2.0);
    }

    #[test]
    fn drag_damps_delta_and_holds_zoom() {
        let mut ctl = controller();
        let before = *ctl.state();
        ctl.apply(ViewState {
            latitude: before.latitude + 10.0,
            longitude: before.longitude + 20.0,
            zoom: 3.0, // must be ignored during drag
            orbit: before.orbit,
            dragging: true,
            zooming: false,
        });
        let s = ViewTuning::default().drag_sensitivity;
        let after = ctl.state();
        assert!((after.latitude - (before.latitude + 10.0 * s)).abs() < 1e-4);
        assert!((after.longitude - (before.longitude + 20.0 * s)).abs() < 1e-4);
        assert_eq!(after.zoom, before.zoom);
    }

    #[test]
    fn pass_through_outside_gestures() {
        let mut ctl = controller();
        ctl.apply(ViewState {
            latitude: -30.0,
            longitude: 55.0,
            zoom: 1.5,
            orbit: 10.0,
            dragging: false,
            zooming: false,
        });
        let after = ctl.state();
        assert_eq!(after.latitude, -30.0);
        assert_eq!(after.longitude, 55.0);
        assert_eq!(after.zoom, 1.5);
        assert_eq!(after.orbit, 10.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut ctl = controller();
        let mut proposed = *ctl.state();
        proposed.zoom = 99.0;
        ctl.apply(proposed);
        assert_eq!(ctl.state().zoom, ViewTuning::default().zoom_max);
    }

    #[test]
    fn auto_rotate_only_when_idle() {
        let mut ctl = controller();
        let orbit0 = ctl.state().orbit;
        ctl.idle_tick(1.0);
        assert!((ctl.state().orbit - orbit0 - ViewTuning::default().auto_rotate_deg).abs() < 1e-4);

        let mut dragging = *ctl.state();
        dragging.dragging = true;
        ctl.apply(dragging);
        let orbit1 = ctl.state().orbit;
        ctl.idle_tick(1.0);
        assert_eq!(ctl.state().orbit, orbit1);
    }

    #[test]
    fn zoom_release_resumes_from_pinned_camera() {
        let mut ctl = controller();
        let before = *ctl.state();
        let mut zooming = before;
        zooming.zooming = true;
        zooming.zoom = 2.0;
        zooming.latitude = 89.0;
        ctl.apply(zooming);

        // Gesture ends; camera continues from the pinned position.
        let mut release = *ctl.state();
        release.zooming = false;
        ctl.apply(release);
        assert_eq!(ctl.state().latitude, before.latitude);
        assert_eq!(ctl.state().zoom, 2.0);
    }
}
