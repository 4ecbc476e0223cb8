//! Live 2D preview: a flippable, zoomable card surface driven by pointer
//! events and wall-clock ticks. All state transitions are pure functions of
//! `(state, event, now)` so the gesture logic is testable without any
//! rendering surface.

use tracing::debug;

use crate::{
    error::{KosmaError, KosmaResult},
    model::{Card, CardStyle},
    plan::{PlanOptions, compile_face},
    raster::{FaceRasterizer, FrameRgba},
    template::{FaceSide, resolve_layout},
};

#[derive(Clone, Debug)]
pub struct PreviewConfig {
    /// A second tap inside this window toggles zoom instead of flipping.
    pub tap_window_ms: u64,
    /// Horizontal drag distance that cycles the template style.
    pub swipe_threshold_px: f64,
    /// Idle auto-flip period (demonstrates both faces unattended).
    pub idle_flip_period_ms: u64,
    /// How long user interaction suppresses the idle flip.
    pub idle_resume_delay_ms: u64,
    pub raster_scale: f64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            tap_window_ms: 300,
            swipe_threshold_px: 50.0,
            idle_flip_period_ms: 8000,
            idle_resume_delay_ms: 4000,
            raster_scale: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
}

#[derive(Clone, Copy, Debug)]
struct PointerTrack {
    down_x: f64,
    down_y: f64,
    max_travel: f64,
    swipe_consumed: bool,
}

/// Outcome of one pointer event, surfaced for callers that want to react
/// (e.g. persist a style change).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewAction {
    None,
    Flipped,
    ZoomToggled,
    StyleChanged(CardStyle),
}

#[derive(Clone, Debug)]
pub struct PreviewState {
    pub flipped: bool,
    pub zoomed: bool,
    pub style: CardStyle,
    last_tap_at: Option<u64>,
    pointer: Option<PointerTrack>,
    idle_suppressed_until: u64,
    next_idle_flip_at: u64,
}

impl PreviewState {
    pub fn new(style: CardStyle, now_ms: u64, config: &PreviewConfig) -> Self {
        Self {
            flipped: false,
            zoomed: false,
            style,
            last_tap_at: None,
            pointer: None,
            idle_suppressed_until: 0,
            next_idle_flip_at: now_ms + config.idle_flip_period_ms,
        }
    }

    fn touch(&mut self, now_ms: u64, config: &PreviewConfig) {
        self.idle_suppressed_until = now_ms + config.idle_resume_delay_ms;
    }

    pub fn on_pointer(
        &mut self,
        ev: PointerEvent,
        now_ms: u64,
        config: &PreviewConfig,
    ) -> PreviewAction {
        self.touch(now_ms, config);
        match ev {
            PointerEvent::Down { x, y } => {
                self.pointer = Some(PointerTrack {
                    down_x: x,
                    down_y: y,
                    max_travel: 0.0,
                    swipe_consumed: false,
                });
                PreviewAction::None
            }
            PointerEvent::Move { x, y } => {
                let Some(track) = self.pointer.as_mut() else {
                    return PreviewAction::None;
                };
                let dx = x - track.down_x;
                let dy = y - track.down_y;
                track.max_travel = track.max_travel.max(dx.hypot(dy));

                if !track.swipe_consumed && dx.abs() >= config.swipe_threshold_px {
                    track.swipe_consumed = true;
                    self.style = if dx < 0.0 {
                        self.style.next()
                    } else {
                        self.style.prev()
                    };
                    debug!(style = self.style.key(), "preview style cycled by swipe");
                    return PreviewAction::StyleChanged(self.style);
                }
                PreviewAction::None
            }
            PointerEvent::Up { .. } => {
                let Some(track) = self.pointer.take() else {
                    return PreviewAction::None;
                };
                if track.swipe_consumed || track.max_travel >= config.swipe_threshold_px {
                    self.last_tap_at = None;
                    return PreviewAction::None;
                }

                // Tap: rapid second tap zooms, otherwise flip.
                let rapid = self
                    .last_tap_at
                    .is_some_and(|t| now_ms.saturating_sub(t) <= config.tap_window_ms);
                if rapid {
                    self.last_tap_at = None;
                    self.zoomed = !self.zoomed;
                    PreviewAction::ZoomToggled
                } else {
                    self.last_tap_at = Some(now_ms);
                    self.flipped = !self.flipped;
                    PreviewAction::Flipped
                }
            }
        }
    }

    /// Advance the idle clock. Auto-flip fires only when past the period and
    /// not suppressed by recent interaction, so a user-driven flip always
    /// wins while the user is active.
    pub fn tick(&mut self, now_ms: u64, config: &PreviewConfig) -> bool {
        if now_ms < self.next_idle_flip_at {
            return false;
        }
        if now_ms < self.idle_suppressed_until || self.pointer.is_some() {
            // Re-arm without flipping; interaction takes precedence.
            self.next_idle_flip_at = now_ms + config.idle_flip_period_ms;
            return false;
        }
        self.flipped = !self.flipped;
        self.next_idle_flip_at = now_ms + config.idle_flip_period_ms;
        true
    }

    pub fn visible_side(&self) -> FaceSide {
        if self.flipped {
            FaceSide::Back
        } else {
            FaceSide::Front
        }
    }
}

/// Owns the card, the gesture state, and lazily rendered face rasters.
pub struct PreviewSession {
    card: Card,
    config: PreviewConfig,
    state: PreviewState,
    raster: FaceRasterizer,
    front: Option<FrameRgba>,
    back: Option<FrameRgba>,
}

impl PreviewSession {
    pub fn new(card: Card, now_ms: u64, config: PreviewConfig) -> Self {
        let state = PreviewState::new(card.style, now_ms, &config);
        Self {
            card,
            config,
            state,
            raster: FaceRasterizer::new(),
            front: None,
            back: None,
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    /// Replace the card (editing flow); face rasters re-derive on next read.
    pub fn set_card(&mut self, card: Card) {
        if card == self.card {
            return;
        }
        self.card = card;
        self.invalidate();
    }

    pub fn on_pointer(&mut self, ev: PointerEvent, now_ms: u64) -> PreviewAction {
        let action = self.state.on_pointer(ev, now_ms, &self.config);
        if matches!(action, PreviewAction::StyleChanged(_)) {
            self.invalidate();
        }
        action
    }

    pub fn tick(&mut self, now_ms: u64) -> bool {
        self.state.tick(now_ms, &self.config)
    }

    /// Raster for the currently visible face.
    pub fn visible_face(&mut self) -> KosmaResult<&FrameRgba> {
        let side = self.state.visible_side();
        self.face(side)
    }

    pub fn face(&mut self, side: FaceSide) -> KosmaResult<&FrameRgba> {
        let slot_filled = match side {
            FaceSide::Front => self.front.is_some(),
            FaceSide::Back => self.back.is_some(),
        };
        if !slot_filled {
            let layout = resolve_layout(&self.card, self.state.style);
            let plan = compile_face(
                &layout,
                side,
                &PlanOptions {
                    scale: self.config.raster_scale,
                    photo: self.card.photo.clone(),
                    ..PlanOptions::default()
                },
            );
            let frame = self.raster.render(&plan)?;
            match side {
                FaceSide::Front => self.front = Some(frame),
                FaceSide::Back => self.back = Some(frame),
            }
        }
        match side {
            FaceSide::Front => self.front.as_ref(),
            FaceSide::Back => self.back.as_ref(),
        }
        .ok_or_else(|| KosmaError::render("face cache empty after render"))
    }

    fn invalidate(&mut self) {
        self.front = None;
        self.back = None;
        self.raster.invalidate_images();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PreviewConfig {
        PreviewConfig::default()
    }

    fn tap(state: &mut PreviewState, now: u64) -> PreviewAction {
        state.on_pointer(PointerEvent::Down { x: 10.0, y: 10.0 }, now, &cfg());
        state.on_pointer(PointerEvent::Up { x: 10.0, y: 10.0 }, now, &cfg())
    }

    #[test]
    fn single_tap_flips() {
        let mut state = PreviewState::new(CardStyle::Kosma, 0, &cfg());
        assert_eq!(tap(&mut state, 1000), PreviewAction::Flipped);
        assert!(state.flipped);
        assert!(!state.zoomed);
    }

    #[test]
    fn rapid_second_tap_zooms() {
        let mut state = PreviewState::new(CardStyle::Kosma, 0, &cfg());
        tap(&mut state, 1000);
        assert_eq!(tap(&mut state, 1200), PreviewAction::ZoomToggled);
        assert!(state.zoomed);

        // Outside the window it is a plain flip again.
        assert_eq!(tap(&mut state, 5000), PreviewAction::Flipped);
    }

    #[test]
    fn horizontal_swipe_cycles_style() {
        let mut state = PreviewState::new(CardStyle::Kosma, 0, &cfg());
        state.on_pointer(PointerEvent::Down { x: 200.0, y: 50.0 }, 0, &cfg());
        assert_eq!(
            state.on_pointer(PointerEvent::Move { x: 140.0, y: 52.0 }, 16, &cfg()),
            PreviewAction::StyleChanged(CardStyle::Techno)
        );
        // Releasing after a swipe is not a tap.
        assert_eq!(
            state.on_pointer(PointerEvent::Up { x: 140.0, y: 52.0 }, 32, &cfg()),
            PreviewAction::None
        );
        assert!(!state.flipped);
    }

    #[test]
    fn sub_threshold_drag_is_a_tap() {
        let mut state = PreviewState::new(CardStyle::Kosma, 0, &cfg());
        state.on_pointer(PointerEvent::Down { x: 200.0, y: 50.0 }, 0, &cfg());
        state.on_pointer(PointerEvent::Move { x: 210.0, y: 50.0 }, 16, &cfg());
        assert_eq!(
            state.on_pointer(PointerEvent::Up { x: 210.0, y: 50.0 }, 32, &cfg()),
            PreviewAction::Flipped
        );
    }

    #[test]
    fn idle_flip_fires_and_rearms() {
        let cfg = cfg();
        let mut state = PreviewState::new(CardStyle::Kosma, 0, &cfg);
        assert!(!state.tick(cfg.idle_flip_period_ms - 1, &cfg));
        assert!(state.tick(cfg.idle_flip_period_ms, &cfg));
        assert!(state.flipped);
        assert!(!state.tick(cfg.idle_flip_period_ms + 1, &cfg));
    }

    #[test]
    fn user_interaction_suppresses_idle_flip() {
        let cfg = cfg();
        let mut state = PreviewState::new(CardStyle::Kosma, 0, &cfg);
        let due = cfg.idle_flip_period_ms;
        tap(&mut state, due - 100);
        let flipped_by_tap = state.flipped;
        // Idle fire due now, but interaction was 100 ms ago: suppressed.
        assert!(!state.tick(due, &cfg));
        assert_eq!(state.flipped, flipped_by_tap);
        // Long after the resume delay it fires again.
        assert!(state.tick(due + cfg.idle_flip_period_ms + cfg.idle_resume_delay_ms, &cfg));
    }

    #[test]
    fn session_rerenders_on_style_change() {
        let mut session = PreviewSession::new(Card::empty(), 0, PreviewConfig {
            raster_scale: 0.2,
            ..PreviewConfig::default()
        });
        let w = session.visible_face().unwrap().width;
        assert!(w > 0);

        session.on_pointer(PointerEvent::Down { x: 300.0, y: 10.0 }, 10);
        let action = session.on_pointer(PointerEvent::Move { x: 100.0, y: 10.0 }, 20);
        assert_eq!(action, PreviewAction::StyleChanged(CardStyle::Techno));
        assert!(session.front.is_none());
        assert!(session.visible_face().unwrap().width > 0);
    }
}
