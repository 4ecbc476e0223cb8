//! 3D showroom preview: the card as a thin textured slab with idle
//! auto-rotation, drag/pinch/wheel interaction, and double-tap flip. The
//! interaction math lives in plain structs stepped by exponential smoothing
//! so it is unit-testable without any graphics surface; [`CardStage`] is the
//! render-loop object that owns every per-mount resource and tears down
//! deterministically.

use std::f64::consts::{PI, TAU};

use tracing::debug;

use crate::{
    composite,
    error::{KosmaError, KosmaResult},
    model::Card,
    plan::{PlanOptions, compile_face},
    raster::{FaceRasterizer, FrameRgba},
    template::{FaceSide, resolve_layout},
};

/// Card slab aspect ratio (width : height).
pub const SLAB_ASPECT: f64 = 1.75;
/// Face textures are rasterized at this fixed size so text stays legible
/// when the mesh fills the viewport.
pub const TEXTURE_WIDTH: u32 = 1400;
pub const TEXTURE_HEIGHT: u32 = 800;

pub const ZOOM_MIN: f64 = 0.5;
pub const ZOOM_MAX: f64 = 8.0;
pub const WHEEL_ZOOM_STEP: f64 = 0.4;

/// Pointer travel that converts a press into a drag.
pub const DRAG_INTENT_PX: f64 = 5.0;
/// Double-tap window and slop.
pub const DOUBLE_TAP_MS: u64 = 300;
pub const DOUBLE_TAP_SLOP_PX: f64 = 10.0;
/// Auto-rotate resumes this long after a flip or drag release.
pub const AUTO_ROTATE_RESUME_MS: u64 = 1000;

/// One smoothed axis: a current value eased toward a target each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Smoothed {
    pub current: f64,
    pub target: f64,
}

impl Smoothed {
    pub fn at(value: f64) -> Self {
        Self {
            current: value,
            target: value,
        }
    }

    /// Exponential step toward the target: frame-rate independent, never
    /// snaps, converges monotonically.
    pub fn step(&mut self, rate: f64, dt_s: f64) {
        let k = 1.0 - (-rate * dt_s).exp();
        self.current += (self.target - self.current) * k;
    }

    pub fn settled(&self, eps: f64) -> bool {
        (self.target - self.current).abs() < eps
    }
}

/// Compact embeds ease faster so the small surface feels snappy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    Compact,
    Full,
}

impl DisplayMode {
    pub fn smoothing_rate(self) -> f64 {
        match self {
            Self::Compact => 10.0,
            Self::Full => 6.0,
        }
    }
}

/// Double-tap flip target: normalize the Y rotation into [0, 2pi), round to
/// the nearest multiple of pi (a flat face), and go one half-turn further.
pub fn compute_flip_target(rotation_y: f64) -> f64 {
    let norm = rotation_y.rem_euclid(TAU);
    let nearest_flat = (norm / PI).round() * PI;
    nearest_flat + PI
}

#[derive(Clone, Copy, Debug)]
struct DragTrack {
    start_x: f64,
    start_y: f64,
    last_x: f64,
    last_y: f64,
    intent: bool,
}

#[derive(Clone, Copy, Debug)]
struct TapMemory {
    at_ms: u64,
    x: f64,
    y: f64,
}

/// All user-driven and showroom-driven motion state for the slab.
#[derive(Clone, Debug)]
pub struct Interaction {
    pub mode: DisplayMode,
    pub rotation_x: Smoothed,
    pub rotation_y: Smoothed,
    pub position_x: Smoothed,
    pub position_y: Smoothed,
    pub zoom: Smoothed,
    drag: Option<DragTrack>,
    last_tap: Option<TapMemory>,
    pinch_base_zoom: Option<f64>,
    auto_rotate_resume_at: u64,
}

impl Interaction {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            mode,
            rotation_x: Smoothed::default(),
            rotation_y: Smoothed::default(),
            position_x: Smoothed::default(),
            position_y: Smoothed::default(),
            zoom: Smoothed::at(1.0),
            drag: None,
            last_tap: None,
            pinch_base_zoom: None,
            auto_rotate_resume_at: 0,
        }
    }

    pub fn dragging(&self) -> bool {
        self.drag.as_ref().is_some_and(|d| d.intent)
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.drag = Some(DragTrack {
            start_x: x,
            start_y: y,
            last_x: x,
            last_y: y,
            intent: false,
        });
    }

    /// Drag translates the slab's on-screen position proportionally to the
    /// pointer delta (not a rotation).
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let travel = (x - drag.start_x).hypot(y - drag.start_y);
        if !drag.intent && travel >= DRAG_INTENT_PX {
            drag.intent = true;
        }
        if drag.intent {
            self.position_x.target += x - drag.last_x;
            self.position_y.target += y - drag.last_y;
        }
        drag.last_x = x;
        drag.last_y = y;
    }

    /// Release: a clean click may complete a double-tap flip; a drag release
    /// schedules the showroom resume.
    pub fn pointer_up(&mut self, x: f64, y: f64, now_ms: u64) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        if drag.intent {
            self.auto_rotate_resume_at = now_ms + AUTO_ROTATE_RESUME_MS;
            self.last_tap = None;
            return;
        }

        let is_double = self.last_tap.is_some_and(|tap| {
            now_ms.saturating_sub(tap.at_ms) <= DOUBLE_TAP_MS
                && (x - tap.x).hypot(y - tap.y) < DOUBLE_TAP_SLOP_PX
        });
        if is_double {
            self.flip(now_ms);
            self.last_tap = None;
        } else {
            self.last_tap = Some(TapMemory { at_ms: now_ms, x, y });
        }
    }

    pub fn flip(&mut self, now_ms: u64) {
        let target = compute_flip_target(self.rotation_y.current);
        // Keep the accumulated turns so the ease is one half-turn, not a
        // multi-revolution unwind.
        let turns = (self.rotation_y.current / TAU).floor() * TAU;
        self.rotation_y.target = turns + target;
        self.auto_rotate_resume_at = now_ms + AUTO_ROTATE_RESUME_MS;
        debug!(target = self.rotation_y.target, "flip scheduled");
    }

    /// Two-finger pinch: distance ratio against the gesture's starting zoom.
    pub fn pinch(&mut self, ratio: f64) {
        let base = *self.pinch_base_zoom.get_or_insert(self.zoom.target);
        self.zoom.target = (base * ratio).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    pub fn pinch_end(&mut self) {
        self.pinch_base_zoom = None;
    }

    pub fn wheel(&mut self, delta_steps: f64) {
        self.zoom.target =
            (self.zoom.target + delta_steps * WHEEL_ZOOM_STEP).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// Step one frame: showroom rotation (when idle) plus smoothing on every
    /// axis. `dt_s` is the frame delta in seconds.
    pub fn advance(&mut self, now_ms: u64, dt_s: f64) {
        let idle = !self.dragging() && now_ms >= self.auto_rotate_resume_at;
        if idle {
            // Constant spin with a slow secondary wobble.
            self.rotation_y.target += 0.6 * dt_s;
            self.rotation_x.target = 0.12 * (now_ms as f64 / 1000.0 * 0.8).sin();
        }

        let rate = self.mode.smoothing_rate();
        self.rotation_x.step(rate, dt_s);
        self.rotation_y.step(rate, dt_s);
        self.position_x.step(rate, dt_s);
        self.position_y.step(rate, dt_s);
        self.zoom.step(rate, dt_s);
    }

    /// Which face the viewer currently sees, from the eased Y rotation.
    pub fn visible_side(&self) -> FaceSide {
        let norm = self.rotation_y.current.rem_euclid(TAU);
        if (norm - PI).abs() < PI / 2.0 {
            FaceSide::Back
        } else {
            FaceSide::Front
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3 {
    fn rotate_x(self, a: f64) -> Self {
        let (s, c) = a.sin_cos();
        Self {
            x: self.x,
            y: self.y * c - self.z * s,
            z: self.y * s + self.z * c,
        }
    }

    fn rotate_y(self, a: f64) -> Self {
        let (s, c) = a.sin_cos();
        Self {
            x: self.x * c + self.z * s,
            y: self.y,
            z: -self.x * s + self.z * c,
        }
    }
}

/// Stage configuration: output viewport size and display mode.
#[derive(Clone, Copy, Debug)]
pub struct StageConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub mode: DisplayMode,
    pub background: [u8; 4],
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            viewport_width: 960,
            viewport_height: 640,
            mode: DisplayMode::Full,
            background: [0, 0, 0, 0],
        }
    }
}

/// The render-loop object. Constructed fresh per mount; owns its textures,
/// rasterizer, and interaction state; `dispose` releases everything and a
/// disposed stage refuses further work (the liveness guard for callbacks
/// that land after teardown).
pub struct CardStage {
    config: StageConfig,
    card: Card,
    interaction: Interaction,
    raster: FaceRasterizer,
    front_tex: Option<FrameRgba>,
    back_tex: Option<FrameRgba>,
    textures_dirty: bool,
    running: bool,
    alive: bool,
    last_advance_ms: Option<u64>,
}

impl CardStage {
    pub fn new(card: Card, config: StageConfig) -> Self {
        Self {
            interaction: Interaction::new(config.mode),
            config,
            card,
            raster: FaceRasterizer::new(),
            front_tex: None,
            back_tex: None,
            textures_dirty: true,
            running: false,
            alive: true,
            last_advance_ms: None,
        }
    }

    pub fn interaction(&mut self) -> &mut Interaction {
        &mut self.interaction
    }

    pub fn is_running(&self) -> bool {
        self.running && self.alive
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn start(&mut self) {
        if self.alive {
            self.running = true;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.last_advance_ms = None;
    }

    /// Release every owned resource. Idempotent; the stage never renders
    /// again afterwards.
    pub fn dispose(&mut self) {
        self.running = false;
        self.alive = false;
        self.front_tex = None;
        self.back_tex = None;
        self.raster.invalidate_images();
        debug!("card stage disposed");
    }

    /// Card data changed: re-derive both textures on the next frame. Ignored
    /// after dispose (a late-arriving update must not resurrect resources).
    pub fn set_card(&mut self, card: Card) {
        if !self.alive || card == self.card {
            return;
        }
        self.card = card;
        self.textures_dirty = true;
        self.raster.invalidate_images();
    }

    fn ensure_textures(&mut self) -> KosmaResult<()> {
        if !self.textures_dirty && self.front_tex.is_some() && self.back_tex.is_some() {
            return Ok(());
        }
        let scale = f64::from(TEXTURE_WIDTH) / crate::plan::BASE_FACE_WIDTH;
        let layout = resolve_layout(&self.card, self.card.style);
        let opts = PlanOptions {
            scale,
            photo: self.card.photo.clone(),
            ..PlanOptions::default()
        };
        self.front_tex = Some(
            self.raster
                .render(&compile_face(&layout, FaceSide::Front, &opts))?,
        );
        self.back_tex = Some(
            self.raster
                .render(&compile_face(&layout, FaceSide::Back, &opts))?,
        );
        self.textures_dirty = false;
        Ok(())
    }

    /// One frame: steps interaction, refreshes textures if dirty, projects
    /// the slab. Returns `None` when the loop is stopped or disposed,
    /// signalling the caller not to reschedule.
    pub fn advance(&mut self, now_ms: u64) -> KosmaResult<Option<FrameRgba>> {
        if !self.is_running() {
            return Ok(None);
        }
        let dt_s = match self.last_advance_ms {
            Some(prev) => (now_ms.saturating_sub(prev) as f64 / 1000.0).min(0.1),
            None => 1.0 / 60.0,
        };
        self.last_advance_ms = Some(now_ms);

        self.ensure_textures()?;
        self.interaction.advance(now_ms, dt_s);
        self.project().map(Some)
    }

    /// Project the slab into the viewport with the current interaction
    /// state and affine-texture-map the visible face.
    fn project(&self) -> KosmaResult<FrameRgba> {
        let side = self.interaction.visible_side();
        let tex = match side {
            FaceSide::Front => self.front_tex.as_ref(),
            FaceSide::Back => self.back_tex.as_ref(),
        }
        .ok_or_else(|| KosmaError::render("stage textures missing at project time"))?;

        let vw = self.config.viewport_width;
        let vh = self.config.viewport_height;
        let mut data = vec![0u8; vw as usize * vh as usize * 4];
        let bg = composite::premul_px(
            self.config.background[0],
            self.config.background[1],
            self.config.background[2],
            self.config.background[3],
        );
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&bg);
        }

        // Slab corners in model space (unit height, 1.75 width), viewed
        // from +z with mild perspective.
        let hw = SLAB_ASPECT / 2.0;
        let hh = 0.5;
        let rx = self.interaction.rotation_x.current;
        let ry = self.interaction.rotation_y.current;
        // The back face is pre-mirrored by the half-turn; flip its local x
        // so its texture reads left-to-right when facing the viewer.
        let (ry, flip_u) = match side {
            FaceSide::Front => (ry, false),
            FaceSide::Back => (ry + PI, true),
        };

        let corners = [
            Vec3 { x: -hw, y: -hh, z: 0.0 },
            Vec3 { x: hw, y: -hh, z: 0.0 },
            Vec3 { x: hw, y: hh, z: 0.0 },
            Vec3 { x: -hw, y: hh, z: 0.0 },
        ]
        .map(|p| p.rotate_x(rx).rotate_y(ry));

        let focal = 4.0;
        let base_scale =
            f64::from(vh) * 0.55 * self.interaction.zoom.current;
        let cx = f64::from(vw) / 2.0 + self.interaction.position_x.current;
        let cy = f64::from(vh) / 2.0 + self.interaction.position_y.current;

        let screen: [(f64, f64); 4] = corners.map(|p| {
            let persp = focal / (focal - p.z);
            (cx + p.x * base_scale * persp, cy + p.y * base_scale * persp)
        });

        let uv = if flip_u {
            [(1.0, 0.0), (0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
        } else {
            [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        };

        for (a, b, c) in [(0, 1, 2), (0, 2, 3)] {
            fill_textured_tri(
                &mut data,
                vw,
                vh,
                [screen[a], screen[b], screen[c]],
                [uv[a], uv[b], uv[c]],
                tex,
            );
        }

        Ok(FrameRgba {
            width: vw,
            height: vh,
            data,
            premultiplied: true,
        })
    }
}

/// Barycentric fill of one textured triangle with nearest sampling.
fn fill_textured_tri(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    pts: [(f64, f64); 3],
    uvs: [(f64, f64); 3],
    tex: &FrameRgba,
) {
    let [(x0, y0), (x1, y1), (x2, y2)] = pts;
    let area = (x1 - x0) * (y2 - y0) - (x2 - x0) * (y1 - y0);
    if area.abs() < 1e-9 {
        return;
    }

    let min_x = x0.min(x1).min(x2).floor().max(0.0) as i64;
    let max_x = (x0.max(x1).max(x2).ceil() as i64).min(dst_w as i64 - 1);
    let min_y = y0.min(y1).min(y2).floor().max(0.0) as i64;
    let max_y = (y0.max(y1).max(y2).ceil() as i64).min(dst_h as i64 - 1);

    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let fx = px as f64 + 0.5;
            let fy = py as f64 + 0.5;
            let w0 = ((x1 - fx) * (y2 - fy) - (x2 - fx) * (y1 - fy)) / area;
            let w1 = ((x2 - fx) * (y0 - fy) - (x0 - fx) * (y2 - fy)) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let u = (w0 * uvs[0].0 + w1 * uvs[1].0 + w2 * uvs[2].0) as f32;
            let v = (w0 * uvs[0].1 + w1 * uvs[1].1 + w2 * uvs[2].1) as f32;
            let src = composite::sample_nearest(&tex.data, tex.width, tex.height, u, v);
            let di = ((py * dst_w as i64 + px) * 4) as usize;
            let out = composite::over(
                [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]],
                src,
                1.0,
            );
            dst[di..di + 4].copy_from_slice(&out);
        }
    }
}
