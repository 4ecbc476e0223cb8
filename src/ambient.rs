//! Ambient page background: a field of slow diagonal streaks drifting
//! behind the card. The field is seeded, so a given seed always produces
//! the same motion; `tick` advances purely on elapsed time.

use kurbo::{BezPath, Point, Vec2};
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

use crate::composite;
use crate::error::{KosmaError, KosmaResult};
use crate::raster::{FrameRgba, bezpath_to_cpu, clear_pixmap, color_to_cpu};
use crate::template::{Rgba, Theme};

/// Streak count scales with area; this many per million pixels.
const STREAKS_PER_MPX: f64 = 90.0;
/// Drift direction, roughly down-right.
const DRIFT: Vec2 = Vec2::new(0.55, 1.0);

#[derive(Clone, Copy, Debug)]
struct Streak {
    pos: Point,
    len: f64,
    thickness: f64,
    speed: f64,
    color: Rgba,
}

/// The animated field. `tick` then `render` each frame; rendering is a
/// pure function of the current streak positions.
pub struct AmbientField {
    width: u32,
    height: u32,
    streaks: Vec<Streak>,
    background: Rgba,
}

impl AmbientField {
    pub fn new(width: u32, height: u32, seed: u64, theme: &Theme) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let area_mpx = f64::from(width) * f64::from(height) / 1.0e6;
        let count = (STREAKS_PER_MPX * area_mpx).ceil().max(8.0) as usize;

        // Hues rotate through the theme palette, accent most common.
        let palette = [theme.accent, theme.swatches[0], theme.swatches[1], theme.accent];
        let streaks = (0..count)
            .map(|_| {
                let hue = palette[rng.random_range(0..palette.len())];
                Streak {
                    pos: Point::new(
                        rng.random_range(-0.2..1.2) * f64::from(width),
                        rng.random_range(-0.2..1.2) * f64::from(height),
                    ),
                    len: rng.random_range(40.0..180.0),
                    thickness: rng.random_range(1.0..2.5),
                    speed: rng.random_range(8.0..30.0),
                    color: hue.with_alpha(rng.random_range(14..48)),
                }
            })
            .collect();

        Self {
            width,
            height,
            streaks,
            background: theme.face_bg_back,
        }
    }

    /// Advance the field by `dt_s` seconds. Streaks wrap with a margin so
    /// they re-enter fully off-screen.
    pub fn tick(&mut self, dt_s: f64) {
        let margin = 200.0;
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        let dir = DRIFT / DRIFT.hypot();
        for s in &mut self.streaks {
            s.pos += dir * (s.speed * dt_s);
            if s.pos.x > w + margin {
                s.pos.x -= w + 2.0 * margin;
            }
            if s.pos.y > h + margin {
                s.pos.y -= h + 2.0 * margin;
            }
        }
    }

    /// Rasterize the current frame.
    pub fn render(&self) -> KosmaResult<FrameRgba> {
        let width: u16 = self
            .width
            .try_into()
            .map_err(|_| KosmaError::render("ambient width exceeds u16"))?;
        let height: u16 = self
            .height
            .try_into()
            .map_err(|_| KosmaError::render("ambient height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        let dir = DRIFT / DRIFT.hypot();
        let normal = Vec2::new(-dir.y, dir.x);
        for s in &self.streaks {
            ctx.set_paint(color_to_cpu(s.color));
            ctx.fill_path(&bezpath_to_cpu(&streak_quad(s, dir, normal)));
        }
        ctx.flush();

        // The page tone fills every pixel via a clear, not a rect fill, so
        // the frame edges stay fully opaque.
        let bg = self.background;
        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        clear_pixmap(&mut pixmap, composite::premul_px(bg.r, bg.g, bg.b, bg.a));
        ctx.render_to_pixmap(&mut pixmap);
        Ok(FrameRgba {
            width: self.width,
            height: self.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

/// A streak is a thin quad along the drift direction.
fn streak_quad(s: &Streak, dir: Vec2, normal: Vec2) -> BezPath {
    let half = normal * (s.thickness / 2.0);
    let tail = s.pos - dir * s.len;
    let mut path = BezPath::new();
    path.move_to(s.pos + half);
    path.line_to(s.pos - half);
    path.line_to(tail - half);
    path.line_to(tail + half);
    path.close_path();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CardStyle;

    fn field(seed: u64) -> AmbientField {
        AmbientField::new(320, 200, seed, Theme::for_style(CardStyle::Kosma))
    }

    #[test]
    fn same_seed_same_field() {
        let mut a = field(7);
        let mut b = field(7);
        for _ in 0..30 {
            a.tick(1.0 / 60.0);
            b.tick(1.0 / 60.0);
        }
        assert_eq!(a.render().unwrap().data, b.render().unwrap().data);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = field(1).render().unwrap();
        let b = field(2).render().unwrap();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn tick_moves_the_field() {
        let mut f = field(3);
        let before = f.render().unwrap();
        f.tick(2.0);
        let after = f.render().unwrap();
        assert_ne!(before.data, after.data);
    }

    #[test]
    fn frame_is_fully_opaque() {
        let frame = field(5).render().unwrap();
        assert_eq!((frame.width, frame.height), (320, 200));
        assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
    }
}
