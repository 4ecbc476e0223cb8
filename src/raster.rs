//! CPU rasterization of face plans via `vello_cpu`, with `parley` text
//! shaping against the system font collection.

use std::collections::HashMap;

use kurbo::{Affine, Circle, Point, Shape as _};
use tracing::warn;

use crate::{
    composite,
    error::{KosmaError, KosmaResult},
    model::{DecodedImage, decode_data_uri},
    plan::{DrawOp, FacePlan, TextAlign, TextOp},
    template::Rgba,
};

/// One rasterized frame: premultiplied RGBA8, row-major.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRgba {
    /// Straight-alpha copy of the pixel data (for `image` encoders).
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        if !self.premultiplied {
            return self.data.clone();
        }
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a == 0 || a == 255 {
                continue;
            }
            for c in px.iter_mut().take(3) {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Parley shaping contexts plus the laid-out result cache inputs. One engine
/// per rasterizer; contexts are reused across draws as parley intends.
pub struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl Default for TextEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out a single styled run against a family stack string
    /// (e.g. "Georgia, serif").
    pub fn layout_plain(
        &mut self,
        text: &str,
        font_stack: &str,
        size_px: f32,
        brush: TextBrush,
        max_width_px: Option<f32>,
    ) -> KosmaResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(KosmaError::validation("text size_px must be finite and > 0"));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(font_stack.to_string())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(max_width_px);
        layout.align(
            max_width_px,
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );
        Ok(layout)
    }
}

/// Executes [`FacePlan`]s on a `vello_cpu` render context. Owns decoded
/// image and font caches so repeated renders of the same card are cheap.
pub struct FaceRasterizer {
    text: TextEngine,
    image_cache: HashMap<String, vello_cpu::Image>,
    font_cache: HashMap<u64, vello_cpu::peniko::FontData>,
}

impl Default for FaceRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceRasterizer {
    pub fn new() -> Self {
        Self {
            text: TextEngine::new(),
            image_cache: HashMap::new(),
            font_cache: HashMap::new(),
        }
    }

    /// Drop cached decoded images (called when the underlying card data
    /// changes so stale photo/logo pixels cannot survive).
    pub fn invalidate_images(&mut self) {
        self.image_cache.clear();
    }

    pub fn render(&mut self, plan: &FacePlan) -> KosmaResult<FrameRgba> {
        let width: u16 = plan
            .width
            .try_into()
            .map_err(|_| KosmaError::render("face width exceeds u16"))?;
        let height: u16 = plan
            .height
            .try_into()
            .map_err(|_| KosmaError::render("face height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        for op in &plan.ops {
            self.draw_op(&mut ctx, op)?;
        }
        ctx.flush();

        // Clear to the face color before compositing ops so every pixel of
        // the frame starts exactly at the background, edges included.
        let bg = plan.background;
        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        clear_pixmap(&mut pixmap, composite::premul_px(bg.r, bg.g, bg.b, bg.a));
        ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRgba {
            width: plan.width,
            height: plan.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_op(&mut self, ctx: &mut vello_cpu::RenderContext, op: &DrawOp) -> KosmaResult<()> {
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        match op {
            DrawOp::Rect { rect, color, .. } => {
                ctx.set_paint(color_to_cpu(*color));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    rect.x0, rect.y0, rect.x1, rect.y1,
                ));
                Ok(())
            }
            DrawOp::Circle {
                center,
                radius,
                color,
                ..
            } => {
                ctx.set_paint(color_to_cpu(*color));
                let path = Circle::new(*center, *radius).to_path(0.1);
                ctx.fill_path(&bezpath_to_cpu(&path));
                Ok(())
            }
            DrawOp::Text { op, .. } => self.draw_text(ctx, op),
            DrawOp::PhotoDisc {
                data_uri,
                center,
                radius,
                ring_width,
                ring_color,
                z: _,
                fallback_glyph,
                fallback_color,
            } => {
                match self.image_paint_for(data_uri) {
                    Ok(paint) => {
                        self.draw_photo_disc(ctx, &paint, *center, *radius)?;
                        draw_ring(ctx, *center, *radius, *ring_width, *ring_color);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "photo decode failed; falling back to glyph mark");
                        self.draw_glyph_fallback(ctx, *center, *radius, *fallback_glyph, *fallback_color)
                    }
                }
            }
            DrawOp::Logo {
                data_uri,
                rect,
                z: _,
                fallback_glyph,
                fallback_color,
            } => match self.image_paint_for(data_uri) {
                Ok(paint) => draw_logo_contained(ctx, &paint, rect),
                Err(e) => {
                    warn!(error = %e, "logo decode failed; falling back to glyph mark");
                    let center = Point::new(rect.center().x, rect.center().y);
                    let radius = rect.width().min(rect.height()) / 2.0;
                    self.draw_glyph_fallback(ctx, center, radius, *fallback_glyph, *fallback_color)
                }
            },
            DrawOp::QrCode {
                payload,
                rect,
                dark,
                light,
                ..
            } => draw_qr(ctx, payload, rect, *dark, *light),
        }
    }

    fn draw_text(&mut self, ctx: &mut vello_cpu::RenderContext, op: &TextOp) -> KosmaResult<()> {
        let brush = TextBrush {
            r: op.color.r,
            g: op.color.g,
            b: op.color.b,
            a: op.color.a,
        };
        let layout = self.text.layout_plain(
            &op.content,
            op.font_stack,
            op.size_px,
            brush,
            op.max_width.map(|w| w as f32),
        )?;

        let origin_x = match op.align {
            TextAlign::Left => op.origin.x,
            TextAlign::Center => op.origin.x - f64::from(layout.width()) / 2.0,
        };
        ctx.set_transform(affine_to_cpu(Affine::translate((origin_x, op.origin.y))));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));

                // Bridge the parley-resolved font into vello_cpu's peniko
                // types; cached by blob identity so bytes clone once.
                let run_font = run.run().font();
                let key = run_font.data.id();
                let font = match self.font_cache.get(&key) {
                    Some(cached) => cached.clone(),
                    None => {
                        let data = vello_cpu::peniko::FontData::new(
                            vello_cpu::peniko::Blob::from(run_font.data.as_ref().to_vec()),
                            run_font.index,
                        );
                        self.font_cache.insert(key, data.clone());
                        data
                    }
                };
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }

    fn image_paint_for(&mut self, data_uri: &str) -> KosmaResult<vello_cpu::Image> {
        if let Some(paint) = self.image_cache.get(data_uri) {
            return Ok(paint.clone());
        }
        let decoded = decode_data_uri(data_uri)?;
        let paint = decoded_to_paint(&decoded)?;
        self.image_cache.insert(data_uri.to_string(), paint.clone());
        Ok(paint)
    }

    /// Cover-crop the photo into a circle: scale so the image covers the
    /// disc's bounding square, then fill the disc path with the image paint.
    fn draw_photo_disc(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        paint: &vello_cpu::Image,
        center: Point,
        radius: f64,
    ) -> KosmaResult<()> {
        let (w, h) = image_paint_size(paint)?;
        let d = radius * 2.0;
        let s = (d / w).max(d / h);

        let local = Affine::translate((center.x - s * w / 2.0, center.y - s * h / 2.0))
            * Affine::scale(s);
        ctx.set_transform(affine_to_cpu(local));
        ctx.set_paint(paint.clone());

        // Disc in image-local coordinates; content outside it is cropped.
        let local_center = Point::new(w / 2.0, h / 2.0);
        let path = Circle::new(local_center, radius / s).to_path(0.1);
        ctx.fill_path(&bezpath_to_cpu(&path));
        Ok(())
    }

    fn draw_glyph_fallback(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        center: Point,
        radius: f64,
        glyph: char,
        color: Rgba,
    ) -> KosmaResult<()> {
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(color_to_cpu(color.with_alpha(28)));
        let disc = Circle::new(center, radius).to_path(0.1);
        ctx.fill_path(&bezpath_to_cpu(&disc));

        let size = (radius * 1.1) as f32;
        self.draw_text(
            ctx,
            &TextOp {
                content: glyph.to_string(),
                size_px: size,
                color,
                origin: Point::new(center.x, center.y - f64::from(size) * 0.62),
                max_width: None,
                align: TextAlign::Center,
                font_stack: "sans-serif",
            },
        )
    }
}

fn draw_logo_contained(
    ctx: &mut vello_cpu::RenderContext,
    paint: &vello_cpu::Image,
    rect: &kurbo::Rect,
) -> KosmaResult<()> {
    let (w, h) = image_paint_size(paint)?;
    let s = (rect.width() / w).min(rect.height() / h);
    let x = rect.x0 + (rect.width() - s * w) / 2.0;
    let y = rect.y0 + (rect.height() - s * h) / 2.0;

    ctx.set_transform(affine_to_cpu(Affine::translate((x, y)) * Affine::scale(s)));
    ctx.set_paint(paint.clone());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
    Ok(())
}

/// Ring stroked around the photo disc: an annulus built from the outer
/// circle plus the reversed inner circle, filled non-zero.
fn draw_ring(
    ctx: &mut vello_cpu::RenderContext,
    center: Point,
    radius: f64,
    width: f64,
    color: Rgba,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(color_to_cpu(color));

    let mut annulus = Circle::new(center, radius + width).to_path(0.1);
    let inner = Circle::new(center, radius).to_path(0.1).reverse_subpaths();
    annulus.extend(inner.elements().iter().copied());
    ctx.fill_path(&bezpath_to_cpu(&annulus));
}

fn draw_qr(
    ctx: &mut vello_cpu::RenderContext,
    payload: &str,
    rect: &kurbo::Rect,
    dark: Rgba,
    light: Rgba,
) -> KosmaResult<()> {
    let code = qrcode::QrCode::with_error_correction_level(payload.as_bytes(), qrcode::EcLevel::M)
        .map_err(|e| KosmaError::render(format!("qr encode: {e}")))?;
    let modules = code.width();
    let colors = code.to_colors();

    // 4-module quiet zone on every side.
    let quiet = 4usize;
    let total = modules + 2 * quiet;
    let cell = rect.width().min(rect.height()) / total as f64;

    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(color_to_cpu(light));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        rect.x0, rect.y0, rect.x1, rect.y1,
    ));

    ctx.set_paint(color_to_cpu(dark));
    for (i, c) in colors.iter().enumerate() {
        if *c != qrcode::Color::Dark {
            continue;
        }
        let mx = i % modules;
        let my = i / modules;
        let x0 = rect.x0 + (quiet + mx) as f64 * cell;
        let y0 = rect.y0 + (quiet + my) as f64 * cell;
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(x0, y0, x0 + cell, y0 + cell));
    }
    Ok(())
}

fn decoded_to_paint(img: &DecodedImage) -> KosmaResult<vello_cpu::Image> {
    let w: u16 = img
        .width
        .try_into()
        .map_err(|_| KosmaError::render("image width exceeds u16"))?;
    let h: u16 = img
        .height
        .try_into()
        .map_err(|_| KosmaError::render("image height exceeds u16"))?;
    if img.rgba8.len() != img.width as usize * img.height as usize * 4 {
        return Err(KosmaError::render("decoded image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(img.width as usize * img.height as usize);
    for px in img.rgba8.chunks_exact(4) {
        let p = composite::premul_px(px[0], px[1], px[2], px[3]);
        may_have_opacities |= p[3] != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: p[0],
            g: p[1],
            b: p[2],
            a: p[3],
        });
    }

    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(
            vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities),
        )),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn image_paint_size(image: &vello_cpu::Image) -> KosmaResult<(f64, f64)> {
    match &image.image {
        vello_cpu::ImageSource::Pixmap(p) => Ok((f64::from(p.width()), f64::from(p.height()))),
        vello_cpu::ImageSource::OpaqueId(_) => Err(KosmaError::render(
            "cpu rasterizer does not support opaque image ids",
        )),
    }
}

pub(crate) fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

pub(crate) fn color_to_cpu(c: Rgba) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

pub(crate) fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Card, CardStyle};
    use crate::plan::{BackVariant, PlanOptions, compile_face};
    use crate::template::{FaceSide, resolve_layout};

    fn render_face(card: &Card, side: FaceSide, opts: &PlanOptions) -> FrameRgba {
        let layout = resolve_layout(card, card.style);
        let plan = compile_face(&layout, side, opts);
        FaceRasterizer::new().render(&plan).unwrap()
    }

    #[test]
    fn empty_card_front_renders_opaque_frame() {
        let frame = render_face(
            &Card::empty(),
            FaceSide::Front,
            &PlanOptions {
                scale: 0.25,
                ..PlanOptions::default()
            },
        );
        assert_eq!((frame.width, frame.height), (263, 150));
        assert!(frame.premultiplied);
        // Background clear makes every pixel opaque, edges included.
        assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn qr_back_renders_dark_and_light_cells() {
        let mut card = Card::empty();
        card.style = CardStyle::Techno;
        let frame = render_face(
            &card,
            FaceSide::Back,
            &PlanOptions {
                scale: 0.5,
                back: BackVariant::ShareQr {
                    payload: "https://example.test/c/abc?data=xyz".to_string(),
                    prompt: "Scan to save".to_string(),
                },
                ..PlanOptions::default()
            },
        );
        let has_light = frame
            .data
            .chunks_exact(4)
            .any(|px| px[0] > 230 && px[1] > 230 && px[2] > 230);
        let has_dark = frame
            .data
            .chunks_exact(4)
            .any(|px| px[0] < 20 && px[1] < 20 && px[2] < 20 && px[3] == 255);
        assert!(has_light && has_dark);
    }

    #[test]
    fn bad_photo_uri_still_renders() {
        let mut card = Card::empty();
        card.name = "Ada".to_string();
        card.photo = Some("data:image/png;base64,notbase64!!".to_string());
        // Decode failure inside the disc op must fall back, not error.
        let frame = render_face(
            &card,
            FaceSide::Front,
            &PlanOptions {
                scale: 0.25,
                photo: card.photo.clone(),
                ..PlanOptions::default()
            },
        );
        assert_eq!(frame.width, 263);
    }

    #[test]
    fn oversized_plan_is_rejected() {
        let layout = resolve_layout(&Card::empty(), CardStyle::Kosma);
        let plan = compile_face(
            &layout,
            FaceSide::Front,
            &PlanOptions {
                scale: 80.0,
                ..PlanOptions::default()
            },
        );
        assert!(FaceRasterizer::new().render(&plan).is_err());
    }

    #[test]
    fn text_engine_rejects_bad_sizes() {
        let mut engine = TextEngine::new();
        assert!(
            engine
                .layout_plain("hi", "sans-serif", 0.0, TextBrush::default(), None)
                .is_err()
        );
        assert!(
            engine
                .layout_plain("hi", "sans-serif", f32::NAN, TextBrush::default(), None)
                .is_err()
        );
    }
}
