//! Face plan compilation: turns a resolved [`CardLayout`] into a z-ordered
//! list of typed draw ops at a caller-chosen pixel scale. The 2D preview,
//! the 3D textures, and the export all rasterize these plans, so layout
//! decisions live here exactly once.

use kurbo::{Point, Rect};

use crate::template::{
    CardLayout, Face, FaceSide, IdentityMark, Region, Rgba, Theme,
};

/// Card faces are 1.75:1. Reference raster at scale 1.0.
pub const BASE_FACE_WIDTH: f64 = 1050.0;
pub const BASE_FACE_HEIGHT: f64 = 600.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

#[derive(Clone, Debug)]
pub struct TextOp {
    pub content: String,
    pub size_px: f32,
    pub color: Rgba,
    /// Top-left anchor for `Left`, horizontal midpoint for `Center`.
    pub origin: Point,
    pub max_width: Option<f64>,
    pub align: TextAlign,
    pub font_stack: &'static str,
}

#[derive(Clone, Debug)]
pub enum DrawOp {
    Rect {
        rect: Rect,
        color: Rgba,
        z: i32,
    },
    Circle {
        center: Point,
        radius: f64,
        color: Rgba,
        z: i32,
    },
    Text {
        op: TextOp,
        z: i32,
    },
    /// Photo cover-cropped into a circle, ring stroked afterwards. The
    /// fallback glyph is drawn instead when the payload fails to decode.
    PhotoDisc {
        data_uri: String,
        center: Point,
        radius: f64,
        ring_width: f64,
        ring_color: Rgba,
        z: i32,
        fallback_glyph: char,
        fallback_color: Rgba,
    },
    /// Logo drawn contain-fit into `rect`; same decode fallback as the photo.
    Logo {
        data_uri: String,
        rect: Rect,
        z: i32,
        fallback_glyph: char,
        fallback_color: Rgba,
    },
    QrCode {
        payload: String,
        rect: Rect,
        dark: Rgba,
        light: Rgba,
        z: i32,
    },
}

impl DrawOp {
    pub fn z(&self) -> i32 {
        match self {
            Self::Rect { z, .. }
            | Self::Circle { z, .. }
            | Self::Text { z, .. }
            | Self::PhotoDisc { z, .. }
            | Self::Logo { z, .. }
            | Self::QrCode { z, .. } => *z,
        }
    }
}

/// Back-face content selector: previews keep the interactive layout, the
/// export replaces it with a share prompt plus QR code.
#[derive(Clone, Debug, Default)]
pub enum BackVariant {
    #[default]
    Interactive,
    ShareQr {
        payload: String,
        prompt: String,
    },
}

#[derive(Clone, Debug)]
pub struct PlanOptions {
    /// Pixel scale applied to all geometry (1.0 = 1050x600).
    pub scale: f64,
    /// Extra multiplier on text sizes only; the export uses ~2.5x so text
    /// stays legible on a phone screen.
    pub text_scale: f64,
    pub back: BackVariant,
    /// Optional photo drawn on the front face (not a layout region: the
    /// template only decides the identity mark, the photo rides alongside).
    pub photo: Option<String>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            text_scale: 1.0,
            back: BackVariant::Interactive,
            photo: None,
        }
    }
}

/// One face, ready to rasterize.
#[derive(Clone, Debug)]
pub struct FacePlan {
    pub width: u32,
    pub height: u32,
    /// Opaque face color the rasterizer clears to before executing ops. Kept
    /// out of the op list so every pixel starts exactly at this value instead
    /// of picking up antialiased edges from a full-frame rect fill.
    pub background: Rgba,
    pub ops: Vec<DrawOp>,
}

// z bands: decor 10..20, watermark 20..30, images 30..40, text 40..60,
// foreground accents 60+. The face background clears the pixmap, not an op.
const Z_DECOR: i32 = 10;
const Z_WATERMARK: i32 = 20;
const Z_IMAGE: i32 = 30;
const Z_TEXT: i32 = 40;

struct PlanBuilder<'a> {
    theme: &'a Theme,
    scale: f64,
    text_scale: f64,
    ops: Vec<DrawOp>,
}

impl<'a> PlanBuilder<'a> {
    fn new(theme: &'a Theme, opts: &PlanOptions) -> Self {
        Self {
            theme,
            scale: opts.scale,
            text_scale: opts.text_scale,
            ops: Vec::new(),
        }
    }

    fn sx(&self, v: f64) -> f64 {
        v * self.scale
    }

    fn pt(&self, x: f64, y: f64) -> Point {
        Point::new(self.sx(x), self.sx(y))
    }

    fn rect(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect::new(self.sx(x0), self.sx(y0), self.sx(x1), self.sx(y1))
    }

    fn push_rect(&mut self, rect: Rect, color: Rgba, z: i32) {
        self.ops.push(DrawOp::Rect { rect, color, z });
    }

    fn push_text(&mut self, op: TextOp, z: i32) {
        self.ops.push(DrawOp::Text { op, z });
    }

    fn text(
        &self,
        content: impl Into<String>,
        size: f64,
        color: Rgba,
        origin: Point,
        align: TextAlign,
    ) -> TextOp {
        TextOp {
            content: content.into(),
            size_px: (size * self.scale * self.text_scale) as f32,
            color,
            origin,
            max_width: Some(self.sx(BASE_FACE_WIDTH) * 0.9),
            align,
            font_stack: self.theme.font_stack,
        }
    }

    /// The relief effect: dark copy down-right, light copy up-left, crisp
    /// layer last. Multi-pass draws, deliberately not a shadow filter.
    fn push_embossed(&mut self, op: TextOp, z: i32) {
        let off = (2.0 * self.scale).max(1.0);
        let mut dark = op.clone();
        dark.color = self.theme.emboss_dark;
        dark.origin = Point::new(op.origin.x + off, op.origin.y + off);
        self.push_text(dark, z);

        let mut light = op.clone();
        light.color = self.theme.emboss_light;
        light.origin = Point::new(op.origin.x - off, op.origin.y - off);
        self.push_text(light, z + 1);

        self.push_text(op, z + 2);
    }

    fn face_background(&mut self, side: FaceSide) -> Rgba {
        let bg = match side {
            FaceSide::Front => self.theme.face_bg,
            FaceSide::Back => self.theme.face_bg_back,
        };
        // Thin accent frame, four strips inset from the edge.
        let inset = 18.0;
        let w = 3.0;
        let frame = self.theme.accent.with_alpha(110);
        self.push_rect(
            self.rect(inset, inset, BASE_FACE_WIDTH - inset, inset + w),
            frame,
            Z_DECOR,
        );
        self.push_rect(
            self.rect(
                inset,
                BASE_FACE_HEIGHT - inset - w,
                BASE_FACE_WIDTH - inset,
                BASE_FACE_HEIGHT - inset,
            ),
            frame,
            Z_DECOR,
        );
        self.push_rect(
            self.rect(inset, inset, inset + w, BASE_FACE_HEIGHT - inset),
            frame,
            Z_DECOR,
        );
        self.push_rect(
            self.rect(
                BASE_FACE_WIDTH - inset - w,
                inset,
                BASE_FACE_WIDTH - inset,
                BASE_FACE_HEIGHT - inset,
            ),
            frame,
            Z_DECOR,
        );
        bg
    }

    fn region_header(&mut self, company: &str) {
        let op = self.text(
            company,
            30.0,
            self.theme.text_secondary,
            self.pt(BASE_FACE_WIDTH / 2.0, 48.0),
            TextAlign::Center,
        );
        self.push_text(op, Z_TEXT);
        // Short accent underline below the company banner.
        self.push_rect(
            self.rect(
                BASE_FACE_WIDTH / 2.0 - 60.0,
                96.0,
                BASE_FACE_WIDTH / 2.0 + 60.0,
                100.0,
            ),
            self.theme.accent,
            Z_DECOR,
        );
    }

    fn region_identity(&mut self, mark: &IdentityMark, photo: Option<&str>, fallback: char) {
        let center = self.pt(BASE_FACE_WIDTH / 2.0, 255.0);
        let radius = self.sx(105.0);

        if let Some(uri) = photo {
            self.ops.push(DrawOp::PhotoDisc {
                data_uri: uri.to_string(),
                center,
                radius,
                ring_width: self.sx(5.0),
                ring_color: self.theme.accent,
                z: Z_IMAGE,
                fallback_glyph: fallback,
                fallback_color: self.theme.accent,
            });
            return;
        }

        match mark {
            IdentityMark::Logo { data_uri } => {
                self.ops.push(DrawOp::Logo {
                    data_uri: data_uri.clone(),
                    rect: self.rect(
                        BASE_FACE_WIDTH / 2.0 - 105.0,
                        150.0,
                        BASE_FACE_WIDTH / 2.0 + 105.0,
                        360.0,
                    ),
                    z: Z_IMAGE,
                    fallback_glyph: fallback,
                    fallback_color: self.theme.accent,
                });
            }
            IdentityMark::Glyph { ch } => {
                // Disc plus a pattern of faint repeated glyphs behind the
                // embossed initial.
                self.ops.push(DrawOp::Circle {
                    center,
                    radius,
                    color: self.theme.accent.with_alpha(28),
                    z: Z_DECOR,
                });
                let watermark = self.theme.text_primary.with_alpha(16);
                for (dx, dy) in [(-55.0, -40.0), (45.0, -55.0), (-40.0, 55.0), (55.0, 45.0)] {
                    let op = self.text(
                        ch.to_string(),
                        44.0,
                        watermark,
                        self.pt(BASE_FACE_WIDTH / 2.0 + dx, 255.0 + dy - 22.0),
                        TextAlign::Center,
                    );
                    self.push_text(op, Z_WATERMARK);
                }
                let glyph = self.text(
                    ch.to_string(),
                    120.0,
                    self.theme.accent,
                    self.pt(BASE_FACE_WIDTH / 2.0, 255.0 - 70.0),
                    TextAlign::Center,
                );
                self.push_embossed(glyph, Z_TEXT);
            }
        }
    }

    fn region_name_title(&mut self, name: &str, title: &str) {
        let name_op = self.text(
            name,
            56.0,
            self.theme.text_primary,
            self.pt(BASE_FACE_WIDTH / 2.0, 408.0),
            TextAlign::Center,
        );
        self.push_embossed(name_op, Z_TEXT + 3);

        let title_op = self.text(
            title,
            30.0,
            self.theme.text_secondary,
            self.pt(BASE_FACE_WIDTH / 2.0, 492.0),
            TextAlign::Center,
        );
        self.push_text(title_op, Z_TEXT);
    }

    fn region_contact(&mut self, rows: &[crate::template::ContactRow; 4]) {
        let x = 80.0;
        let mut y = 84.0;
        for row in rows {
            let label = self.text(
                row.label,
                22.0,
                self.theme.accent,
                self.pt(x, y),
                TextAlign::Left,
            );
            self.push_text(label, Z_TEXT);
            let value = self.text(
                &row.value,
                30.0,
                self.theme.text_primary,
                self.pt(x, y + 28.0),
                TextAlign::Left,
            );
            self.push_text(value, Z_TEXT);
            y += 92.0;
        }
    }

    fn region_socials(&mut self, entries: &[crate::template::SocialEntry]) {
        // One line per entry, right column; stored order, never sorted.
        let x = 580.0;
        let mut y = 96.0;
        for entry in entries.iter().take(5) {
            let line = format!("{} · {}", entry.platform_name, entry.label);
            let op = self.text(
                line,
                24.0,
                self.theme.text_secondary,
                self.pt(x, y),
                TextAlign::Left,
            );
            self.push_text(op, Z_TEXT);
            y += 54.0;
        }
    }

    fn region_back_decor(&mut self, swatches: &[Rgba]) {
        let mut x = BASE_FACE_WIDTH - 70.0;
        for &color in swatches.iter().rev() {
            self.ops.push(DrawOp::Circle {
                center: self.pt(x, BASE_FACE_HEIGHT - 64.0),
                radius: self.sx(16.0),
                color,
                z: Z_DECOR + 1,
            });
            x -= 46.0;
        }
    }

    fn back_share_qr(&mut self, payload: &str, prompt: &str) {
        let op = self.text(
            prompt,
            34.0,
            self.theme.text_primary,
            self.pt(BASE_FACE_WIDTH / 2.0, 72.0),
            TextAlign::Center,
        );
        self.push_text(op, Z_TEXT);

        let half = 170.0;
        self.ops.push(DrawOp::QrCode {
            payload: payload.to_string(),
            rect: self.rect(
                BASE_FACE_WIDTH / 2.0 - half,
                150.0,
                BASE_FACE_WIDTH / 2.0 + half,
                150.0 + 2.0 * half,
            ),
            dark: Rgba::rgb(12, 12, 16),
            light: Rgba::rgb(245, 245, 245),
            z: Z_IMAGE,
        });
    }

    fn finish(mut self, width: u32, height: u32, background: Rgba) -> FacePlan {
        // Stable sort keeps push order within a band.
        self.ops.sort_by_key(DrawOp::z);
        FacePlan {
            width,
            height,
            background,
            ops: self.ops,
        }
    }
}

/// Glyph used when an image payload fails to decode at raster time: the
/// resolved name's initial, or the template fallback for a placeholder name.
fn fallback_glyph(layout: &CardLayout) -> char {
    layout
        .front
        .regions
        .iter()
        .find_map(|r| match r {
            Region::NameTitle { name, .. } if name != crate::template::PLACEHOLDER_NAME => name
                .chars()
                .next()
                .map(|c| c.to_uppercase().next().unwrap_or(c)),
            _ => None,
        })
        .unwrap_or(crate::template::FALLBACK_GLYPH)
}

/// Compile one face of `layout` into draw ops.
pub fn compile_face(layout: &CardLayout, side: FaceSide, opts: &PlanOptions) -> FacePlan {
    let theme = Theme::for_style(layout.style);
    let mut b = PlanBuilder::new(theme, opts);
    let width = (BASE_FACE_WIDTH * opts.scale).round() as u32;
    let height = (BASE_FACE_HEIGHT * opts.scale).round() as u32;

    let background = b.face_background(side);

    let face: &Face = match side {
        FaceSide::Front => &layout.front,
        FaceSide::Back => &layout.back,
    };

    let share_back = matches!(opts.back, BackVariant::ShareQr { .. }) && side == FaceSide::Back;
    let fallback = fallback_glyph(layout);

    for region in &face.regions {
        match region {
            Region::Header { company } => b.region_header(company),
            Region::IdentityMark(mark) => b.region_identity(mark, opts.photo.as_deref(), fallback),
            Region::NameTitle { name, title } => b.region_name_title(name, title),
            Region::ContactBlock { rows } if !share_back => b.region_contact(rows),
            Region::SocialBlock { entries } if !share_back => b.region_socials(entries),
            Region::BackDecor { swatches } => b.region_back_decor(swatches),
            Region::ContactBlock { .. } | Region::SocialBlock { .. } => {}
        }
    }

    if let (true, BackVariant::ShareQr { payload, prompt }) = (share_back, &opts.back) {
        b.back_share_qr(payload, prompt);
    }

    b.finish(width, height, background)
}
