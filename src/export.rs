//! Artifact export: a vCard 3.0 contact file and a phone-sized PNG that
//! stacks both card faces over the brand page, the back face carrying a
//! share QR instead of the interactive hints.

use std::io::Cursor;

use image::ImageEncoder as _;
use tracing::info;

use crate::{
    composite,
    error::{KosmaError, KosmaResult},
    model::{Card, Platform},
    plan::{
        BASE_FACE_WIDTH, BackVariant, DrawOp, FacePlan, PlanOptions, TextAlign, TextOp,
        compile_face,
    },
    raster::FaceRasterizer,
    template::{Theme, resolve_layout, resolve_profile_url},
};

/// Portrait export canvas, sized for a phone lockscreen/gallery.
pub const EXPORT_WIDTH: u32 = 1080;
pub const EXPORT_HEIGHT: u32 = 1920;
/// Text on the exported faces is enlarged so it survives the downscale to
/// a phone screen.
pub const EXPORT_TEXT_SCALE: f64 = 2.5;

const FACE_MARGIN_X: f64 = 60.0;

/// Filename stem for downloads: the card holder's name slugified, or a
/// neutral fallback when the card is still blank.
pub fn artifact_file_stem(card: &Card) -> String {
    let mut stem = String::new();
    for ch in card.name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch.to_ascii_lowercase());
        } else if (ch == ' ' || ch == '-' || ch == '_') && !stem.ends_with('-') {
            stem.push('-');
        }
    }
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "kosma-card".to_string()
    } else {
        stem.to_string()
    }
}

fn vcard_name_parts(name: &str) -> (String, String) {
    let mut words: Vec<&str> = name.split_whitespace().collect();
    match words.len() {
        0 => (String::new(), String::new()),
        1 => (String::new(), words[0].to_string()),
        _ => {
            let surname = words.pop().unwrap_or_default().to_string();
            (surname, words.join(" "))
        }
    }
}

/// Render the card as a vCard 3.0 string. Empty fields are omitted; the
/// surname is taken as the last whitespace-separated word of the name.
pub fn vcard(card: &Card) -> String {
    let mut lines: Vec<String> = vec!["BEGIN:VCARD".into(), "VERSION:3.0".into()];

    let name = card.name.trim();
    if !name.is_empty() {
        let (surname, given) = vcard_name_parts(name);
        lines.push(format!("N:{surname};{given};;;"));
        lines.push(format!("FN:{name}"));
    }
    if !card.title.trim().is_empty() {
        lines.push(format!("TITLE:{}", card.title.trim()));
    }
    if !card.company.trim().is_empty() {
        lines.push(format!("ORG:{}", card.company.trim()));
    }
    if !card.phone.trim().is_empty() {
        lines.push(format!("TEL;TYPE=CELL:{}", card.phone.trim()));
    }
    if !card.email.trim().is_empty() {
        lines.push(format!("EMAIL:{}", card.email.trim()));
    }
    if !card.website.trim().is_empty() {
        lines.push(format!("URL:{}", card.website.trim()));
    }
    if !card.address.trim().is_empty() {
        let flat = card.address.trim().replace(['\r', '\n'], ";");
        lines.push(format!("ADR;TYPE=WORK:;;{flat};;;;"));
    }
    for social in &card.socials {
        let type_key = match &social.platform {
            Platform::Other(name) => name.to_ascii_lowercase(),
            known => known.display_name().to_ascii_lowercase(),
        };
        let url = resolve_profile_url(&social.platform, &social.handle);
        lines.push(format!("X-SOCIALPROFILE;type={type_key}:{url}"));
    }
    if let Some(photo) = card.photo.as_deref()
        && let Some(b64) = split_data_uri(photo)
    {
        // TYPE is nominal; contact apps sniff the actual format.
        lines.push(format!("PHOTO;ENCODING=b;TYPE=JPEG:{b64}"));
    }

    lines.push("END:VCARD".into());
    lines.join("\n") + "\n"
}

/// `data:image/jpeg;base64,AAAA` -> `"AAAA"`.
fn split_data_uri(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("data:image/")?;
    let (_, rest) = rest.split_once(';')?;
    rest.strip_prefix("base64,")
}

/// Export against an origin: mints a fresh share id, builds the viewer URL
/// for this card, and bakes it into the back-face QR.
pub fn export_png_for_origin(card: &Card, origin: &str) -> KosmaResult<Vec<u8>> {
    let snapshot = crate::share::ShareSnapshot::from_card(card);
    let url = crate::share::viewer_url(origin, &crate::share::new_share_id(), &snapshot)?;
    export_png(card, &url)
}

/// Export the card as a 1080x1920 PNG: brand mark on top, then both faces
/// stacked, the back face replaced by a share QR pointing at `share_url`.
pub fn export_png(card: &Card, share_url: &str) -> KosmaResult<Vec<u8>> {
    let theme = Theme::for_style(card.style);
    let layout = resolve_layout(card, card.style);
    let scale = (f64::from(EXPORT_WIDTH) - 2.0 * FACE_MARGIN_X) / BASE_FACE_WIDTH;

    let mut raster = FaceRasterizer::new();
    let front = raster.render(&compile_face(
        &layout,
        crate::template::FaceSide::Front,
        &PlanOptions {
            scale,
            text_scale: EXPORT_TEXT_SCALE,
            back: BackVariant::Interactive,
            photo: card.photo.clone(),
        },
    ))?;
    let back = raster.render(&compile_face(
        &layout,
        crate::template::FaceSide::Back,
        &PlanOptions {
            scale,
            text_scale: EXPORT_TEXT_SCALE,
            back: BackVariant::ShareQr {
                payload: share_url.to_string(),
                prompt: "Scan to save this card".to_string(),
            },
            photo: card.photo.clone(),
        },
    ))?;
    let brand = raster.render(&brand_mark_plan(theme))?;

    // Page canvas, premultiplied, filled with the back-of-card tone.
    let bg = theme.face_bg_back;
    let page_px = composite::premul_px(bg.r, bg.g, bg.b, 255);
    let mut page = vec![0u8; EXPORT_WIDTH as usize * EXPORT_HEIGHT as usize * 4];
    for px in page.chunks_exact_mut(4) {
        px.copy_from_slice(&page_px);
    }

    let x = FACE_MARGIN_X as i64;
    let gap = 72;
    let mut y: i64 = 120;
    for frame in [&brand, &front, &back] {
        let fx = x + (i64::from(EXPORT_WIDTH) - 2 * x - i64::from(frame.width)) / 2;
        composite::blit_over(
            &mut page,
            EXPORT_WIDTH,
            EXPORT_HEIGHT,
            &frame.data,
            frame.width,
            frame.height,
            fx,
            y,
        )?;
        y += i64::from(frame.height) + gap;
    }

    let straight: Vec<u8> = page
        .chunks_exact(4)
        .flat_map(|px| {
            let [r, g, b, a] = [px[0], px[1], px[2], px[3]];
            if a == 0 || a == 255 {
                [r, g, b, a]
            } else {
                let unmul = |c: u8| ((u16::from(c) * 255) / u16::from(a)).min(255) as u8;
                [unmul(r), unmul(g), unmul(b), a]
            }
        })
        .collect();

    let mut out = Cursor::new(Vec::new());
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(
            &straight,
            EXPORT_WIDTH,
            EXPORT_HEIGHT,
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| KosmaError::export(format!("png encode failed: {e}")))?;
    info!(
        bytes = out.get_ref().len(),
        "card exported as {}x{} png", EXPORT_WIDTH, EXPORT_HEIGHT
    );
    Ok(out.into_inner())
}

/// Small wordmark strip rendered with the same text engine as the faces.
fn brand_mark_plan(theme: &Theme) -> FacePlan {
    let width = EXPORT_WIDTH - 2 * FACE_MARGIN_X as u32;
    FacePlan {
        width,
        height: 120,
        background: theme.face_bg_back,
        ops: vec![DrawOp::Text {
            op: TextOp {
                content: "K O S M A".to_string(),
                size_px: 64.0,
                color: theme.accent,
                origin: kurbo::Point::new(f64::from(width) / 2.0, 24.0),
                max_width: Some(f64::from(width)),
                align: TextAlign::Center,
                font_stack: theme.font_stack,
            },
            z: 0,
        }],
    }
}
