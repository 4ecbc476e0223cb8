//! Premultiplied-alpha pixel helpers shared by the 3D projector and the
//! export assembler. All buffers are RGBA8 with premultiplied color.

use crate::error::{KosmaError, KosmaResult};

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Source-over an equal-size buffer in place.
pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> KosmaResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(KosmaError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Source-over `src` onto a sub-rectangle of `dst` at (`x`, `y`). Pixels
/// falling outside `dst` are clipped.
pub fn blit_over(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    x: i64,
    y: i64,
) -> KosmaResult<()> {
    if dst.len() != (dst_w as usize) * (dst_h as usize) * 4 {
        return Err(KosmaError::render("blit_over dst buffer shape mismatch"));
    }
    if src.len() != (src_w as usize) * (src_h as usize) * 4 {
        return Err(KosmaError::render("blit_over src buffer shape mismatch"));
    }

    for sy in 0..src_h as i64 {
        let dy = y + sy;
        if dy < 0 || dy >= dst_h as i64 {
            continue;
        }
        for sx in 0..src_w as i64 {
            let dx = x + sx;
            if dx < 0 || dx >= dst_w as i64 {
                continue;
            }
            let si = ((sy * src_w as i64 + sx) * 4) as usize;
            let di = ((dy * dst_w as i64 + dx) * 4) as usize;
            let out = over(
                [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]],
                [src[si], src[si + 1], src[si + 2], src[si + 3]],
                1.0,
            );
            dst[di..di + 4].copy_from_slice(&out);
        }
    }
    Ok(())
}

pub fn premul_px(r: u8, g: u8, b: u8, a: u8) -> PremulRgba8 {
    [
        mul_div255(u16::from(r), u16::from(a)),
        mul_div255(u16::from(g), u16::from(a)),
        mul_div255(u16::from(b), u16::from(a)),
        a,
    ]
}

/// Convert a straight-alpha RGBA8 buffer to premultiplied in place.
pub fn premultiply_in_place(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(4) {
        let out = premul_px(px[0], px[1], px[2], px[3]);
        px.copy_from_slice(&out);
    }
}

/// Nearest-neighbor sample at normalized (u, v) in [0, 1].
pub fn sample_nearest(src: &[u8], w: u32, h: u32, u: f32, v: f32) -> PremulRgba8 {
    let x = ((u * w as f32) as i64).clamp(0, w as i64 - 1);
    let y = ((v * h as f32) as i64).clamp(0, h as i64 - 1);
    let i = ((y * w as i64 + x) * 4) as usize;
    [src[i], src[i + 1], src[i + 2], src[i + 3]]
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_opacity_0_is_noop() {
        let dst = [1, 2, 3, 4];
        let src = [200, 200, 200, 200];
        assert_eq!(over(dst, src, 0.0), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn over_dst_transparent_returns_src() {
        let dst = [0, 0, 0, 0];
        let src = [100, 110, 120, 200];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn blit_clips_outside_destination() {
        let mut dst = vec![0u8; 4 * 4]; // 2x2
        let src = vec![255u8; 4]; // 1x1 opaque white
        blit_over(&mut dst, 2, 2, &src, 1, 1, -5, -5).unwrap();
        assert!(dst.iter().all(|&b| b == 0));

        blit_over(&mut dst, 2, 2, &src, 1, 1, 1, 1).unwrap();
        assert_eq!(&dst[12..16], &[255, 255, 255, 255]);
    }

    #[test]
    fn blit_rejects_bad_shapes() {
        let mut dst = vec![0u8; 3];
        assert!(blit_over(&mut dst, 2, 2, &[0; 4], 1, 1, 0, 0).is_err());
    }

    #[test]
    fn premultiply_scales_color_channels() {
        assert_eq!(premul_px(255, 255, 255, 0), [0, 0, 0, 0]);
        assert_eq!(premul_px(255, 255, 255, 255), [255, 255, 255, 255]);
        let half = premul_px(200, 100, 0, 128);
        assert_eq!(half[3], 128);
        assert!(half[0] > 98 && half[0] < 103);
    }

    #[test]
    fn sample_clamps_to_edges() {
        // 2x1: left red, right green.
        let src = [255, 0, 0, 255, 0, 255, 0, 255];
        assert_eq!(sample_nearest(&src, 2, 1, -1.0, 0.0), [255, 0, 0, 255]);
        assert_eq!(sample_nearest(&src, 2, 1, 2.0, 0.0), [0, 255, 0, 255]);
    }
}
