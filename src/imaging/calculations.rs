//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Top-left offset of a centered `target` crop inside `filled`.
pub fn center_crop_offset(filled: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    (
        filled.0.saturating_sub(target.0) / 2,
        filled.1.saturating_sub(target.1) / 2,
    )
}

/// Scale native dimensions by `ratio`, flooring each edge.
///
/// A ratio of `1.0` (or more) means "original size" and maps to the `(0, 0)`
/// full-size request.
pub fn scaled_dimensions(native: (u32, u32), ratio: f64) -> (u32, u32) {
    if ratio >= 1.0 {
        return (0, 0);
    }
    (
        (native.0 as f64 * ratio).floor() as u32,
        (native.1 as f64 * ratio).floor() as u32,
    )
}

/// Square thumbnail edges at 1×, 1.5× and 2× the base size.
pub fn thumbnail_sizes(base: u32) -> [u32; 3] {
    [base, base * 3 / 2, base * 2]
}

/// Every `(width, height)` request needed to pre-warm one photo, in order:
/// the scaled main images followed by the square thumbnails.
pub fn prewarm_plan(native: (u32, u32), ratios: &[f64], thumbs: [u32; 3]) -> Vec<(u32, u32)> {
    ratios
        .iter()
        .map(|&ratio| scaled_dimensions(native, ratio))
        .chain(thumbs.iter().map(|&edge| (edge, edge)))
        .collect()
}
