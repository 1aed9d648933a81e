//! Pure calculation functions for derivative dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Derived dimensions always use integer truncation of
//! `(other_dim * target) / source_dim`, so results are reproducible
//! bit-for-bit across platforms and backends.

/// Returns true when an image is "very tall": taller than 16:9 portrait.
///
/// Equivalent to `height * 9 / 16 > width` evaluated over the reals, done in
/// integers so there is no rounding at the boundary.
fn is_very_tall(width: u32, height: u32) -> bool {
    u64::from(height) * 9 > u64::from(width) * 16
}

/// `(other * target) / source`, truncated, never below one pixel and
/// saturating at `u32::MAX`.
fn proportional(other: u32, target: u32, source: u32) -> u32 {
    let scaled = (u64::from(other) * u64::from(target)) / u64::from(source);
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Constrain an image so neither side exceeds `max`, preserving aspect ratio.
///
/// Decision tree:
/// - both sides exceed `max`: a very tall image (taller than 16:9) or a
///   landscape image constrains the width; otherwise the height.
/// - only the width exceeds: constrain the width.
/// - only the height exceeds: a very tall image is left untouched so narrow
///   portraits are not shrunk into slivers; otherwise constrain the height.
/// - nothing exceeds: unchanged.
///
/// Returns `None` when either input dimension is zero.
///
/// # Examples
/// ```
/// # use photoscale::imaging::scale_down;
/// assert_eq!(scale_down(4000, 1000, 800), Some((800, 200)));
/// assert_eq!(scale_down(500, 1200, 800), Some((500, 1200)));
/// ```
pub fn scale_down(width: u32, height: u32, max: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let constrain_width = (max, proportional(height, max, width));
    let constrain_height = (proportional(width, max, height), max);

    let dims = if width > max && height > max {
        if is_very_tall(width, height) || width > height {
            constrain_width
        } else {
            constrain_height
        }
    } else if width > max {
        constrain_width
    } else if height > max {
        if is_very_tall(width, height) {
            (width, height)
        } else {
            constrain_height
        }
    } else {
        (width, height)
    };

    Some(dims)
}

/// Enlarge an image so neither side is below `min`, preserving aspect ratio.
///
/// Mirror of [`scale_down`] without the very-tall rule. Returns `None` when
/// either input dimension is zero.
pub fn scale_up(width: u32, height: u32, min: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let dims = if width < min && height < min {
        if width > height {
            (min, proportional(height, min, width))
        } else {
            (proportional(width, min, height), min)
        }
    } else if width < min {
        (min, proportional(height, min, width))
    } else if height < min {
        (proportional(width, min, height), min)
    } else {
        (width, height)
    };

    Some(dims)
}

/// Top-left corner of a `dim × dim` window for a centered square crop.
///
/// The horizontal offset centers on the width whenever the width exceeds
/// `dim`. The vertical offset is only applied when the height is the smaller
/// side and also exceeds `dim`; portrait images are cropped from the top.
pub fn square_crop_offset(width: u32, height: u32, dim: u32) -> (u32, u32) {
    let mut x = 0;
    let mut y = 0;

    let mut min = width;
    if min > dim {
        x = (min - dim) / 2;
    }

    if height < min {
        min = height;
        if min > dim {
            y = (min - dim) / 2;
        }
    }

    (x, y)
}

/// Either side strictly greater than `bound`.
pub fn exceeds_either(dims: (u32, u32), bound: u32) -> bool {
    dims.0 > bound || dims.1 > bound
}

/// Both sides strictly greater than `bound`.
pub fn exceeds_both(dims: (u32, u32), bound: u32) -> bool {
    dims.0 > bound && dims.1 > bound
}
