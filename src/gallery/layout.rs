//! Sizing of slide images inside the gallery viewport.
//!
//! Images cover the viewport while keeping their aspect ratio; a configured
//! minimum size may push them past the viewport edges.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Which axes get a centering offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Centering {
    pub horizontal: bool,
    pub vertical: bool,
}

/// Displayed size of an image plus its offsets inside the viewport. An offset
/// is `None` when centering on that axis is disabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub width: f64,
    pub height: f64,
    pub left: Option<f64>,
    pub top: Option<f64>,
}

/// Computes the placement of an image with the given `aspect_ratio`
/// (height / width) inside `container`.
pub fn fit(container: Size, minimum: Size, aspect_ratio: f64, centering: Centering) -> Placement {
    let (width, height) = if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
        (container.width, container.height)
    } else if minimum.width > container.width {
        fit_width(container, minimum, aspect_ratio, true)
    } else if minimum.height > container.height {
        fit_height(container, minimum, aspect_ratio, true)
    } else if container.width > 0.0 && container.height / container.width > aspect_ratio {
        fit_height(container, minimum, aspect_ratio, false)
    } else {
        fit_width(container, minimum, aspect_ratio, false)
    };

    Placement {
        width,
        height,
        left: centering
            .horizontal
            .then(|| (container.width - width) / 2.0),
        top: centering.vertical.then(|| (container.height - height) / 2.0),
    }
}

fn fit_width(container: Size, minimum: Size, ratio: f64, check_min: bool) -> (f64, f64) {
    if check_min {
        let height = minimum.width * ratio;
        if container.height <= height {
            (minimum.width, height)
        } else {
            fit_height(container, minimum, ratio, false)
        }
    } else {
        (container.width, container.width * ratio)
    }
}

fn fit_height(container: Size, minimum: Size, ratio: f64, check_min: bool) -> (f64, f64) {
    if check_min {
        let width = minimum.height / ratio;
        if container.width <= width {
            (width, minimum.height)
        } else {
            fit_width(container, minimum, ratio, false)
        }
    } else {
        (container.height / ratio, container.height)
    }
}
