use layercut_core::clip::ClipTransform;

/// A destination rectangle on the output surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Scale about the rectangle's own center.
    pub fn scaled(&self, scale: f64) -> Rect {
        let (cx, cy) = self.center();
        let width = self.width * scale;
        let height = self.height * scale;
        Rect {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }
}

/// Largest rectangle with aspect `src_ratio` that fits inside the surface,
/// centered. Wider sources are letterboxed, taller ones pillarboxed.
pub fn contain_fit(src_ratio: f64, surface_w: f64, surface_h: f64) -> Rect {
    let dst_ratio = surface_w / surface_h;
    if src_ratio > dst_ratio {
        let height = surface_w / src_ratio;
        Rect {
            x: 0.0,
            y: (surface_h - height) / 2.0,
            width: surface_w,
            height,
        }
    } else {
        let width = surface_h * src_ratio;
        Rect {
            x: (surface_w - width) / 2.0,
            y: 0.0,
            width,
            height: surface_h,
        }
    }
}

/// Placement of a base-layer clip. The transform position is an offset from
/// the fitted center, where 50/50 means no offset.
pub fn base_rect(
    surface_w: f64,
    surface_h: f64,
    src_ratio: f64,
    transform: Option<&ClipTransform>,
) -> Rect {
    let mut rect = contain_fit(src_ratio, surface_w, surface_h);
    if let Some(t) = transform {
        rect.x += (t.position.x - 50.0) / 100.0 * surface_w;
        rect.y += (t.position.y - 50.0) / 100.0 * surface_h;
        if t.scale != 1.0 {
            rect = rect.scaled(t.scale);
        }
    }
    rect
}

/// Placement of an overlay clip. The transform position is the absolute
/// center point in percent of the surface.
pub fn overlay_rect(
    surface_w: f64,
    surface_h: f64,
    aspect_ratio: f64,
    transform: &ClipTransform,
) -> Rect {
    let fitted = contain_fit(aspect_ratio, surface_w, surface_h);
    let width = fitted.width * transform.scale;
    let height = fitted.height * transform.scale;
    Rect {
        x: transform.position.x / 100.0 * surface_w - width / 2.0,
        y: transform.position.y / 100.0 * surface_h - height / 2.0,
        width,
        height,
    }
}
