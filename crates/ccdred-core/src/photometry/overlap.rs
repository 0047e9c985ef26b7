//! Exact area of overlap between a circle and a pixel square.
//!
//! Pixel `(col, row)` covers `[col - 0.5, col + 0.5] x [row - 0.5, row + 0.5]`.

/// Antiderivative of `sqrt(r^2 - u^2)`, valid on `[-r, r]`.
fn chord_integral(u: f64, r: f64) -> f64 {
    let u = u.clamp(-r, r);
    0.5 * (u * (r * r - u * u).max(0.0).sqrt() + r * r * (u / r).asin())
}

/// `integral of sqrt(r^2 - u^2) du` from `a` to `b` (both clamped to the disk).
fn half_chord_area(a: f64, b: f64, r: f64) -> f64 {
    chord_integral(b, r) - chord_integral(a, r)
}

/// Area of the disk `u^2 + v^2 <= r^2` restricted to `u <= x` and `v <= y`.
fn corner_area(x: f64, y: f64, r: f64) -> f64 {
    if x <= -r || y <= -r {
        return 0.0;
    }
    let xc = x.min(r);
    if y >= r {
        return 2.0 * half_chord_area(-r, xc, r);
    }

    // The line v = y cuts the circle at u = +/- w.
    let w = (r * r - y * y).max(0.0).sqrt();
    let mut area = 0.0;

    // Inside |u| < w the column spans from the lower arc up to v = y.
    let (a, b) = (-w, xc.min(w));
    if b > a {
        area += y * (b - a) + half_chord_area(a, b, r);
    }
    // Outside, when y is above the centre, the full chord lies below the line.
    if y > 0.0 {
        let (a, b) = (-r, xc.min(-w));
        if b > a {
            area += 2.0 * half_chord_area(a, b, r);
        }
        let (a, b) = (w, xc);
        if b > a {
            area += 2.0 * half_chord_area(a, b, r);
        }
    }
    area
}

/// Area of a circle of radius `r` centred at `(cx, cy)` that falls inside the
/// pixel at `(col, row)`.
pub fn pixel_overlap(col: f64, row: f64, cx: f64, cy: f64, r: f64) -> f64 {
    if r <= 0.0 {
        return 0.0;
    }
    let x0 = col - 0.5 - cx;
    let x1 = col + 0.5 - cx;
    let y0 = row - 0.5 - cy;
    let y1 = row + 0.5 - cy;

    // Fully inside: all four corners within the circle.
    let r2 = r * r;
    let far_x = x0.abs().max(x1.abs());
    let far_y = y0.abs().max(y1.abs());
    if far_x * far_x + far_y * far_y <= r2 {
        return 1.0;
    }
    // Fully outside: nearest point of the square beyond the radius.
    let near_x = if x0 > 0.0 { x0 } else if x1 < 0.0 { -x1 } else { 0.0 };
    let near_y = if y0 > 0.0 { y0 } else if y1 < 0.0 { -y1 } else { 0.0 };
    if near_x * near_x + near_y * near_y >= r2 {
        return 0.0;
    }

    let area = corner_area(x1, y1, r) - corner_area(x0, y1, r) - corner_area(x1, y0, r)
        + corner_area(x0, y0, r);
    area.clamp(0.0, 1.0)
}

/// Area of an annulus pixel overlap: outer disk minus inner disk.
pub fn pixel_annulus_overlap(col: f64, row: f64, cx: f64, cy: f64, r_in: f64, r_out: f64) -> f64 {
    (pixel_overlap(col, row, cx, cy, r_out) - pixel_overlap(col, row, cx, cy, r_in)).max(0.0)
}
