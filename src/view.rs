//! Mapping between image pixel space and screen space.

use egui::{pos2, vec2, Pos2, Rect, Vec2};

use crate::model::ViewportSettings;

/// Image is centered in `canvas`, flipped, rotated by a multiple of 90°
/// (clockwise), scaled by `zoom` and offset by `pan`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub canvas: Rect,
    pub image_size: Vec2,
    pub zoom: f32,
    pub pan: Vec2,
    pub rotation: i32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl ViewTransform {
    pub fn new(canvas: Rect, image_size: Vec2, settings: &ViewportSettings) -> Self {
        Self {
            canvas,
            image_size,
            zoom: settings.zoom,
            pan: settings.pan.to_vec2(),
            rotation: settings.rotation.rem_euclid(360),
            flip_horizontal: settings.flip_horizontal,
            flip_vertical: settings.flip_vertical,
        }
    }

    pub fn image_to_screen(&self, img: Pos2) -> Pos2 {
        let centered = img.to_vec2() - self.image_size * 0.5;
        let oriented = rotate(self.flip(centered), self.rotation);
        self.canvas.center() + self.pan + oriented * self.zoom
    }

    pub fn screen_to_image(&self, screen: Pos2) -> Pos2 {
        let rel = (screen - self.canvas.center() - self.pan) / self.zoom;
        let unrotated = rotate(rel, 360 - self.rotation);
        (self.flip(unrotated) + self.image_size * 0.5).to_pos2()
    }

    pub fn rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_two_pos(self.image_to_screen(rect.min), self.image_to_screen(rect.max))
    }

    pub fn image_bounds(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, self.image_size)
    }

    /// Screen positions of the image corners, in top-left, top-right,
    /// bottom-right, bottom-left image order.
    pub fn image_corners(&self) -> [Pos2; 4] {
        let (w, h) = (self.image_size.x, self.image_size.y);
        [
            self.image_to_screen(pos2(0.0, 0.0)),
            self.image_to_screen(pos2(w, 0.0)),
            self.image_to_screen(pos2(w, h)),
            self.image_to_screen(pos2(0.0, h)),
        ]
    }

    /// Pan that keeps the image point under `cursor` fixed when zooming to `new_zoom`.
    pub fn pan_for_zoom_at(&self, cursor: Pos2, new_zoom: f32) -> Vec2 {
        let cursor_rel = cursor - self.canvas.center() - self.pan;
        self.pan - cursor_rel * (new_zoom / self.zoom - 1.0)
    }

    fn flip(&self, v: Vec2) -> Vec2 {
        vec2(
            if self.flip_horizontal { -v.x } else { v.x },
            if self.flip_vertical { -v.y } else { v.y },
        )
    }
}

fn rotate(v: Vec2, degrees: i32) -> Vec2 {
    match degrees.rem_euclid(360) {
        90 => vec2(-v.y, v.x),
        180 => vec2(-v.x, -v.y),
        270 => vec2(v.y, -v.x),
        _ => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(rotation: i32, flip_h: bool, flip_v: bool) -> ViewTransform {
        ViewTransform {
            canvas: Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0)),
            image_size: vec2(200.0, 100.0),
            zoom: 2.0,
            pan: vec2(15.0, -7.0),
            rotation,
            flip_horizontal: flip_h,
            flip_vertical: flip_v,
        }
    }

    #[test]
    fn unrotated_matches_centered_scaling() {
        let t = ViewTransform {
            pan: Vec2::ZERO,
            ..transform(0, false, false)
        };
        assert_eq!(t.image_to_screen(pos2(0.0, 0.0)), pos2(200.0, 200.0));
        assert_eq!(t.image_to_screen(pos2(200.0, 100.0)), pos2(600.0, 400.0));
    }

    #[test]
    fn screen_to_image_inverts_every_orientation() {
        let p = pos2(37.0, 81.0);
        for rotation in [0, 90, 180, 270] {
            for flip_h in [false, true] {
                for flip_v in [false, true] {
                    let t = transform(rotation, flip_h, flip_v);
                    let back = t.screen_to_image(t.image_to_screen(p));
                    assert!(
                        (back - p).length() < 1e-3,
                        "rotation {rotation} flips {flip_h}/{flip_v}: {back:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn clockwise_rotation_moves_top_left_to_top_right() {
        let t = ViewTransform {
            pan: Vec2::ZERO,
            zoom: 1.0,
            ..transform(90, false, false)
        };
        let [tl, tr, br, bl] = t.image_corners();
        // 200x100 image becomes 100 wide and 200 tall around (400, 300).
        assert_eq!(tl, pos2(450.0, 200.0));
        assert_eq!(tr, pos2(450.0, 400.0));
        assert_eq!(br, pos2(350.0, 400.0));
        assert_eq!(bl, pos2(350.0, 200.0));
    }

    #[test]
    fn rect_mapping_stays_axis_aligned() {
        let t = transform(270, true, false);
        let r = t.rect_to_screen(Rect::from_min_size(pos2(10.0, 20.0), vec2(30.0, 10.0)));
        assert!((r.width() - 20.0).abs() < 1e-3);
        assert!((r.height() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_at_cursor_keeps_point_fixed() {
        let t = transform(0, false, false);
        let cursor = pos2(520.0, 330.0);
        let under = t.screen_to_image(cursor);

        let zoomed = ViewTransform {
            pan: t.pan_for_zoom_at(cursor, 3.0),
            zoom: 3.0,
            ..t
        };
        assert!((zoomed.image_to_screen(under) - cursor).length() < 1e-3);
    }
}
