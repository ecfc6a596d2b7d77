use crate::types::{BoundingBox, SlotState};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

const OCCUPIED_COLOR: Rgba<u8> = Rgba([220, 40, 40, 255]);
const FREE_COLOR: Rgba<u8> = Rgba([60, 175, 80, 255]);
const LINE_WIDTH: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParkingReport {
    pub free: usize,
    pub occupied: usize,
}

impl ParkingReport {
    pub fn from_boxes(boxes: &[BoundingBox]) -> Self {
        boxes
            .iter()
            .fold(ParkingReport::default(), |mut report, b| {
                match b.slot_state() {
                    SlotState::Occupied => report.occupied += 1,
                    SlotState::Free => report.free += 1,
                }
                report
            })
    }

    pub fn total(&self) -> usize {
        self.free + self.occupied
    }

    /// Summary card shown under the annotated image.
    pub fn to_html(&self) -> String {
        format!(
            r#"<div style="font-family: Arial, sans-serif; text-align: center; background-color: #f9f9f9; padding: 20px; border: 2px solid #4CAF50; border-radius: 10px; box-shadow: 0 4px 8px rgba(0, 0, 0, 0.1); max-width: 400px; margin: 0 auto;">
  <h2 style="color: #4CAF50; margin: 10px 0;">Welcome to the parking lot!</h2>
  <p style="font-size: 18px; margin: 5px 0;">&#x2705; Free slots: <strong>{}</strong></p>
  <p style="font-size: 18px; margin: 5px 0;">&#x274C; Occupied slots: <strong>{}</strong></p>
  <p style="font-size: 18px; margin: 5px 0;">&#x2139;&#xFE0F; Total slots: <strong>{}</strong></p>
</div>"#,
            self.free,
            self.occupied,
            self.total()
        )
    }
}

/// Copy of `image` with an outline per box: red for occupied, green for free.
pub fn annotate(image: &DynamicImage, boxes: &[BoundingBox]) -> RgbaImage {
    let mut canvas = image.to_rgba();
    for b in boxes {
        let color = match b.slot_state() {
            SlotState::Occupied => OCCUPIED_COLOR,
            SlotState::Free => FREE_COLOR,
        };
        draw_outline(&mut canvas, b, color);
    }
    canvas
}

fn draw_outline(canvas: &mut RgbaImage, b: &BoundingBox, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let (left, right) = ordered(b.x1, b.x2);
    let (top, bottom) = ordered(b.y1, b.y2);
    if right < 0.0 || bottom < 0.0 || left >= width as f32 || top >= height as f32 {
        return;
    }
    let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max - 1);
    let (x1, x2) = (clamp(left, width), clamp(right, width));
    let (y1, y2) = (clamp(top, height), clamp(bottom, height));

    let (w, h) = (x2 - x1 + 1, y2 - y1 + 1);

    // Thickness is drawn as nested one-pixel rectangles.
    for t in 0..LINE_WIDTH {
        let inner_w = w.saturating_sub(2 * t);
        let inner_h = h.saturating_sub(2 * t);
        if inner_w > 0 && inner_h > 0 {
            let rect = Rect::at((x1 + t) as i32, (y1 + t) as i32).of_size(inner_w, inner_h);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
