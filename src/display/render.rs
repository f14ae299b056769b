//! Draws detections and the FPS overlay into a frame in place.
//!
//! Coordinates come straight from the server and are never trusted: every
//! write is clipped to the frame, so boxes partly or wholly outside the image
//! are safe.

use crate::capture::Frame;
use crate::codec::Detection;

/// Class labels for ids `0..80` as emitted by COCO-trained detectors
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

const GREEN: [u8; 3] = [0, 255, 0];
const BOX_THICKNESS: i32 = 2;
const GLYPH_W: i32 = 5;
const GLYPH_H: i32 = 7;
const FPS_ORIGIN: (i32, i32) = (20, 30);

pub struct Renderer {
    class_names: Vec<String>,
    color: [u8; 3],
}

impl Renderer {
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            class_names,
            color: GREEN,
        }
    }

    /// `class[ conf]`, or `None` when the detection carries neither
    pub fn label_for(&self, detection: &Detection) -> Option<String> {
        let class = detection.class_id.map(|id| {
            self.class_names
                .get(id as usize)
                .cloned()
                .unwrap_or_else(|| id.to_string())
        });
        match (class, detection.confidence) {
            (Some(class), Some(conf)) => Some(format!("{} {:.2}", class, conf)),
            (Some(class), None) => Some(class),
            (None, Some(conf)) => Some(format!("{:.2}", conf)),
            (None, None) => None,
        }
    }

    pub fn annotate(&self, frame: &mut Frame, detections: &[Detection], fps: Option<f64>) {
        for detection in detections {
            let (x1, y1, x2, y2) = detection.bbox.corners();
            draw_rect(frame, x1, y1, x2, y2, self.color, BOX_THICKNESS);

            if let Some(label) = self.label_for(detection) {
                // baseline four pixels above the box
                let top = y1.saturating_sub(4 + GLYPH_H);
                draw_text(frame, x1, top, &label, self.color, 1);
            }
        }

        if let Some(fps) = fps {
            let (x, baseline) = FPS_ORIGIN;
            draw_text(
                frame,
                x,
                baseline - GLYPH_H * 2,
                &format!("FPS {:.1}", fps),
                self.color,
                2,
            );
        }
    }
}

/// Rectangle outline between two corners, `thickness` pixels inward
pub fn draw_rect(frame: &mut Frame, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 3], thickness: i32) {
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));

    for t in 0..thickness.max(1) {
        hline(frame, left, right, top.saturating_add(t), color);
        hline(frame, left, right, bottom.saturating_sub(t), color);
        vline(frame, left.saturating_add(t), top, bottom, color);
        vline(frame, right.saturating_sub(t), top, bottom, color);
    }
}

fn hline(frame: &mut Frame, x_start: i32, x_end: i32, y: i32, color: [u8; 3]) {
    if y < 0 || y >= frame.height() as i32 {
        return;
    }
    let from = x_start.max(0);
    let to = x_end.min(frame.width() as i32 - 1);
    for x in from..=to {
        frame.put_pixel(x, y, color);
    }
}

fn vline(frame: &mut Frame, x: i32, y_start: i32, y_end: i32, color: [u8; 3]) {
    if x < 0 || x >= frame.width() as i32 {
        return;
    }
    let from = y_start.max(0);
    let to = y_end.min(frame.height() as i32 - 1);
    for y in from..=to {
        frame.put_pixel(x, y, color);
    }
}

/// Blit `text` with the built-in 5x7 font, top-left at `(x, y)`
pub fn draw_text(frame: &mut Frame, x: i32, y: i32, text: &str, color: [u8; 3], scale: i32) {
    let scale = scale.max(1);
    let advance = (GLYPH_W + 1) * scale;
    let mut pen_x = x;

    for ch in text.chars().flat_map(char::to_uppercase) {
        if pen_x >= frame.width() as i32 {
            break;
        }
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_W {
                if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        frame.put_pixel(
                            pen_x.saturating_add(col * scale + dx),
                            y.saturating_add(row as i32 * scale + dy),
                            color,
                        );
                    }
                }
            }
        }
        pen_x = pen_x.saturating_add(advance);
    }
}

fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'A'..='Z' => LETTERS[(ch as u8 - b'A') as usize],
        '0'..='9' => DIGITS[(ch as u8 - b'0') as usize],
        '.' => [0, 0, 0, 0, 0, 0b01100, 0b01100],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        _ => [0; 7],
    }
}

#[rustfmt::skip]
const LETTERS: [[u8; 7]; 26] = [
    [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001], // A
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110], // B
    [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110], // C
    [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100], // D
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111], // E
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000], // F
    [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111], // G
    [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001], // H
    [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110], // I
    [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100], // J
    [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001], // K
    [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111], // L
    [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001], // M
    [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001], // N
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110], // O
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000], // P
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101], // Q
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001], // R
    [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110], // S
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100], // T
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110], // U
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100], // V
    [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010], // W
    [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001], // X
    [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100], // Y
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111], // Z
];

#[rustfmt::skip]
const DIGITS: [[u8; 7]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BoundingBox;

    fn black(width: u32, height: u32) -> Frame {
        Frame::filled(0, width, height, [0, 0, 0])
    }

    #[test]
    fn test_box_outline_drawn_inside_frame() {
        let mut frame = black(40, 40);
        draw_rect(&mut frame, 10, 10, 30, 30, GREEN, 2);

        assert_eq!(frame.pixel(10, 10), Some(GREEN));
        assert_eq!(frame.pixel(30, 30), Some(GREEN));
        assert_eq!(frame.pixel(11, 20), Some(GREEN));
        assert_eq!(frame.pixel(20, 20), Some([0, 0, 0]));
        assert_eq!(frame.pixel(5, 5), Some([0, 0, 0]));
    }

    #[test]
    fn test_out_of_bounds_boxes_are_clipped() {
        let mut frame = black(16, 16);
        draw_rect(&mut frame, -10, -10, 8, 8, GREEN, 2);
        assert_eq!(frame.pixel(8, 0), Some(GREEN));
        assert_eq!(frame.pixel(0, 8), Some(GREEN));

        // wholly outside: nothing drawn
        let mut outside = black(16, 16);
        draw_rect(&mut outside, 100, 100, 200, 200, GREEN, 2);
        draw_rect(&mut outside, -50, -50, -20, -20, GREEN, 2);
        assert!(outside.data.iter().all(|&v| v == 0));

        // extreme coordinates terminate without overflow
        let mut frame = black(8, 8);
        draw_rect(&mut frame, i32::MIN, i32::MIN, i32::MAX, i32::MAX, GREEN, 2);
    }

    #[test]
    fn test_labels() {
        let renderer = Renderer::new(COCO_CLASSES.iter().map(|s| s.to_string()).collect());
        let bbox = BoundingBox::from_size(0, 0, 5, 5);

        let det = Detection::new(bbox).with_class(2).with_confidence(0.87);
        assert_eq!(renderer.label_for(&det).as_deref(), Some("car 0.87"));

        let det = Detection::new(bbox).with_class(500);
        assert_eq!(renderer.label_for(&det).as_deref(), Some("500"));

        assert_eq!(renderer.label_for(&Detection::new(bbox)), None);
    }

    #[test]
    fn test_annotate_draws_fps_and_boxes() {
        let renderer = Renderer::new(Vec::new());
        let mut frame = black(120, 60);
        let detections = vec![Detection::new(BoundingBox::from_corners(50, 20, 100, 50)).with_class(1)];
        renderer.annotate(&mut frame, &detections, Some(29.97));

        assert_eq!(frame.pixel(50, 20), Some(GREEN));
        // FPS text lands in the top-left band
        let fps_pixels = (16..30)
            .flat_map(|y| (20..70).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(GREEN))
            .count();
        assert!(fps_pixels > 0);
    }

    #[test]
    fn test_draw_text_clips_at_edges() {
        let mut frame = black(10, 10);
        draw_text(&mut frame, -3, -3, "PERSON 0.99", GREEN, 2);
        draw_text(&mut frame, 8, 8, "XYZ", GREEN, 1);
    }
}
