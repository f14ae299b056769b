//! Wire codec: frame compression, length-prefixed request framing and the
//! three response dialects spoken by detection servers.

pub mod detections;
pub mod wire;

use serde::{Deserialize, Serialize};

pub use detections::decode_detections;
pub use wire::{decode_message, encode, frame_message, frame_message_with_limit, read_message};

/// Size of a fixed-binary response: four big-endian i32
pub const FIXED_RESPONSE_LEN: usize = 16;

/// Largest single read in chunk framing
pub const MAX_CHUNK_LEN: usize = 4096;

/// Response dialect, chosen by configuration and never sniffed from content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseMode {
    /// 16 bytes: `x1, y1, x2, y2` as big-endian i32
    #[value(alias = "binary")]
    FixedBinary,
    /// `x1,y1,x2,y2,class,confidence` records joined by `;`
    #[value(alias = "semicolon")]
    TextSemicolon,
    /// `[v1,v2,...]` of flattened `x,y,w,h[,class]` groups
    #[value(alias = "bracket")]
    TextBracket,
}

impl ResponseMode {
    pub fn default_framing(self) -> ResponseFraming {
        match self {
            ResponseMode::FixedBinary => ResponseFraming::Fixed,
            ResponseMode::TextSemicolon => ResponseFraming::Line,
            // bracket servers send no terminator
            ResponseMode::TextBracket => ResponseFraming::Chunk,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResponseMode::FixedBinary => "fixed-binary",
            ResponseMode::TextSemicolon => "text-semicolon",
            ResponseMode::TextBracket => "text-bracket",
        }
    }
}

/// How one response is delimited on the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseFraming {
    /// Exactly [`FIXED_RESPONSE_LEN`] bytes
    Fixed,
    /// Terminated by `\n`
    Line,
    /// One read of at most [`MAX_CHUNK_LEN`] bytes per request
    Chunk,
}

/// Axis-aligned box in width/height form. `width` and `height` are never
/// negative; `x`/`y` are not clamped to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Corners may arrive in either order
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (top, bottom) = (y1.min(y2), y1.max(y2));
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        }
    }

    pub fn from_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// `(x1, y1, x2, y2)`
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (
            self.x,
            self.y,
            self.x.saturating_add(self.width),
            self.y.saturating_add(self.height),
        )
    }
}

/// One recognized object
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: Option<u32>,
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            class_id: None,
            confidence: None,
        }
    }

    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}
