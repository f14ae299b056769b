//! Response decoding for the three server dialects

use tracing::debug;

use crate::codec::{BoundingBox, Detection, ResponseMode, FIXED_RESPONSE_LEN};
use crate::error::ParseWarning;

/// Decode one response into detections. Malformed or truncated input is a
/// [`ParseWarning`]; callers treat it as an empty batch.
pub fn decode_detections(raw: &[u8], mode: ResponseMode) -> Result<Vec<Detection>, ParseWarning> {
    match mode {
        ResponseMode::FixedBinary => decode_fixed(raw),
        ResponseMode::TextSemicolon => decode_semicolon(as_text(raw, mode)?),
        ResponseMode::TextBracket => decode_bracket(as_text(raw, mode)?),
    }
}

fn as_text(raw: &[u8], mode: ResponseMode) -> Result<&str, ParseWarning> {
    std::str::from_utf8(raw)
        .map(str::trim)
        .map_err(|e| ParseWarning::new(mode.name(), format!("invalid UTF-8: {}", e)))
}

fn decode_fixed(raw: &[u8]) -> Result<Vec<Detection>, ParseWarning> {
    let mode = ResponseMode::FixedBinary.name();
    if raw.len() != FIXED_RESPONSE_LEN {
        return Err(ParseWarning::new(
            mode,
            format!("expected {} bytes, got {}", FIXED_RESPONSE_LEN, raw.len()),
        ));
    }

    let mut values = raw
        .chunks_exact(4)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]));
    let mut next = || values.next().unwrap_or_default();
    let (x1, y1, x2, y2) = (next(), next(), next(), next());

    Ok(vec![Detection::new(BoundingBox::from_corners(x1, y1, x2, y2))])
}

fn decode_semicolon(text: &str) -> Result<Vec<Detection>, ParseWarning> {
    let mode = ResponseMode::TextSemicolon.name();

    text.split(';')
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(|record| {
            let fields: Vec<&str> = record.split(',').map(str::trim).collect();
            if fields.len() != 6 {
                return Err(ParseWarning::new(
                    mode,
                    format!("record {:?} has {} fields, expected 6", record, fields.len()),
                ));
            }
            let bad = |field: &str| ParseWarning::new(mode, format!("bad field {:?} in {:?}", field, record));
            let int = |field: &str| field.parse::<i32>().map_err(|_| bad(field));

            let (x1, y1, x2, y2) = (int(fields[0])?, int(fields[1])?, int(fields[2])?, int(fields[3])?);
            let class_id = fields[4].parse::<u32>().map_err(|_| bad(fields[4]))?;
            let confidence = fields[5].parse::<f32>().map_err(|_| bad(fields[5]))?;

            Ok(Detection::new(BoundingBox::from_corners(x1, y1, x2, y2))
                .with_class(class_id)
                .with_confidence(confidence))
        })
        .collect()
}

fn decode_bracket(text: &str) -> Result<Vec<Detection>, ParseWarning> {
    let mode = ResponseMode::TextBracket.name();

    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| ParseWarning::new(mode, format!("not a bracketed list: {:?}", text)))?
        .trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let values = inner
        .split(',')
        .map(|token| parse_number(token.trim()).ok_or_else(|| ParseWarning::new(mode, format!("bad value {:?}", token))))
        .collect::<Result<Vec<i32>, _>>()?;

    // 5-arity wins whenever the count allows it
    let arity = if values.len() % 5 == 0 { 5 } else { 4 };
    let leftover = values.len() % arity;
    if leftover != 0 {
        debug!("Dropping {} trailing value(s) from bracket response", leftover);
    }

    values
        .chunks_exact(arity)
        .map(|group| {
            let detection = Detection::new(BoundingBox::from_size(group[0], group[1], group[2], group[3]));
            match group.get(4) {
                Some(&class) => u32::try_from(class)
                    .map(|class| detection.with_class(class))
                    .map_err(|_| ParseWarning::new(mode, format!("negative class id {}", class))),
                None => Ok(detection),
            }
        })
        .collect()
}

/// Integers, or decimals truncated toward zero
fn parse_number(token: &str) -> Option<i32> {
    if let Ok(value) = token.parse::<i32>() {
        return Some(value);
    }
    let value = token.parse::<f64>().ok()?;
    if value.is_finite() && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Some(value.trunc() as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_binary_box() {
        let raw = [
            0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00,
            0xC8,
        ];
        let detections = decode_detections(&raw, ResponseMode::FixedBinary).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox.corners(), (10, 20, 100, 200));
        assert_eq!(detections[0].class_id, None);
        assert_eq!(detections[0].confidence, None);
    }

    #[test]
    fn test_fixed_binary_negative_and_truncated() {
        let mut raw = Vec::new();
        for v in [-5i32, -6, 20, 30] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        let detections = decode_detections(&raw, ResponseMode::FixedBinary).unwrap();
        assert_eq!(detections[0].bbox, BoundingBox { x: -5, y: -6, width: 25, height: 36 });

        assert!(decode_detections(&raw[..12], ResponseMode::FixedBinary).is_err());
    }

    #[test]
    fn test_reversed_corners_keep_full_box() {
        let mut raw = Vec::new();
        for v in [100i32, 200, 10, 20] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        let fixed = decode_detections(&raw, ResponseMode::FixedBinary).unwrap();
        assert_eq!(fixed[0].bbox, BoundingBox { x: 10, y: 20, width: 90, height: 180 });
        assert_eq!(fixed[0].bbox.corners(), (10, 20, 100, 200));

        let text = decode_detections(b"100,200,10,20,2,0.9", ResponseMode::TextSemicolon).unwrap();
        assert_eq!(text[0].bbox.corners(), (10, 20, 100, 200));
        assert_eq!(text[0].class_id, Some(2));

        // mixed order on one axis only
        let mixed = decode_detections(b"10,200,100,20,0,0.5", ResponseMode::TextSemicolon).unwrap();
        assert_eq!(mixed[0].bbox.corners(), (10, 20, 100, 200));
    }

    #[test]
    fn test_semicolon_records() {
        let detections =
            decode_detections(b"10,20,110,220,2,0.87;5,5,15,15,0,0.40", ResponseMode::TextSemicolon).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_id, Some(2));
        assert!((detections[0].confidence.unwrap() - 0.87).abs() < 1e-6);
        assert_eq!(detections[0].bbox.corners(), (10, 20, 110, 220));
        assert_eq!(detections[1].bbox, BoundingBox { x: 5, y: 5, width: 10, height: 10 });
        assert_eq!(detections[1].class_id, Some(0));
    }

    #[test]
    fn test_semicolon_trailing_separator_and_empty() {
        let detections = decode_detections(b"0,0,5,5,0,0.99;\n", ResponseMode::TextSemicolon).unwrap();
        assert_eq!(detections.len(), 1);

        assert!(decode_detections(b"\n", ResponseMode::TextSemicolon).unwrap().is_empty());
        assert!(decode_detections(b"", ResponseMode::TextSemicolon).unwrap().is_empty());
    }

    #[test]
    fn test_semicolon_malformed() {
        assert!(decode_detections(b"10,20,110", ResponseMode::TextSemicolon).is_err());
        assert!(decode_detections(b"10,20,110,220,x,0.5", ResponseMode::TextSemicolon).is_err());
        assert!(decode_detections(&[0xFF, 0xFE], ResponseMode::TextSemicolon).is_err());
    }

    #[test]
    fn test_bracket_falls_back_to_four_and_drops_remainder() {
        let detections =
            decode_detections(b"[10,20,30,40,10,20,30,40,1]", ResponseMode::TextBracket).unwrap();
        assert_eq!(detections.len(), 2);
        for detection in &detections {
            assert_eq!(detection.bbox, BoundingBox { x: 10, y: 20, width: 30, height: 40 });
            assert_eq!(detection.class_id, None);
        }
    }

    #[test]
    fn test_bracket_prefers_five_arity() {
        let detections =
            decode_detections(b"[10,20,30,40,2,50,60,70,80,7]\n", ResponseMode::TextBracket).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_id, Some(2));
        assert_eq!(detections[1].bbox, BoundingBox { x: 50, y: 60, width: 70, height: 80 });
        assert_eq!(detections[1].class_id, Some(7));

        // 20 values: five groups of four would also fit, five-arity still wins
        let twenty: Vec<String> = (1..=20).map(|v| v.to_string()).collect();
        let raw = format!("[{}]", twenty.join(","));
        let detections = decode_detections(raw.as_bytes(), ResponseMode::TextBracket).unwrap();
        assert_eq!(detections.len(), 4);
        assert_eq!(detections[0].class_id, Some(5));
    }

    #[test]
    fn test_bracket_decimal_tokens_and_empty() {
        let detections = decode_detections(b"[ 1.9, 2, 3.5, 4 ]", ResponseMode::TextBracket).unwrap();
        assert_eq!(detections[0].bbox, BoundingBox { x: 1, y: 2, width: 3, height: 4 });

        assert!(decode_detections(b"[]", ResponseMode::TextBracket).unwrap().is_empty());
    }

    #[test]
    fn test_bracket_malformed() {
        assert!(decode_detections(b"[10,20,30", ResponseMode::TextBracket).is_err());
        assert!(decode_detections(b"[10,abc,30,40]", ResponseMode::TextBracket).is_err());
        assert!(decode_detections(b"[1,2,3,4,-1]", ResponseMode::TextBracket).is_err());
    }
}
