use super::*;

const EPSILON: f32 = 1e-6;

fn full_mask(width: usize, height: usize) -> BitBuffer2 {
    BitBuffer2::new_filled(width, height, true)
}

#[test]
fn test_full_rectangle_weights() {
    let w = centerline_weights(&full_mask(5, 3), &WeightConfig::default());

    assert!((w.get(2, 1) - 1.0).abs() < EPSILON);
    // Corner: horizontal 1 - 2/2.5 = 0.2, vertical 1 - 1/1.5 = 1/3.
    assert!((w.get(0, 0) - 0.2).abs() < EPSILON);
    assert!((w.get(4, 2) - 0.2).abs() < EPSILON);
    // Middle of the left edge: horizontal 0.2 wins.
    assert!((w.get(0, 1) - 0.2).abs() < EPSILON);
}

#[test]
fn test_weights_decrease_away_from_center() {
    let w = centerline_weights(&full_mask(21, 15), &WeightConfig::default());
    let (cx, cy) = (10, 7);

    for x in cx..20 {
        assert!(w.get(x + 1, cy) <= w.get(x, cy), "row not monotone at x={x}");
    }
    for x in 1..=cx {
        assert!(w.get(x - 1, cy) <= w.get(x, cy), "row not monotone at x={x}");
    }
    for y in cy..14 {
        assert!(w.get(cx, y + 1) <= w.get(cx, y), "column not monotone at y={y}");
    }
    let max = w.iter().cloned().fold(f32::MIN, f32::max);
    assert_eq!(*w.get(cx, cy), max);
}

#[test]
fn test_valid_pixels_have_positive_weight() {
    let mask = BitBuffer2::from_fn(37, 23, |x, y| (x * 7 + y * 3) % 5 != 0);
    let w = centerline_weights(&mask, &WeightConfig::default());
    for y in 0..23 {
        for x in 0..37 {
            if mask.get(x, y) {
                let v = *w.get(x, y);
                assert!(v > 0.0 && v <= 1.0, "weight {v} at ({x}, {y})");
            }
        }
    }
}

#[test]
fn test_hole_and_border_sentinels() {
    // Diamond-ish footprint: row 0 only covers x in 1..=3, rest is full.
    let mut mask = full_mask(5, 5);
    mask.set(0, 0, false);
    mask.set(4, 0, false);
    mask.set(2, 2, false);
    let config = WeightConfig {
        hole_fill: 0.5,
        border_fill: -2.0,
        clip_to_cutoff: true,
    };
    let w = centerline_weights(&mask, &config);

    assert_eq!(*w.get(2, 2), 0.5);
    assert_eq!(*w.get(0, 0), -2.0);
    assert_eq!(*w.get(4, 0), -2.0);
}

#[test]
fn test_fully_invalid_is_border_everywhere() {
    let w = centerline_weights(&BitBuffer2::new_default(6, 4), &WeightConfig::default());
    assert!(w.iter().all(|&v| v == -1.0));
}

#[test]
fn test_single_pixel_row_has_full_weight() {
    let mask = BitBuffer2::from_fn(7, 7, |x, _| x == 3);
    let w = centerline_weights(&mask, &WeightConfig::default());
    // Horizontal span is one pixel, vertical span is the whole column.
    assert!((w.get(3, 3) - 1.0).abs() < EPSILON);
    assert!(*w.get(3, 0) > 0.0);
    assert_eq!(*w.get(0, 3), -1.0);
}

#[test]
fn test_blend_cutoff() {
    let area = Aabb::from_size(100, 100);
    assert!((blend_cutoff(&area, 20) - 20.0 / 70.0).abs() < EPSILON);
    // Narrow side decides.
    let strip = Aabb::from_size(400, 40);
    assert!((blend_cutoff(&strip, 20) - 0.5).abs() < EPSILON);
    assert_eq!(blend_cutoff(&Aabb::empty(), 20), 1.0);
    assert_eq!(blend_cutoff(&area, 0), 1.0);
}

#[test]
fn test_clip_keeps_sentinels() {
    let mut w = Buffer2::new(4, 1, vec![0.9, 0.1, -1.0, 0.0]);
    clip_to_cutoff(&mut w, 0.3);
    assert_eq!(w.pixels(), &[0.3, 0.1, -1.0, 0.0]);
}

#[test]
fn test_weight_field_lookup() {
    let region = Aabb::from_xywh(10, 20, 3, 3);
    let mut mask = full_mask(3, 3);
    mask.set(0, 0, false);
    let mut field = WeightField::compute(region, mask, &WeightConfig::default());

    assert_eq!(field.weight_at(IVec2::new(10, 20)), None);
    assert_eq!(field.raw_at(IVec2::new(10, 20)), Some(-1.0));
    assert_eq!(field.weight_at(IVec2::new(0, 0)), None);
    let center = field.weight_at(IVec2::new(11, 21)).unwrap();
    assert!((center - 1.0).abs() < EPSILON);

    field.clip(0.25);
    assert_eq!(field.weight_at(IVec2::new(11, 21)), Some(0.25));
    assert_eq!(field.raw_at(IVec2::new(10, 20)), Some(-1.0));
}
