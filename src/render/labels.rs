//! Axis label generation

/// A tick label along one axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisLabel {
    pub value: f64,
    pub text: String,
}

/// Fraction digits used for labels spanning `range`
pub fn label_precision(range: f64) -> usize {
    let range = range.abs();
    if range < 0.1 {
        6
    } else if range < 1.0 {
        4
    } else if range < 5.0 {
        3
    } else if range < 10.0 {
        1
    } else {
        0
    }
}

/// Evenly spaced labels from `min` to `max`, one per `spacing_px` of
/// `extent_px` plus the closing label, in ascending order.
///
/// Always yields at least the two end labels.
pub fn axis_labels(min: f64, max: f64, extent_px: f32, spacing_px: f32) -> Vec<AxisLabel> {
    let intervals = if spacing_px > 0.0 {
        ((extent_px / spacing_px) as usize).max(1)
    } else {
        1
    };
    let digits = label_precision(max - min);

    (0..=intervals)
        .map(|i| {
            let value = min + (max - min) * i as f64 / intervals as f64;
            AxisLabel {
                value,
                text: format_label(value, digits),
            }
        })
        .collect()
}

/// Labels for a vertical axis, top (max) first
pub fn vertical_axis_labels(min: f64, max: f64, extent_px: f32, spacing_px: f32) -> Vec<AxisLabel> {
    let mut labels = axis_labels(min, max, extent_px, spacing_px);
    labels.reverse();
    labels
}

/// At most `digits` fraction digits, trailing zeros dropped
fn format_label(value: f64, digits: usize) -> String {
    let mut text = format!("{:.*}", digits, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text.remove(0);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(labels: &[AxisLabel]) -> Vec<&str> {
        labels.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_precision_by_range() {
        assert_eq!(label_precision(0.05), 6);
        assert_eq!(label_precision(0.5), 4);
        assert_eq!(label_precision(-2.0), 3);
        assert_eq!(label_precision(7.0), 1);
        assert_eq!(label_precision(20.0), 0);
    }

    #[test]
    fn test_count_follows_spacing() {
        // 240 px at 80 px spacing: three intervals
        let labels = axis_labels(0.0, 30.0, 240.0, 80.0);
        assert_eq!(texts(&labels), vec!["0", "10", "20", "30"]);
    }

    #[test]
    fn test_vertical_labels_top_down() {
        let labels = vertical_axis_labels(-10.0, 10.0, 160.0, 80.0);
        assert_eq!(texts(&labels), vec!["10", "0", "-10"]);
    }

    #[test]
    fn test_small_extent_keeps_end_labels() {
        let labels = axis_labels(0.0, 1.5, 10.0, 80.0);
        assert_eq!(texts(&labels), vec!["0", "1.5"]);
    }

    #[test]
    fn test_fraction_digits_trimmed() {
        let labels = axis_labels(0.0, 0.5, 160.0, 80.0);
        assert_eq!(texts(&labels), vec!["0", "0.25", "0.5"]);
    }
}
