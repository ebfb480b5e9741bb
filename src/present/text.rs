use std::fmt::Write as _;

use super::{DetectionRow, ResultView};

const HEADERS: [&str; 5] = ["#", "Class", "Confidence", "Center", "Bounding Box"];

/// Render a result view as plain terminal text.
pub fn render_text(view: &ResultView) -> String {
    let mut out = String::new();
    let stats = &view.stats;
    let _ = writeln!(out, "Detection Results");
    let _ = writeln!(out, "  Total objects:   {}", stats.total_detections);
    let _ = writeln!(out, "  Avg confidence:  {}", stats.average_confidence);
    let _ = writeln!(out, "  Processing time: {}", stats.processing_time);
    let _ = writeln!(out, "  Timestamp:       {}", stats.timestamp);

    let _ = writeln!(out);
    let _ = writeln!(out, "Class Distribution");
    if view.classes.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    let name_width = view
        .classes
        .iter()
        .map(|row| row.class_name.chars().count())
        .max()
        .unwrap_or(0);
    for row in &view.classes {
        let _ = writeln!(
            out,
            "  {:<width$}  {:>4}  {}",
            row.class_name,
            row.count,
            row.color,
            width = name_width
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Detections");
    if view.detections.is_empty() {
        let _ = writeln!(out, "  (none)");
        return out;
    }
    let widths = column_widths(&view.detections);
    write_row(&mut out, &widths, HEADERS.map(str::to_string));
    for row in &view.detections {
        write_row(
            &mut out,
            &widths,
            [
                row.index.to_string(),
                row.class_name.clone(),
                format!("{} ({})", row.confidence, row.tier.as_str()),
                row.center.clone(),
                row.bounding_box.clone(),
            ],
        );
    }
    out
}

fn column_widths(rows: &[DetectionRow]) -> [usize; 5] {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in rows {
        let cells = [
            row.index.to_string().len(),
            row.class_name.chars().count(),
            row.confidence.len() + row.tier.as_str().len() + 3,
            row.center.len(),
            row.bounding_box.len(),
        ];
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell);
        }
    }
    widths
}

fn write_row(out: &mut String, widths: &[usize; 5], cells: [String; 5]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "  {}", line.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::{ClassRow, ConfidenceTier, StatsView};

    fn view(detections: Vec<DetectionRow>) -> ResultView {
        ResultView {
            stats: StatsView {
                total_detections: detections.len() as u64,
                average_confidence: "91.0%".into(),
                processing_time: "12ms".into(),
                timestamp: "2024-05-01 12:00:00".into(),
            },
            classes: vec![ClassRow {
                class_name: "FireAlarm".into(),
                count: 1,
                color: "#ffff00",
            }],
            detections,
            has_image: true,
        }
    }

    #[test]
    fn renders_sections() {
        let text = render_text(&view(vec![DetectionRow {
            index: 1,
            class_name: "FireAlarm".into(),
            confidence: "91.0%".into(),
            tier: ConfidenceTier::High,
            center: "(60, 120)".into(),
            bounding_box: "[10, 20, 110, 220]".into(),
        }]));
        assert!(text.contains("Total objects:   1"));
        assert!(text.contains("FireAlarm     1  #ffff00"));
        assert!(text.contains("91.0% (high)"));
        assert!(text.contains("[10, 20, 110, 220]"));
    }

    #[test]
    fn empty_table_says_none() {
        let text = render_text(&view(vec![]));
        assert!(text.ends_with("Detections\n  (none)\n"));
    }
}
