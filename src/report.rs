//! Coordinator-side result of one analysis run.

use std::fmt;

use serde::Serialize;

use crate::band::Band;

/// Global answers, as computed at the coordinator.
///
/// `Display` renders the human-readable console report; the wording is not
/// stable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Non-zero cells outside column 0
    pub total: i32,
    /// Horizontal side of the bounding rectangle
    pub width: i32,
    /// Vertical side of the bounding rectangle
    pub height: i32,
    /// Bands in discovery order
    pub bands: Vec<Band>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "The number of non-white pixels of the given image is {}",
            self.total
        )?;
        writeln!(
            f,
            "The x side of the rectangle with minimal face that contains the image is {}",
            self.width
        )?;
        writeln!(
            f,
            "The y side of the rectangle with minimal face that contains the image is {}",
            self.height
        )?;
        for band in &self.bands {
            writeln!(
                f,
                "Top left: ({},{}), Bottom right: ({},{})",
                band.top_left.row, band.top_left.col, band.bottom_right.row, band.bottom_right.col
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_band() {
        let report = Report {
            total: 53,
            width: 11,
            height: 18,
            bands: vec![Band::ending_at(10, 2, 12, 14)],
        };
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with(" 53"));
        assert!(lines[1].ends_with(" 11"));
        assert!(lines[2].ends_with(" 18"));
        assert_eq!(lines[3], "Top left: (9,12), Bottom right: (10,14)");
    }

    #[test]
    fn serializes_to_json() {
        let report = Report {
            total: 0,
            width: -31,
            height: -31,
            bands: Vec::new(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["width"], -31);
        assert_eq!(json["bands"].as_array().map(Vec::len), Some(0));
    }
}
