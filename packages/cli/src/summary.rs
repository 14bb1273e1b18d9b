//! Plain-text summary of an analysis result.

use std::fmt::Write as _;

use soil_map_analysis_models::AnalysisResult;

/// Formats one line per map unit, largest first, followed by totals.
pub fn format(result: &AnalysisResult) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:<10} {:>12} {:<24} {:<16} METHOD",
        "MUKEY", "ACRES", "COMPONENT", "TEXTURE"
    );
    let _ = writeln!(out, "{}", "-".repeat(80));

    for unit in &result.units {
        let method = unit
            .features
            .first()
            .map_or("-", |feature| feature.method.as_ref());
        let _ = writeln!(
            out,
            "{:<10} {:>12.3} {:<24} {:<16} {method}",
            unit.mukey,
            unit.area_acres,
            unit.properties.component_name.as_deref().unwrap_or("-"),
            unit.properties.texture.as_deref().unwrap_or("-"),
        );
    }

    let _ = writeln!(
        out,
        "{} map units, {:.3} acres",
        result.mapunit_count, result.total_area_acres
    );

    if let Some(partial) = &result.partial_union {
        let _ = writeln!(
            out,
            "warning: {} of {} input features could not be merged into the study area",
            partial.skipped_features.len(),
            partial.total_features
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use soil_map_analysis_models::PartialUnion;

    use super::*;

    #[test]
    fn empty_result_has_totals_only() {
        let text = format(&AnalysisResult::empty(json!({}), None));
        assert!(text.starts_with("MUKEY"));
        assert!(text.contains("0 map units, 0.000 acres"));
        assert!(!text.contains("warning"));
    }

    #[test]
    fn partial_union_is_flagged() {
        let partial = PartialUnion {
            total_features: 3,
            skipped_features: vec![1],
        };
        let text = format(&AnalysisResult::empty(json!({}), Some(partial)));
        assert!(text.contains("warning: 1 of 3 input features"));
    }
}
