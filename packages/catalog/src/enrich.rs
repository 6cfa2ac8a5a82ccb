//! Route metadata enrichment.
//!
//! Route metadata rows are grouped by the base of their route id (the id
//! with one trailing letter removed, so `N-5A` and `N-5` share a group).
//! Within a group, the row whose reference-point range contains the
//! segment's midpoint wins; otherwise the group's first row is used. This
//! only affects display fields, never counts.

use std::collections::BTreeMap;

use road_safety_segment_models::{
    RouteInfo, RouteMetadataRow, Segment, normalize_id, parse_numeric,
};

#[derive(Debug, Clone, PartialEq)]
struct RouteCandidate {
    info: RouteInfo,
    begin: Option<f64>,
    end: Option<f64>,
}

impl RouteCandidate {
    fn contains(&self, milepost: f64) -> bool {
        match (self.begin, self.end) {
            (Some(begin), Some(end)) => begin <= milepost && milepost <= end,
            _ => false,
        }
    }
}

/// Route metadata grouped by route-id base.
#[derive(Debug, Clone, Default)]
pub struct RouteIndex {
    groups: BTreeMap<String, Vec<RouteCandidate>>,
}

impl RouteIndex {
    /// Groups metadata rows by route-id base, preserving table order within
    /// each group.
    #[must_use]
    pub fn from_rows(rows: &[RouteMetadataRow]) -> Self {
        let mut groups: BTreeMap<String, Vec<RouteCandidate>> = BTreeMap::new();

        for row in rows {
            let route_id = normalize_id(row.route_id.as_deref().unwrap_or_default());
            groups
                .entry(route_base(&route_id).to_string())
                .or_default()
                .push(RouteCandidate {
                    info: RouteInfo {
                        route_name: trimmed(row.route_name.as_deref()),
                        signed_route: trimmed(row.signed_route.as_deref()),
                        system: trimmed(row.system.as_deref()),
                    },
                    begin: parse_numeric(row.begin_ref.as_deref()).map(round3),
                    end: parse_numeric(row.end_ref.as_deref()).map(round3),
                });
        }

        log::info!(
            "Loaded {} route metadata rows in {} route groups",
            rows.len(),
            groups.len()
        );

        Self { groups }
    }

    /// Number of route groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Finds display metadata for a segment.
    ///
    /// The corridor id is tried first, then the department id.
    #[must_use]
    pub fn lookup(&self, segment: &Segment) -> Option<&RouteInfo> {
        let candidates = self
            .groups
            .get(segment.key.corridor_id())
            .or_else(|| self.groups.get(segment.key.department_id()))?;

        segment
            .midpoint()
            .and_then(|mid| candidates.iter().find(|c| c.contains(mid)))
            .or_else(|| candidates.first())
            .map(|c| &c.info)
    }
}

/// Strips a single trailing ASCII letter from a route id.
fn route_base(route_id: &str) -> &str {
    match route_id.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => &route_id[..route_id.len() - 1],
        _ => route_id,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use road_safety_segment_models::SegmentRow;

    use super::*;

    fn meta(route_id: &str, name: &str, begin: &str, end: &str) -> RouteMetadataRow {
        RouteMetadataRow {
            route_id: Some(route_id.to_string()),
            route_name: Some(name.to_string()),
            signed_route: None,
            system: Some("PRIMARY".to_string()),
            begin_ref: Some(begin.to_string()),
            end_ref: Some(end.to_string()),
        }
    }

    fn segment(corr: &str, dept: &str, start: &str, end: &str) -> Segment {
        Segment::from_row(
            &SegmentRow {
                corridor_id: Some(corr.to_string()),
                department_id: Some(dept.to_string()),
                start_mp: Some(start.to_string()),
                end_mp: Some(end.to_string()),
                ..SegmentRow::default()
            },
            0,
        )
    }

    #[test]
    fn strips_single_trailing_letter() {
        assert_eq!(route_base("N-5A"), "N-5");
        assert_eq!(route_base("N-5"), "N-5");
        assert_eq!(route_base("C000200E"), "C000200");
        assert_eq!(route_base(""), "");
    }

    #[test]
    fn picks_candidate_containing_midpoint() {
        let index = RouteIndex::from_rows(&[
            meta("C1E", "FIRST", "0.0", "5.0"),
            meta("c1", "SECOND", "5.0", "10.0"),
        ]);
        assert_eq!(index.len(), 1);

        let seg = segment("C1", "D", "006+0.0", "008+0.0");
        let info = index.lookup(&seg).unwrap();
        assert_eq!(info.route_name.as_deref(), Some("SECOND"));
        assert_eq!(info.system.as_deref(), Some("PRIMARY"));
    }

    #[test]
    fn falls_back_to_first_candidate() {
        let index = RouteIndex::from_rows(&[
            meta("C1", "FIRST", "0.0", "1.0"),
            meta("C1", "SECOND", "1.0", "2.0"),
        ]);
        let seg = segment("C1", "D", "050+0.0", "051+0.0");
        assert_eq!(
            index.lookup(&seg).unwrap().route_name.as_deref(),
            Some("FIRST")
        );

        let unparsed = segment("C1", "D", "bad", "051+0.0");
        assert_eq!(
            index.lookup(&unparsed).unwrap().route_name.as_deref(),
            Some("FIRST")
        );
    }

    #[test]
    fn falls_back_to_department_group() {
        let index = RouteIndex::from_rows(&[meta("N-5", "DEPT ROUTE", "0.0", "9.0")]);
        let seg = segment("C9", "N-5", "1+0.0", "2+0.0");
        assert_eq!(
            index.lookup(&seg).unwrap().route_name.as_deref(),
            Some("DEPT ROUTE")
        );
        assert!(index.lookup(&segment("C9", "X", "1+0.0", "2+0.0")).is_none());
    }

    #[test]
    fn reference_points_round_to_three_decimals() {
        let index = RouteIndex::from_rows(&[meta("C1", "R", "1.0004", "2.0004")]);
        let seg = segment("C1", "D", "002+0.0", "002+0.0");
        assert_eq!(index.lookup(&seg).unwrap().route_name.as_deref(), Some("R"));
        let candidate = &index.groups["C1"][0];
        assert!((candidate.end.unwrap() - 2.0).abs() < 1e-12);
    }
}
