//! Segment geometry loaders.
//!
//! Each year may ship its segment centerlines as a `GeoJSON`
//! `FeatureCollection`. The first readable candidate path for a year is
//! used; unreadable files are logged and the next candidate is tried.

use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, GeoJson};

use crate::{DataLayout, SourceError};

/// Features loaded from one year's geometry file.
#[derive(Debug, Clone)]
pub struct YearGeometry {
    pub year: u16,
    pub path: PathBuf,
    pub features: Vec<Feature>,
}

/// Reads a `GeoJSON` file that must contain a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be read, or
/// [`SourceError::GeoJson`] if it is not a valid feature collection.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let to_error = |e: geojson::Error| SourceError::GeoJson {
        path: path.display().to_string(),
        source: Box::new(e),
    };

    let geojson: GeoJson = text.parse().map_err(to_error)?;
    FeatureCollection::try_from(geojson).map_err(to_error)
}

/// Loads geometry for each year in `years`, preserving their order.
///
/// Years with no readable file are omitted.
#[must_use]
pub fn load_geometry_years(layout: &DataLayout, years: &[u16]) -> Vec<YearGeometry> {
    let mut loaded = Vec::new();

    for &year in years {
        let found = layout
            .geometry_candidates(year)
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match read_feature_collection(&path) {
                Ok(collection) => Some((path, collection)),
                Err(e) => {
                    log::warn!("Ignoring unreadable geometry file: {e}");
                    None
                }
            });

        match found {
            Some((path, collection)) => {
                log::info!(
                    "Loaded {} geometry features for {year} from {}",
                    collection.features.len(),
                    path.display()
                );
                loaded.push(YearGeometry {
                    year,
                    path,
                    features: collection.features,
                });
            }
            None => log::debug!("No segment geometry found for {year}"),
        }
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"CORR_ID": "C1", "DEPT_ID": "D", "CORR_MP": "0+0", "CORR_ENDMP": "1+0"},
            "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 0.0]]}
        }]
    }"#;

    fn scratch_layout(name: &str) -> DataLayout {
        let dir = std::env::temp_dir().join(format!(
            "road_safety_geometry_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        DataLayout::new(dir)
    }

    #[test]
    fn falls_through_to_next_readable_candidate() {
        let layout = scratch_layout("fallthrough");
        let [shared, per_year, upper] = layout.geometry_candidates(2022);
        std::fs::create_dir_all(shared.parent().unwrap()).unwrap();
        std::fs::create_dir_all(per_year.parent().unwrap()).unwrap();
        std::fs::write(&shared, "not json").unwrap();
        std::fs::write(&upper, COLLECTION).unwrap();

        let years = load_geometry_years(&layout, &[2023, 2022]);
        assert_eq!(years.len(), 1);
        assert_eq!(years[0].year, 2022);
        assert_eq!(years[0].path, upper);
        assert_eq!(years[0].features.len(), 1);
    }

    #[test]
    fn rejects_non_collection_documents() {
        let layout = scratch_layout("non_collection");
        let path = layout.data_dir().join("point.json");
        std::fs::write(&path, r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#).unwrap();
        assert!(matches!(
            read_feature_collection(&path),
            Err(SourceError::GeoJson { .. })
        ));
    }
}
