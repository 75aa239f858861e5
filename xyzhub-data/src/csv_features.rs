//! Conversion of CSV rows into point features.
//!
//! Coordinates come from explicitly named columns, from a single
//! `(lat,lon)` column, or from the first headers matching the usual names
//! (`lat`/`latitude`/`y`..., `lon`/`lng`/`x`...). Rows without a valid
//! WGS84 coordinate keep a `null` geometry. Every column, coordinates
//! included, becomes a property; numeric-looking values become JSON numbers
//! unless the column is listed as a string field.

use geo::Coord;
use log::warn;
use serde_json::{Map, Number, Value, json};
use xyzhub_core::Feature;

use crate::ingest::CsvRow;

const LATITUDE_NAMES: [&str; 5] = ["lat", "latitude", "y", "ycoord", "ycoordinate"];
const LONGITUDE_NAMES: [&str; 7] = ["lon", "long", "longitude", "lng", "x", "xcoord", "xcoordinate"];

/// Column selection for [`CsvConverter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvOptions {
    /// Latitude column overriding detection.
    pub lat: Option<String>,
    /// Longitude column overriding detection.
    pub lon: Option<String>,
    /// Column holding `lat,lon` in one value; takes precedence.
    pub point: Option<String>,
    /// Columns kept as strings even when they look numeric.
    pub string_fields: Vec<String>,
}

impl CsvOptions {
    /// Parse a comma-separated list of string-typed columns.
    #[must_use]
    pub fn with_string_fields(mut self, fields: &str) -> Self {
        self.string_fields = fields
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_owned)
            .collect();
        self
    }
}

/// Turns [`CsvRow`]s into GeoJSON features.
///
/// # Examples
/// ```
/// use xyzhub_data::csv_features::{CsvConverter, CsvOptions};
/// use xyzhub_data::ingest::CsvRow;
///
/// let row: CsvRow = [("Latitude", "52.5"), ("lng", "13.4"), ("name", "Berlin")]
///     .into_iter()
///     .map(|(k, v)| (k.to_owned(), v.to_owned()))
///     .collect();
/// let feature = CsvConverter::new(CsvOptions::default()).convert(&row);
/// assert_eq!(feature.geometry["coordinates"], serde_json::json!([13.4, 52.5]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CsvConverter {
    options: CsvOptions,
}

impl CsvConverter {
    /// Build a converter with the given column selection.
    #[must_use]
    pub const fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    /// Convert one row into a feature.
    #[must_use]
    pub fn convert(&self, row: &CsvRow) -> Feature {
        let properties: Map<String, Value> = row
            .iter()
            .map(|(name, value)| (name.to_owned(), self.property_value(name, value)))
            .collect();
        let geometry = match self.coordinate(row) {
            Some(coord) => json!({"type": "Point", "coordinates": [coord.x, coord.y]}),
            None => {
                warn!("CSV row has no valid coordinate; uploading without geometry");
                Value::Null
            }
        };
        Feature::new(geometry, properties)
    }

    fn coordinate(&self, row: &CsvRow) -> Option<Coord<f64>> {
        if let Some(column) = &self.options.point {
            let (lat, lon) = split_point(row.get(column)?)?;
            return validated_coord(lon, lat);
        }
        let lat_column = self
            .options
            .lat
            .clone()
            .or_else(|| detect_column(row, &LATITUDE_NAMES))?;
        let lon_column = self
            .options
            .lon
            .clone()
            .or_else(|| detect_column(row, &LONGITUDE_NAMES))?;
        let lat = parse_degrees(row.get(&lat_column)?)?;
        let lon = parse_degrees(row.get(&lon_column)?)?;
        validated_coord(lon, lat)
    }

    fn property_value(&self, name: &str, raw: &str) -> Value {
        if self.options.string_fields.iter().any(|field| field == name) {
            return Value::String(raw.to_owned());
        }
        numeric(raw).unwrap_or_else(|| Value::String(raw.to_owned()))
    }
}

fn detect_column(row: &CsvRow, candidates: &[&str]) -> Option<String> {
    row.headers()
        .find(|header| {
            candidates
                .iter()
                .any(|candidate| header.eq_ignore_ascii_case(candidate))
        })
        .map(str::to_owned)
}

fn split_point(raw: &str) -> Option<(f64, f64)> {
    let inner = raw
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let (lat, lon) = inner.split_once(',')?;
    Some((parse_degrees(lat)?, parse_degrees(lon)?))
}

fn parse_degrees(raw: &str) -> Option<f64> {
    raw.trim().parse().ok()
}

fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

fn numeric(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Value::Number(integer.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(fields: &[(&str, &str)]) -> CsvRow {
        fields
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[rstest]
    #[case(&[("lat", "52.5"), ("lon", "13.4")])]
    #[case(&[("LATITUDE", "52.5"), ("Longitude", "13.4")])]
    #[case(&[("y", "52.5"), ("x", "13.4")])]
    #[case(&[("ycoord", "52.5"), ("lng", "13.4")])]
    fn detects_coordinate_columns(#[case] fields: &[(&str, &str)]) {
        let feature = CsvConverter::default().convert(&row(fields));
        assert_eq!(
            feature.geometry,
            json!({"type": "Point", "coordinates": [13.4, 52.5]})
        );
    }

    #[rstest]
    fn explicit_columns_win_over_detection() {
        let options = CsvOptions {
            lat: Some("north".into()),
            lon: Some("east".into()),
            ..CsvOptions::default()
        };
        let feature = CsvConverter::new(options).convert(&row(&[
            ("lat", "1"),
            ("lon", "1"),
            ("north", "10"),
            ("east", "20"),
        ]));
        assert_eq!(feature.geometry["coordinates"], json!([20.0, 10.0]));
    }

    #[rstest]
    #[case("(52.5, 13.4)")]
    #[case("52.5,13.4")]
    fn point_column_holds_lat_then_lon(#[case] point: &str) {
        let options = CsvOptions {
            point: Some("where".into()),
            ..CsvOptions::default()
        };
        let feature = CsvConverter::new(options).convert(&row(&[("where", point)]));
        assert_eq!(feature.geometry["coordinates"], json!([13.4, 52.5]));
    }

    #[rstest]
    #[case(&[("lat", "95"), ("lon", "10")])]
    #[case(&[("lat", "north"), ("lon", "10")])]
    #[case(&[("name", "nowhere")])]
    fn invalid_coordinates_leave_geometry_empty(#[case] fields: &[(&str, &str)]) {
        let feature = CsvConverter::default().convert(&row(fields));
        assert_eq!(feature.geometry, Value::Null);
    }

    #[rstest]
    fn coerces_numbers_unless_string_field() {
        let options = CsvOptions::default().with_string_fields("zip, code");
        let feature = CsvConverter::new(options).convert(&row(&[
            ("zip", "01234"),
            ("count", "7"),
            ("ratio", "0.5"),
            ("label", "7th"),
            ("blank", ""),
        ]));
        assert_eq!(feature.property("zip"), Some(&json!("01234")));
        assert_eq!(feature.property("count"), Some(&json!(7)));
        assert_eq!(feature.property("ratio"), Some(&json!(0.5)));
        assert_eq!(feature.property("label"), Some(&json!("7th")));
        assert_eq!(feature.property("blank"), Some(&json!("")));
    }
}
