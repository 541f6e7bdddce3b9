use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Real-valued raster sample data
pub type Sample = f32;

/// 2D raster band (row x column)
pub type Band = Array2<Sample>;

/// Geospatial bounding box in geographic coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Bounding box as [min_lon, min_lat, max_lon, max_lat] (GeoJSON order)
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Affine georeferencing transform (GDAL 6-parameter convention)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Geographic coordinates of a pixel's top-left corner
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.top_left_x + col * self.pixel_width + row * self.rotation_x;
        let y = self.top_left_y + col * self.rotation_y + row * self.pixel_height;
        (x, y)
    }

    /// Fractional pixel coordinates of a geographic point (north-up rasters)
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.top_left_x) / self.pixel_width;
        let row = (y - self.top_left_y) / self.pixel_height;
        (col, row)
    }

    /// Transform for a sub-window starting at (col_off, row_off)
    pub fn window(&self, col_off: usize, row_off: usize) -> GeoTransform {
        let (x, y) = self.pixel_to_geo(col_off as f64, row_off as f64);
        GeoTransform {
            top_left_x: x,
            top_left_y: y,
            ..self.clone()
        }
    }
}

/// Geographic filter: a polygon (exterior ring) or a plain bounding box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AreaOfInterest {
    Bbox(BoundingBox),
    /// Exterior ring as (lon, lat) vertices; closure is implicit
    Polygon(Vec<(f64, f64)>),
}

impl AreaOfInterest {
    pub fn bbox(&self) -> BoundingBox {
        match self {
            AreaOfInterest::Bbox(b) => b.clone(),
            AreaOfInterest::Polygon(ring) => {
                let mut bbox = BoundingBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
                for &(lon, lat) in ring {
                    bbox.min_lon = bbox.min_lon.min(lon);
                    bbox.max_lon = bbox.max_lon.max(lon);
                    bbox.min_lat = bbox.min_lat.min(lat);
                    bbox.max_lat = bbox.max_lat.max(lat);
                }
                bbox
            }
        }
    }

    /// GeoJSON geometry for catalog `intersects` filters
    pub fn to_geojson(&self) -> serde_json::Value {
        match self {
            AreaOfInterest::Bbox(b) => serde_json::json!({
                "type": "Polygon",
                "coordinates": [[
                    [b.min_lon, b.min_lat],
                    [b.max_lon, b.min_lat],
                    [b.max_lon, b.max_lat],
                    [b.min_lon, b.max_lat],
                    [b.min_lon, b.min_lat],
                ]]
            }),
            AreaOfInterest::Polygon(ring) => {
                let mut coords: Vec<[f64; 2]> =
                    ring.iter().map(|&(lon, lat)| [lon, lat]).collect();
                if coords.first() != coords.last() {
                    if let Some(first) = coords.first().copied() {
                        coords.push(first);
                    }
                }
                serde_json::json!({
                    "type": "Polygon",
                    "coordinates": [coords]
                })
            }
        }
    }
}

/// A single downloadable asset attached to a catalog item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRef {
    pub href: String,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One item returned by a catalog search. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    #[serde(default)]
    pub collection: Option<String>,
    /// Item footprint as a GeoJSON geometry
    pub geometry: serde_json::Value,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    pub properties: HashMap<String, serde_json::Value>,
    pub assets: HashMap<String, AssetRef>,
}

impl CatalogItem {
    /// Acquisition datetime from the standard `datetime` property
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.properties
            .get("datetime")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Footprint bounding box, when the catalog supplied one
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let b = self.bbox.as_ref()?;
        if b.len() < 4 {
            return None;
        }
        Some(BoundingBox::new(b[0], b[1], b[2], b[3]))
    }

    pub fn asset(&self, key: &str) -> FetchResult<&AssetRef> {
        self.assets.get(key).ok_or_else(|| {
            FetchError::Catalog(format!("item '{}' has no asset '{}'", self.id, key))
        })
    }
}

/// A single RGBA colormap entry keyed by raster sample value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorEntry {
    pub value: i64,
    pub rgba: [u8; 4],
}

/// Ordered lookup table mapping sample values to display colors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Colormap {
    entries: Vec<ColorEntry>,
}

impl Colormap {
    /// Entries are sorted by value on construction
    pub fn new(mut entries: Vec<ColorEntry>) -> Self {
        entries.sort_by_key(|e| e.value);
        Self { entries }
    }

    pub fn entries(&self) -> &[ColorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-value lookup (embedded palettes are keyed by sample value)
    pub fn lookup(&self, value: i64) -> Option<[u8; 4]> {
        self.entries
            .binary_search_by_key(&value, |e| e.value)
            .ok()
            .map(|i| self.entries[i].rgba)
    }

    /// Nearest-entry lookup for continuous data
    pub fn lookup_nearest(&self, value: f64) -> Option<[u8; 4]> {
        if self.entries.is_empty() || !value.is_finite() {
            return None;
        }
        self.entries
            .iter()
            .min_by(|a, b| {
                let da = (a.value as f64 - value).abs();
                let db = (b.value as f64 - value).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|e| e.rgba)
    }
}

/// Decoded raster asset: pixel bands plus georeferencing
#[derive(Debug, Clone)]
pub struct RasterAsset {
    pub bands: Vec<Band>,
    pub transform: GeoTransform,
    pub epsg: u32,
    pub nodata: Option<f64>,
    pub colormap: Option<Colormap>,
}

impl RasterAsset {
    pub fn band(&self, idx: usize) -> FetchResult<&Band> {
        self.bands
            .get(idx)
            .ok_or_else(|| FetchError::Processing(format!("band index {} out of range", idx)))
    }

    /// (rows, cols) of the first band
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.bands.first().map(|b| b.dim())
    }
}

/// Error types for catalog, raster and storage operations
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("JSON decoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

/// Result type for geofetch operations
pub type FetchResult<T> = Result<T, FetchError>;
