use crate::types::{Band, ColorEntry, Colormap, FetchError, FetchResult, GeoTransform, RasterAsset};
use gdal::Dataset;
use ndarray::Array2;

/// Credential injection: rewrites an asset href with short-lived
/// access tokens before the first byte is read.
pub trait TokenProvider {
    fn sign(&self, href: &str) -> FetchResult<String>;
}

/// Pass-through signer for public assets
pub struct NoopSigner;

impl TokenProvider for NoopSigner {
    fn sign(&self, href: &str) -> FetchResult<String> {
        Ok(href.to_string())
    }
}

/// Appends a SAS-style query token to every href
pub struct QueryTokenSigner {
    token: String,
}

impl QueryTokenSigner {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.trim_start_matches('?').to_string(),
        }
    }
}

impl TokenProvider for QueryTokenSigner {
    fn sign(&self, href: &str) -> FetchResult<String> {
        if self.token.is_empty() {
            return Ok(href.to_string());
        }
        let sep = if href.contains('?') { '&' } else { '?' };
        Ok(format!("{}{}{}", href, sep, self.token))
    }
}

/// GDAL virtual filesystem path for an asset href
pub(crate) fn vsi_path(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        format!("/vsicurl/{}", href)
    } else {
        href.to_string()
    }
}

/// Remote raster asset reader backed by GDAL
pub struct AssetReader {
    dataset: Dataset,
    href: String,
}

impl AssetReader {
    /// Sign the href, then open it through GDAL. Remote hrefs are
    /// streamed via `/vsicurl/`; local paths open directly.
    pub fn open(href: &str, signer: &dyn TokenProvider) -> FetchResult<Self> {
        let signed = signer.sign(href)?;
        let path = vsi_path(&signed);

        log::info!("Opening raster asset: {}", href);
        log::debug!("GDAL path: {}", path);

        let dataset = Dataset::open(&path)?;
        Ok(Self {
            dataset,
            href: href.to_string(),
        })
    }

    /// (width, height) in pixels
    pub fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    pub fn band_count(&self) -> usize {
        self.dataset.raster_count() as usize
    }

    pub fn transform(&self) -> FetchResult<GeoTransform> {
        let gt = self.dataset.geo_transform()?;
        Ok(GeoTransform::from_gdal(&gt))
    }

    /// EPSG code of the asset's spatial reference; falls back to
    /// geographic WGS84 when the authority code is missing.
    pub fn epsg(&self) -> u32 {
        match self.dataset.spatial_ref().and_then(|sr| sr.auth_code()) {
            Ok(code) => code as u32,
            Err(_) => {
                log::warn!("Asset {} has no EPSG authority code, assuming 4326", self.href);
                4326
            }
        }
    }

    /// No-data value of a 1-based band
    pub fn nodata(&self, band: usize) -> FetchResult<Option<f64>> {
        Ok(self.dataset.rasterband(band as isize)?.no_data_value())
    }

    /// Decode one 1-based band into a (rows x cols) array
    pub fn read_band(&self, band: usize) -> FetchResult<Band> {
        let (width, height) = self.dataset.raster_size();
        log::debug!("Reading band {} ({}x{}) from {}", band, width, height, self.href);

        let rasterband = self.dataset.rasterband(band as isize)?;
        let data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        Array2::from_shape_vec((height, width), data.data).map_err(|e| {
            FetchError::Processing(format!("failed to reshape band {}: {}", band, e))
        })
    }

    pub fn read_bands(&self, bands: &[usize]) -> FetchResult<Vec<Band>> {
        bands.iter().map(|&b| self.read_band(b)).collect()
    }

    /// Embedded palette of a 1-based band, independent of pixel
    /// decoding. Returns None when the format carries no colormap.
    pub fn read_colormap(&self, band: usize) -> FetchResult<Option<Colormap>> {
        let rasterband = self.dataset.rasterband(band as isize)?;
        let table = match rasterband.color_table() {
            Some(t) => t,
            None => {
                log::debug!("Band {} of {} has no embedded colormap", band, self.href);
                return Ok(None);
            }
        };

        let mut entries = Vec::with_capacity(table.entry_count());
        for idx in 0..table.entry_count() {
            if let Some(c) = table.entry_as_rgb(idx) {
                entries.push(ColorEntry {
                    value: idx as i64,
                    rgba: [c.r as u8, c.g as u8, c.b as u8, c.a as u8],
                });
            }
        }

        log::debug!("Extracted colormap with {} entries", entries.len());
        Ok(Some(Colormap::new(entries)))
    }

    /// Decode the named bands plus georeferencing into a RasterAsset.
    /// The colormap, if any, is taken from the first requested band.
    pub fn read_asset(&self, bands: &[usize]) -> FetchResult<RasterAsset> {
        let first = *bands.first().ok_or_else(|| {
            FetchError::Processing("at least one band index is required".to_string())
        })?;

        Ok(RasterAsset {
            bands: self.read_bands(bands)?,
            transform: self.transform()?,
            epsg: self.epsg(),
            nodata: self.nodata(first)?,
            colormap: self.read_colormap(first)?,
        })
    }
}
