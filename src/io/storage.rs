use crate::io::asset::TokenProvider;
use crate::types::{Band, FetchError, FetchResult, GeoTransform, RasterAsset};
use gdal::raster::{Buffer, RasterCreationOption};
use gdal::{Dataset, DriverManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static VSIMEM_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn next_vsimem_path(tag: &str) -> String {
    let n = VSIMEM_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/vsimem/geofetch_{}_{}", tag, n)
}

/// Serialize raster bands plus georeferencing into a tiled,
/// DEFLATE-compressed GeoTIFF and return the encoded bytes.
///
/// The file is staged in GDAL's in-memory filesystem; nothing touches
/// disk.
pub fn encode_geotiff(
    bands: &[Band],
    transform: &GeoTransform,
    epsg: u32,
    nodata: Option<f64>,
) -> FetchResult<Vec<u8>> {
    let first = bands
        .first()
        .ok_or_else(|| FetchError::Processing("cannot encode a raster with no bands".to_string()))?;
    let (height, width) = first.dim();
    for (i, band) in bands.iter().enumerate() {
        if band.dim() != (height, width) {
            return Err(FetchError::Processing(format!(
                "band {} shape {:?} does not match {:?}",
                i + 1,
                band.dim(),
                (height, width)
            )));
        }
    }

    let vsi_path = next_vsimem_path("enc");
    log::debug!(
        "Encoding {}x{} GeoTIFF with {} band(s) to {}",
        width,
        height,
        bands.len(),
        vsi_path
    );

    {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let options = [
            RasterCreationOption {
                key: "COMPRESS",
                value: "DEFLATE",
            },
            RasterCreationOption {
                key: "TILED",
                value: "YES",
            },
        ];
        let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
            &vsi_path,
            width as isize,
            height as isize,
            bands.len() as isize,
            &options,
        )?;

        dataset.set_geo_transform(&transform.to_gdal())?;
        dataset.set_spatial_ref(&gdal::spatial_ref::SpatialRef::from_epsg(epsg)?)?;

        for (i, band) in bands.iter().enumerate() {
            let mut rasterband = dataset.rasterband((i + 1) as isize)?;
            let flat: Vec<f32> = band.iter().cloned().collect();
            let buffer = Buffer::new((width, height), flat);
            rasterband.write((0, 0), (width, height), &buffer)?;
            if let Some(nd) = nodata {
                rasterband.set_no_data_value(Some(nd))?;
            }
        }

        // dataset drops here, closing and finalizing the in-memory file
    }

    let bytes = take_vsimem_file(&vsi_path)?;
    log::info!("Encoded GeoTIFF: {} bytes", bytes.len());
    Ok(bytes)
}

/// Decode a GeoTIFF byte buffer back into a RasterAsset (all bands)
pub fn decode_geotiff(bytes: &[u8]) -> FetchResult<RasterAsset> {
    let vsi_path = next_vsimem_path("dec");

    unsafe {
        let c_path = std::ffi::CString::new(vsi_path.clone())
            .map_err(|e| FetchError::Processing(format!("invalid VSI path: {}", e)))?;
        gdal_sys::VSIFileFromMemBuffer(
            c_path.as_ptr(),
            bytes.as_ptr() as *mut std::os::raw::c_uchar,
            bytes.len() as u64,
            0, // don't take ownership
        );
    }

    let result = (|| -> FetchResult<RasterAsset> {
        let dataset = Dataset::open(&vsi_path)?;
        let (width, height) = dataset.raster_size();
        let count = dataset.raster_count() as usize;

        let mut bands = Vec::with_capacity(count);
        let mut nodata = None;
        for i in 1..=count {
            let rasterband = dataset.rasterband(i as isize)?;
            if i == 1 {
                nodata = rasterband.no_data_value();
            }
            let data =
                rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            bands.push(ndarray::Array2::from_shape_vec((height, width), data.data).map_err(
                |e| FetchError::Processing(format!("failed to reshape band {}: {}", i, e)),
            )?);
        }

        let epsg = match dataset.spatial_ref().and_then(|sr| sr.auth_code()) {
            Ok(code) => code as u32,
            Err(_) => 4326,
        };

        Ok(RasterAsset {
            bands,
            transform: GeoTransform::from_gdal(&dataset.geo_transform()?),
            epsg,
            nodata,
            colormap: None,
        })
    })();

    unsafe {
        if let Ok(c_path) = std::ffi::CString::new(vsi_path) {
            gdal_sys::VSIUnlink(c_path.as_ptr());
        }
    }

    result
}

/// Read a finished /vsimem file into an owned buffer and unlink it
fn take_vsimem_file(vsi_path: &str) -> FetchResult<Vec<u8>> {
    unsafe {
        let c_path = std::ffi::CString::new(vsi_path)
            .map_err(|e| FetchError::Processing(format!("invalid VSI path: {}", e)))?;

        let mut length: u64 = 0;
        let ptr = gdal_sys::VSIGetMemFileBuffer(c_path.as_ptr(), &mut length, 0);
        if ptr.is_null() {
            return Err(FetchError::Processing(format!(
                "no in-memory file at {}",
                vsi_path
            )));
        }

        let bytes = std::slice::from_raw_parts(ptr, length as usize).to_vec();
        gdal_sys::VSIUnlink(c_path.as_ptr());
        Ok(bytes)
    }
}

/// Object storage client addressed by (account endpoint, container).
///
/// Uploads are single PUTs with overwrite; a failed transfer leaving
/// no partially-written object visible is the storage service's
/// guarantee, not implemented here.
pub struct BlobStore {
    endpoint: String,
    container: String,
    client: reqwest::blocking::Client,
}

impl BlobStore {
    /// Azure-style account shorthand:
    /// `https://{account}.blob.core.windows.net/{container}`
    pub fn new(account: &str, container: &str) -> FetchResult<Self> {
        Self::with_endpoint(&format!("https://{}.blob.core.windows.net", account), container)
    }

    pub fn with_endpoint(endpoint: &str, container: &str) -> FetchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .user_agent("geofetch/0.2.0 (Raster Workflow Toolkit)")
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            container: container.trim_matches('/').to_string(),
            client,
        })
    }

    /// Unsigned address of a blob
    pub fn blob_url(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            self.container,
            name.trim_start_matches('/')
        )
    }

    /// Read-access URL with the signer's token applied
    pub fn signed_url(&self, name: &str, signer: &dyn TokenProvider) -> FetchResult<String> {
        signer.sign(&self.blob_url(name))
    }

    /// Upload a byte stream, overwriting any existing object at that
    /// location.
    pub fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        signer: &dyn TokenProvider,
    ) -> FetchResult<()> {
        let url = self.signed_url(name, signer)?;
        log::info!(
            "Uploading {} bytes to {}/{}",
            bytes.len(),
            self.container,
            name
        );

        let response = self
            .client
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .body(bytes)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(FetchError::Storage(format!(
                "upload of '{}' failed with HTTP {}: {}",
                name,
                status.as_u16(),
                detail.chars().take(200).collect::<String>()
            )));
        }

        log::info!("Upload of '{}' complete", name);
        Ok(())
    }

    /// Fetch a blob back as bytes via its signed URL
    pub fn get(&self, name: &str, signer: &dyn TokenProvider) -> FetchResult<Vec<u8>> {
        let url = self.signed_url(name, signer)?;
        log::debug!("Fetching blob {}/{}", self.container, name);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Storage(format!(
                "download of '{}' failed with HTTP {}",
                name,
                status.as_u16()
            )));
        }

        Ok(response.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::asset::QueryTokenSigner;

    #[test]
    fn test_blob_url_formatting() {
        let store = BlobStore::new("myaccount", "outputs").unwrap();
        assert_eq!(
            store.blob_url("ndvi/scene1.tif"),
            "https://myaccount.blob.core.windows.net/outputs/ndvi/scene1.tif"
        );
    }

    #[test]
    fn test_blob_url_trims_separators() {
        let store = BlobStore::with_endpoint("http://localhost:10000/", "/outputs/").unwrap();
        assert_eq!(
            store.blob_url("/a.tif"),
            "http://localhost:10000/outputs/a.tif"
        );
    }

    #[test]
    fn test_signed_url_carries_token() {
        let store = BlobStore::new("myaccount", "outputs").unwrap();
        let signer = QueryTokenSigner::new("sig=abc");
        let url = store.signed_url("a.tif", &signer).unwrap();
        assert_eq!(
            url,
            "https://myaccount.blob.core.windows.net/outputs/a.tif?sig=abc"
        );
    }
}
