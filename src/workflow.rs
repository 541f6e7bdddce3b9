//! Linear workflow entry points: Query → Read → (Transform) → Sink.
//!
//! Each step blocks until the remote call completes and releases its
//! resources before the next step starts. Failures propagate to the
//! caller of the whole workflow; an empty catalog result is a normal
//! outcome, not an error.

use crate::core::{normalized_difference, PolygonMask};
use crate::io::{
    encode_geotiff, AssetReader, BlobStore, CatalogClient, SearchParams, TokenProvider,
};
use crate::types::{AreaOfInterest, FetchResult, RasterAsset};

/// Query the catalog and decode the named asset of the first match.
///
/// Returns Ok(None) when the search matches nothing.
pub fn fetch_scene(
    client: &CatalogClient,
    params: &SearchParams,
    asset_key: &str,
    bands: &[usize],
    signer: &dyn TokenProvider,
) -> FetchResult<Option<RasterAsset>> {
    let item = match client.search_first(params)? {
        Some(item) => item,
        None => {
            log::info!("Search matched no items in '{}'", params.collection);
            return Ok(None);
        }
    };

    log::info!("Fetching asset '{}' of item '{}'", asset_key, item.id);
    let href = item.asset(asset_key)?.href.clone();

    let raster = {
        let reader = AssetReader::open(&href, signer)?;
        reader.read_asset(bands)?
        // remote handle closes here, before any transform runs
    };

    Ok(Some(raster))
}

/// Parameters for the index-and-upload workflow
pub struct IndexUpload<'a> {
    /// 1-based band holding the first index input (e.g. near-infrared)
    pub band_a: usize,
    /// 1-based band holding the second index input (e.g. red)
    pub band_b: usize,
    /// Optional polygon to mask/crop the index to
    pub area: Option<&'a AreaOfInterest>,
    /// No-data sentinel written to the output raster
    pub nodata: f32,
    /// Destination blob name
    pub blob_name: &'a str,
}

/// Full derived-raster workflow: query, read two bands, compute the
/// normalized difference, optionally mask by a polygon, encode a
/// compressed GeoTIFF and upload it with overwrite.
///
/// Returns the uploaded blob's unsigned URL, or None when the search
/// matched nothing.
pub fn index_to_storage(
    client: &CatalogClient,
    params: &SearchParams,
    asset_key: &str,
    job: &IndexUpload,
    store: &BlobStore,
    read_signer: &dyn TokenProvider,
    write_signer: &dyn TokenProvider,
) -> FetchResult<Option<String>> {
    let raster = match fetch_scene(
        client,
        params,
        asset_key,
        &[job.band_a, job.band_b],
        read_signer,
    )? {
        Some(raster) => raster,
        None => return Ok(None),
    };

    let index = normalized_difference(raster.band(0)?, raster.band(1)?)?;

    let (data, transform) = match job.area {
        Some(AreaOfInterest::Polygon(ring)) => {
            let mask = PolygonMask::new(ring.clone(), job.nodata)?;
            mask.apply(&index, &raster.transform)?
        }
        Some(AreaOfInterest::Bbox(bbox)) => {
            let ring = vec![
                (bbox.min_lon, bbox.min_lat),
                (bbox.max_lon, bbox.min_lat),
                (bbox.max_lon, bbox.max_lat),
                (bbox.min_lon, bbox.max_lat),
            ];
            let mask = PolygonMask::new(ring, job.nodata)?;
            mask.apply(&index, &raster.transform)?
        }
        None => (index, raster.transform.clone()),
    };

    let bytes = encode_geotiff(
        &[data],
        &transform,
        raster.epsg,
        Some(job.nodata as f64),
    )?;

    store.put(job.blob_name, bytes, "image/tiff", write_signer)?;
    Ok(Some(store.blob_url(job.blob_name)))
}
