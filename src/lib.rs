//! geofetch: A Fast, Modular Geospatial Catalog and Raster Workflow Toolkit
//!
//! This library covers the recurring remote-sensing workflow of
//! searching a STAC-style item catalog, decoding remote raster assets,
//! applying per-pixel transforms (normalized difference indices,
//! polygon masking, colormap rendering) and persisting derived
//! GeoTIFFs to object storage.

pub mod core;
pub mod io;
pub mod types;
pub mod workflow;

// Re-export main types and functions for easier access
pub use types::{
    AreaOfInterest, AssetRef, Band, BoundingBox, CatalogItem, ColorEntry, Colormap, FetchError,
    FetchResult, GeoTransform, RasterAsset, Sample,
};

pub use crate::core::{
    apply_colormap, apply_ramp, linear_ramp, ndvi, normalized_difference, PolygonMask,
};

pub use io::{
    decode_geotiff, encode_geotiff, AssetReader, BlobStore, CatalogClient, NoopSigner,
    QueryTokenSigner, SearchParams, TokenProvider,
};

pub use workflow::{fetch_scene, index_to_storage, IndexUpload};
