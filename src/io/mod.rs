//! Catalog, raster asset and object storage I/O

pub mod asset;
pub mod catalog;
pub mod storage;

pub use asset::{AssetReader, NoopSigner, QueryTokenSigner, TokenProvider};
pub use catalog::{CatalogClient, SearchParams};
pub use storage::{decode_geotiff, encode_geotiff, BlobStore};
