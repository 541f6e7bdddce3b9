use geofetch::io::{decode_geotiff, encode_geotiff, AssetReader, NoopSigner};
use geofetch::types::GeoTransform;
use ndarray::Array2;

fn sample_transform() -> GeoTransform {
    GeoTransform {
        top_left_x: -76.7,
        pixel_width: 0.001,
        rotation_x: 0.0,
        top_left_y: 39.0,
        rotation_y: 0.0,
        pixel_height: -0.001,
    }
}

#[test]
fn test_encode_decode_roundtrip() {
    let band = Array2::from_shape_fn((32, 48), |(r, c)| (r * 48 + c) as f32 / 10.0);
    let transform = sample_transform();

    let bytes = encode_geotiff(&[band.clone()], &transform, 4326, Some(-9999.0))
        .expect("Failed to encode GeoTIFF");
    assert!(!bytes.is_empty());
    // TIFF magic: little-endian "II*\0" or big-endian "MM\0*"
    assert!(&bytes[0..2] == b"II" || &bytes[0..2] == b"MM");

    let decoded = decode_geotiff(&bytes).expect("Failed to decode GeoTIFF");

    assert_eq!(decoded.bands.len(), 1);
    assert_eq!(decoded.bands[0], band, "pixel grid must round-trip exactly");
    assert_eq!(decoded.transform, transform);
    assert_eq!(decoded.epsg, 4326);
    assert_eq!(decoded.nodata, Some(-9999.0));
}

#[test]
fn test_multiband_roundtrip() {
    let nir = Array2::from_elem((8, 8), 0.8_f32);
    let red = Array2::from_elem((8, 8), 0.1_f32);
    let transform = sample_transform();

    let bytes = encode_geotiff(&[nir.clone(), red.clone()], &transform, 4326, None)
        .expect("Failed to encode multi-band GeoTIFF");
    let decoded = decode_geotiff(&bytes).expect("Failed to decode multi-band GeoTIFF");

    assert_eq!(decoded.bands.len(), 2);
    assert_eq!(decoded.bands[0], nir);
    assert_eq!(decoded.bands[1], red);
}

#[test]
fn test_mismatched_band_shapes_rejected() {
    let a = Array2::<f32>::zeros((4, 4));
    let b = Array2::<f32>::zeros((4, 5));
    let result = encode_geotiff(&[a, b], &sample_transform(), 4326, None);
    assert!(result.is_err());
}

#[test]
fn test_empty_band_list_rejected() {
    let result = encode_geotiff(&[], &sample_transform(), 4326, None);
    assert!(result.is_err());
}

#[test]
fn test_asset_reader_on_local_file() {
    let band = Array2::from_shape_fn((16, 16), |(r, c)| ((r + c) % 7) as f32);
    let transform = sample_transform();
    let bytes = encode_geotiff(&[band.clone()], &transform, 4326, Some(-9999.0))
        .expect("Failed to encode GeoTIFF");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("tile.tif");
    std::fs::write(&path, &bytes).expect("Failed to write temp GeoTIFF");

    let reader = AssetReader::open(path.to_str().unwrap(), &NoopSigner)
        .expect("Failed to open local GeoTIFF");

    assert_eq!(reader.size(), (16, 16));
    assert_eq!(reader.band_count(), 1);
    assert_eq!(reader.epsg(), 4326);
    assert_eq!(reader.nodata(1).unwrap(), Some(-9999.0));
    assert_eq!(reader.transform().unwrap(), transform);
    assert_eq!(reader.read_band(1).unwrap(), band);

    // Plain imagery has no embedded palette
    assert!(reader.read_colormap(1).unwrap().is_none());
}

#[test]
fn test_read_asset_bundles_bands_and_georeferencing() {
    let band = Array2::from_elem((4, 6), 3.5_f32);
    let bytes = encode_geotiff(&[band.clone()], &sample_transform(), 4326, None)
        .expect("Failed to encode GeoTIFF");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("asset.tif");
    std::fs::write(&path, &bytes).expect("Failed to write temp GeoTIFF");

    let reader = AssetReader::open(path.to_str().unwrap(), &NoopSigner)
        .expect("Failed to open local GeoTIFF");
    let asset = reader.read_asset(&[1]).expect("Failed to read asset");

    assert_eq!(asset.bands.len(), 1);
    assert_eq!(asset.shape(), Some((4, 6)));
    assert_eq!(asset.bands[0], band);
    assert_eq!(asset.epsg, 4326);
}
