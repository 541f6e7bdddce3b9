use crate::types::{Band, FetchError, FetchResult, GeoTransform, RasterAsset, Sample};
use ndarray::Array2;

/// Polygon mask applied in geographic space.
///
/// Output rasters are cropped to the polygon's bounding box and every
/// sample outside the polygon is set to the no-data sentinel.
/// Rasterization is inclusive: a boundary pixel is kept if any part
/// of its footprint intersects the polygon.
pub struct PolygonMask {
    ring: Vec<(f64, f64)>,
    nodata: Sample,
}

impl PolygonMask {
    /// Build a mask from an exterior ring of (lon, lat) vertices.
    /// Closure of the ring is implicit.
    pub fn new(mut ring: Vec<(f64, f64)>, nodata: Sample) -> FetchResult<Self> {
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first == last && ring.len() > 1 {
                ring.pop();
            }
        }
        if ring.len() < 3 {
            return Err(FetchError::Processing(
                "mask polygon needs at least 3 vertices".to_string(),
            ));
        }
        Ok(Self { ring, nodata })
    }

    pub fn nodata(&self) -> Sample {
        self.nodata
    }

    /// Mask one band. Returns the cropped array together with the
    /// geotransform of the cropped window. The input is not mutated.
    pub fn apply(&self, data: &Band, transform: &GeoTransform) -> FetchResult<(Band, GeoTransform)> {
        let (height, width) = data.dim();
        let (col_range, row_range) = self.window(transform, width, height)?;
        let (col0, col1) = col_range;
        let (row0, row1) = row_range;

        log::debug!(
            "Masking window cols {}..{} rows {}..{} of {}x{} raster",
            col0,
            col1,
            row0,
            row1,
            width,
            height
        );

        let mut out = Array2::from_elem((row1 - row0, col1 - col0), self.nodata);
        let mut kept = 0usize;

        for row in row0..row1 {
            for col in col0..col1 {
                if self.pixel_intersects(transform, col, row) {
                    out[[row - row0, col - col0]] = data[[row, col]];
                    kept += 1;
                }
            }
        }

        log::debug!("Mask kept {} of {} window pixels", kept, out.len());
        Ok((out, transform.window(col0, row0)))
    }

    /// Mask every band of an asset, preserving its georeferencing
    pub fn apply_asset(&self, asset: &RasterAsset) -> FetchResult<RasterAsset> {
        let mut bands = Vec::with_capacity(asset.bands.len());
        let mut out_transform = asset.transform.clone();
        for band in &asset.bands {
            let (masked, transform) = self.apply(band, &asset.transform)?;
            bands.push(masked);
            out_transform = transform;
        }
        Ok(RasterAsset {
            bands,
            transform: out_transform,
            epsg: asset.epsg,
            nodata: Some(self.nodata as f64),
            colormap: asset.colormap.clone(),
        })
    }

    /// Pixel window of the polygon bbox, clamped to the raster extent
    fn window(
        &self,
        transform: &GeoTransform,
        width: usize,
        height: usize,
    ) -> FetchResult<((usize, usize), (usize, usize))> {
        let mut min_col = f64::MAX;
        let mut max_col = f64::MIN;
        let mut min_row = f64::MAX;
        let mut max_row = f64::MIN;

        for &(lon, lat) in &self.ring {
            let (col, row) = transform.geo_to_pixel(lon, lat);
            min_col = min_col.min(col);
            max_col = max_col.max(col);
            min_row = min_row.min(row);
            max_row = max_row.max(row);
        }

        let col0 = min_col.floor().max(0.0) as usize;
        let row0 = min_row.floor().max(0.0) as usize;
        let col1 = (max_col.ceil() as isize).clamp(0, width as isize) as usize;
        let row1 = (max_row.ceil() as isize).clamp(0, height as isize) as usize;

        if col0 >= col1 || row0 >= row1 {
            return Err(FetchError::Processing(
                "mask polygon does not intersect the raster extent".to_string(),
            ));
        }

        Ok(((col0, col1), (row0, row1)))
    }

    /// Inclusive intersection test between one pixel square and the
    /// polygon: corner inside polygon, vertex inside pixel, or edge
    /// crossing.
    fn pixel_intersects(&self, transform: &GeoTransform, col: usize, row: usize) -> bool {
        let (x0, y0) = transform.pixel_to_geo(col as f64, row as f64);
        let (x1, y1) = transform.pixel_to_geo((col + 1) as f64, (row + 1) as f64);
        let (px_min_x, px_max_x) = (x0.min(x1), x0.max(x1));
        let (px_min_y, px_max_y) = (y0.min(y1), y0.max(y1));

        let corners = [
            (px_min_x, px_min_y),
            (px_max_x, px_min_y),
            (px_max_x, px_max_y),
            (px_min_x, px_max_y),
        ];
        if corners
            .iter()
            .any(|&(x, y)| point_in_ring(&self.ring, x, y))
        {
            return true;
        }

        if self.ring.iter().any(|&(x, y)| {
            x >= px_min_x && x <= px_max_x && y >= px_min_y && y <= px_max_y
        }) {
            return true;
        }

        let box_edges = [
            (corners[0], corners[1]),
            (corners[1], corners[2]),
            (corners[2], corners[3]),
            (corners[3], corners[0]),
        ];
        let n = self.ring.len();
        for i in 0..n {
            let a = self.ring[i];
            let b = self.ring[(i + 1) % n];
            if box_edges
                .iter()
                .any(|&(p, q)| segments_intersect(a, b, p, q))
            {
                return true;
            }
        }

        false
    }
}

/// Ray-casting point-in-polygon over the exterior ring
fn point_in_ring(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let n = ring.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn orientation(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn on_segment(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
    r.0 >= p.0.min(q.0) && r.0 <= p.0.max(q.0) && r.1 >= p.1.min(q.1) && r.1 <= p.1.max(q.1)
}

/// Segment intersection including collinear-touching cases
fn segments_intersect(a: (f64, f64), b: (f64, f64), p: (f64, f64), q: (f64, f64)) -> bool {
    let d1 = orientation(a, b, p);
    let d2 = orientation(a, b, q);
    let d3 = orientation(p, q, a);
    let d4 = orientation(p, q, b);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(a, b, p))
        || (d2 == 0.0 && on_segment(a, b, q))
        || (d3 == 0.0 && on_segment(p, q, a))
        || (d4 == 0.0 && on_segment(p, q, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// North-up 10x10 raster: lon 0..10, lat 0..10, 1-degree pixels
    fn test_transform() -> GeoTransform {
        GeoTransform {
            top_left_x: 0.0,
            pixel_width: 1.0,
            rotation_x: 0.0,
            top_left_y: 10.0,
            rotation_y: 0.0,
            pixel_height: -1.0,
        }
    }

    fn test_band() -> Band {
        Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f32)
    }

    #[test]
    fn test_square_mask_crops_to_polygon_bbox() {
        // Square covering lon 2..5, lat 5..8 exactly
        let mask = PolygonMask::new(
            vec![(2.0, 5.0), (5.0, 5.0), (5.0, 8.0), (2.0, 8.0)],
            f32::NAN,
        )
        .unwrap();

        let (out, transform) = mask.apply(&test_band(), &test_transform()).unwrap();
        assert_eq!(out.dim(), (3, 3));

        // Cropped window bbox equals the polygon bbox
        assert_eq!(transform.top_left_x, 2.0);
        assert_eq!(transform.top_left_y, 8.0);
        let (east, south) = transform.pixel_to_geo(3.0, 3.0);
        assert_eq!(east, 5.0);
        assert_eq!(south, 5.0);

        // Every window pixel intersects the square, so all survive
        assert!(out.iter().all(|v| v.is_finite()));
        // Values come from the source window rows 2..5, cols 2..5
        assert_eq!(out[[0, 0]], 22.0);
        assert_eq!(out[[2, 2]], 44.0);
    }

    #[test]
    fn test_triangle_mask_sets_sentinel_outside() {
        // Right triangle inside lon 1..7, lat 1..7
        let mask = PolygonMask::new(vec![(1.0, 1.0), (7.0, 1.0), (1.0, 7.0)], -9999.0).unwrap();
        let (out, _) = mask.apply(&test_band(), &test_transform()).unwrap();
        assert_eq!(out.dim(), (6, 6));

        // Far corner of the bbox (max lon, max lat) lies outside the
        // hypotenuse and must be the sentinel
        assert_eq!(out[[0, 5]], -9999.0);
        // The right-angle corner (min lon, min lat) is inside
        let (rows, _) = out.dim();
        assert_ne!(out[[rows - 1, 0]], -9999.0);
        // Sentinel count: strictly outside pixels only
        let masked = out.iter().filter(|&&v| v == -9999.0).count();
        assert!(masked > 0 && masked < out.len());
    }

    #[test]
    fn test_boundary_pixels_are_inclusive() {
        // Polygon edge cuts through the middle of pixel column 3:
        // lon 3.5..5.5 covers half of pixels at cols 3 and 5
        let mask = PolygonMask::new(
            vec![(3.5, 4.0), (5.5, 4.0), (5.5, 6.0), (3.5, 6.0)],
            f32::NAN,
        )
        .unwrap();
        let (out, _) = mask.apply(&test_band(), &test_transform()).unwrap();
        // bbox cols 3..6 (3 pixels wide), partially-covered edge
        // pixels included
        assert_eq!(out.dim(), (2, 3));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_disjoint_polygon_is_error() {
        let mask = PolygonMask::new(
            vec![(20.0, 20.0), (22.0, 20.0), (22.0, 22.0), (20.0, 22.0)],
            f32::NAN,
        )
        .unwrap();
        assert!(mask.apply(&test_band(), &test_transform()).is_err());
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        assert!(PolygonMask::new(vec![(0.0, 0.0), (1.0, 1.0)], 0.0).is_err());
    }

    #[test]
    fn test_closed_ring_accepted() {
        // Explicitly closed rings are fine too
        let mask = PolygonMask::new(
            vec![(2.0, 5.0), (5.0, 5.0), (5.0, 8.0), (2.0, 8.0), (2.0, 5.0)],
            0.0,
        );
        assert!(mask.is_ok());
    }

    #[test]
    fn test_input_not_mutated() {
        let band = test_band();
        let before = band.clone();
        let mask =
            PolygonMask::new(vec![(1.0, 1.0), (7.0, 1.0), (1.0, 7.0)], f32::NAN).unwrap();
        let _ = mask.apply(&band, &test_transform()).unwrap();
        assert_eq!(band, before);
    }

    #[test]
    fn test_point_in_ring() {
        let ring = vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)];
        assert!(point_in_ring(&ring, 2.0, 2.0));
        assert!(!point_in_ring(&ring, 5.0, 2.0));
        assert!(!point_in_ring(&ring, -1.0, -1.0));
    }

    #[test]
    fn test_segments_intersect() {
        assert!(segments_intersect(
            (0.0, 0.0),
            (2.0, 2.0),
            (0.0, 2.0),
            (2.0, 0.0)
        ));
        assert!(!segments_intersect(
            (0.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0)
        ));
        // Touching endpoint counts as intersection
        assert!(segments_intersect(
            (0.0, 0.0),
            (2.0, 0.0),
            (1.0, 0.0),
            (1.0, 5.0)
        ));
    }
}
