use crate::types::{Band, ColorEntry, Colormap, FetchError, FetchResult};
use ndarray::Array3;

/// Render a band to an RGBA image through a colormap.
///
/// Samples matching the no-data sentinel (or non-finite samples) come
/// out fully transparent; everything else uses the nearest colormap
/// entry.
pub fn apply_colormap(band: &Band, colormap: &Colormap, nodata: Option<f64>) -> Array3<u8> {
    let (rows, cols) = band.dim();
    let mut image = Array3::zeros((rows, cols, 4));

    for ((r, c), &value) in band.indexed_iter() {
        if !value.is_finite() {
            continue;
        }
        if let Some(nd) = nodata {
            if (value as f64) == nd {
                continue;
            }
        }
        if let Some(rgba) = colormap.lookup_nearest(value as f64) {
            for (k, &ch) in rgba.iter().enumerate() {
                image[[r, c, k]] = ch;
            }
        }
    }

    image
}

/// Build a continuous colormap by linearly interpolating between
/// color stops over `[min, max]`, quantized to `steps` entries.
///
/// Entry values are scaled sample values (`value * scale`), which
/// lets integer-keyed tables represent fractional data such as a
/// normalized difference index in [-1, 1] with `scale = 100`.
pub fn linear_ramp(
    stops: &[[u8; 4]],
    min: f64,
    max: f64,
    steps: usize,
    scale: f64,
) -> FetchResult<Colormap> {
    if stops.len() < 2 {
        return Err(FetchError::Processing(
            "a color ramp needs at least two stops".to_string(),
        ));
    }
    if steps < 2 || max <= min {
        return Err(FetchError::Processing(format!(
            "invalid ramp quantization: {} steps over [{}, {}]",
            steps, min, max
        )));
    }

    let mut entries = Vec::with_capacity(steps);
    for i in 0..steps {
        let t = i as f64 / (steps - 1) as f64;
        let value = min + t * (max - min);

        // Position within the stop sequence
        let pos = t * (stops.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(stops.len() - 1);
        let frac = pos - lo as f64;

        let mut rgba = [0u8; 4];
        for k in 0..4 {
            let a = stops[lo][k] as f64;
            let b = stops[hi][k] as f64;
            rgba[k] = (a + frac * (b - a)).round() as u8;
        }

        entries.push(ColorEntry {
            value: (value * scale).round() as i64,
            rgba,
        });
    }

    Ok(Colormap::new(entries))
}

/// Render continuous data through a ramp built with [`linear_ramp`],
/// applying the same sample scaling before lookup.
pub fn apply_ramp(band: &Band, colormap: &Colormap, scale: f64, nodata: Option<f64>) -> Array3<u8> {
    let (rows, cols) = band.dim();
    let mut image = Array3::zeros((rows, cols, 4));

    for ((r, c), &value) in band.indexed_iter() {
        if !value.is_finite() {
            continue;
        }
        if let Some(nd) = nodata {
            if (value as f64) == nd {
                continue;
            }
        }
        if let Some(rgba) = colormap.lookup_nearest(value as f64 * scale) {
            for (k, &ch) in rgba.iter().enumerate() {
                image[[r, c, k]] = ch;
            }
        }
    }

    image
}
