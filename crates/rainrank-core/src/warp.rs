//! Reprojection of geographic rainfall grids to GDA94 / Australian Albers
//! (EPSG:3577). All coordinate math uses f64.
//!
//! The projection is Snyder's ellipsoidal Albers equal-area conic on GRS80.
//! Warping is nearest-neighbour by inverse mapping: each output pixel centre
//! projects back to geographic coordinates and takes the source pixel that
//! contains it.

use std::f64::consts::{FRAC_PI_2, PI};
use std::path::Path;

use crate::blocks::{row_bands, BLOCK_ROWS};
use crate::error::RasterError;
use crate::grid::{is_geographic, GeoTransform, EPSG_AUSTRALIAN_ALBERS};
use crate::io::{write_blocks, BlockData, GridMeta, GridReader};

/// GRS80 semi-major axis in metres.
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 inverse flattening.
const GRS80_INV_F: f64 = 298.257_222_101;

/// Ellipsoidal Albers equal-area conic.
#[derive(Debug, Clone, Copy)]
pub struct AlbersEqualArea {
    a: f64,
    e: f64,
    e2: f64,
    /// Central meridian, radians.
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

/// Snyder's q: proportional to the area between the equator and `lat`.
fn q_auth(e: f64, e2: f64, lat: f64) -> f64 {
    let s = lat.sin();
    let es = e * s;
    (1.0 - e2) * (s / (1.0 - e2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - es) / (1.0 + es)).ln())
}

fn m_radius(e2: f64, lat: f64) -> f64 {
    lat.cos() / (1.0 - e2 * lat.sin() * lat.sin()).sqrt()
}

impl AlbersEqualArea {
    /// Projection with standard parallels `lat1`/`lat2`, origin latitude
    /// `lat0` and central meridian `lon0`, all in degrees.
    pub fn new(lat1_deg: f64, lat2_deg: f64, lat0_deg: f64, lon0_deg: f64) -> Self {
        let f = 1.0 / GRS80_INV_F;
        let e2 = f * (2.0 - f);
        let e = e2.sqrt();

        let lat1 = lat1_deg.to_radians();
        let lat2 = lat2_deg.to_radians();
        let lat0 = lat0_deg.to_radians();

        let m1 = m_radius(e2, lat1);
        let m2 = m_radius(e2, lat2);
        let q0 = q_auth(e, e2, lat0);
        let q1 = q_auth(e, e2, lat1);
        let q2 = q_auth(e, e2, lat2);

        let n = (m1 * m1 - m2 * m2) / (q2 - q1);
        let c = m1 * m1 + n * q1;
        let rho0 = GRS80_A * (c - n * q0).sqrt() / n;

        Self {
            a: GRS80_A,
            e,
            e2,
            lon0: lon0_deg.to_radians(),
            n,
            c,
            rho0,
        }
    }

    /// EPSG:3577, GDA94 / Australian Albers: standard parallels 18S and 36S,
    /// origin at the equator on 132E.
    pub fn australian_albers() -> Self {
        Self::new(-18.0, -36.0, 0.0, 132.0)
    }

    /// Degrees to projected metres.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let q = q_auth(self.e, self.e2, lat_deg.to_radians());
        let rho = self.a * (self.c - self.n * q).sqrt() / self.n;
        let mut dlon = lon_deg.to_radians() - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }
        let theta = self.n * dlon;
        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }

    /// Projected metres to degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        // With southern standard parallels n is negative; the signs of x and
        // rho0 - y reverse before the angle is taken (Snyder 14-11).
        let sign = if self.n >= 0.0 { 1.0 } else { -1.0 };
        let rho = sign * (x * x + (self.rho0 - y) * (self.rho0 - y)).sqrt();
        let theta = (sign * x).atan2(sign * (self.rho0 - y));
        let q = (self.c - (rho * self.n / self.a) * (rho * self.n / self.a)) / self.n;
        let lat = self.lat_from_q(q);
        let lon = self.lon0 + theta / self.n;
        (lon.to_degrees(), lat.to_degrees())
    }

    /// Invert q by Newton iteration (Snyder 3-16).
    fn lat_from_q(&self, q: f64) -> f64 {
        let q_pole = q_auth(self.e, self.e2, FRAC_PI_2);
        if q.abs() >= q_pole.abs() {
            return FRAC_PI_2.copysign(q);
        }
        let mut lat = (q / 2.0).asin();
        for _ in 0..30 {
            let s = lat.sin();
            let es = self.e * s;
            let denom = 1.0 - self.e2 * s * s;
            let delta = denom * denom / (2.0 * lat.cos())
                * (q / (1.0 - self.e2) - s / denom
                    + (1.0 / (2.0 * self.e)) * ((1.0 - es) / (1.0 + es)).ln());
            lat += delta;
            if delta.abs() < 1e-12 {
                break;
            }
        }
        lat
    }
}

/// Warp a geographic grid onto GDA94 / Australian Albers. Output extent
/// comes from the projected source edges; output resolution matches the
/// source pixel footprint at the grid centre. Pixels mapping outside the
/// source take the source nodata, or 0 when none is declared.
pub fn reproject_to_albers(input: &Path, output: &Path) -> Result<(), RasterError> {
    let mut reader = GridReader::open(input)?;
    let meta = reader.meta();
    if !is_geographic(meta.epsg) {
        return Err(RasterError::NotGeographic {
            path: input.to_path_buf(),
            epsg: meta.epsg,
        });
    }

    let format = reader.storage_format();
    // Inverse mapping needs random access to the source.
    let src = reader.read_all()?;
    let proj = AlbersEqualArea::australian_albers();

    let t = meta.transform;
    let (w, h) = (meta.width, meta.height);
    let lon_max = t.origin_x + w as f64 * t.pixel_width;
    let lat_min = t.origin_y + h as f64 * t.pixel_height;

    // Projected extent from points along all four source edges.
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let steps = 32;
    let mut grow = |x: f64, y: f64| {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    };
    for i in 0..=steps {
        let frac = f64::from(i) / f64::from(steps);
        let lon = t.origin_x + frac * (lon_max - t.origin_x);
        let lat = t.origin_y + frac * (lat_min - t.origin_y);
        let (x, y) = proj.forward(lon, t.origin_y);
        grow(x, y);
        let (x, y) = proj.forward(lon, lat_min);
        grow(x, y);
        let (x, y) = proj.forward(t.origin_x, lat);
        grow(x, y);
        let (x, y) = proj.forward(lon_max, lat);
        grow(x, y);
    }

    // Output resolution from the pixel footprint at the grid centre.
    let (clon, clat) = t.pixel_center(w / 2, h / 2);
    let (cx, cy) = proj.forward(clon, clat);
    let (ex, ey) = proj.forward(clon + t.pixel_width, clat);
    let (sx, sy) = proj.forward(clon, clat + t.pixel_height);
    let px = (ex - cx).hypot(ey - cy);
    let py = (sx - cx).hypot(sy - cy);

    let out_w = (((max_x - min_x) / px).ceil() as usize).max(1);
    let out_h = (((max_y - min_y) / py).ceil() as usize).max(1);
    let out_t = GeoTransform::new(min_x, max_y, px, -py);
    let out_meta = GridMeta {
        width: out_w,
        height: out_h,
        transform: out_t,
        epsg: EPSG_AUSTRALIAN_ALBERS,
        nodata: meta.nodata,
    };
    let fill = meta.nodata.unwrap_or(0.0);

    let blocks = row_bands(out_h, BLOCK_ROWS).map(|band| {
        let mut out = Vec::with_capacity(band.len(out_w));
        for row in band.y0..band.y0 + band.rows {
            for col in 0..out_w {
                let (x, y) = out_t.pixel_center(col, row);
                let (lon, lat) = proj.inverse(x, y);
                let (fc, fr) = t.to_pixel(lon, lat);
                let (sc, sr) = (fc.floor(), fr.floor());
                let v = if sc >= 0.0 && sr >= 0.0 && (sc as usize) < w && (sr as usize) < h {
                    src[sr as usize * w + sc as usize]
                } else {
                    fill
                };
                out.push(v);
            }
        }
        Ok(BlockData::from_f32(format, out))
    });
    write_blocks(output, &out_meta, format, blocks)
}
