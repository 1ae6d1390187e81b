//! Clip a grid to a polygon boundary: crop to the boundary's bounding box
//! and set pixels whose centres fall outside the polygon to nodata.
//!
//! Boundaries are GeoJSON (Polygon or MultiPolygon, bare or wrapped in a
//! Feature / FeatureCollection) and must be in the same coordinate system as
//! the grid being clipped.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::blocks::{row_bands, BLOCK_ROWS};
use crate::error::RasterError;
use crate::io::{write_blocks, BlockData, GridMeta, GridReader};

type Ring = Vec<Vec<f64>>;

#[derive(Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    FeatureCollection { features: Vec<Feature> },
    Feature { geometry: Geometry },
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

#[derive(Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

/// A polygon boundary flattened to its rings. Holes are ordinary rings;
/// containment is decided by the even-odd rule across all of them.
#[derive(Debug, Clone)]
pub struct Boundary {
    rings: Vec<Vec<(f64, f64)>>,
}

impl Boundary {
    pub fn from_rings(rings: Vec<Vec<(f64, f64)>>) -> Self {
        Self { rings }
    }

    /// Load a boundary from a GeoJSON file.
    pub fn from_geojson_file(path: &Path) -> Result<Self, RasterError> {
        let text = fs::read_to_string(path)?;
        let parsed: GeoJson = serde_json::from_str(&text).map_err(|e| RasterError::Boundary {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut rings: Vec<Vec<(f64, f64)>> = Vec::new();
        match &parsed {
            GeoJson::FeatureCollection { features } => {
                for feature in features {
                    push_geometry(&mut rings, &feature.geometry);
                }
            }
            GeoJson::Feature { geometry } => push_geometry(&mut rings, geometry),
            GeoJson::Polygon { coordinates } => push_polygon(&mut rings, coordinates),
            GeoJson::MultiPolygon { coordinates } => {
                for polygon in coordinates {
                    push_polygon(&mut rings, polygon);
                }
            }
        }

        if rings.is_empty() {
            return Err(RasterError::Boundary {
                path: path.to_path_buf(),
                reason: "no polygon rings found".into(),
            });
        }
        Ok(Self { rings })
    }

    /// Bounding box as (min_x, min_y, max_x, max_y).
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for ring in &self.rings {
            for &(x, y) in ring {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        (min_x, min_y, max_x, max_y)
    }

    /// Even-odd containment test over all rings.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for ring in &self.rings {
            if ring.len() < 3 {
                continue;
            }
            let mut j = ring.len() - 1;
            for i in 0..ring.len() {
                let (xi, yi) = ring[i];
                let (xj, yj) = ring[j];
                if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }
}

fn push_polygon(rings: &mut Vec<Vec<(f64, f64)>>, polygon: &[Ring]) {
    for ring in polygon {
        let pts: Vec<(f64, f64)> = ring
            .iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| (pos[0], pos[1]))
            .collect();
        if pts.len() >= 3 {
            rings.push(pts);
        }
    }
}

fn push_geometry(rings: &mut Vec<Vec<(f64, f64)>>, geometry: &Geometry) {
    match geometry {
        Geometry::Polygon { coordinates } => push_polygon(rings, coordinates),
        Geometry::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                push_polygon(rings, polygon);
            }
        }
    }
}

/// Crop `input` to the boundary's bounding box and mask everything outside
/// the polygon to the grid's nodata (or 0 when none is declared).
pub fn clip_to_boundary(
    input: &Path,
    boundary: &Boundary,
    output: &Path,
) -> Result<(), RasterError> {
    let mut reader = GridReader::open(input)?;
    let meta = reader.meta();
    let t = meta.transform;
    let (bmin_x, bmin_y, bmax_x, bmax_y) = boundary.bbox();

    // Pixel rectangle containing the bbox, clamped to the raster.
    let (left, top) = t.to_pixel(bmin_x, bmax_y);
    let (right, bottom) = t.to_pixel(bmax_x, bmin_y);
    let col0 = left.floor().max(0.0) as usize;
    let row0 = top.floor().max(0.0) as usize;
    let col1 = (right.ceil() as isize).clamp(0, meta.width as isize) as usize;
    let row1 = (bottom.ceil() as isize).clamp(0, meta.height as isize) as usize;
    if col0 >= col1 || row0 >= row1 {
        return Err(RasterError::Boundary {
            path: input.to_path_buf(),
            reason: "boundary does not overlap the raster".into(),
        });
    }

    let out_w = col1 - col0;
    let out_h = row1 - row0;
    let out_t = t.window(col0, row0);
    let out_meta = GridMeta {
        width: out_w,
        height: out_h,
        transform: out_t,
        ..meta
    };
    let format = reader.storage_format();
    let fill = meta.nodata.unwrap_or(0.0);

    let blocks = row_bands(out_h, BLOCK_ROWS).map(|band| {
        let rows = reader.read_rows(row0 + band.y0, band.rows)?;
        let mut out = Vec::with_capacity(band.len(out_w));
        for r in 0..band.rows {
            for c in 0..out_w {
                let v = rows[r * meta.width + col0 + c];
                let (x, y) = out_t.pixel_center(c, band.y0 + r);
                out.push(if boundary.contains(x, y) { v } else { fill });
            }
        }
        Ok(BlockData::from_f32(format, out))
    });
    write_blocks(output, &out_meta, format, blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GeoTransform, RainGrid, EPSG_AUSTRALIAN_ALBERS};
    use crate::io::{read_grid, write_grid, PixelFormat};

    fn square(min: f64, max: f64) -> Vec<(f64, f64)> {
        vec![(min, min), (max, min), (max, max), (min, max)]
    }

    #[test]
    fn even_odd_rule_handles_holes() {
        let boundary = Boundary::from_rings(vec![square(0.0, 10.0), square(4.0, 6.0)]);
        assert!(boundary.contains(2.0, 2.0));
        assert!(!boundary.contains(5.0, 5.0), "hole interior is outside");
        assert!(!boundary.contains(11.0, 5.0));
    }

    #[test]
    fn parses_a_feature_collection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bnd.geojson");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},
                "geometry":{"type":"Polygon","coordinates":[[[0,0],[4,0],[4,4],[0,4],[0,0]]]}}]}"#,
        )
        .expect("write geojson");
        let boundary = Boundary::from_geojson_file(&path).expect("parse");
        assert!(boundary.contains(2.0, 2.0));
        assert_eq!(boundary.bbox(), (0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn rejects_a_boundary_without_rings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.geojson");
        fs::write(&path, r#"{"type":"FeatureCollection","features":[]}"#).expect("write");
        assert!(matches!(
            Boundary::from_geojson_file(&path),
            Err(RasterError::Boundary { .. })
        ));
    }

    #[test]
    fn stage_crops_and_masks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("grid.tif");
        // 6x6 grid over x 0..6000, y 0..-6000 at 1 km pixels.
        let grid = RainGrid {
            data: (0..36).map(|i| i as f32).collect(),
            width: 6,
            height: 6,
            transform: GeoTransform::new(0.0, 0.0, 1000.0, -1000.0),
            epsg: EPSG_AUSTRALIAN_ALBERS,
            nodata: Some(-1.0),
        };
        write_grid(&input, &grid, PixelFormat::F32).expect("write");

        // Triangle inside the pixel rectangle covering cols/rows 1..4.
        let boundary = Boundary::from_rings(vec![vec![
            (1000.0, -4000.0),
            (4000.0, -4000.0),
            (4000.0, -1000.0),
        ]]);
        let output = dir.path().join("clipped.tif");
        clip_to_boundary(&input, &boundary, &output).expect("clip");

        let back = read_grid(&output).expect("read");
        assert_eq!(back.width, 3);
        assert_eq!(back.height, 3);
        assert!((back.transform.origin_x - 1000.0).abs() < 1e-9);
        assert!((back.transform.origin_y - -1000.0).abs() < 1e-9);
        // The lower-right corner pixel centre is inside the triangle,
        // the upper-left one is not.
        assert_eq!(back.get(2, 2), grid.get(3, 3));
        assert_eq!(back.get(0, 0), -1.0);
    }

    #[test]
    fn stage_rejects_disjoint_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("grid.tif");
        let grid = RainGrid {
            data: vec![1.0; 4],
            width: 2,
            height: 2,
            transform: GeoTransform::new(0.0, 0.0, 1000.0, -1000.0),
            epsg: EPSG_AUSTRALIAN_ALBERS,
            nodata: None,
        };
        write_grid(&input, &grid, PixelFormat::F32).expect("write");
        let far = Boundary::from_rings(vec![square(1e7, 2e7)]);
        assert!(matches!(
            clip_to_boundary(&input, &far, &dir.path().join("out.tif")),
            Err(RasterError::Boundary { .. })
        ));
    }
}
