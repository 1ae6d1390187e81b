//! End-to-end run of the statistics chain through real files: monthly grids
//! on disk, seasonal totals, percentile rank against a three-season record,
//! then decile classes.

use std::path::PathBuf;

use rainrank_core::decile::percentiles_to_deciles;
use rainrank_core::grid::{GeoTransform, RainGrid, EPSG_WGS84};
use rainrank_core::io::{read_grid, write_grid, PixelFormat};
use rainrank_core::percentile::rank_against_history;
use rainrank_core::season::{select_period, year_month};
use rainrank_core::total::sum_rasters;

const NODATA: f32 = -9999.0;

fn monthly_grid(data: Vec<f32>) -> RainGrid {
    RainGrid {
        data,
        width: 2,
        height: 2,
        transform: GeoTransform::new(129.0, -11.0, 0.05, -0.05),
        epsg: EPSG_WGS84,
        nodata: Some(NODATA),
    }
}

#[test]
fn totals_rank_and_classify_across_seasons() {
    let dir = tempfile::tempdir().expect("tempdir");

    // Four seasons of two monthly grids each. Per-season totals:
    //   2019: [10 20 / 30 40]   2020: [15 25 / 35 45]
    //   2021: [ 5 25 / 25 50]   2022: [12 25 / 30 45]  (the target season)
    let seasons: [(u32, [Vec<f32>; 2]); 4] = [
        (2019, [vec![4.0, 8.0, 12.0, 16.0], vec![6.0, 12.0, 18.0, 24.0]]),
        (2020, [vec![5.0, 10.0, 15.0, 20.0], vec![10.0, 15.0, 20.0, 25.0]]),
        (2021, [vec![2.0, 10.0, 10.0, 20.0], vec![3.0, 15.0, 15.0, 30.0]]),
        (2022, [vec![6.0, 10.0, 14.0, 20.0], vec![6.0, 15.0, 16.0, 25.0]]),
    ];

    let mut monthly: Vec<PathBuf> = Vec::new();
    for (year, months) in &seasons {
        for (m, data) in months.iter().enumerate() {
            let path = dir.path().join(format!("{year}{:02}01.monthly_rain.tif", m + 1));
            write_grid(&path, &monthly_grid(data.clone()), PixelFormat::F32).expect("write month");
            monthly.push(path);
        }
    }

    // Period selection picks exactly one season's grids.
    let picked = select_period(&monthly, 202101, 202102);
    assert_eq!(picked.len(), 2);
    assert!(picked.iter().all(|p| year_month(p).is_some_and(|ym| ym / 100 == 2021)));

    // Seasonal totals.
    let mut totals: Vec<PathBuf> = Vec::new();
    for (year, _) in &seasons {
        let out = dir.path().join(format!("total_{year}.tif"));
        let months = select_period(&monthly, year * 100 + 1, year * 100 + 2);
        sum_rasters(&months, &out).expect("total");
        totals.push(out);
    }
    let total_2022 = read_grid(&totals[3]).expect("read total");
    assert_eq!(total_2022.data, vec![12.0, 25.0, 30.0, 45.0]);

    // Percentile rank of 2022 against 2019-2021.
    let perc_path = dir.path().join("perc_2022.tif");
    rank_against_history(&totals[..3], &totals[3], &perc_path).expect("rank");
    let perc = read_grid(&perc_path).expect("read perc");
    // (0,0): {10,15,5} vs 12 -> 2 below / 3.
    assert!((perc.data[0] - 200.0 / 3.0).abs() < 1e-4, "got {}", perc.data[0]);
    // (0,1): {20,25,25} vs 25 -> 1 below + half of 2 ties.
    assert!((perc.data[1] - 200.0 / 3.0).abs() < 1e-4, "got {}", perc.data[1]);
    // (1,0): {30,35,25} vs 30 -> 1 below + half a tie.
    assert!((perc.data[2] - 50.0).abs() < 1e-4, "got {}", perc.data[2]);
    // (1,1): {40,45,50} vs 45 -> 1 below + half a tie.
    assert!((perc.data[3] - 50.0).abs() < 1e-4, "got {}", perc.data[3]);
    assert_eq!(perc.nodata, Some(-1.0));

    // Decile classes from the percentile raster; its declared nodata (-1)
    // is the classifier's input sentinel here.
    let decile_path = dir.path().join("decile_2022.tif");
    percentiles_to_deciles(&perc_path, &decile_path).expect("classify");
    let deciles = read_grid(&decile_path).expect("read deciles");
    assert_eq!(deciles.data, vec![7.0, 7.0, 5.0, 5.0]);
    assert_eq!(deciles.nodata, Some(-1.0));
}

#[test]
fn target_nodata_pixels_survive_the_whole_chain_as_nodata() {
    let dir = tempfile::tempdir().expect("tempdir");

    let history_path = dir.path().join("hist.tif");
    write_grid(
        &history_path,
        &monthly_grid(vec![10.0, 10.0, 10.0, 10.0]),
        PixelFormat::F32,
    )
    .expect("write history");

    // One valid pixel, one nodata pixel in the target.
    let target_path = dir.path().join("target.tif");
    write_grid(
        &target_path,
        &monthly_grid(vec![20.0, NODATA, 5.0, NODATA]),
        PixelFormat::F32,
    )
    .expect("write target");

    let perc_path = dir.path().join("perc.tif");
    rank_against_history(&[history_path], &target_path, &perc_path).expect("rank");
    let perc = read_grid(&perc_path).expect("read");
    assert_eq!(perc.data[0], 100.0);
    assert_eq!(perc.data[1], -1.0);
    // Below the whole record computes 0 and reports 0.01.
    assert!((perc.data[2] - 0.01).abs() < 1e-6);
    assert_eq!(perc.data[3], -1.0);

    let decile_path = dir.path().join("decile.tif");
    percentiles_to_deciles(&perc_path, &decile_path).expect("classify");
    let deciles = read_grid(&decile_path).expect("read deciles");
    assert_eq!(deciles.data, vec![10.0, -1.0, 1.0, -1.0]);
}
