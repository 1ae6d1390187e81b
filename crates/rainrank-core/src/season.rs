//! Seasonal period selection over a monthly rainfall archive.
//!
//! Monthly grids carry their period in the file name (`20210501.monthly_rain.tif`
//! and the like); a period key is the integer `YYYYMM`, compared numerically.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RasterError;

/// `YYYYMM` key from a file name: the first run of six or more digits in the
/// name whose month part is 1-12. `None` when the name carries no date.
pub fn year_month(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start >= 6 {
                if let Ok(ym) = name[start..start + 6].parse::<u32>() {
                    let month = ym % 100;
                    if (1..=12).contains(&month) {
                        return Some(ym);
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Grids whose key falls in `[start, finish]`, in the given order.
/// Files without a parseable key are dropped.
pub fn select_period(files: &[PathBuf], start: u32, finish: u32) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|f| year_month(f).is_some_and(|ym| ym >= start && ym <= finish))
        .cloned()
        .collect()
}

/// Sorted distinct years appearing in the archive's file names.
pub fn years(files: &[PathBuf]) -> Vec<u32> {
    let mut out: Vec<u32> = files.iter().filter_map(|f| year_month(f)).map(|ym| ym / 100).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// A seasonal window by start and finish month, optionally running into the
/// following year (a 2021-05 to 2022-04 wet season, for example).
#[derive(Debug, Clone, Copy)]
pub struct SeasonWindow {
    pub start_month: u32,
    pub finish_month: u32,
    pub cross_year: bool,
}

impl SeasonWindow {
    /// The inclusive `(start, finish)` period keys for a season anchored at
    /// `year`.
    pub fn period_for(&self, year: u32) -> (u32, u32) {
        let finish_year = if self.cross_year { year + 1 } else { year };
        (
            year * 100 + self.start_month,
            finish_year * 100 + self.finish_month,
        )
    }
}

/// All rasters under `root` whose names end with `suffix`, recursively,
/// sorted by path for deterministic period selection.
pub fn find_rasters(root: &Path, suffix: &str) -> Result<Vec<PathBuf>, RasterError> {
    let mut out = Vec::new();
    walk(root, suffix, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> Result<(), RasterError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, suffix, out)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_finds_the_leading_date() {
        assert_eq!(
            year_month(Path::new("/data/2021/20210501.monthly_rain.tif")),
            Some(202105)
        );
        assert_eq!(year_month(Path::new("monthly_199912_rain.tif")), Some(199912));
    }

    #[test]
    fn year_month_rejects_impossible_months() {
        assert_eq!(year_month(Path::new("20219901.rain.tif")), None);
        assert_eq!(year_month(Path::new("no_date_rain.tif")), None);
    }

    #[test]
    fn select_period_is_inclusive_on_both_ends() {
        let files: Vec<PathBuf> = ["202104.rain.tif", "202105.rain.tif", "202204.rain.tif", "202205.rain.tif"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let picked = select_period(&files, 202105, 202204);
        assert_eq!(
            picked,
            vec![PathBuf::from("202105.rain.tif"), PathBuf::from("202204.rain.tif")]
        );
    }

    #[test]
    fn cross_year_window_spans_two_years() {
        let window = SeasonWindow {
            start_month: 5,
            finish_month: 4,
            cross_year: true,
        };
        assert_eq!(window.period_for(2021), (202105, 202204));

        let same = SeasonWindow {
            start_month: 1,
            finish_month: 12,
            cross_year: false,
        };
        assert_eq!(same.period_for(2021), (202101, 202112));
    }

    #[test]
    fn years_are_sorted_and_distinct() {
        let files: Vec<PathBuf> = ["202201.rain.tif", "202101.rain.tif", "202112.rain.tif"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(years(&files), vec![2021, 2022]);
    }

    #[test]
    fn find_rasters_walks_subdirectories_with_the_suffix_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("2021");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("20210101.rain.tif"), b"x").expect("touch");
        fs::write(nested.join("notes.txt"), b"x").expect("touch");
        fs::write(dir.path().join("20200101.rain.tif"), b"x").expect("touch");

        let found = find_rasters(dir.path(), "rain.tif").expect("walk");
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("20200101.rain.tif"));
        assert!(found[1].ends_with("20210101.rain.tif"));
    }
}
