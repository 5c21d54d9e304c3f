//! Rank and morphological building blocks used by the scan cleaner.
//!
//! NaN is "no data" everywhere: the percentile skips it, the median filters
//! rank it above every finite value, labelling and despeckling treat it as
//! background.

use crate::types::{PolarImage, RadarReal, NO_DATA};
use ndarray::{Array1, Array2, ArrayView1};
use std::collections::VecDeque;

/// Pixel adjacency used when labelling regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbours only
    Four,
    /// Edge and corner neighbours
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, -1), (-1, 0), (-1, 1),
                (0, -1), (0, 1),
                (1, -1), (1, 0), (1, 1),
            ],
        }
    }
}

/// Map an out-of-range index back into `0..len` by mirroring about the
/// edges, repeating the edge sample (`d c b a | a b c d | d c b a`).
pub fn reflect_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let m = index.rem_euclid(period);
    if m < len {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Percentile of the finite samples, interpolating linearly between the
/// neighbouring order statistics. `None` when no sample is finite.
pub fn percentile_finite(values: ArrayView1<RadarReal>, percentile: f64) -> Option<RadarReal> {
    let mut finite: Vec<RadarReal> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));

    let rank = (percentile / 100.0).clamp(0.0, 1.0) * (finite.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = (rank - lower as f64) as RadarReal;
    Some(finite[lower] + (finite[upper] - finite[lower]) * fraction)
}

/// NaN ranks above every finite value, so a window that is mostly
/// no-data has a no-data median
fn rank_order(a: &RadarReal, b: &RadarReal) -> std::cmp::Ordering {
    a.partial_cmp(b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

fn median_of(values: &mut [RadarReal]) -> RadarReal {
    if values.is_empty() {
        return NO_DATA;
    }
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, rank_order);
    *median
}

/// Sliding median of a 1D profile with reflected boundaries
pub fn median_filter_1d(profile: ArrayView1<RadarReal>, window: usize) -> Array1<RadarReal> {
    let len = profile.len();
    let half = (window / 2) as isize;
    let mut buffer = Vec::with_capacity(window);

    Array1::from_shape_fn(len, |i| {
        buffer.clear();
        for offset in -half..=half {
            buffer.push(profile[reflect_index(i as isize + offset, len)]);
        }
        median_of(&mut buffer)
    })
}

/// One row of the 2D sliding median image (`window` x `window`, reflected
/// boundaries on both axes)
pub fn median_filter_row(image: &PolarImage, row: usize, window: usize) -> Array1<RadarReal> {
    let (rows, cols) = image.dim();
    let half = (window / 2) as isize;
    let mut buffer = Vec::with_capacity(window * window);

    Array1::from_shape_fn(cols, |j| {
        buffer.clear();
        for di in -half..=half {
            let ii = reflect_index(row as isize + di, rows);
            for dj in -half..=half {
                let jj = reflect_index(j as isize + dj, cols);
                buffer.push(image[[ii, jj]]);
            }
        }
        median_of(&mut buffer)
    })
}

/// Full 2D sliding median image
pub fn median_filter_2d(image: &PolarImage, window: usize) -> PolarImage {
    let (rows, cols) = image.dim();
    let mut filtered = Array2::from_elem((rows, cols), NO_DATA);
    for i in 0..rows {
        filtered.row_mut(i).assign(&median_filter_row(image, i, window));
    }
    filtered
}

/// Label connected regions of finite cells.
///
/// Returns the label image (0 = background, regions numbered from 1) and the
/// pixel count of each region, indexed by `label - 1`.
pub fn label_regions(image: &PolarImage, connectivity: Connectivity) -> (Array2<u32>, Vec<usize>) {
    let (rows, cols) = image.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for start_i in 0..rows {
        for start_j in 0..cols {
            if labels[[start_i, start_j]] != 0 || !image[[start_i, start_j]].is_finite() {
                continue;
            }

            let label = sizes.len() as u32 + 1;
            let mut size = 0usize;
            labels[[start_i, start_j]] = label;
            queue.push_back((start_i, start_j));

            while let Some((i, j)) = queue.pop_front() {
                size += 1;
                for &(di, dj) in connectivity.offsets() {
                    let ni = i as isize + di;
                    let nj = j as isize + dj;
                    if ni < 0 || nj < 0 || ni >= rows as isize || nj >= cols as isize {
                        continue;
                    }
                    let (ni, nj) = (ni as usize, nj as usize);
                    if labels[[ni, nj]] == 0 && image[[ni, nj]].is_finite() {
                        labels[[ni, nj]] = label;
                        queue.push_back((ni, nj));
                    }
                }
            }
            sizes.push(size);
        }
    }

    (labels, sizes)
}

/// Blank every region whose pixel count is at or below `min_area`.
/// Returns the number of regions removed.
pub fn remove_small_regions(image: &mut PolarImage, min_area: usize, connectivity: Connectivity) -> usize {
    let (labels, sizes) = label_regions(image, connectivity);
    let doomed: Vec<bool> = sizes.iter().map(|&size| size <= min_area).collect();

    for (value, &label) in image.iter_mut().zip(labels.iter()) {
        if label != 0 && doomed[label as usize - 1] {
            *value = NO_DATA;
        }
    }

    doomed.iter().filter(|&&d| d).count()
}

/// Blank finite cells that have no finite neighbour within `n / 2` bins
/// along the range axis. The neighbourhood wraps around the row ends.
/// Returns the number of cells removed.
pub fn despeckle(image: &mut PolarImage, n: usize) -> usize {
    let (_, cols) = image.dim();
    let half = (n / 2) as isize;
    let mut removed = 0;

    for mut row in image.rows_mut() {
        let valid: Vec<bool> = row.iter().map(|v| v.is_finite()).collect();
        for j in 0..cols {
            if !valid[j] {
                continue;
            }
            let neighbours = (-half..=half)
                .filter(|&offset| offset != 0)
                .filter(|&offset| valid[(j as isize + offset).rem_euclid(cols as isize) as usize])
                .count();
            if neighbours == 0 {
                row[j] = NO_DATA;
                removed += 1;
            }
        }
    }

    removed
}
