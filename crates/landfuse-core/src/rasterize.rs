//! Vector-to-raster burn: each (code, geometry) pair is written onto the
//! shared grid; pixels not covered by any geometry keep the background value.
//!
//! Coverage is decided by the pixel centre under the even-odd rule, so
//! interior rings punch holes. Features are burned in input order and later
//! features overwrite earlier ones (last-write-wins), which keeps overlap
//! resolution deterministic.

use geo::{BoundingRect, LineString, Polygon};
use log::debug;

use crate::codes::CodedDataset;
use crate::error::FuseError;
use crate::raster::{GridSpec, Raster, NODATA};

/// Rasterise a coded dataset onto `grid`.
pub fn rasterize_layer(dataset: &CodedDataset, grid: GridSpec) -> Result<Raster<u32>, FuseError> {
    let mut raster = Raster::filled(grid, NODATA)?;
    for (code, geometry) in &dataset.coded {
        for polygon in &geometry.0 {
            burn_polygon(&mut raster, polygon, *code);
        }
    }
    debug!(
        "dataset '{}': {} features burned, {} of {} pixels covered",
        dataset.name,
        dataset.coded.len(),
        raster.coverage(),
        raster.data.len()
    );
    Ok(raster)
}

fn burn_polygon(raster: &mut Raster<u32>, polygon: &Polygon<f64>, code: u32) {
    let Some(bbox) = polygon.bounding_rect() else {
        return;
    };
    let grid = raster.grid;
    let res = grid.resolution;

    // Rows whose centre falls inside the polygon's vertical extent.
    let row_first = ((grid.maxy - bbox.max().y) / res - 0.5).ceil().max(0.0) as i64;
    let row_last =
        (((grid.maxy - bbox.min().y) / res - 0.5).floor() as i64).min(raster.height as i64 - 1);

    let mut crossings: Vec<f64> = Vec::new();
    for row in row_first..=row_last {
        let (_, yc) = grid.pixel_center(row as usize, 0);

        crossings.clear();
        ring_crossings(polygon.exterior(), yc, &mut crossings);
        for ring in polygon.interiors() {
            ring_crossings(ring, yc, &mut crossings);
        }
        crossings.sort_by(f64::total_cmp);

        // Even-odd rule: every pair of crossings bounds an interior span.
        for span in crossings.chunks_exact(2) {
            let (x0, x1) = (span[0], span[1]);
            let col_first = ((x0 - grid.minx) / res - 0.5).ceil().max(0.0) as i64;
            let col_last =
                last_index_below((x1 - grid.minx) / res - 0.5).min(raster.width as i64 - 1);
            for col in col_first..=col_last {
                raster.set(row as usize, col as usize, code);
            }
        }
    }
}

/// Largest integer strictly below `t`, as an index bound. Keeps spans
/// half-open so a pixel centre exactly on a shared edge lands in one span.
fn last_index_below(t: f64) -> i64 {
    t.ceil() as i64 - 1
}

/// Append the x-coordinates where `ring` crosses the horizontal line `y`.
/// Edges are treated half-open in y so a vertex shared by two edges counts
/// exactly once.
fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    let coords = &ring.0;
    if coords.len() < 2 {
        return;
    }
    for pair in coords.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if (a.y > y) != (b.y > y) {
            out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
    // Close the ring if the source geometry left it open.
    let (first, last) = (coords[0], coords[coords.len() - 1]);
    if first != last && (last.y > y) != (first.y > y) {
        out.push(last.x + (y - last.y) * (first.x - last.x) / (first.y - last.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn grid_10x10_res5() -> GridSpec {
        GridSpec::new((0.0, 0.0, 10.0, 10.0), 5.0)
    }

    fn dataset(name: &str, coded: Vec<(u32, MultiPolygon<f64>)>) -> CodedDataset {
        CodedDataset { name: name.to_string(), coded }
    }

    fn rect(minx: f64, miny: f64, maxx: f64, maxy: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: minx, y: miny),
            (x: maxx, y: miny),
            (x: maxx, y: maxy),
            (x: minx, y: maxy),
        ]])
    }

    #[test]
    fn left_column_burn() {
        let ds = dataset("a", vec![(3, rect(0.0, 0.0, 5.0, 10.0))]);
        let raster = rasterize_layer(&ds, grid_10x10_res5()).unwrap();
        assert_eq!(raster.data, vec![3, 0, 3, 0]);
    }

    #[test]
    fn full_cover_burn() {
        let ds = dataset("b", vec![(7, rect(0.0, 0.0, 10.0, 10.0))]);
        let raster = rasterize_layer(&ds, grid_10x10_res5()).unwrap();
        assert_eq!(raster.data, vec![7, 7, 7, 7]);
    }

    #[test]
    fn pixel_center_rule_ignores_slivers() {
        // Covers the left 2 map units: no pixel centre (at x = 2.5, 7.5)
        // falls inside, so nothing is burned.
        let ds = dataset("sliver", vec![(9, rect(0.0, 0.0, 2.0, 10.0))]);
        let raster = rasterize_layer(&ds, grid_10x10_res5()).unwrap();
        assert_eq!(raster.coverage(), 0);
    }

    #[test]
    fn later_features_win_overlaps() {
        let ds = dataset(
            "overlap",
            vec![(1, rect(0.0, 0.0, 10.0, 10.0)), (2, rect(0.0, 0.0, 5.0, 10.0))],
        );
        let raster = rasterize_layer(&ds, grid_10x10_res5()).unwrap();
        assert_eq!(raster.data, vec![2, 1, 2, 1]);

        // Reversed input order flips the outcome.
        let ds = dataset(
            "overlap",
            vec![(2, rect(0.0, 0.0, 5.0, 10.0)), (1, rect(0.0, 0.0, 10.0, 10.0))],
        );
        let raster = rasterize_layer(&ds, grid_10x10_res5()).unwrap();
        assert_eq!(raster.data, vec![1, 1, 1, 1]);
    }

    #[test]
    fn interior_rings_punch_holes() {
        let donut = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (30.0, 0.0), (30.0, 30.0), (0.0, 30.0), (0.0, 0.0)]),
            vec![LineString::from(vec![
                (10.0, 10.0),
                (20.0, 10.0),
                (20.0, 20.0),
                (10.0, 20.0),
                (10.0, 10.0),
            ])],
        )]);
        let grid = GridSpec::new((0.0, 0.0, 30.0, 30.0), 10.0);
        let ds = dataset("donut", vec![(5, donut)]);
        let raster = rasterize_layer(&ds, grid).unwrap();
        assert_eq!(raster.data, vec![5, 5, 5, 5, 0, 5, 5, 5, 5]);
    }

    #[test]
    fn rasterization_is_idempotent() {
        let ds = dataset("a", vec![(3, rect(0.0, 0.0, 5.0, 10.0)), (4, rect(2.0, 2.0, 9.0, 9.0))]);
        let first = rasterize_layer(&ds, grid_10x10_res5()).unwrap();
        let second = rasterize_layer(&ds, grid_10x10_res5()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_grid_is_fatal() {
        let ds = dataset("a", vec![(3, rect(0.0, 0.0, 5.0, 10.0))]);
        let bad = GridSpec::new((0.0, 0.0, 2.0, 10.0), 5.0);
        assert!(matches!(rasterize_layer(&ds, bad), Err(FuseError::InvalidGrid { .. })));
    }
}
