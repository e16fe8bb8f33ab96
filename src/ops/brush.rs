use crate::canvas::MaskGrid;

// ============================================================================
// BRUSH RASTERIZER – hard-edged disk and stroke-segment stamping
// ============================================================================
//
// Brush and Eraser both route through these two functions; the only
// difference is the value written (255 marks, 0 erases). Fill never comes
// through here.

/// Stamp a filled disk: every cell within Euclidean distance `radius` of
/// `center` (boundary inclusive) is set to `value`. Cells falling outside
/// the grid are discarded.
pub fn stamp_disk(grid: &mut MaskGrid, center: (u32, u32), radius: u32, value: u8) {
    let (w, h) = grid.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let (cx, cy) = center;
    let r = radius as i64;
    let r2 = r * r;

    let min_x = cx.saturating_sub(radius);
    let max_x = (cx.saturating_add(radius)).min(w - 1);
    let min_y = cy.saturating_sub(radius);
    let max_y = (cy.saturating_add(radius)).min(h - 1);

    for y in min_y..=max_y {
        let dy = y as i64 - cy as i64;
        for x in min_x..=max_x {
            let dx = x as i64 - cx as i64;
            if dx * dx + dy * dy <= r2 {
                grid.put(x, y, value);
            }
        }
    }
}

/// Rasterize one segment of a stroke.
///
/// With a previous position, three shapes are stamped unconditionally: a
/// thick line of stroke width `2*radius` from `from` to `to`, plus a filled
/// disk of `radius` at each endpoint. The redundancy is intentional: it
/// guarantees no gaps at stroke endpoints or direction changes regardless of
/// the line primitive's cap shape. On the first dab of a gesture (`from` is
/// `None`) only a single disk at `to` is stamped.
pub fn stroke_segment(
    grid: &mut MaskGrid,
    from: Option<(u32, u32)>,
    to: (u32, u32),
    radius: u32,
    value: u8,
) {
    let Some(from) = from else {
        stamp_disk(grid, to, radius, value);
        return;
    };

    stamp_disk(grid, from, radius, value);
    stamp_disk(grid, to, radius, value);
    fill_thick_line(grid, from, to, radius, value);
}

/// Mark every cell within `radius` of the segment `from`→`to`.
fn fill_thick_line(grid: &mut MaskGrid, from: (u32, u32), to: (u32, u32), radius: u32, value: u8) {
    let (w, h) = grid.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let min_x = from.0.min(to.0).saturating_sub(radius);
    let max_x = (from.0.max(to.0).saturating_add(radius)).min(w - 1);
    let min_y = from.1.min(to.1).saturating_sub(radius);
    let max_y = (from.1.max(to.1).saturating_add(radius)).min(h - 1);

    let (x1, y1) = (from.0 as f64, from.1 as f64);
    let (x2, y2) = (to.0 as f64, to.1 as f64);
    let dx = x2 - x1;
    let dy = y2 - y1;
    let len2 = dx * dx + dy * dy;
    let r2 = (radius as f64) * (radius as f64);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f64;
            let py = y as f64;
            // Project onto the segment, clamped to its endpoints.
            let t = if len2 > 0.0 {
                (((px - x1) * dx + (py - y1) * dy) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let nx = x1 + t * dx;
            let ny = y1 + t * dy;
            let d2 = (px - nx) * (px - nx) + (py - ny) * (py - ny);
            if d2 <= r2 {
                grid.put(x, y, value);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_marks_cells_within_radius_inclusive() {
        let mut g = MaskGrid::new(100, 100);
        stamp_disk(&mut g, (50, 50), 5, 255);
        // Boundary is included...
        assert_eq!(g.get(50, 55).unwrap(), 255);
        assert_eq!(g.get(55, 50).unwrap(), 255);
        assert_eq!(g.get(53, 54).unwrap(), 255); // 9 + 16 = 25
        // ...one past it is not.
        assert_eq!(g.get(50, 56).unwrap(), 0);
        assert_eq!(g.get(54, 54).unwrap(), 0); // 16 + 16 = 32 > 25
    }

    #[test]
    fn disk_marks_exactly_the_euclidean_disk() {
        let mut g = MaskGrid::new(40, 40);
        stamp_disk(&mut g, (20, 20), 7, 255);
        for y in 0..40u32 {
            for x in 0..40u32 {
                let dx = x as i64 - 20;
                let dy = y as i64 - 20;
                let inside = dx * dx + dy * dy <= 49;
                let expect = if inside { 255 } else { 0 };
                assert_eq!(g.get(x, y).unwrap(), expect, "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn disk_overhanging_the_edge_is_clipped() {
        let mut g = MaskGrid::new(20, 20);
        stamp_disk(&mut g, (0, 0), 5, 255);
        assert_eq!(g.get(0, 0).unwrap(), 255);
        assert_eq!(g.get(5, 0).unwrap(), 255);
        assert_eq!(g.get(19, 19).unwrap(), 0);
    }

    #[test]
    fn first_dab_is_a_single_disk() {
        let mut g = MaskGrid::new(30, 30);
        stroke_segment(&mut g, None, (15, 15), 3, 255);
        let mut reference = MaskGrid::new(30, 30);
        stamp_disk(&mut reference, (15, 15), 3, 255);
        assert_eq!(g, reference);
    }

    #[test]
    fn segment_covers_both_endpoint_disks() {
        let mut g = MaskGrid::new(60, 60);
        stroke_segment(&mut g, Some((10, 10)), (45, 30), 4, 255);
        let mut disks = MaskGrid::new(60, 60);
        stamp_disk(&mut disks, (10, 10), 4, 255);
        stamp_disk(&mut disks, (45, 30), 4, 255);
        for y in 0..60 {
            for x in 0..60 {
                if disks.get(x, y).unwrap() == 255 {
                    assert_eq!(g.get(x, y).unwrap(), 255, "endpoint cell ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn segment_has_no_gaps_along_its_length() {
        let mut g = MaskGrid::new(100, 100);
        stroke_segment(&mut g, Some((5, 5)), (90, 47), 2, 255);
        // Sample densely along the center line; every sample must land on a
        // marked cell.
        for i in 0..=200 {
            let t = i as f64 / 200.0;
            let x = (5.0 + t * 85.0).round() as u32;
            let y = (5.0 + t * 42.0).round() as u32;
            assert_eq!(g.get(x, y).unwrap(), 255, "gap at sample ({x},{y})");
        }
    }

    #[test]
    fn zero_length_segment_degenerates_to_a_dab() {
        let mut g = MaskGrid::new(30, 30);
        stroke_segment(&mut g, Some((12, 12)), (12, 12), 5, 255);
        let mut reference = MaskGrid::new(30, 30);
        stamp_disk(&mut reference, (12, 12), 5, 255);
        assert_eq!(g, reference);
    }

    #[test]
    fn eraser_writes_zero_through_the_same_rasterizer() {
        let mut g = MaskGrid::new(50, 50);
        g.fill_all(255);
        stroke_segment(&mut g, Some((10, 25)), (40, 25), 3, 0);
        assert_eq!(g.get(25, 25).unwrap(), 0);
        assert_eq!(g.get(25, 27).unwrap(), 0);
        // Outside the stroke the mask is untouched.
        assert_eq!(g.get(25, 35).unwrap(), 255);
        assert_eq!(g.get(2, 2).unwrap(), 255);
    }

    #[test]
    fn radius_one_still_paints() {
        let mut g = MaskGrid::new(10, 10);
        stamp_disk(&mut g, (5, 5), 1, 255);
        assert_eq!(g.get(5, 5).unwrap(), 255);
        assert_eq!(g.get(6, 5).unwrap(), 255);
        assert_eq!(g.get(6, 6).unwrap(), 0); // distance √2 > 1
    }
}
