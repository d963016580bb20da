//! Point-in-polygon test over fixed-point coordinates.

use crate::store::PolygonView;

/// Ray-cast point-in-polygon test.
///
/// Casts a horizontal ray from `(qx, qy)` towards `+x` and counts edge
/// crossings; an odd count means inside. An edge `A -> B` crosses the ray
/// iff exactly one of its endpoints lies strictly above `qy` and the
/// intersection with `y = qy` lies strictly right of `qx`. The strict
/// inequality gives the ray a half-open interpretation, so a vertex shared
/// by two edges is counted at most once and horizontal edges never count.
///
/// The intersection comparison is evaluated as the sign of
/// `(bx-ax)*(qy-ay) - (qx-ax)*(by-ay)`; both factors can reach the full
/// ±3.6e9 coordinate span, so the products are taken in `i128`.
///
/// The closing edge from the last to the first vertex is implicit. Points
/// exactly on an edge yield an unspecified result.
pub(crate) fn inside_polygon(qx: i32, qy: i32, polygon: &PolygonView<'_>) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let (mut ax, mut ay) = polygon.vertex(n - 1);
    for i in 0..n {
        let (bx, by) = polygon.vertex(i);
        if (ay > qy) != (by > qy) {
            let run = i64::from(bx) - i64::from(ax);
            let rise = i64::from(by) - i64::from(ay);
            let lhs = i128::from(run) * i128::from(i64::from(qy) - i64::from(ay));
            let rhs = i128::from(i64::from(qx) - i64::from(ax)) * i128::from(rise);
            let crossed = if rise > 0 { lhs > rhs } else { lhs < rhs };
            if crossed {
                inside = !inside;
            }
        }
        (ax, ay) = (bx, by);
    }
    inside
}
