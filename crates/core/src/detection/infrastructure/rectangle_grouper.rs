use crate::detection::infrastructure::math;
use crate::shared::region::Region;

/// Collapses raw sliding-window hits into one rectangle per object.
///
/// Hits are clustered by [`Region::is_similar`]; clusters with no more than
/// `min_neighbors` members are discarded, the rest are averaged. A
/// surviving rectangle is dropped when it sits (loosely) inside a
/// better-supported one. With `min_neighbors == 0` hits pass through
/// untouched.
pub fn group_rectangles(hits: &[Region], min_neighbors: usize, eps: f64) -> Vec<Region> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits.to_vec();
    }

    let (labels, classes) = math::partition(hits, |a, b| a.is_similar(b, eps));

    let mut sums = vec![[0i64; 4]; classes];
    let mut counts = vec![0usize; classes];
    for (hit, &class) in hits.iter().zip(&labels) {
        let s = &mut sums[class];
        s[0] += hit.x as i64;
        s[1] += hit.y as i64;
        s[2] += hit.width as i64;
        s[3] += hit.height as i64;
        counts[class] += 1;
    }

    let clusters: Vec<(Region, usize)> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            (Region::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3])), n)
        })
        .collect();

    clusters
        .iter()
        .enumerate()
        .filter(|&(_, &(_, n1))| n1 > min_neighbors)
        .filter(|&(i, &(r1, n1))| {
            !clusters.iter().enumerate().any(|(j, &(r2, n2))| {
                j != i
                    && n2 > min_neighbors
                    && r1.is_inside_loose(&r2, eps)
                    && (n2 > n1.max(3) || n1 < 3)
            })
        })
        .map(|(_, &(r, _))| r)
        .collect()
}
