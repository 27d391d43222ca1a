/// 2-D k-d tree over tangent-plane star positions (arcsec).
///
/// Built once per frame from the current star positions and queried by
/// every detection of that frame, possibly from several threads.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
struct KdNode {
    point_idx: usize,
    left: Option<usize>,
    right: Option<usize>,
    /// 0 = x, 1 = y
    split_dim: usize,
}

impl KdTree {
    /// Build a balanced tree by median splits. `None` if `points` is empty.
    pub fn build(points: &[(f64, f64)]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        Self::build_recursive(points, &mut indices, 0, &mut nodes);
        Some(Self {
            nodes,
            points: points.to_vec(),
        })
    }

    fn build_recursive(
        points: &[(f64, f64)],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let split_dim = depth % 2;
        indices.sort_by(|&a, &b| coord(points[a], split_dim).total_cmp(&coord(points[b], split_dim)));

        let median = indices.len() / 2;
        let node_idx = nodes.len();
        nodes.push(KdNode {
            point_idx: indices[median],
            left: None,
            right: None,
            split_dim,
        });

        let (left_indices, right_part) = indices.split_at_mut(median);
        let left = Self::build_recursive(points, left_indices, depth + 1, nodes);
        let right = Self::build_recursive(points, &mut right_part[1..], depth + 1, nodes);
        nodes[node_idx].left = left;
        nodes[node_idx].right = right;

        Some(node_idx)
    }

    /// All points within `radius` of `query` as (index, distance_squared),
    /// nearest first.
    pub fn radius_search(&self, query: (f64, f64), radius: f64) -> Vec<(usize, f64)> {
        let mut results = Vec::new();
        if !self.nodes.is_empty() {
            self.radius_search_recursive(0, query, radius * radius, &mut results);
        }
        results.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        results
    }

    fn radius_search_recursive(
        &self,
        node_idx: usize,
        query: (f64, f64),
        radius_sq: f64,
        results: &mut Vec<(usize, f64)>,
    ) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        let dist_sq = distance_squared(query, point);
        if dist_sq <= radius_sq {
            results.push((node.point_idx, dist_sq));
        }

        let diff = coord(query, node.split_dim) - coord(point, node.split_dim);
        let diff_sq = diff * diff;

        if let Some(left_idx) = node.left {
            if diff <= 0.0 || diff_sq <= radius_sq {
                self.radius_search_recursive(left_idx, query, radius_sq, results);
            }
        }
        if let Some(right_idx) = node.right {
            if diff >= 0.0 || diff_sq <= radius_sq {
                self.radius_search_recursive(right_idx, query, radius_sq, results);
            }
        }
    }
}

#[inline]
fn coord(p: (f64, f64), dim: usize) -> f64 {
    if dim == 0 {
        p.0
    } else {
        p.1
    }
}

#[inline]
fn distance_squared(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[(f64, f64)], query: (f64, f64), radius: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| distance_squared(**p, query) <= radius * radius)
            .map(|(i, _)| i)
            .collect();
        hits.sort();
        hits
    }

    #[test]
    fn test_build_empty() {
        assert!(KdTree::build(&[]).is_none());
    }

    #[test]
    fn test_radius_search_sorted_nearest_first() {
        let points = vec![(0.0, 0.0), (3.0, 0.0), (1.0, 0.0), (10.0, 10.0)];
        let tree = KdTree::build(&points).unwrap();
        let hits = tree.radius_search((0.2, 0.0), 3.0);
        let order: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_radius_search_matches_brute_force() {
        // Deterministic scatter on a skewed lattice.
        let points: Vec<(f64, f64)> = (0..200)
            .map(|i| {
                let f = i as f64;
                ((f * 7.3) % 50.0, (f * 3.1 + (f * 0.7).sin() * 4.0) % 40.0)
            })
            .collect();
        let tree = KdTree::build(&points).unwrap();
        for q in [(10.0, 10.0), (25.5, 3.2), (49.0, 39.0), (0.0, 0.0)] {
            let mut got: Vec<usize> = tree.radius_search(q, 4.5).iter().map(|(i, _)| *i).collect();
            got.sort();
            assert_eq!(got, brute_force(&points, q, 4.5));
        }
    }
}
