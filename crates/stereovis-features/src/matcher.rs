use crate::brief::DESCRIPTOR_LEN;

/// Hamming distance between two binary descriptors.
pub fn hamming_distance(a: &[u8; DESCRIPTOR_LEN], b: &[u8; DESCRIPTOR_LEN]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum()
}

/// Brute-force nearest-neighbor matching of binary descriptors.
///
/// For each descriptor in `d1` the `k` nearest descriptors in `d2` are
/// searched by Hamming distance. With `k = 1` the nearest neighbor is
/// accepted unconditionally. With `k = 2` a match is kept only when the
/// nearest distance divided by the second-nearest is below `max_ratio`,
/// which rejects ambiguous correspondences.
///
/// Returns `(index into d1, index into d2, distance)` triples, one per
/// accepted query.
pub fn match_descriptors(
    d1: &[[u8; DESCRIPTOR_LEN]],
    d2: &[[u8; DESCRIPTOR_LEN]],
    k: usize,
    max_ratio: f64,
) -> Vec<(usize, usize, u32)> {
    debug_assert!(k == 1 || k == 2);
    if d2.is_empty() || (k == 2 && d2.len() < 2) {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for (i, query) in d1.iter().enumerate() {
        let mut best = (usize::MAX, u32::MAX);
        let mut second = u32::MAX;
        for (j, candidate) in d2.iter().enumerate() {
            let dist = hamming_distance(query, candidate);
            if dist < best.1 {
                second = best.1;
                best = (j, dist);
            } else if dist < second {
                second = dist;
            }
        }

        if k == 2 {
            // Guard the all-zero case: identical best and second-best
            // distances of zero are as ambiguous as it gets.
            if (best.1 as f64) >= max_ratio * (second as f64) {
                continue;
            }
        }
        matches.push((i, best.0, best.1));
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(bits: &[usize]) -> [u8; DESCRIPTOR_LEN] {
        let mut d = [0u8; DESCRIPTOR_LEN];
        for &b in bits {
            d[b / 8] |= 1 << (b % 8);
        }
        d
    }

    #[test]
    fn test_hamming_distance_counts_bits() {
        let a = descriptor(&[0, 5, 100]);
        let b = descriptor(&[0, 7, 100, 200]);
        assert_eq!(hamming_distance(&a, &b), 3);
        assert_eq!(hamming_distance(&a, &a), 0);
    }

    #[test]
    fn test_nearest_neighbor_match() {
        let d1 = [descriptor(&[0, 1, 2])];
        let d2 = [descriptor(&[40, 41]), descriptor(&[0, 1, 2, 3]), descriptor(&[])];
        let matches = match_descriptors(&d1, &d2, 1, 0.7);
        assert_eq!(matches, vec![(0, 1, 1)]);
    }

    #[test]
    fn test_ratio_test_rejects_ambiguous() {
        // Two near-identical candidates: ratio close to 1, rejected.
        let d1 = [descriptor(&[0, 1, 2, 3])];
        let ambiguous = [descriptor(&[0, 1, 2]), descriptor(&[0, 1, 3])];
        assert!(match_descriptors(&d1, &ambiguous, 2, 0.7).is_empty());

        // One clear winner: ratio well below the cutoff, accepted.
        let clear = [descriptor(&[0, 1, 2, 3]), descriptor(&[100, 130, 160, 190, 220])];
        let matches = match_descriptors(&d1, &clear, 2, 0.7);
        assert_eq!(matches, vec![(0, 0, 0)]);
    }

    #[test]
    fn test_k2_needs_two_candidates() {
        let d1 = [descriptor(&[0])];
        let d2 = [descriptor(&[0])];
        assert!(match_descriptors(&d1, &d2, 2, 0.7).is_empty());
        assert_eq!(match_descriptors(&d1, &d2, 1, 0.7).len(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        let d1: [[u8; DESCRIPTOR_LEN]; 0] = [];
        let d2 = [descriptor(&[0])];
        assert!(match_descriptors(&d1, &d2, 1, 0.7).is_empty());
        assert!(match_descriptors(&d2, &d1, 1, 0.7).is_empty());
    }
}
