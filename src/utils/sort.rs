use core::mem;

/// Stable u32-key radix sort for SoA (inds/vals).
/// - Sorts by inds ascending
/// - Reorders vals accordingly
/// - Equal keys keep their input order, so duplicate term indices
///   stay in the order they were accumulated
///
/// Complexity: 4 passes, each O(n + 256)
#[inline]
pub fn radix_sort_u32_soa<N: Copy + Default>(inds: &mut [u32], vals: &mut [N]) {
    assert_eq!(inds.len(), vals.len());
    let n = inds.len();
    if n <= 1 {
        return;
    }

    // 小さい入力は挿入ソートの方が速い
    if n <= 32 {
        insertion_sort_u32_soa(inds, vals);
        return;
    }

    let mut inds_tmp = vec![0u32; n];
    let mut vals_tmp = vec![N::default(); n];

    let mut src_inds: &mut [u32] = inds;
    let mut src_vals: &mut [N] = vals;
    let mut dst_inds: &mut [u32] = &mut inds_tmp;
    let mut dst_vals: &mut [N] = &mut vals_tmp;

    // LSD: byte 0..3
    for shift in [0u32, 8, 16, 24] {
        let mut count = [0usize; 256];
        for &k in src_inds.iter() {
            count[((k >> shift) & 0xFF) as usize] += 1;
        }

        // prefix sum -> starting positions
        let mut sum = 0usize;
        for c in count.iter_mut() {
            let tmp = *c;
            *c = sum;
            sum += tmp;
        }

        for idx in 0..n {
            let k = src_inds[idx];
            let b = ((k >> shift) & 0xFF) as usize;
            let pos = count[b];
            count[b] = pos + 1;
            dst_inds[pos] = k;
            dst_vals[pos] = src_vals[idx];
        }

        mem::swap(&mut src_inds, &mut dst_inds);
        mem::swap(&mut src_vals, &mut dst_vals);
    }
    // 4 passes (even) so the result already sits in the caller's slices
}

#[inline]
fn insertion_sort_u32_soa<N: Copy>(inds: &mut [u32], vals: &mut [N]) {
    let n = inds.len();
    for i in 1..n {
        let mut j = i;
        while j > 0 && inds[j] < inds[j - 1] {
            inds.swap(j, j - 1);
            vals.swap(j, j - 1);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline_stable_sort(inds: &[u32], vals: &[f64]) -> (Vec<u32>, Vec<f64>) {
        let mut pairs: Vec<(u32, usize, f64)> = inds
            .iter()
            .copied()
            .enumerate()
            .map(|(i, k)| (k, i, vals[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        (
            pairs.iter().map(|p| p.0).collect(),
            pairs.iter().map(|p| p.2).collect(),
        )
    }

    /// tiny deterministic PRNG (xorshift32)
    struct Rng(u32);
    impl Rng {
        fn next_u32(&mut self) -> u32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            self.0 = x;
            x
        }
    }

    #[test]
    fn radix_sort_handles_empty_and_single() {
        let mut inds: Vec<u32> = vec![];
        let mut vals: Vec<f64> = vec![];
        radix_sort_u32_soa(&mut inds, &mut vals);
        assert!(inds.is_empty());

        let mut inds = vec![42u32];
        let mut vals = vec![0.5f64];
        radix_sort_u32_soa(&mut inds, &mut vals);
        assert_eq!(inds, vec![42]);
        assert_eq!(vals, vec![0.5]);
    }

    #[test]
    fn duplicate_term_indices_keep_accumulation_order() {
        let mut inds = vec![3u32, 1, 3, 2, 1, 3, 0];
        let mut vals: Vec<f64> = (0..inds.len()).map(|i| i as f64).collect();
        let (base_k, base_v) = baseline_stable_sort(&inds, &vals);
        radix_sort_u32_soa(&mut inds, &mut vals);
        assert_eq!(inds, base_k);
        assert_eq!(vals, base_v);
    }

    #[test]
    fn large_random_input_matches_stable_baseline() {
        let mut rng = Rng(0x9E37_79B9);
        let mut inds: Vec<u32> = (0..5000).map(|_| rng.next_u32() % 700).collect();
        let mut vals: Vec<f64> = (0..5000).map(|i| i as f64 * 0.25).collect();
        let (base_k, base_v) = baseline_stable_sort(&inds, &vals);
        radix_sort_u32_soa(&mut inds, &mut vals);
        assert_eq!(inds, base_k);
        assert_eq!(vals, base_v);
    }
}
