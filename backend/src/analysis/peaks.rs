//! One-dimensional peak finding.
//!
//! A peak is a sample strictly greater than its neighbours; flat tops count
//! once, at their (left-biased) midpoint. The first and last samples are never
//! peaks. `min_distance` then suppresses lower peaks closer than that many
//! samples to a kept one, preferring later peaks among equal heights.

/// Indices of local maxima, in ascending order.
pub fn local_maxima<T: PartialOrd + Copy>(signal: &[T]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if signal.len() < 3 {
        return peaks;
    }
    let last = signal.len() - 1;
    let mut i = 1;
    while i < last {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < last && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                let right = ahead - 1;
                peaks.push((i + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

pub fn find_peaks<T: PartialOrd + Copy>(signal: &[T], min_distance: usize) -> Vec<usize> {
    let peaks = local_maxima(signal);
    if min_distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut keep = vec![true; peaks.len()];
    // Stable ascending sort by height, then visit from the highest priority.
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        signal[peaks[a]]
            .partial_cmp(&signal[peaks[b]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < min_distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < min_distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}
