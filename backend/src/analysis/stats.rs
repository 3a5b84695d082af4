/// Percentile with linear interpolation between closest ranks.
/// `sorted` must be ascending and non-empty.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxplotStats {
    pub mean: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    /// Counts outside the 1.5 IQR fences, in input order.
    pub outliers: Vec<u32>,
    pub range: (i64, i64),
    /// Extremes of the non-outlier counts; these end the whiskers.
    pub whisker_low: f64,
    pub whisker_high: f64,
}

impl BoxplotStats {
    pub fn lower_fence(&self) -> f64 {
        self.q1 - 1.5 * self.iqr
    }

    pub fn upper_fence(&self) -> f64 {
        self.q3 + 1.5 * self.iqr
    }

    pub fn is_outlier(&self, count: u32) -> bool {
        let c = count as f64;
        c < self.lower_fence() || c > self.upper_fence()
    }

    pub fn from_counts(counts: &[u32]) -> Option<Self> {
        if counts.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        let q1 = percentile(&sorted, 25.0);
        let median = percentile(&sorted, 50.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;

        let mut stats = Self {
            mean,
            q1,
            median,
            q3,
            iqr,
            outliers: Vec::new(),
            range: (q1.floor() as i64, q3.ceil() as i64),
            whisker_low: q1,
            whisker_high: q3,
        };
        stats.outliers = counts
            .iter()
            .copied()
            .filter(|&c| stats.is_outlier(c))
            .collect();

        let inliers = sorted
            .iter()
            .copied()
            .filter(|&c| c >= stats.lower_fence() && c <= stats.upper_fence());
        let (low, high) = inliers.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c), hi.max(c))
        });
        if low.is_finite() {
            stats.whisker_low = low.min(q1);
            stats.whisker_high = high.max(q3);
        }
        Some(stats)
    }
}
