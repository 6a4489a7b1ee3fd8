/// Running sums for one field of the window being built.
///
/// Values are summed relative to the first value seen in the window. Time
/// tags are large (microseconds since 2000 exceed 1e14) and summing them
/// directly loses the digits that distinguish samples.
#[derive(Debug, Clone)]
pub(super) struct Accumulator {
    sums: Vec<f64>,
    count: usize,
    base: Option<f64>,
}

impl Accumulator {
    pub(super) fn new(elements: usize) -> Self {
        Self {
            sums: vec![0.0; elements],
            count: 0,
            base: None,
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[cfg(test)]
    pub(super) fn count(&self) -> usize {
        self.count
    }

    pub(super) fn add(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.sums.len());
        let base = *self
            .base
            .get_or_insert_with(|| values.first().copied().unwrap_or_default());
        for (sum, value) in self.sums.iter_mut().zip(values) {
            *sum += value - base;
        }
        self.count += 1;
    }

    /// Mean of every element, resets the accumulator
    pub(super) fn finish(&mut self) -> Vec<f64> {
        let base = self.base.take().unwrap_or_default();
        #[allow(clippy::cast_precision_loss)]
        let count = self.count as f64;
        let means = self.sums.iter().map(|sum| sum / count + base).collect();
        self.sums.fill(0.0);
        self.count = 0;
        means
    }
}
