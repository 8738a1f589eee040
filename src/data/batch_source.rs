use rand::seq::SliceRandom;

/// Anything that can hand out a fresh, finite sequence of batches.
///
/// `batches` is called once per pass (train, valid or test) per epoch. Every
/// call must start over from the beginning; no cursor state may leak from one
/// epoch into the next.
pub trait BatchSource {
    type Batch;

    fn batches(&self) -> Box<dyn Iterator<Item = Self::Batch> + '_>;
}

/// A fixed list of batches, replayed in order every epoch.
impl<B: Clone> BatchSource for Vec<B> {
    type Batch = B;

    fn batches(&self) -> Box<dyn Iterator<Item = B> + '_> {
        Box::new(self.iter().cloned())
    }
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    type Batch = S::Batch;

    fn batches(&self) -> Box<dyn Iterator<Item = S::Batch> + '_> {
        (**self).batches()
    }
}

/// Wraps a factory closure; the closure is invoked anew for every pass.
pub struct FnSource<F> {
    factory: F,
}

impl<F> FnSource<F> {
    pub fn new(factory: F) -> Self {
        FnSource { factory }
    }
}

impl<F, I> BatchSource for FnSource<F>
where
    F: Fn() -> I,
    I: IntoIterator,
    I::IntoIter: 'static,
{
    type Batch = I::Item;

    fn batches(&self) -> Box<dyn Iterator<Item = I::Item> + '_> {
        Box::new((self.factory)().into_iter())
    }
}

/// In-memory samples cut into mini-batches of `batch_size`.
///
/// When `shuffle` is on, sample order is reshuffled on every call to
/// `batches`, so each epoch sees a different batch composition. The last
/// batch is short when the sample count is not a multiple of `batch_size`.
#[derive(Debug, Clone)]
pub struct ShuffledBatches<S> {
    samples: Vec<S>,
    batch_size: usize,
    shuffle: bool,
}

impl<S: Clone> ShuffledBatches<S> {
    /// # Panics
    /// Panics if `batch_size == 0`.
    pub fn new(samples: Vec<S>, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be at least 1");
        ShuffledBatches { samples, batch_size, shuffle: true }
    }

    /// Keeps the original sample order (useful for evaluation sets).
    pub fn sequential(mut self) -> Self {
        self.shuffle = false;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches one pass yields.
    pub fn batch_count(&self) -> usize {
        (self.samples.len() + self.batch_size - 1) / self.batch_size
    }
}

impl<S: Clone> BatchSource for ShuffledBatches<S> {
    type Batch = Vec<S>;

    fn batches(&self) -> Box<dyn Iterator<Item = Vec<S>> + '_> {
        let mut indices: Vec<usize> = (0..self.samples.len()).collect();
        if self.shuffle {
            indices.shuffle(&mut rand::thread_rng());
        }

        let batch_size = self.batch_size;
        let n = indices.len();
        Box::new((0..n).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(n);
            indices[start..end]
                .iter()
                .map(|&i| self.samples[i].clone())
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_source_restarts_every_pass() {
        let source = vec![1, 2, 3];
        assert_eq!(source.batches().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(source.batches().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn fn_source_calls_factory_per_pass() {
        let source = FnSource::new(|| (0..4).map(|i| i * 10));
        assert_eq!(source.batches().count(), 4);
        assert_eq!(source.batches().sum::<i32>(), 60);
    }

    #[test]
    fn shuffled_batches_cover_every_sample_once() {
        let source = ShuffledBatches::new((0..10).collect::<Vec<u32>>(), 3);
        assert_eq!(source.batch_count(), 4);

        let batches: Vec<Vec<u32>> = source.batches().collect();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[3].len(), 1);

        let mut seen: Vec<u32> = batches.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn sequential_batches_keep_order() {
        let source = ShuffledBatches::new(vec!['a', 'b', 'c', 'd', 'e'], 2).sequential();
        let batches: Vec<Vec<char>> = source.batches().collect();
        assert_eq!(batches, vec![vec!['a', 'b'], vec!['c', 'd'], vec!['e']]);
    }

    #[test]
    fn empty_samples_yield_no_batches() {
        let source: ShuffledBatches<f64> = ShuffledBatches::new(Vec::new(), 4);
        assert!(source.is_empty());
        assert_eq!(source.batches().count(), 0);
    }

    #[test]
    fn boxed_sources_are_sources() {
        let source: Box<dyn BatchSource<Batch = u8>> = Box::new(vec![7u8, 8]);
        assert_eq!(source.batches().collect::<Vec<_>>(), vec![7, 8]);
    }
}
