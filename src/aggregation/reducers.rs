//! Reducers and the reducer registry
//!
//! A reducer collapses the values of one bucket into a single scalar. Every
//! reducer here is total: the empty slice reduces to `0.0` and a single
//! value reduces to itself. Reducers carry no state or configuration beyond
//! the input slice, so adding one never touches the bucketing engine.
//!
//! # Example
//!
//! ```rust
//! use lumen_tsdb::aggregation::ReducerRegistry;
//!
//! let registry = ReducerRegistry::builtin();
//! let median = registry.resolve("median").unwrap();
//! assert_eq!(median.reduce(&[1.0, 2.0, 3.0, 4.0]), 2.5);
//! assert_eq!(median.reduce(&[]), 0.0);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A named, pure aggregation function over a bucket of values
pub trait Reducer: Send + Sync + 'static {
    /// Name the reducer is registered under
    fn name(&self) -> &'static str;

    /// Reduce a slice of values to one scalar
    ///
    /// Must return `0.0` for the empty slice.
    fn reduce(&self, values: &[f64]) -> f64;

    /// Whether the result is invariant to the input order
    fn order_independent(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reducer({})", self.name())
    }
}

/// Arithmetic mean, `0.0` for an empty bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Reducer for Mean {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn reduce(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Median after a full sort of the bucket
///
/// Even-length buckets yield the mean of the two central values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl Reducer for Median {
    fn name(&self) -> &'static str {
        "median"
    }

    fn reduce(&self, values: &[f64]) -> f64 {
        let n = values.len();
        if n == 0 {
            return 0.0;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mid = n / 2;
        if n % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }
}

/// Smallest value, `0.0` for an empty bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl Reducer for Min {
    fn name(&self) -> &'static str {
        "min"
    }

    fn reduce(&self, values: &[f64]) -> f64 {
        values.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }
}

/// Largest value, `0.0` for an empty bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl Reducer for Max {
    fn name(&self) -> &'static str {
        "max"
    }

    fn reduce(&self, values: &[f64]) -> f64 {
        values.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }
}

/// Sum of all values
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Reducer for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn reduce(&self, values: &[f64]) -> f64 {
        values.iter().fold(0.0, |acc, v| acc + v)
    }
}

/// Name-to-reducer mapping, resolved once per query
#[derive(Clone)]
pub struct ReducerRegistry {
    reducers: BTreeMap<&'static str, Arc<dyn Reducer>>,
}

impl ReducerRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            reducers: BTreeMap::new(),
        }
    }

    /// Registry with `mean`, `median`, `min`, `max` and `sum`
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Mean));
        registry.register(Arc::new(Median));
        registry.register(Arc::new(Min));
        registry.register(Arc::new(Max));
        registry.register(Arc::new(Sum));
        registry
    }

    /// Register a reducer under its own name, replacing any previous entry
    pub fn register(&mut self, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducers.insert(reducer.name(), reducer);
        self
    }

    /// Look up a reducer by name (case-sensitive)
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Reducer>> {
        self.reducers.get(name).cloned()
    }

    /// Whether a reducer with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.reducers.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&'static str> {
        self.reducers.keys().copied().collect()
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ReducerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerRegistry")
            .field("reducers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(Mean.reduce(&[]), 0.0);
        assert_eq!(Mean.reduce(&[0.2, 0.8]), 0.5);
        assert_eq!(Mean.reduce(&[3.0, 5.0]), 4.0);
    }

    #[test]
    fn test_median_odd_even() {
        assert_eq!(Median.reduce(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(Median.reduce(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(Median.reduce(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(Median.reduce(&[]), 0.0);
    }

    #[test]
    fn test_median_leaves_input_untouched() {
        let values = vec![3.0, 1.0, 2.0];
        Median.reduce(&values);
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_min_max_sum() {
        let values = [0.5, 0.1, 0.9];
        assert_eq!(Min.reduce(&values), 0.1);
        assert_eq!(Max.reduce(&values), 0.9);
        assert!((Sum.reduce(&values) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_builtin_contract() {
        let registry = ReducerRegistry::builtin();
        for name in registry.names() {
            let reducer = registry.resolve(name).unwrap();
            assert_eq!(reducer.reduce(&[]), 0.0, "{} of empty", name);
            assert_eq!(reducer.reduce(&[0.75]), 0.75, "{} of singleton", name);
            assert!(reducer.order_independent());
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ReducerRegistry::builtin();
        assert!(registry.contains("mean"));
        assert!(registry.contains("median"));
        assert!(registry.resolve("mode").is_none());
        assert!(registry.resolve("MEAN").is_none());
        assert_eq!(registry.names(), vec!["max", "mean", "median", "min", "sum"]);
    }

    #[test]
    fn test_register_custom() {
        struct Last;
        impl Reducer for Last {
            fn name(&self) -> &'static str {
                "last"
            }
            fn reduce(&self, values: &[f64]) -> f64 {
                values.last().copied().unwrap_or(0.0)
            }
            fn order_independent(&self) -> bool {
                false
            }
        }

        let mut registry = ReducerRegistry::empty();
        registry.register(Arc::new(Last));
        let last = registry.resolve("last").unwrap();
        assert_eq!(last.reduce(&[1.0, 2.0]), 2.0);
        assert!(!last.order_independent());
    }
}
