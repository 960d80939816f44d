// rivulet/src/core/sequence.rs

//! The source adapter: wraps a finite in-memory collection (or any iterator)
//! as an ordered series of elements owned by one pipeline.

/// An ordered, finite (or conceptually unbounded) series of elements of a
/// single type. A `Sequence` is owned by the pipeline that created it and is
/// consumed at most once, when a terminal operation runs.
pub struct Sequence<T>(Box<dyn Iterator<Item = T> + Send>);

impl<T> Sequence<T> {
  /// Wraps an arbitrary iterator as a sequence. Nothing is pulled until a
  /// terminal operation drives the pipeline.
  pub fn new(iter: impl Iterator<Item = T> + Send + 'static) -> Self {
    Sequence(Box::new(iter))
  }

  /// Wraps an owned vector, yielding its elements in order.
  pub fn from_vec(items: Vec<T>) -> Self
  where
    T: Send + 'static,
  {
    Sequence(Box::new(items.into_iter()))
  }

  /// Wraps any collection that can be turned into an iterator.
  pub fn from_iter<I>(items: I) -> Self
  where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
  {
    Sequence(Box::new(items.into_iter()))
  }

  /// Wraps a collection of collections, flattening exactly one level: each
  /// outer element becomes its own sub-sequence, and relative order is
  /// preserved both between and within sub-sequences. Nested containers
  /// deeper than one level are not recursed into.
  pub fn from_nested<I, J>(nested: I) -> Self
  where
    I: IntoIterator<Item = J>,
    I::IntoIter: Send + 'static,
    J: IntoIterator<Item = T>,
    J::IntoIter: Send + 'static,
  {
    Sequence(Box::new(nested.into_iter().flat_map(|sub| sub.into_iter())))
  }

  /// A sequence that yields no elements.
  pub fn empty() -> Self
  where
    T: Send + 'static,
  {
    Sequence(Box::new(std::iter::empty()))
  }
}

impl<T> Iterator for Sequence<T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.0.next()
  }
}

// The boxed iterator carries no useful debug state; report only the type.
impl<T> std::fmt::Debug for Sequence<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Sequence")
      .field("element_type", &std::any::type_name::<T>())
      .finish_non_exhaustive()
  }
}
