use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use super::similarity::{dot, normalize};
use super::{Neighbor, VectorIndex};
use crate::error::ClaimError;

/// Brute-force index over a row-major matrix of unit vectors.
///
/// Search is O(N·D + N log k): every row is scored and a bounded min-heap keeps
/// the best `k`.
#[derive(Debug, Clone)]
pub struct ExactIndex {
    dimension: usize,
    ids: Vec<u64>,
    vectors: Vec<f32>,
}

/// Heap entry: higher similarity wins, then lower passage id
#[derive(Debug, Clone, Copy)]
struct Ranked {
    similarity: f32,
    passage_id: u64,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| other.passage_id.cmp(&self.passage_id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl ExactIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            ids: Vec::with_capacity(capacity),
            vectors: Vec::with_capacity(capacity * dimension),
        }
    }

    /// Build from `(passage_id, embedding)` pairs
    pub fn build<'a, I>(dimension: usize, items: I) -> Result<Self, ClaimError>
    where
        I: IntoIterator<Item = (u64, &'a [f32])>,
    {
        let items = items.into_iter();
        let mut index = Self::with_capacity(dimension, items.size_hint().0);
        for (id, vector) in items {
            index.insert(id, vector)?;
        }
        Ok(index)
    }

    /// Append a vector. It is stored normalised; the caller's copy is untouched.
    pub fn insert(&mut self, passage_id: u64, vector: &[f32]) -> Result<(), ClaimError> {
        if vector.len() != self.dimension {
            return Err(ClaimError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let start = self.vectors.len();
        self.vectors.extend_from_slice(vector);
        normalize(&mut self.vectors[start..]);
        self.ids.push(passage_id);
        Ok(())
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }
}

impl VectorIndex for ExactIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, ClaimError> {
        if query.len() != self.dimension {
            return Err(ClaimError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let k = k.min(self.ids.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut q = query.to_vec();
        normalize(&mut q);

        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
        for (row, &passage_id) in self.ids.iter().enumerate() {
            let similarity = dot(&q, self.row(row));
            // NaN never enters the ranking
            let similarity = if similarity.is_nan() { 0.0 } else { similarity };
            let candidate = Ranked {
                similarity,
                passage_id,
            };
            if heap.len() < k {
                heap.push(Reverse(candidate));
            } else if let Some(Reverse(worst)) = heap.peek() {
                if candidate > *worst {
                    heap.pop();
                    heap.push(Reverse(candidate));
                }
            }
        }

        // Ascending order of Reverse<_> is descending order of Ranked
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| Neighbor {
                passage_id: r.passage_id,
                similarity: r.similarity,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index_of(rows: &[(u64, Vec<f32>)]) -> ExactIndex {
        ExactIndex::build(2, rows.iter().map(|(id, v)| (*id, v.as_slice()))).unwrap()
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = index_of(&[
            (0, vec![0.0, 1.0]),
            (1, vec![1.0, 0.0]),
            (2, vec![1.0, 1.0]),
        ]);
        let hits = index.search(&[1.0, 0.1], 3).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.passage_id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits[1].similarity >= hits[2].similarity);
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let index = index_of(&[
            (9, vec![1.0, 0.0]),
            (3, vec![2.0, 0.0]),
            (5, vec![0.5, 0.0]),
        ]);
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.passage_id).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let index = index_of(&[(0, vec![0.0, 1.0]), (1, vec![1.0, 0.0])]);
        assert_eq!(index.search(&[1.0, 0.0], 50).unwrap().len(), 2);
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = index_of(&[(0, vec![0.0, 1.0])]);
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            ClaimError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));

        let mut index = ExactIndex::new(2);
        assert!(index.insert(1, &[1.0]).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let index = index_of(&[(4, vec![0.0, 1.0]), (2, vec![1.0, 0.0])]);
        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].passage_id, 2);
        assert_eq!(hits[0].similarity, 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn rows() -> impl Strategy<Value = Vec<Vec<f32>>> {
            prop::collection::vec(prop::collection::vec(-4i8..4, 3), 1..40)
                .prop_map(|rows| {
                    rows.into_iter()
                        .map(|r| r.into_iter().map(f32::from).collect())
                        .collect()
                })
        }

        proptest! {
            /// Property: heap selection agrees with a full sort
            #[test]
            fn search_matches_full_sort(
                rows in rows(),
                query in prop::collection::vec(-4i8..4, 3),
                k in 1usize..50,
            ) {
                let query: Vec<f32> = query.into_iter().map(f32::from).collect();
                let index = ExactIndex::build(
                    3,
                    rows.iter().enumerate().map(|(i, v)| (i as u64, v.as_slice())),
                ).unwrap();

                let mut expected = Vec::new();
                for (i, _) in rows.iter().enumerate() {
                    let mut q = query.clone();
                    normalize(&mut q);
                    let similarity = dot(&q, index.row(i));
                    expected.push(Ranked { similarity, passage_id: i as u64 });
                }
                expected.sort_by(|a, b| b.cmp(a));
                expected.truncate(k);

                let hits = index.search(&query, k).unwrap();
                prop_assert_eq!(hits.len(), expected.len());
                for (hit, want) in hits.iter().zip(expected.iter()) {
                    prop_assert_eq!(hit.passage_id, want.passage_id);
                }
            }

            /// Property: output is sorted by (similarity desc, id asc)
            #[test]
            fn search_output_is_ordered(rows in rows(), k in 1usize..50) {
                let index = ExactIndex::build(
                    3,
                    rows.iter().enumerate().map(|(i, v)| (i as u64, v.as_slice())),
                ).unwrap();
                let hits = index.search(&[1.0, 0.5, -0.25], k).unwrap();
                for pair in hits.windows(2) {
                    let ordered = pair[0].similarity > pair[1].similarity
                        || (pair[0].similarity == pair[1].similarity
                            && pair[0].passage_id < pair[1].passage_id);
                    prop_assert!(ordered);
                }
            }
        }
    }
}
