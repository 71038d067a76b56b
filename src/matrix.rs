//! Latency matrix assembly and alignment.
//!
//! Nodes may resolve the same peer to slightly different names, so the
//! rows collected from the mesh do not always cover the same
//! destinations.  [`Matrix::pad`] reconciles them into one sorted
//! column layout, filling the gaps with placeholder cells.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Latency, Vector};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix(pub Vec<Vector>);

impl Matrix {
    /// Align every row to the sorted union of all real destinations.
    ///
    /// Rows end up sorted by source and cells by destination.  Cells
    /// synthesized by an earlier pass are dropped first, which makes
    /// padding idempotent.
    pub fn pad(mut self) -> Self {
        for v in &mut self.0 {
            v.latencies.retain(|l| !l.placeholder);
            v.latencies.sort_by(|a, b| a.destination.cmp(&b.destination));
            v.latencies.dedup_by(|a, b| a.destination == b.destination);
        }
        self.0.sort_by(|a, b| a.source.cmp(&b.source));

        let columns = self.columns();
        for v in &mut self.0 {
            let mut row = std::mem::take(&mut v.latencies).into_iter().peekable();
            let mut aligned = Vec::with_capacity(columns.len());
            // Both sides are sorted, so a single forward scan is enough.
            for column in &columns {
                aligned.push(
                    row.next_if(|l| l.destination == *column)
                        .unwrap_or_else(Latency::placeholder),
                );
            }
            v.latencies = aligned;
        }
        self
    }

    /// The sorted set of real destinations across all rows.
    pub fn columns(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|v| v.latencies.iter())
            .filter(|l| !l.placeholder)
            .map(|l| l.destination.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn rows(&self) -> &[Vector] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Vector>> for Matrix {
    fn from(rows: Vec<Vector>) -> Self {
        Matrix(rows)
    }
}
