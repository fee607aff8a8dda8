//! Runs the dispatcher over a list of paintings in fixed-size groups.
//!
//! Paintings within a group run concurrently; the next group starts only
//! after every task of the current one has finished. A task that panics
//! still leaves an `aborted` record for its painting.

use crate::dispatch::Dispatcher;
use gallery_model::{Painting, ResultTable};
use std::sync::Arc;
use tokio::task::JoinSet;

pub struct BatchController {
    dispatcher: Arc<Dispatcher>,
    group_size: usize,
}

impl BatchController {
    /// A `group_size` of zero is treated as one.
    pub fn new(dispatcher: Arc<Dispatcher>, group_size: usize) -> Self {
        Self {
            dispatcher,
            group_size: group_size.max(1),
        }
    }

    /// Dispatch every painting and return the filled result table.
    ///
    /// Paintings whose name was already seen earlier in the list are skipped
    /// with a warning; the first occurrence keeps the record.
    pub async fn run(&self, paintings: &[Painting]) -> ResultTable {
        let table = ResultTable::new();
        let groups = paintings.len().div_ceil(self.group_size);

        for (n, group) in paintings.chunks(self.group_size).enumerate() {
            tracing::info!(group = n + 1, of = groups, size = group.len(), "Starting group");
            let mut tasks = JoinSet::new();

            for painting in group {
                let slot = match table.claim(painting) {
                    Ok(slot) => slot.with_location(self.dispatcher.inferred_location(painting)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping painting");
                        continue;
                    }
                };
                let dispatcher = Arc::clone(&self.dispatcher);
                let painting = painting.clone();
                tasks.spawn(async move {
                    let record = dispatcher.dispatch(&painting).await;
                    slot.fill(record);
                });
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Dispatch task failed");
                }
            }
        }

        tracing::info!(paintings = table.len(), "Batch complete");
        table
    }
}
