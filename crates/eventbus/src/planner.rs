use crate::config::Config;
use crate::log::LogHandle;
use crate::nodes::NodeResolver;

use futures::future::join_all;

/// Nodes assumed behind a seeker that could not be queried.
pub const ASSUMED_CLUSTER_SIZE: usize = 5;

/// Sizes a consumer's in-flight window from the discovered fleet.
///
/// With seekers configured the estimate is the sum of the node counts they
/// report, counting [`ASSUMED_CLUSTER_SIZE`] for each seeker that fails.
/// Without seekers it is the number of configured nodes. The plan is the
/// larger of the estimate and [`Config::max_in_flight`].
#[derive(Clone, Debug)]
pub struct ConcurrencyPlanner<R> {
    resolver: R,
    assumed_cluster_size: usize,
    log: LogHandle,
}

impl<R> ConcurrencyPlanner<R>
where
    R: NodeResolver,
{
    /// Creates a planner using `resolver` for seeker lookups.
    pub const fn new(resolver: R, log: LogHandle) -> Self {
        Self {
            resolver,
            assumed_cluster_size: ASSUMED_CLUSTER_SIZE,
            log,
        }
    }

    /// Overrides the per-seeker fallback used when discovery fails.
    #[must_use]
    pub const fn with_assumed_cluster_size(mut self, size: usize) -> Self {
        self.assumed_cluster_size = size;
        self
    }

    /// The resolver used for seeker lookups.
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Computes the in-flight window for `config`.
    pub async fn plan(&self, config: &Config) -> usize {
        let estimate = if config.seekers.is_empty() {
            config.nodes.len()
        } else {
            let lookups = config
                .seekers
                .iter()
                .map(|seeker| self.resolver.resolve(seeker));

            join_all(lookups)
                .await
                .into_iter()
                .zip(&config.seekers)
                .map(|(result, seeker)| match result {
                    Ok(nodes) => nodes.producers.len(),
                    Err(e) => {
                        self.log.error(format_args!(
                            "discovery via seeker({seeker}) failed, assuming {} nodes: {e}",
                            self.assumed_cluster_size
                        ));
                        self.assumed_cluster_size
                    }
                })
                .sum()
        };

        estimate.max(config.max_in_flight)
    }
}
