//! Shared wiring: the queue, registry, broker, and gateway all live behind
//! one set of `Arc`s constructed once at startup and handed to both
//! transport servers.

use broker_core::{Broker, Config, InFlightRegistry, OperatorGateway, WorkQueue};
use std::sync::Arc;

pub struct Shared {
    pub broker: Arc<Broker>,
    pub gateway: Arc<OperatorGateway>,
    pub queue: Arc<WorkQueue>,
    pub config: Config,
}

impl Shared {
    pub fn new(config: Config) -> Self {
        let queue = Arc::new(WorkQueue::new(config.max_inflight));
        let registry = Arc::new(InFlightRegistry::new());
        let broker = Arc::new(Broker::new(queue.clone(), registry.clone()));
        let gateway = Arc::new(OperatorGateway::new(queue.clone(), registry));
        Self {
            broker,
            gateway,
            queue,
            config,
        }
    }
}
