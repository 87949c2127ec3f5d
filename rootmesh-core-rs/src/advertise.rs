//! Periodic presence advertisement
//!
//! Receiving any frame makes a node register the sender, so this broadcast is
//! what lets nodes that never talk protocol find each other.

use crate::node::MeshContext;
use crate::types::PacketBody;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

pub async fn run_advertise_loop(ctx: Arc<MeshContext>) {
    let period = ctx.config.advertise_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if ctx.broadcast(PacketBody::Advertisement) {
            debug!("Advertisement broadcast");
        }
    }
}
