//! The per-tick exchange engine
//!
//! [`handle_messages_once`] advances every message by at most one step:
//!
//! 1. **Queues** (node by node, queue by queue): stale matrix updates are
//!    canceled, then the head of the queue is looked at. A departing head is
//!    placed on its channel if a slot is free; an arriving head is handed to
//!    the receiver.
//! 2. **Channels** (channel by channel, first slot then second): each message
//!    on the wire either reaches the far node's queue or bounces back to the
//!    head of its origin queue with one more failed attempt.
//!
//! A message touched once in a tick is not touched again in that tick, so a
//! crossing takes two ticks: one to enter the slot, one to resolve it.

use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;
use switchnet_core::{ChannelId, ConnectionType, MessageId, MessageKind, MessageQueue, Network, NodeId, Slot};
use switchnet_logging::NodeContextGuard;
use tracing::{trace, trace_span, warn};
use uuid::Uuid;

use crate::creators::{Creators, RouteSource};
use crate::handler::receive;

/// Collaborators the exchanger and handler need while a tick runs
pub struct ExchangeContext<'a> {
    pub routes: &'a dyn RouteSource,
    pub creators: &'a Creators,
    /// Run the tick belongs to, attached to node spans
    pub run_id: Uuid,
}

impl<'a> ExchangeContext<'a> {
    pub fn new(routes: &'a dyn RouteSource, creators: &'a Creators, run_id: Uuid) -> Self {
        Self {
            routes,
            creators,
            run_id,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeReport {
    /// Messages placed on a channel
    pub moved: u64,
    /// Messages that reached the far end of a channel
    pub crossed: u64,
    /// Crossings that failed and went back to the origin queue
    pub bounced: u64,
    /// Messages taken off a queue at the node they arrived at
    pub arrived: u64,
    /// Messages that reached their receiver
    pub delivered: u64,
    pub canceled: u64,
    /// Replies created for sending requests
    pub responses: u64,
    /// Refused transmissions resent as one message
    pub retries: u64,
}

impl std::ops::AddAssign for ExchangeReport {
    fn add_assign(&mut self, other: Self) {
        self.moved += other.moved;
        self.crossed += other.crossed;
        self.bounced += other.bounced;
        self.arrived += other.arrived;
        self.delivered += other.delivered;
        self.canceled += other.canceled;
        self.responses += other.responses;
        self.retries += other.retries;
    }
}

/// Run one tick of message exchange
pub fn handle_messages_once<R: Rng + ?Sized>(
    network: &mut Network,
    rng: &mut R,
    ctx: &ExchangeContext<'_>,
) -> ExchangeReport {
    let mut handled: HashSet<MessageId> = HashSet::new();
    let mut report = ExchangeReport::default();

    for node in network.node_ids() {
        let _context = NodeContextGuard::new(node, ctx.run_id);
        let _span = trace_span!("node", node = %node).entered();
        let channels = network
            .node(node)
            .map(|n| n.queue_channel_ids())
            .unwrap_or_default();
        for channel in channels {
            process_queue(network, node, channel, &mut handled, ctx, &mut report);
        }
    }

    for channel in network.channel_ids() {
        for slot in Slot::ALL {
            replace_message_to_queue(network, rng, channel, slot, &mut handled, &mut report);
        }
    }

    report
}

/// A matrix update whose receiver already holds its round or a newer one
fn is_stale_update(network: &Network, id: MessageId) -> bool {
    let Some(message) = network.message(id) else {
        return false;
    };
    if message.kind != MessageKind::MatrixUpdate {
        return false;
    }
    let Some(round) = message.tables().map(|t| t.round()) else {
        return false;
    };
    network
        .node(message.receiver_id)
        .and_then(|n| n.table_round)
        .is_some_and(|known| known >= round)
}

fn process_queue(
    network: &mut Network,
    node: NodeId,
    channel: ChannelId,
    handled: &mut HashSet<MessageId>,
    ctx: &ExchangeContext<'_>,
    report: &mut ExchangeReport,
) {
    let stale: Vec<MessageId> = network
        .queue(node, channel)
        .map(|q| q.iter().filter(|&id| is_stale_update(network, id)).collect())
        .unwrap_or_default();
    if !stale.is_empty() {
        if let Some(queue) = network.queue_mut(node, channel) {
            queue.extract_if(|id| stale.contains(&id));
        }
        for id in stale {
            network.cancel_message(id);
            report.canceled += 1;
        }
    }

    let Some(head) = network.queue(node, channel).and_then(MessageQueue::front) else {
        return;
    };
    if handled.contains(&head) {
        return;
    }

    let Some(message) = network.message(head) else {
        warn!(msg = %head, node = %node, "Queue held an unknown message");
        pop(network, node, channel);
        return;
    };

    if message.last_transfer_node_id != node {
        pop(network, node, channel);
        handled.insert(head);
        report.arrived += 1;
        receive(network, node, head, ctx, report);
        return;
    }

    if message.next_channel() != Some(channel) {
        warn!(msg = %head, node = %node, channel = %channel, "Message waits in the wrong queue");
        pop(network, node, channel);
        network.cancel_message(head);
        report.canceled += 1;
        return;
    }

    if try_move_message_to_channel(network, head, channel) {
        pop(network, node, channel);
        handled.insert(head);
        report.moved += 1;
    }
}

fn pop(network: &mut Network, node: NodeId, channel: ChannelId) {
    if let Some(queue) = network.queue_mut(node, channel) {
        queue.pop_front();
    }
}

/// Place a departing message in a free slot of `channel`
///
/// Half-duplex channels carry one message at a time in the first slot.
/// Duplex channels use both slots but never two messages leaving the same
/// node. A reservation held by another group blocks the channel.
pub fn try_move_message_to_channel(network: &mut Network, id: MessageId, channel: ChannelId) -> bool {
    let slot = {
        let (Some(message), Some(ch)) = (network.message(id), network.channel(channel)) else {
            return false;
        };
        if ch.is_reserved_for_other(message.parent_id) {
            trace!(msg = %id, channel = %channel, "Channel reserved by another group");
            return false;
        }
        let origin = message.last_transfer_node_id;
        let origin_of = |occupant: Option<MessageId>| {
            occupant
                .and_then(|m| network.message(m))
                .map(|m| m.last_transfer_node_id)
        };

        match ch.connection_type {
            ConnectionType::HalfDuplex => ch.first_message.is_none().then_some(Slot::First),
            ConnectionType::Duplex => {
                if origin_of(ch.first_message) == Some(origin) || origin_of(ch.second_message) == Some(origin) {
                    None
                } else if ch.first_message.is_none() {
                    Some(Slot::First)
                } else if ch.second_message.is_none() {
                    Some(Slot::Second)
                } else {
                    None
                }
            }
        }
    };

    let Some(slot) = slot else {
        return false;
    };
    match network.channel_mut(channel) {
        Some(ch) => {
            ch.set_slot(slot, id);
            trace!(msg = %id, channel = %channel, slot = ?slot, "Moved to channel");
            true
        }
        None => false,
    }
}

/// Resolve the message in one slot of `channel`
///
/// The crossing succeeds when the channel is not reserved by another group
/// and a uniform draw is at least the channel's error chance.
fn replace_message_to_queue<R: Rng + ?Sized>(
    network: &mut Network,
    rng: &mut R,
    channel: ChannelId,
    slot: Slot,
    handled: &mut HashSet<MessageId>,
    report: &mut ExchangeReport,
) {
    let Some(ch) = network.channel(channel) else {
        return;
    };
    let Some(id) = ch.slot(slot) else {
        return;
    };
    if handled.contains(&id) {
        return;
    }
    let Some(message) = network.message(id) else {
        warn!(msg = %id, channel = %channel, "Slot held an unknown message");
        if let Some(ch) = network.channel_mut(channel) {
            ch.take_slot(slot);
        }
        return;
    };

    let (group, kind, origin) = (message.parent_id, message.kind, message.last_transfer_node_id);
    let Some(far) = ch.other_end(origin) else {
        warn!(msg = %id, channel = %channel, origin = %origin, "Message on a channel it did not enter from");
        if let Some(ch) = network.channel_mut(channel) {
            ch.take_slot(slot);
        }
        network.cancel_message(id);
        report.canceled += 1;
        return;
    };
    let success = !ch.is_reserved_for_other(group) && rng.random::<f64>() >= ch.error_chance;

    if let Some(ch) = network.channel_mut(channel) {
        ch.take_slot(slot);
        if success {
            match kind {
                MessageKind::General => ch.release(),
                MessageKind::SendingRequest => ch.reserve(group),
                _ => {}
            }
        }
    }
    handled.insert(id);

    if success {
        network.enqueue(far, channel, id);
        report.crossed += 1;
        trace!(msg = %id, channel = %channel, to = %far, "Crossed");
    } else {
        if let Some(message) = network.message_mut(id) {
            message.send_attempts += 1;
        }
        network.enqueue_front(origin, channel, id);
        report.bounced += 1;
        trace!(msg = %id, channel = %channel, back_to = %origin, "Bounced");
    }
}
