//! Arrival processing
//!
//! [`receive`] runs when a message is taken off the queue of the node it
//! just reached. Messages with hops left move on to the next queue; the rest
//! are handed to [`handle`], which acts on the message kind.

use switchnet_core::{MessageId, MessageKind, Network, NodeId};
use tracing::{debug, trace, warn};

use crate::creators::{MessageCreator, MessageInitializer, ResponseCreator, adopt_tables, launch, send_table_updates};
use crate::exchanger::{ExchangeContext, ExchangeReport};

/// Take ownership of an arrived message at `node`
pub fn receive(network: &mut Network, node: NodeId, id: MessageId, ctx: &ExchangeContext<'_>, report: &mut ExchangeReport) {
    let Some(message) = network.message_mut(id) else {
        return;
    };
    message.last_transfer_node_id = node;
    message.complete_hop();

    match message.next_channel() {
        Some(next) => {
            if network.enqueue(node, next, id) {
                trace!(msg = %id, node = %node, next = %next, "Forwarded");
            } else {
                warn!(msg = %id, node = %node, next = %next, "Next hop vanished");
                network.cancel_message(id);
                report.canceled += 1;
            }
        }
        None => handle(network, node, id, ctx, report),
    }
}

/// Finish a message at its receiver
pub fn handle(network: &mut Network, node: NodeId, id: MessageId, ctx: &ExchangeContext<'_>, report: &mut ExchangeReport) {
    network.record_received(node, id);
    report.delivered += 1;

    let Some(kind) = network.message(id).map(|m| m.kind) else {
        return;
    };
    match kind {
        MessageKind::General => trace!(msg = %id, node = %node, "Delivered"),
        MessageKind::MatrixUpdate => handle_matrix_update(network, node, id, ctx, report),
        MessageKind::SendingRequest => handle_request(network, node, id, ctx, report),
        MessageKind::PositiveSendingResponse => handle_positive_response(network, node, id, ctx, report),
        MessageKind::NegativeSendingResponse => handle_negative_response(network, node, id, ctx, report),
    }
}

fn handle_matrix_update(
    network: &mut Network,
    node: NodeId,
    id: MessageId,
    ctx: &ExchangeContext<'_>,
    report: &mut ExchangeReport,
) {
    let Some(tables) = network.message(id).and_then(|m| m.tables().cloned()) else {
        return;
    };
    let adopted = match network.node_mut(node) {
        Some(n) => {
            n.is_active = true;
            adopt_tables(n, &tables)
        }
        None => return,
    };
    if !adopted {
        trace!(node = %node, round = tables.round(), "Round already known");
        return;
    }

    // Other copies of this round addressed here are now useless
    let waiting: Vec<MessageId> = network
        .node(node)
        .map(|n| n.queues.iter().flat_map(|q| q.iter()).collect())
        .unwrap_or_default();
    for stale in waiting {
        let is_update_for_node = network
            .message(stale)
            .is_some_and(|m| m.kind == MessageKind::MatrixUpdate && m.receiver_id == node);
        if is_update_for_node {
            network.detach_message(stale);
            network.cancel_message(stale);
            report.canceled += 1;
        }
    }

    let sent = send_table_updates(network, node, &tables, ctx.creators.service_size());
    debug!(node = %node, round = tables.round(), fan_out = sent.len(), "Table adopted");
}

fn handle_request(
    network: &mut Network,
    node: NodeId,
    id: MessageId,
    ctx: &ExchangeContext<'_>,
    report: &mut ExchangeReport,
) {
    let active = network.node(node).is_some_and(|n| n.is_active);
    let path_intact = network
        .message(id)
        .is_some_and(|m| m.traversed.iter().all(|c| network.channel(*c).is_some()));
    let accepted = active && path_intact;

    let response = if accepted {
        ctx.creators.positive.create_response(network, ctx.routes, id)
    } else {
        ctx.creators.negative.create_response(network, ctx.routes, id)
    };
    match response {
        Some(_) => report.responses += 1,
        None => abandon_request(network, node, id, report),
    }
    debug!(node = %node, request = %id, accepted, "Sending request evaluated");
}

/// Cancel the packets of a request no reply can be sent for
///
/// The packets are stored as canceled at the receiver and the group's
/// reservations are dropped, so the transmission counts as failed.
fn abandon_request(network: &mut Network, node: NodeId, id: MessageId, report: &mut ExchangeReport) {
    let Some(message) = network.message_mut(id) else {
        return;
    };
    let group = message.parent_id;
    let batch = message.take_batch().unwrap_or_default();
    let lost = batch.len();
    for packet in batch {
        let packet = network.messages_mut().insert(packet);
        network.cancel_message(packet);
        report.canceled += 1;
    }
    network.release_group(group);
    warn!(node = %node, request = %id, group = %group, lost, "Request abandoned");
}

fn handle_positive_response(
    network: &mut Network,
    node: NodeId,
    id: MessageId,
    ctx: &ExchangeContext<'_>,
    report: &mut ExchangeReport,
) {
    let Some(batch) = network.message_mut(id).and_then(|m| m.take_batch()) else {
        return;
    };

    let mut released = 0;
    for mut packet in batch {
        if network.validate_message(&packet).is_err() {
            match ctx.routes.route(network, packet.sender_id, packet.receiver_id) {
                Some(route) => packet.route = route.into(),
                None => {
                    let lost = network.messages_mut().insert(packet);
                    network.cancel_message(lost);
                    report.canceled += 1;
                    continue;
                }
            }
        }
        match launch(network, packet) {
            Ok(_) => released += 1,
            Err(e) => warn!(node = %node, error = %e, "Packet rejected after reservation"),
        }
    }
    debug!(node = %node, response = %id, released, "Reserved batch released");
}

fn handle_negative_response(
    network: &mut Network,
    node: NodeId,
    id: MessageId,
    ctx: &ExchangeContext<'_>,
    report: &mut ExchangeReport,
) {
    let Some(message) = network.message_mut(id) else {
        return;
    };
    let batch = message.take_batch().unwrap_or_default();
    let (group, target) = (message.parent_id, message.sender_id);
    let total: u32 = batch.iter().map(|m| m.data_size).sum();

    network.release_group(group);
    if total == 0 {
        return;
    }

    let retry = MessageInitializer::new(node, target, total).in_group(group);
    match ctx.creators.general.create_messages(network, ctx.routes, &retry) {
        Ok(Some(_)) => {
            report.retries += 1;
            debug!(node = %node, group = %group, size = total, "Request refused, resending as one message");
        }
        Ok(None) => debug!(node = %node, group = %group, "Request refused and receiver unreachable"),
        Err(e) => warn!(node = %node, group = %group, error = %e, "Retry rejected"),
    }
}
