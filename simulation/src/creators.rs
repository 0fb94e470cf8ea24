//! Message creators
//!
//! Every transmission enters the network through a creator. A creator asks
//! for a route, builds one or more [`Message`]s, stores them and places them
//! in the sender's queue. `Ok(None)` means the receiver cannot be reached
//! right now; callers treat it as final and never retry.
//!
//! | Creator | Produces |
//! |---|---|
//! | [`GeneralMessageCreator`] | one message carrying the whole payload |
//! | [`PackageMessageCreator`] | numbered packets, all-or-nothing |
//! | [`RequestMessageCreator`] | a reservation request carrying the packets |
//! | [`PositiveResponseCreator`] / [`NegativeResponseCreator`] | replies to a request |
//! | [`TableUpdater`] | a new routing round and its first update messages |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use switchnet_core::{
    ChannelId, GroupId, Message, MessageError, MessageId, MessageKind, MessagePayload, Network, Node,
    NodeId, RoutingTables,
};
use switchnet_routing::MessageRouter;
use tracing::{debug, info, trace, warn};

/// Anything that can answer "which channels lead from `sender` to `receiver`"
pub trait RouteSource {
    fn route(&self, network: &Network, sender: NodeId, receiver: NodeId) -> Option<Vec<ChannelId>>;
}

impl RouteSource for MessageRouter {
    fn route(&self, network: &Network, sender: NodeId, receiver: NodeId) -> Option<Vec<ChannelId>> {
        self.get_route(network, sender, receiver)
    }
}

/// Description of a transmission to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInitializer {
    pub sender: NodeId,
    pub receiver: NodeId,
    pub data_size: u32,
    /// Group to join; a fresh one is allocated when `None`
    pub group: Option<GroupId>,
}

impl MessageInitializer {
    pub fn new(sender: NodeId, receiver: NodeId, data_size: u32) -> Self {
        Self {
            sender,
            receiver,
            data_size,
            group: None,
        }
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }
}

/// Ids of the messages a creator placed in the network, `None` when unroutable
pub type CreateResult = Result<Option<Vec<MessageId>>, MessageError>;

/// Strategy for turning an initializer into queued messages
pub trait MessageCreator {
    fn create_messages(
        &self,
        network: &mut Network,
        routes: &dyn RouteSource,
        initializer: &MessageInitializer,
    ) -> CreateResult;
}

/// How user traffic crosses the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
    /// Packets are sent straight away
    #[default]
    Datagram,
    /// A reservation request goes first; packets follow a positive response
    VirtualCircuit,
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferMode::Datagram => write!(f, "datagram"),
            TransferMode::VirtualCircuit => write!(f, "virtual-circuit"),
        }
    }
}

fn check_initializer(network: &Network, initializer: &MessageInitializer) -> Result<(), MessageError> {
    for node in [initializer.sender, initializer.receiver] {
        if !network.contains_node(node) {
            return Err(MessageError::UnknownNode(node));
        }
    }
    if initializer.data_size == 0 {
        return Err(MessageError::ZeroSize);
    }
    Ok(())
}

fn group_for(network: &mut Network, initializer: &MessageInitializer) -> GroupId {
    initializer
        .group
        .unwrap_or_else(|| network.messages_mut().next_group_id())
}

/// Store a message and place it at the tail of its sender's queue
///
/// A message with an empty route is already at its receiver and is recorded
/// as received on the spot.
pub(crate) fn launch(network: &mut Network, message: Message) -> Result<MessageId, MessageError> {
    let first = message.next_channel();
    let (sender, receiver) = (message.sender_id, message.receiver_id);
    let id = network.insert_message(message)?;
    match first {
        Some(channel) => {
            if !network.enqueue(sender, channel, id) {
                warn!(msg = %id, node = %sender, channel = %channel, "Sender has no queue for first hop");
            }
        }
        None => network.record_received(receiver, id),
    }
    Ok(id)
}

/// Sizes of the packets a payload of `data_size` splits into
///
/// `ceil(data_size / packet_size)` packets; the last one carries the remainder.
pub fn packet_sizes(data_size: u32, packet_size: u32) -> Vec<u32> {
    let packet_size = packet_size.max(1);
    let count = data_size.div_ceil(packet_size);
    (0..count)
        .map(|i| {
            if i + 1 == count {
                data_size - packet_size * (count - 1)
            } else {
                packet_size
            }
        })
        .collect()
}

/// One message along the full route
#[derive(Debug, Clone, Copy)]
pub struct GeneralMessageCreator {
    pub service_size: u32,
}

impl MessageCreator for GeneralMessageCreator {
    fn create_messages(
        &self,
        network: &mut Network,
        routes: &dyn RouteSource,
        initializer: &MessageInitializer,
    ) -> CreateResult {
        check_initializer(network, initializer)?;
        let Some(route) = routes.route(network, initializer.sender, initializer.receiver) else {
            debug!(sender = %initializer.sender, receiver = %initializer.receiver, "No route");
            return Ok(None);
        };

        let group = group_for(network, initializer);
        let id = network.messages_mut().next_message_id();
        let message = Message::new(
            id,
            group,
            MessageKind::General,
            initializer.sender,
            initializer.receiver,
            route,
            initializer.data_size,
            self.service_size,
        );
        launch(network, message)?;
        trace!(msg = %id, group = %group, size = initializer.data_size, "Message created");
        Ok(Some(vec![id]))
    }
}

/// Split the payload into numbered packets, each routed on its own
#[derive(Debug, Clone, Copy)]
pub struct PackageMessageCreator {
    pub packet_size: u32,
    pub service_size: u32,
}

impl PackageMessageCreator {
    fn rollback(network: &mut Network, created: &[MessageId]) {
        for &id in created {
            network.detach_message(id);
            network.messages_mut().remove(id);
        }
    }
}

impl MessageCreator for PackageMessageCreator {
    fn create_messages(
        &self,
        network: &mut Network,
        routes: &dyn RouteSource,
        initializer: &MessageInitializer,
    ) -> CreateResult {
        check_initializer(network, initializer)?;
        let group = group_for(network, initializer);
        let sizes = packet_sizes(initializer.data_size, self.packet_size);

        let mut created = Vec::with_capacity(sizes.len());
        for (number, size) in sizes.into_iter().enumerate() {
            let Some(route) = routes.route(network, initializer.sender, initializer.receiver) else {
                debug!(group = %group, packet = number, rolled_back = created.len(), "Packet unroutable");
                Self::rollback(network, &created);
                return Ok(None);
            };
            let id = network.messages_mut().next_message_id();
            let packet = Message::new(
                id,
                group,
                MessageKind::General,
                initializer.sender,
                initializer.receiver,
                route,
                size,
                self.service_size,
            )
            .with_number_in_package(number as u32);

            if let Err(e) = launch(network, packet) {
                Self::rollback(network, &created);
                return Err(e);
            }
            created.push(id);
        }

        trace!(group = %group, packets = created.len(), "Package created");
        Ok(Some(created))
    }
}

/// Reserve the path with a request before sending the packets
#[derive(Debug, Clone, Copy)]
pub struct RequestMessageCreator {
    pub packet_size: u32,
    pub service_size: u32,
}

impl MessageCreator for RequestMessageCreator {
    fn create_messages(
        &self,
        network: &mut Network,
        routes: &dyn RouteSource,
        initializer: &MessageInitializer,
    ) -> CreateResult {
        check_initializer(network, initializer)?;
        if initializer.sender == initializer.receiver {
            // Nothing to reserve
            let package = PackageMessageCreator {
                packet_size: self.packet_size,
                service_size: self.service_size,
            };
            return package.create_messages(network, routes, initializer);
        }

        let group = group_for(network, initializer);
        let mut batch = Vec::new();
        for (number, size) in packet_sizes(initializer.data_size, self.packet_size)
            .into_iter()
            .enumerate()
        {
            let Some(route) = routes.route(network, initializer.sender, initializer.receiver) else {
                debug!(group = %group, packet = number, "Packet unroutable, no request sent");
                return Ok(None);
            };
            let id = network.messages_mut().next_message_id();
            let packet = Message::new(
                id,
                group,
                MessageKind::General,
                initializer.sender,
                initializer.receiver,
                route,
                size,
                self.service_size,
            )
            .with_number_in_package(number as u32);
            network.validate_message(&packet)?;
            batch.push(packet);
        }

        let route: Vec<ChannelId> = batch
            .first()
            .map(|packet| packet.route.iter().copied().collect())
            .unwrap_or_default();
        let packets = batch.len();
        let id = network.messages_mut().next_message_id();
        let request = Message::new(
            id,
            group,
            MessageKind::SendingRequest,
            initializer.sender,
            initializer.receiver,
            route,
            0,
            self.service_size,
        )
        .with_payload(MessagePayload::Batch(batch));
        launch(network, request)?;

        debug!(request = %id, group = %group, packets, "Sending request created");
        Ok(Some(vec![id]))
    }
}

/// Builds the reply to a sending request
///
/// The reply travels from the request's receiver back to its sender along
/// the channels the request crossed, in reverse, and takes the batch with it.
pub trait ResponseCreator {
    fn kind(&self) -> MessageKind;

    fn service_size(&self) -> u32;

    /// Reply to `request`, which must already sit at its receiver
    ///
    /// The route back is settled before the batch leaves the request. When
    /// no route exists the request keeps its batch and `None` is returned.
    fn create_response(
        &self,
        network: &mut Network,
        routes: &dyn RouteSource,
        request: MessageId,
    ) -> Option<MessageId> {
        let message = network.message(request)?;
        let group = message.parent_id;
        let (from, to) = (message.receiver_id, message.sender_id);
        let reversed: Vec<ChannelId> = message.traversed.iter().rev().copied().collect();

        let id = network.messages_mut().next_message_id();
        let mut response = Message::new(id, group, self.kind(), from, to, reversed, 0, self.service_size());
        if network.validate_message(&response).is_err() {
            match routes.route(network, from, to) {
                Some(route) => response.route = route.into(),
                None => {
                    warn!(request = %request, group = %group, "Response cannot reach sender");
                    return None;
                }
            }
        }
        if let Err(e) = network.validate_message(&response) {
            warn!(request = %request, error = %e, "Response rejected");
            return None;
        }

        let batch = network
            .message_mut(request)
            .and_then(Message::take_batch)
            .unwrap_or_default();
        match launch(network, response.with_payload(MessagePayload::Batch(batch))) {
            Ok(id) => {
                debug!(response = %id, request = %request, kind = %self.kind(), "Response created");
                Some(id)
            }
            Err(e) => {
                warn!(request = %request, error = %e, "Response rejected after validation");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PositiveResponseCreator {
    pub service_size: u32,
}

impl ResponseCreator for PositiveResponseCreator {
    fn kind(&self) -> MessageKind {
        MessageKind::PositiveSendingResponse
    }

    fn service_size(&self) -> u32 {
        self.service_size
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NegativeResponseCreator {
    pub service_size: u32,
}

impl ResponseCreator for NegativeResponseCreator {
    fn kind(&self) -> MessageKind {
        MessageKind::NegativeSendingResponse
    }

    fn service_size(&self) -> u32 {
        self.service_size
    }
}

/// The creators a simulation works with, sharing one packet and service size
#[derive(Debug, Clone, Copy)]
pub struct Creators {
    pub general: GeneralMessageCreator,
    pub package: PackageMessageCreator,
    pub request: RequestMessageCreator,
    pub positive: PositiveResponseCreator,
    pub negative: NegativeResponseCreator,
}

impl Creators {
    pub fn new(packet_size: u32, service_size: u32) -> Self {
        Self {
            general: GeneralMessageCreator { service_size },
            package: PackageMessageCreator {
                packet_size,
                service_size,
            },
            request: RequestMessageCreator {
                packet_size,
                service_size,
            },
            positive: PositiveResponseCreator { service_size },
            negative: NegativeResponseCreator { service_size },
        }
    }

    /// Creator used for user traffic in `mode`
    pub fn for_mode(&self, mode: TransferMode) -> &dyn MessageCreator {
        match mode {
            TransferMode::Datagram => &self.package,
            TransferMode::VirtualCircuit => &self.request,
        }
    }

    pub fn service_size(&self) -> u32 {
        self.general.service_size
    }
}

/// Adopt the entry of `tables` for `node` if the round is newer than the node's
pub(crate) fn adopt_tables(node: &mut Node, tables: &RoutingTables) -> bool {
    if node.table_round.is_some_and(|round| round >= tables.round()) {
        return false;
    }
    if let Some(matrix) = tables.get(node.id) {
        node.network_matrix = matrix.clone();
    }
    node.table_round = Some(tables.round());
    node.is_table_updated = true;
    true
}

/// Queue a matrix update from `from` to every neighbour still waiting for the round
///
/// Inactive neighbours are included; the update wakes them up. Updates go to
/// the head of the queue so topology knowledge overtakes user traffic.
pub(crate) fn send_table_updates(
    network: &mut Network,
    from: NodeId,
    tables: &Arc<RoutingTables>,
    service_size: u32,
) -> Vec<MessageId> {
    let neighbours: Vec<NodeId> = network
        .node(from)
        .map(|n| n.linked_nodes.iter().copied().collect())
        .unwrap_or_default();
    let targets: Vec<(NodeId, ChannelId)> = neighbours
        .into_iter()
        .filter(|&to| network.node(to).is_some_and(|n| !n.is_table_updated))
        .filter_map(|to| network.get_channel(from, to).map(|c| (to, c.id)))
        .collect();

    let data_size = u32::try_from(tables.entry_count()).unwrap_or(u32::MAX);
    let mut sent = Vec::with_capacity(targets.len());
    for (to, channel) in targets {
        let group = network.messages_mut().next_group_id();
        let id = network.messages_mut().next_message_id();
        let update = Message::new(
            id,
            group,
            MessageKind::MatrixUpdate,
            from,
            to,
            vec![channel],
            data_size,
            service_size,
        )
        .with_payload(MessagePayload::Tables(Arc::clone(tables)));
        network.messages_mut().insert(update);
        network.enqueue_front(from, channel, id);
        trace!(msg = %id, from = %from, to = %to, round = tables.round(), "Matrix update queued");
        sent.push(id);
    }
    sent
}

/// Starts routing rounds
///
/// Each round recomputes every node's table. The central machine adopts its
/// table at once and seeds the round by sending update messages to its
/// neighbours; everybody else waits for an update to reach them. Without a
/// central machine every node adopts its table directly.
#[derive(Debug, Default)]
pub struct TableUpdater {
    round: u64,
    service_size: u32,
}

impl TableUpdater {
    pub fn new(service_size: u32) -> Self {
        Self {
            round: 0,
            service_size,
        }
    }

    /// Number of the last round started
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Start a new round, returning the update messages it queued
    pub fn update_tables(&mut self, network: &mut Network, router: &MessageRouter) -> Vec<MessageId> {
        self.round += 1;

        // A new round supersedes updates still travelling
        let obsolete: Vec<MessageId> = network
            .messages()
            .iter()
            .filter(|m| m.kind == MessageKind::MatrixUpdate && !m.is_resolved())
            .map(|m| m.id)
            .collect();
        for &id in &obsolete {
            network.detach_message(id);
            network.cancel_message(id);
        }

        let tables = Arc::new(router.count_all(network, self.round));

        let Some(central) = network.central_machine() else {
            for node in network.nodes_mut() {
                adopt_tables(node, &tables);
            }
            info!(round = self.round, superseded = obsolete.len(), "Tables adopted directly");
            return Vec::new();
        };

        for node in network.nodes_mut() {
            node.is_table_updated = false;
        }
        if let Some(node) = network.node_mut(central) {
            adopt_tables(node, &tables);
        }
        let sent = send_table_updates(network, central, &tables, self.service_size);
        info!(
            round = self.round,
            central = %central,
            updates = sent.len(),
            superseded = obsolete.len(),
            "Routing tables recomputed"
        );
        sent
    }
}
