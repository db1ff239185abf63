use crate::error::Error;

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use eventbus::{Delivery, NodeInfo, NodesInfo};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub type Inbox = mpsc::UnboundedSender<Delivery>;

#[derive(Debug, Default)]
struct Channel {
    backlog: Vec<Delivery>,
    members: Vec<(u64, Inbox)>,
    next: usize,
}

impl Channel {
    /// Hands `delivery` to the next live member, or parks it in the backlog.
    fn push(&mut self, mut delivery: Delivery) {
        while !self.members.is_empty() {
            let index = self.next % self.members.len();
            match self.members[index].1.send(delivery) {
                Ok(()) => {
                    self.next = index + 1;
                    return;
                }
                Err(mpsc::error::SendError(returned)) => {
                    self.members.remove(index);
                    delivery = returned;
                }
            }
        }
        self.backlog.push(delivery);
    }

    fn drain_backlog(&mut self) {
        for delivery in mem::take(&mut self.backlog) {
            self.push(delivery);
        }
    }
}

#[derive(Debug, Default)]
struct Topic {
    backlog: Vec<Delivery>,
    channels: HashMap<String, Channel>,
}

#[derive(Debug, Default)]
struct Node {
    fail_connect: bool,
    fail_ping: bool,
    fail_publish: bool,
    published: Vec<(String, Bytes)>,
    topics: HashMap<String, Topic>,
}

#[derive(Debug, Default)]
struct State {
    next_member: u64,
    nodes: HashMap<String, Node>,
    seekers: HashMap<String, Vec<String>>,
}

/// An in-process bus: a set of nodes and the seekers that list them.
///
/// Each node routes a topic to every channel created on it; within a channel
/// messages go round-robin to the subscribed members. Messages published
/// before any channel exists are handed to the first channel, and messages
/// for a channel without members wait for one to join.
///
/// Cloning is cheap and every clone sees the same bus.
#[derive(Clone, Debug, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<State>>,
}

impl MemoryBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node at `address`.
    pub fn add_node(&self, address: impl Into<String>) {
        self.state.lock().nodes.entry(address.into()).or_default();
    }

    /// Registers a seeker listing `nodes`. The nodes themselves are not
    /// registered.
    pub fn add_seeker<I, S>(&self, seeker: impl Into<String>, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = nodes.into_iter().map(Into::into).collect();
        self.state.lock().seekers.insert(seeker.into(), nodes);
    }

    /// Makes connecting to `address` fail (registering the node if needed).
    pub fn fail_connect(&self, address: &str, fail: bool) {
        self.state.lock().nodes.entry(address.to_string()).or_default().fail_connect = fail;
    }

    /// Makes pings to `address` fail (registering the node if needed).
    pub fn fail_ping(&self, address: &str, fail: bool) {
        self.state.lock().nodes.entry(address.to_string()).or_default().fail_ping = fail;
    }

    /// Makes publishes to `address` fail (registering the node if needed).
    pub fn fail_publish(&self, address: &str, fail: bool) {
        self.state.lock().nodes.entry(address.to_string()).or_default().fail_publish = fail;
    }

    /// Topic and body of every publish `address` accepted, oldest first.
    #[must_use]
    pub fn published(&self, address: &str) -> Vec<(String, Bytes)> {
        self.state
            .lock()
            .nodes
            .get(address)
            .map(|node| node.published.clone())
            .unwrap_or_default()
    }

    /// Subscribed members of `topic`/`channel` on `address`.
    #[must_use]
    pub fn members(&self, address: &str, topic: &str, channel: &str) -> usize {
        self.state
            .lock()
            .nodes
            .get(address)
            .and_then(|node| node.topics.get(topic))
            .and_then(|topic| topic.channels.get(channel))
            .map_or(0, |channel| {
                channel.members.iter().filter(|(_, inbox)| !inbox.is_closed()).count()
            })
    }

    /// Routes a prepared delivery through `address`, bypassing the publish
    /// bookkeeping. Lets tests replay redelivered messages.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] when no node is registered at `address`.
    pub fn inject(&self, address: &str, topic: &str, delivery: Delivery) -> Result<(), Error> {
        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(address)
            .ok_or_else(|| Error::UnknownNode(address.to_string()))?;
        route(node, topic, delivery);
        Ok(())
    }

    pub(crate) fn check_connect(&self, address: &str) -> Result<(), Error> {
        match self.state.lock().nodes.get(address) {
            None => Err(Error::UnknownNode(address.to_string())),
            Some(node) if node.fail_connect => Err(Error::Refused(address.to_string())),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn check_ping(&self, address: &str) -> Result<(), Error> {
        match self.state.lock().nodes.get(address) {
            None => Err(Error::UnknownNode(address.to_string())),
            Some(node) if node.fail_ping => Err(Error::Unresponsive(address.to_string())),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn publish(&self, address: &str, topic: &str, body: Bytes) -> Result<(), Error> {
        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(address)
            .ok_or_else(|| Error::UnknownNode(address.to_string()))?;
        if node.fail_publish {
            return Err(Error::Rejected(address.to_string()));
        }

        node.published.push((topic.to_string(), body.clone()));
        route(node, topic, Delivery::new(body));
        Ok(())
    }

    pub(crate) fn join(
        &self,
        address: &str,
        topic: &str,
        channel: &str,
        inbox: Inbox,
    ) -> Result<u64, Error> {
        let mut state = self.state.lock();
        let id = state.next_member;
        let node = state
            .nodes
            .get_mut(address)
            .ok_or_else(|| Error::UnknownNode(address.to_string()))?;

        let topic = node.topics.entry(topic.to_string()).or_default();
        let first_channel = topic.channels.is_empty();
        let parked = if first_channel {
            mem::take(&mut topic.backlog)
        } else {
            Vec::new()
        };

        let channel = topic.channels.entry(channel.to_string()).or_default();
        channel.backlog.extend(parked);
        channel.members.push((id, inbox));
        channel.drain_backlog();

        state.next_member += 1;
        Ok(id)
    }

    pub(crate) fn leave(&self, address: &str, topic: &str, channel: &str, id: u64) {
        let mut state = self.state.lock();
        if let Some(group) = state
            .nodes
            .get_mut(address)
            .and_then(|node| node.topics.get_mut(topic))
            .and_then(|topic| topic.channels.get_mut(channel))
        {
            group.members.retain(|(member, _)| *member != id);
        }
    }

    pub(crate) fn seeker(&self, seeker: &str) -> Option<NodesInfo> {
        let state = self.state.lock();
        let nodes = state.seekers.get(seeker)?;
        Some(NodesInfo {
            producers: nodes.iter().map(|address| node_info(address)).collect(),
        })
    }
}

fn route(node: &mut Node, topic: &str, delivery: Delivery) {
    let topic = node.topics.entry(topic.to_string()).or_default();
    if topic.channels.is_empty() {
        tracing::trace!("no channels yet, parking message {}", delivery.id);
        topic.backlog.push(delivery);
        return;
    }

    for channel in topic.channels.values_mut() {
        channel.push(delivery.clone());
    }
}

fn node_info(address: &str) -> NodeInfo {
    let (host, port) = address
        .rsplit_once(':')
        .and_then(|(host, port)| Some((host, port.parse().ok()?)))
        .unwrap_or((address, 0));

    NodeInfo {
        remote_address: address.to_string(),
        host_name: host.to_string(),
        broadcast_address: host.to_string(),
        tcp_port: port,
        ..NodeInfo::default()
    }
}
