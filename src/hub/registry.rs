use crate::models::device::DeviceId;
use crate::models::events::ServerEvent;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub type ConnectionId = u64;

/// What a connection task is asked to do next.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(Arc<ServerEvent>),
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportRole {
    Unidentified,
    Device(DeviceId),
    /// A browser; `None` until it presents a valid session.
    Client(Option<DeviceId>),
}

#[derive(Debug)]
struct Transport {
    role: TransportRole,
    sender: UnboundedSender<Outbound>,
}

/// Live transports and the device identity each one speaks for.
#[derive(Debug, Default)]
pub struct Registry {
    next_id: ConnectionId,
    transports: HashMap<ConnectionId, Transport>,
    devices: BTreeMap<DeviceId, ConnectionId>,
}

impl Registry {
    pub fn register(&mut self, sender: UnboundedSender<Outbound>) -> ConnectionId {
        self.next_id += 1;
        let id = self.next_id;
        self.transports.insert(
            id,
            Transport {
                role: TransportRole::Unidentified,
                sender,
            },
        );
        id
    }

    pub fn role(&self, id: ConnectionId) -> Option<&TransportRole> {
        self.transports.get(&id).map(|transport| &transport.role)
    }

    pub fn sender(&self, id: ConnectionId) -> Option<UnboundedSender<Outbound>> {
        self.transports.get(&id).map(|transport| transport.sender.clone())
    }

    /// Makes `id` the transport for `device_id`. A previous transport for the
    /// same identity is dropped from the registry and told to close.
    pub fn install_device(&mut self, id: ConnectionId, device_id: DeviceId) -> Option<ConnectionId> {
        let previous = self.devices.insert(device_id.clone(), id).filter(|previous| *previous != id);

        if let Some(previous) = previous
            && let Some(old) = self.transports.remove(&previous)
        {
            let _ = old.sender.send(Outbound::Close);
        }

        if let Some(transport) = self.transports.get_mut(&id) {
            transport.role = TransportRole::Device(device_id);
        }
        previous
    }

    pub fn bind_client(&mut self, id: ConnectionId, device_id: Option<DeviceId>) {
        if let Some(transport) = self.transports.get_mut(&id) {
            transport.role = TransportRole::Client(device_id);
        }
    }

    /// The identity `id` is registered for, if it is the live transport of
    /// that device.
    pub fn device_of(&self, id: ConnectionId) -> Option<&DeviceId> {
        match self.role(id)? {
            TransportRole::Device(device_id) if self.devices.get(device_id) == Some(&id) => Some(device_id),
            _ => None,
        }
    }

    pub fn is_device_connected(&self, device_id: &DeviceId) -> bool {
        self.devices.contains_key(device_id)
    }

    pub fn connected_devices(&self) -> Vec<DeviceId> {
        self.devices.keys().cloned().collect()
    }

    pub fn send(&self, id: ConnectionId, event: ServerEvent) -> bool {
        self.transports
            .get(&id)
            .is_some_and(|transport| transport.sender.send(Outbound::Event(Arc::new(event))).is_ok())
    }

    pub fn send_to_device(&self, device_id: &DeviceId, event: ServerEvent) -> bool {
        match self.devices.get(device_id) {
            Some(id) => self.send(*id, event),
            None => false,
        }
    }

    /// Every browser transport, signed in or not.
    pub fn broadcast_all_clients(&self, event: ServerEvent) {
        self.broadcast(event, |role| matches!(role, TransportRole::Client(_)));
    }

    /// Browsers signed in to `device_id`.
    pub fn broadcast_to_device_clients(&self, device_id: &DeviceId, event: ServerEvent) {
        self.broadcast(event, |role| matches!(role, TransportRole::Client(Some(bound)) if bound == device_id));
    }

    fn broadcast(&self, event: ServerEvent, include: impl Fn(&TransportRole) -> bool) {
        let event = Arc::new(event);
        for transport in self.transports.values().filter(|transport| include(&transport.role)) {
            let _ = transport.sender.send(Outbound::Event(Arc::clone(&event)));
        }
    }

    pub fn close(&self, id: ConnectionId) {
        if let Some(transport) = self.transports.get(&id) {
            let _ = transport.sender.send(Outbound::Close);
        }
    }

    /// Drops the transport. Returns the device it was the live transport for,
    /// so callers can announce the disconnect.
    pub fn remove(&mut self, id: ConnectionId) -> Option<DeviceId> {
        let transport = self.transports.remove(&id)?;
        match transport.role {
            TransportRole::Device(device_id) if self.devices.get(&device_id) == Some(&id) => {
                self.devices.remove(&device_id);
                Some(device_id)
            }
            _ => None,
        }
    }
}
