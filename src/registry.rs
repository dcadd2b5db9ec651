use crate::control::SessionSummary;
use crate::host::Host;
use crate::link::SensorLink;
use crate::session::{tracker_serial, Session};
use crate::transport::Binder;
use crate::types::{DeviceKind, TrackerSettings};
use crate::{OwoError, Result};
use std::collections::HashSet;

/// Arena of sessions indexed by id.
///
/// Destroyed sessions leave an empty slot behind, so ids are never reused
/// and the slot count never shrinks.
#[derive(Default)]
pub struct SessionRegistry {
    slots: Vec<Option<Session>>,
    ports: HashSet<u16>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `port`, register a tracker with the host and return the new id.
    pub fn create(
        &mut self,
        port: u16,
        defaults: &TrackerSettings,
        binder: &mut dyn Binder,
        host: &mut dyn Host,
    ) -> Result<u32> {
        if self.ports.contains(&port) {
            return Err(OwoError::PortTaken(port));
        }

        let id = self.slots.len() as u32;
        let socket = binder.bind(port)?;
        let serial = tracker_serial(id);
        let object = host.add_device(&serial, DeviceKind::Tracker)?;

        let link = SensorLink::new(socket, port);
        self.slots
            .push(Some(Session::new(id, object, link, defaults.clone())));
        self.ports.insert(port);
        log::info!("Created {} on port {} (object {})", serial, port, object);
        Ok(id)
    }

    /// Tear a session down, telling the host to drop it. Returns false if
    /// the id was unknown or already destroyed.
    pub fn destroy(&mut self, id: u32, host: &mut dyn Host) -> bool {
        let Some(slot) = self.slots.get_mut(id as usize) else {
            return false;
        };
        let Some(mut session) = slot.take() else {
            return false;
        };
        session.send_invalid_pose(host);
        self.ports.remove(&session.port());
        log::info!("Destroyed {} on port {}", session.serial(), session.port());
        true
    }

    pub fn get(&self, id: u32) -> Option<&Session> {
        self.slots.get(id as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Session> {
        self.slots.get_mut(id as usize)?.as_mut()
    }

    /// Number of slots, destroyed ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Summary of the slot at `index`, or `None` past the end.
    pub fn summary(&self, index: u32) -> Option<SessionSummary> {
        let slot = self.slots.get(index as usize)?;
        Some(match slot {
            Some(session) => SessionSummary {
                exists: true,
                id: session.id(),
                port: session.port(),
            },
            None => SessionSummary {
                exists: false,
                id: index,
                port: 0,
            },
        })
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().flatten()
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.slots.iter_mut().flatten()
    }

    /// `"<port>:<serial>\n"` for every live session.
    pub fn discovery_response(&self) -> String {
        self.sessions()
            .map(|s| format!("{}:{}\n", s.port(), s.serial()))
            .collect()
    }
}
