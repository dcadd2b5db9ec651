use crate::config::DriverConfig;
use crate::discovery::DiscoveryServer;
use crate::host::Host;
use crate::ipc::DriverEndpoint;
use crate::registry::SessionRegistry;
use crate::transport::Binder;
use crate::types::{ObjectId, TrackerSettings};
use crate::Result;
use std::time::Instant;

/// Top-level driver: owns every session and runs them once per host frame.
pub struct Driver<H: Host> {
    host: H,
    registry: SessionRegistry,
    binder: Box<dyn Binder>,
    defaults: TrackerSettings,
    discovery: Option<DiscoveryServer>,
    control: Option<DriverEndpoint>,
    bypass_wait: bool,
}

impl<H: Host> Driver<H> {
    /// Bind the discovery responder and create the configured startup
    /// sessions. Failures on either are logged and skipped.
    pub fn new(host: H, mut binder: Box<dyn Binder>, config: &DriverConfig) -> Self {
        let discovery = config.discovery().and_then(|port| match binder.bind(port) {
            Ok(socket) => {
                log::info!("Discovery responder on port {}", port);
                Some(DiscoveryServer::new(socket))
            }
            Err(e) => {
                log::warn!("Discovery disabled, port {}: {}", port, e);
                None
            }
        });

        let mut driver = Self {
            host,
            registry: SessionRegistry::new(),
            binder,
            defaults: config.defaults.clone(),
            discovery,
            control: None,
            bypass_wait: false,
        };
        for &port in &config.startup_ports {
            if let Err(e) = driver.create_session(port) {
                log::warn!("Startup session on port {} failed: {}", port, e);
            }
        }
        driver
    }

    /// Attach the overlay's control queue.
    pub fn with_control(mut self, endpoint: DriverEndpoint) -> Self {
        self.control = Some(endpoint);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn bypass_wait(&self) -> bool {
        self.bypass_wait
    }

    pub(crate) fn set_bypass_wait(&mut self) {
        self.bypass_wait = true;
    }

    pub(crate) fn registry_and_host(&mut self) -> (&mut SessionRegistry, &mut H) {
        (&mut self.registry, &mut self.host)
    }

    pub fn create_session(&mut self, port: u16) -> Result<u32> {
        self.registry
            .create(port, &self.defaults, self.binder.as_mut(), &mut self.host)
    }

    /// Returns false if `id` was unknown or already destroyed.
    pub fn destroy_session(&mut self, id: u32) -> bool {
        self.registry.destroy(id, &mut self.host)
    }

    /// One host frame: network in, poses out, then events, control and
    /// discovery.
    pub fn run_frame(&mut self, now: Instant) {
        for session in self.registry.sessions_mut() {
            if let Err(e) = session.tick_link(now) {
                log::warn!("{}: socket error: {}", session.serial(), e);
            }
        }

        let poses = self.host.raw_poses();
        for session in self.registry.sessions_mut() {
            session.run_frame(&mut self.host, &poses, now);
        }

        while let Some(event) = self.host.poll_event() {
            for session in self.registry.sessions_mut() {
                if let Err(e) = session.process_host_event(&event) {
                    log::warn!("{}: haptic failed: {}", session.serial(), e);
                }
            }
        }

        self.drain_control(now);

        if let Some(discovery) = &mut self.discovery {
            if let Err(e) = discovery.tick(&self.registry) {
                log::warn!("Discovery socket error: {}", e);
            }
        }
    }

    fn drain_control(&mut self, now: Instant) {
        while let Some(bytes) = self.control.as_ref().and_then(|c| c.try_recv()) {
            let Some(response) = self.handle_control_bytes(&bytes, now) else {
                continue;
            };
            if let Some(control) = &self.control {
                if let Err(e) = control.send(response) {
                    log::warn!("Control response dropped: {}", e);
                }
            }
        }
    }

    /// Route a host debug request to the device owning `object`.
    /// Returns `None` if no device has that object id.
    pub fn debug_request(&mut self, object: ObjectId, request: &[u8], now: Instant) -> Option<Vec<u8>> {
        for session in self.registry.sessions_mut() {
            if session.object() == object {
                return Some(session.debug_request(request, now));
            }
            if let Some(controller) = session.controller() {
                if controller.object() == object {
                    return Some(controller.debug_request(request));
                }
            }
        }
        None
    }
}
