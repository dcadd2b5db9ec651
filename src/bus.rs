//! Dispatch of control requests against the session registry.

use crate::control::{ControlRequest, ControlResponse, SessionSummary, MESSAGE_SIZE, PROTOCOL_VERSION};
use crate::driver::Driver;
use crate::host::Host;
use std::time::Instant;

impl<H: Host> Driver<H> {
    /// Apply one request. Set, destroy and bypass requests are
    /// fire-and-forget and never produce a response; neither do requests
    /// naming an unknown session.
    pub fn handle_control(&mut self, request: ControlRequest, now: Instant) -> Option<ControlResponse> {
        match request {
            ControlRequest::GetVersion => Some(ControlResponse::Version(PROTOCOL_VERSION)),
            ControlRequest::GetSessionCount => {
                Some(ControlResponse::SessionCount(self.registry().len() as u32))
            }
            ControlRequest::GetSession { index } => {
                let summary = self.registry().summary(index).unwrap_or(SessionSummary {
                    exists: false,
                    id: index,
                    port: 0,
                });
                Some(ControlResponse::Session(summary))
            }
            ControlRequest::BypassWait => {
                log::info!("Bypass-wait requested");
                self.set_bypass_wait();
                None
            }
            ControlRequest::SetSetting { session, setting } => {
                let (registry, host) = self.registry_and_host();
                match registry.get_mut(session) {
                    Some(s) => {
                        if let Err(e) = s.set_setting(setting, host) {
                            log::warn!("Set {:?} on session {}: {}", setting.value().kind(), session, e);
                        }
                    }
                    None => log::warn!("Set request for unknown session {}", session),
                }
                None
            }
            ControlRequest::GetSetting { session, kind } => {
                let (registry, _) = self.registry_and_host();
                match registry.get_mut(session) {
                    Some(s) => Some(ControlResponse::Setting {
                        session,
                        value: s.get_setting(kind, now),
                    }),
                    None => {
                        log::warn!("Get request for unknown session {}", session);
                        None
                    }
                }
            }
            ControlRequest::CreateSession { port } => {
                let Ok(port) = u16::try_from(port) else {
                    log::warn!("Create session on invalid port {}", port);
                    return Some(ControlResponse::SessionCreated(None));
                };
                let id = match self.create_session(port) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        log::warn!("Create session on port {} failed: {}", port, e);
                        None
                    }
                };
                Some(ControlResponse::SessionCreated(id))
            }
            ControlRequest::DestroySession { session } => {
                if !self.destroy_session(session) {
                    log::debug!("Destroy for unknown session {}", session);
                }
                None
            }
        }
    }

    /// Decode, dispatch and encode one wire message. Malformed messages
    /// are logged and dropped.
    pub fn handle_control_bytes(&mut self, bytes: &[u8], now: Instant) -> Option<[u8; MESSAGE_SIZE]> {
        match ControlRequest::decode(bytes) {
            Ok(request) => self.handle_control(request, now).map(|r| r.encode()),
            Err(e) => {
                log::warn!("Dropping control message: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DriverConfig;
    use crate::control::{ControlRequest, ControlResponse, SettingKind, SettingValue, MESSAGE_SIZE};
    use crate::driver::Driver;
    use crate::host::RecordingHost;
    use crate::transport::mock::MockBinder;
    use std::time::Instant;

    fn driver() -> Driver<RecordingHost> {
        let config = DriverConfig {
            enable_discovery: false,
            startup_ports: vec![6969],
            ..DriverConfig::default()
        };
        Driver::new(RecordingHost::new(), Box::new(MockBinder::new()), &config)
    }

    fn set(driver: &mut Driver<RecordingHost>, value: SettingValue) -> Option<ControlResponse> {
        let request = ControlRequest::set_setting(0, value).unwrap();
        driver.handle_control(request, Instant::now())
    }

    fn get(driver: &mut Driver<RecordingHost>, kind: SettingKind) -> Option<ControlResponse> {
        driver.handle_control(ControlRequest::get_setting(0, kind), Instant::now())
    }

    #[test]
    fn test_version() {
        let mut d = driver();
        assert_eq!(
            d.handle_control(ControlRequest::GetVersion, Instant::now()),
            Some(ControlResponse::Version(8))
        );
    }

    #[test]
    fn test_set_then_get_yaw() {
        let mut d = driver();
        assert_eq!(set(&mut d, SettingValue::YawOffset(1.25)), None);
        assert_eq!(
            get(&mut d, SettingKind::YawOffset),
            Some(ControlResponse::Setting {
                session: 0,
                value: SettingValue::YawOffset(1.25)
            })
        );
    }

    #[test]
    fn test_connection_alive_set_is_dropped() {
        let mut d = driver();
        let mut buf = ControlRequest::get_setting(0, SettingKind::ConnectionAlive).encode();
        buf[0] = 8; // turn it into a set request
        buf[16] = 1;
        assert_eq!(d.handle_control_bytes(&buf, Instant::now()), None);
        assert_eq!(
            get(&mut d, SettingKind::ConnectionAlive),
            Some(ControlResponse::Setting {
                session: 0,
                value: SettingValue::ConnectionAlive(false)
            })
        );
    }

    #[test]
    fn test_unknown_session_is_silent() {
        let mut d = driver();
        let now = Instant::now();
        assert_eq!(
            d.handle_control(ControlRequest::get_setting(5, SettingKind::YawOffset), now),
            None
        );
        let request = ControlRequest::set_setting(5, SettingValue::YawOffset(1.0)).unwrap();
        assert_eq!(d.handle_control(request, now), None);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut d = driver();
        let now = Instant::now();
        let destroy = ControlRequest::DestroySession { session: 0 };
        assert_eq!(d.handle_control(destroy, now), None);
        assert_eq!(d.handle_control(destroy, now), None);
        assert_eq!(
            d.handle_control(ControlRequest::GetSessionCount, now),
            Some(ControlResponse::SessionCount(1))
        );
        assert_eq!(get(&mut d, SettingKind::YawOffset), None);

        match d.handle_control(ControlRequest::GetSession { index: 0 }, now) {
            Some(ControlResponse::Session(summary)) => assert!(!summary.exists),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_port_collision() {
        let mut d = driver();
        let now = Instant::now();
        let create = ControlRequest::CreateSession { port: 7000 };
        assert_eq!(
            d.handle_control(create, now),
            Some(ControlResponse::SessionCreated(Some(1)))
        );
        assert_eq!(
            d.handle_control(create, now),
            Some(ControlResponse::SessionCreated(None))
        );
        assert_eq!(
            d.handle_control(ControlRequest::GetSessionCount, now),
            Some(ControlResponse::SessionCount(2))
        );
    }

    #[test]
    fn test_create_on_invalid_port_reports_failure() {
        let mut d = driver();
        let mut buf = ControlRequest::CreateSession { port: 0 }.encode();
        buf[4..8].copy_from_slice(&70_000u32.to_le_bytes());
        let reply = d.handle_control_bytes(&buf, Instant::now()).unwrap();
        assert_eq!(
            ControlResponse::decode(&reply).unwrap(),
            ControlResponse::SessionCreated(None)
        );
        assert_eq!(
            d.handle_control(ControlRequest::GetSessionCount, Instant::now()),
            Some(ControlResponse::SessionCount(1))
        );
    }

    #[test]
    fn test_session_summary() {
        let mut d = driver();
        let now = Instant::now();
        match d.handle_control(ControlRequest::GetSession { index: 0 }, now) {
            Some(ControlResponse::Session(s)) => {
                assert!(s.exists);
                assert_eq!(s.id, 0);
                assert_eq!(s.port, 6969);
            }
            other => panic!("unexpected response {:?}", other),
        }
        match d.handle_control(ControlRequest::GetSession { index: 3 }, now) {
            Some(ControlResponse::Session(s)) => assert!(!s.exists),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_bypass_wait() {
        let mut d = driver();
        assert!(!d.bypass_wait());
        assert_eq!(d.handle_control(ControlRequest::BypassWait, Instant::now()), None);
        assert!(d.bypass_wait());
    }

    #[test]
    fn test_wire_dispatch() {
        let mut d = driver();
        let reply = d
            .handle_control_bytes(&ControlRequest::GetSessionCount.encode(), Instant::now())
            .unwrap();
        assert_eq!(reply.len(), MESSAGE_SIZE);
        assert_eq!(
            ControlResponse::decode(&reply).unwrap(),
            ControlResponse::SessionCount(1)
        );
        assert_eq!(d.handle_control_bytes(&[0u8; 12], Instant::now()), None);
    }

    #[test]
    fn test_calibration_flags_round_trip() {
        let mut d = driver();
        set(&mut d, SettingValue::IsCalibrating(true));
        set(&mut d, SettingValue::IsDownCalibrating(true));
        assert_eq!(
            get(&mut d, SettingKind::IsCalibrating),
            Some(ControlResponse::Setting {
                session: 0,
                value: SettingValue::IsCalibrating(true)
            })
        );
        set(&mut d, SettingValue::AnchorDeviceId(None));
        assert_eq!(
            get(&mut d, SettingKind::AnchorDeviceId),
            Some(ControlResponse::Setting {
                session: 0,
                value: SettingValue::AnchorDeviceId(None)
            })
        );
    }
}
