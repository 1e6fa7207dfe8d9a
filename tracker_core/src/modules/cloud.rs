//! Cloud module: connection lifecycle and the payload transport.
//!
//! ```text
//! LteDisconnected ──LteConnected──► LteConnected{CloudDisconnected ⇄ CloudConnected}
//!        ▲                                   │
//!        └────────────LteDisconnected────────┘         any ──ShutdownRequest──► Shutdown
//! ```
//!
//! Connection attempts are paced by [`ReconnectBackoff`]. Each attempt arms
//! a `ConnectionTimeout`; if the cloud has not connected by then the next
//! attempt starts. Running out of attempts escalates to
//! `Error(NetworkUnreachable)`.

use tracing::{debug, info, warn};

use tracker_common::error::ErrorCode;
use tracker_common::event::{
    AckMode, CloudEvent, DataEvent, Event, Family, ModemEvent, OutboundPayload, UtilEvent,
};

use crate::backoff::ReconnectBackoff;
use crate::bus::Rank;
use crate::module::{Module, ModuleContext, StateCell};
use crate::ports::{CloudLink, CloudTransport};
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudState {
    LteDisconnected,
    LteConnected,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudSubState {
    CloudDisconnected,
    CloudConnected,
}

pub struct CloudModule {
    state: StateCell<CloudState>,
    sub_state: StateCell<CloudSubState>,
    transport: Box<dyn CloudTransport>,
    backoff: ReconnectBackoff,
    connection_timer: Timer,
}

impl CloudModule {
    pub fn new(transport: Box<dyn CloudTransport>, connect_retries: u32) -> Self {
        Self {
            state: StateCell::new("cloud", CloudState::LteDisconnected),
            sub_state: StateCell::new("cloud", CloudSubState::CloudDisconnected),
            transport,
            backoff: ReconnectBackoff::new(connect_retries),
            connection_timer: Timer::new("cloud_connection"),
        }
    }

    fn connect_cloud(&mut self, ctx: &ModuleContext) {
        let delay = match self.backoff.next_delay() {
            Ok(delay) => delay,
            Err(e) => {
                warn!("{e}");
                ctx.send_error(ErrorCode::NetworkUnreachable);
                return;
            }
        };
        info!(
            "Connecting to cloud, attempt {} (next try in {delay:?})",
            self.backoff.attempts()
        );
        if let Err(e) = self.transport.connect(CloudLink::new(ctx.bus().clone())) {
            warn!("Cloud connect failed: {e}");
        }
        ctx.send(CloudEvent::Connecting);
        self.connection_timer
            .start_once(delay, ctx.bus(), CloudEvent::ConnectionTimeout);
    }

    fn transmit(&mut self, ctx: &ModuleContext, payload: &OutboundPayload) {
        if !self.sub_state.is(CloudSubState::CloudConnected) {
            debug!("Cloud not connected, payload {} not sent", payload.id);
            ctx.send(CloudEvent::DataAck {
                id: payload.id,
                sent: false,
            });
            return;
        }
        match self.transport.send(payload) {
            Ok(()) => {
                if payload.ack == AckMode::Disabled {
                    ctx.send(CloudEvent::DataAck {
                        id: payload.id,
                        sent: true,
                    });
                }
            }
            Err(e) => {
                warn!("Sending payload {} failed: {e}", payload.id);
                ctx.send(CloudEvent::DataAck {
                    id: payload.id,
                    sent: false,
                });
            }
        }
    }

    fn shutdown(&mut self, ctx: &ModuleContext) {
        self.connection_timer.cancel();
        if let Err(e) = self.transport.disconnect() {
            warn!("Cloud disconnect failed: {e}");
        }
        ctx.send_shutdown_ack();
        self.state.set(CloudState::Shutdown);
    }
}

fn outbound(event: &Event) -> Option<&OutboundPayload> {
    match event {
        Event::Data(
            DataEvent::DataSend(p)
            | DataEvent::DataSendBatch(p)
            | DataEvent::UiDataSend(p)
            | DataEvent::ConfigSend(p),
        ) => Some(p),
        _ => None,
    }
}

impl Module for CloudModule {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn family(&self) -> Family {
        Family::Cloud
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        vec![
            (Family::Cloud, Rank::Normal),
            (Family::Data, Rank::Normal),
            (Family::Modem, Rank::Normal),
            (Family::Util, Rank::Normal),
        ]
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match (self.state.get(), event) {
            (CloudState::LteDisconnected, Event::Modem(ModemEvent::LteConnected)) => {
                self.state.set(CloudState::LteConnected);
                self.connect_cloud(ctx);
            }
            (CloudState::LteConnected, Event::Modem(ModemEvent::LteDisconnected)) => {
                self.connection_timer.cancel();
                self.backoff.reset();
                self.sub_state.set(CloudSubState::CloudDisconnected);
                self.state.set(CloudState::LteDisconnected);
            }
            _ => {}
        }
    }

    fn on_sub_state(&mut self, ctx: &ModuleContext, event: &Event) {
        if !self.state.is(CloudState::LteConnected) {
            return;
        }
        match (self.sub_state.get(), event) {
            (CloudSubState::CloudDisconnected, Event::Cloud(CloudEvent::Connected)) => {
                info!("Cloud connected");
                self.backoff.reset();
                self.connection_timer.cancel();
                self.sub_state.set(CloudSubState::CloudConnected);
            }
            (CloudSubState::CloudDisconnected, Event::Cloud(CloudEvent::ConnectionTimeout)) => {
                self.connect_cloud(ctx);
            }
            (CloudSubState::CloudConnected, Event::Cloud(CloudEvent::ConnectionTimeout)) => {
                debug!("Stale connection timeout ignored");
            }
            (CloudSubState::CloudConnected, Event::Cloud(CloudEvent::Disconnected)) => {
                warn!("Cloud disconnected, reconnecting");
                self.sub_state.set(CloudSubState::CloudDisconnected);
                self.connect_cloud(ctx);
            }
            (CloudSubState::CloudConnected, Event::Data(DataEvent::ConfigGet)) => {
                if let Err(e) = self.transport.request_config() {
                    warn!("Configuration request failed: {e}");
                }
            }
            _ => {}
        }
    }

    fn on_all_states(&mut self, ctx: &ModuleContext, event: &Event) {
        if let Some(payload) = outbound(event) {
            if !self.state.is(CloudState::Shutdown) {
                self.transmit(ctx, payload);
            }
            return;
        }
        if matches!(event, Event::Util(UtilEvent::ShutdownRequest(_)))
            && !self.state.is(CloudState::Shutdown)
        {
            self.shutdown(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracker_common::error::DriverError;
    use tracker_common::event::PayloadKind;

    use super::*;
    use crate::bus::{Bus, Handled, Subscription};

    #[derive(Clone, Default)]
    struct Wire {
        sent: Arc<Mutex<Vec<u32>>>,
        reject: bool,
    }

    impl CloudTransport for Wire {
        fn connect(&mut self, _link: CloudLink) -> Result<(), DriverError> {
            Ok(())
        }
        fn disconnect(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
        fn send(&mut self, payload: &OutboundPayload) -> Result<(), DriverError> {
            if self.reject {
                return Err(DriverError::NotConnected);
            }
            self.sent.lock().push(payload.id);
            Ok(())
        }
        fn request_config(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn payload(id: u32, ack: AckMode) -> Event {
        Event::Data(DataEvent::DataSend(OutboundPayload {
            id,
            kind: PayloadKind::Data,
            bytes: Arc::from(&b"{}"[..]),
            ack,
        }))
    }

    fn cloud_events(bus: &Bus) -> Arc<Mutex<Vec<CloudEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(Subscription::immediate(
            "observer",
            Family::Cloud,
            Rank::Final,
            move |env| {
                if let Event::Cloud(ev) = env.event() {
                    sink.lock().push(ev.clone());
                }
                Handled::Pass
            },
        ));
        seen
    }

    fn connected(wire: Wire, ctx: &ModuleContext) -> CloudModule {
        let mut cloud = CloudModule::new(Box::new(wire), 3);
        cloud.on_state(ctx, &Event::Modem(ModemEvent::LteConnected));
        cloud.on_sub_state(ctx, &Event::Cloud(CloudEvent::Connected));
        cloud
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_send_is_nacked() {
        let bus = Arc::new(Bus::new(16));
        let seen = cloud_events(&bus);
        let ctx = ModuleContext::detached("cloud", Family::Cloud, bus);
        let wire = Wire::default();
        let mut cloud = CloudModule::new(Box::new(wire.clone()), 3);

        cloud.on_all_states(&ctx, &payload(7, AckMode::Required));
        assert!(wire.sent.lock().is_empty());
        assert_eq!(
            *seen.lock(),
            vec![CloudEvent::DataAck { id: 7, sent: false }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ack_depends_on_mode_and_outcome() {
        let bus = Arc::new(Bus::new(16));
        let seen = cloud_events(&bus);
        let ctx = ModuleContext::detached("cloud", Family::Cloud, bus);
        let wire = Wire::default();
        let mut cloud = connected(wire.clone(), &ctx);
        seen.lock().clear();

        cloud.on_all_states(&ctx, &payload(1, AckMode::Required));
        cloud.on_all_states(&ctx, &payload(2, AckMode::Disabled));
        assert_eq!(*wire.sent.lock(), vec![1, 2]);
        // Required payloads wait for the transport's own ack.
        assert_eq!(*seen.lock(), vec![CloudEvent::DataAck { id: 2, sent: true }]);

        let mut failing = connected(
            Wire {
                reject: true,
                ..Wire::default()
            },
            &ctx,
        );
        seen.lock().clear();
        failing.on_all_states(&ctx, &payload(3, AckMode::Required));
        assert_eq!(*seen.lock(), vec![CloudEvent::DataAck { id: 3, sent: false }]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_raise_network_unreachable() {
        let bus = Arc::new(Bus::new(16));
        let seen = cloud_events(&bus);
        let ctx = ModuleContext::detached("cloud", Family::Cloud, bus);
        let mut cloud = CloudModule::new(Box::new(Wire::default()), 0);

        cloud.on_state(&ctx, &Event::Modem(ModemEvent::LteConnected));
        cloud.on_sub_state(&ctx, &Event::Cloud(CloudEvent::ConnectionTimeout));

        assert_eq!(
            *seen.lock(),
            vec![
                CloudEvent::Connecting,
                CloudEvent::Error(ErrorCode::NetworkUnreachable)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lte_reconnect_starts_fresh_backoff() {
        let bus = Arc::new(Bus::new(16));
        let seen = cloud_events(&bus);
        let ctx = ModuleContext::detached("cloud", Family::Cloud, bus);
        let mut cloud = CloudModule::new(Box::new(Wire::default()), 1);

        cloud.on_state(&ctx, &Event::Modem(ModemEvent::LteConnected));
        cloud.on_sub_state(&ctx, &Event::Cloud(CloudEvent::ConnectionTimeout));
        assert_eq!(
            *seen.lock(),
            vec![CloudEvent::Connecting, CloudEvent::Connecting]
        );
        cloud.on_state(&ctx, &Event::Modem(ModemEvent::LteDisconnected));
        seen.lock().clear();

        // Both attempts were used by the previous LTE session.
        cloud.on_state(&ctx, &Event::Modem(ModemEvent::LteConnected));
        assert_eq!(*seen.lock(), vec![CloudEvent::Connecting]);
    }

    #[test]
    fn only_send_requests_are_outbound() {
        assert!(outbound(&payload(1, AckMode::Required)).is_some());
        assert!(outbound(&Event::Data(DataEvent::UiDataReady)).is_none());
    }
}
