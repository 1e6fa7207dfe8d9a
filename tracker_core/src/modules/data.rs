//! Data module: fan-in, sample buffering, cloud payloads and the device
//! configuration.
//!
//! States `CloudDisconnected ⇄ CloudConnected`, then `Shutdown`.
//!
//! Every `DataGet` opens a [`SamplingManifest`]; responses are buffered and
//! counted until the request is complete or its collection timer fires.
//! Either way a single `DataReady { cycle }` follows, and while the cloud is
//! connected that triggers encoding of the buffered samples.
//!
//! Samples are stamped with uptime. Nothing is encoded until the clock
//! source reports wall-clock time (requested on the first cloud
//! connection); until then samples stay buffered.
//!
//! Sent payloads are tracked until the cloud acknowledges them:
//!
//! ```text
//! encode ──► pending ──ack(sent)──► freed
//!               │
//!               └──ack(!sent)──► failed ──next DataReady──► pending
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use tracker_common::consts::{
    DEVICE_SETTINGS_KEY, FAILED_DATA_COUNT, PENDING_DATA_COUNT, SAMPLE_BUFFER_CAPACITY,
};
use tracker_common::device::{ConfigUpdate, DeviceConfig};
use tracker_common::error::ErrorCode;
use tracker_common::event::{
    Acceleration, AckMode, AppEvent, Battery, ButtonPress, CellularInfo, CloudEvent, DataEvent,
    DataRequest, Environmental, Event, Family, GnssFix, LocationEvent, ModemDynamic, ModemEvent,
    ModemStatic, OutboundPayload, PayloadKind, SensorEvent, TimeSync, UiEvent, UtilEvent,
};
use tracker_common::settings::SettingsStore;

use crate::bus::Rank;
use crate::codec::{BatchRecord, CloudCodec, CloudMessage, CodecError, DataRecord};
use crate::manifest::{RecordOutcome, SamplingManifest};
use crate::module::{Module, ModuleContext, StateCell};
use crate::ports::{DateTimeLink, DateTimeSource};
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    CloudDisconnected,
    CloudConnected,
    Shutdown,
}

// ─── Sample buffers ─────────────────────────────────────────────────

/// Sample with an uptime timestamp.
trait Stamped: Clone {
    fn timestamp_mut(&mut self) -> &mut u64;

    fn into_unix(mut self, sync: &TimeSync) -> Self {
        let ts = self.timestamp_mut();
        *ts = sync.to_unix(*ts);
        self
    }
}

macro_rules! impl_stamped {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Stamped for $ty {
                fn timestamp_mut(&mut self) -> &mut u64 {
                    &mut self.timestamp
                }
            }
        )*
    };
}

impl_stamped!(
    ModemStatic,
    ModemDynamic,
    Battery,
    Environmental,
    GnssFix,
    CellularInfo,
    Acceleration,
    ButtonPress,
);

fn all_into_unix<T: Stamped>(samples: Vec<T>, sync: &TimeSync) -> Vec<T> {
    samples.into_iter().map(|s| s.into_unix(sync)).collect()
}

#[derive(Debug, Clone)]
struct Queued<T> {
    sample: T,
    queued: bool,
}

/// Fixed-size ring of samples; the oldest entry is overwritten when full.
#[derive(Debug)]
struct SampleRing<T> {
    entries: heapless::Deque<Queued<T>, SAMPLE_BUFFER_CAPACITY>,
}

impl<T: Clone> SampleRing<T> {
    fn new() -> Self {
        Self {
            entries: heapless::Deque::new(),
        }
    }

    fn push(&mut self, sample: T) {
        if self.entries.is_full() {
            self.entries.pop_front();
        }
        let _ = self.entries.push_back(Queued {
            sample,
            queued: true,
        });
    }

    /// Newest sample, if not yet published.
    fn take_newest(&mut self) -> Option<T> {
        let newest = self.entries.back_mut()?;
        if !newest.queued {
            return None;
        }
        newest.queued = false;
        Some(newest.sample.clone())
    }

    /// Every unpublished sample, oldest first.
    fn take_queued(&mut self) -> Vec<T> {
        self.entries
            .iter_mut()
            .filter(|e| e.queued)
            .map(|e| {
                e.queued = false;
                e.sample.clone()
            })
            .collect()
    }

    fn queued(&self) -> usize {
        self.entries.iter().filter(|e| e.queued).count()
    }
}

#[derive(Debug)]
struct Buffers {
    modem_static: Option<Queued<ModemStatic>>,
    modem_dynamic: SampleRing<ModemDynamic>,
    battery: SampleRing<Battery>,
    environmental: SampleRing<Environmental>,
    gnss: SampleRing<GnssFix>,
    neighbor_cells: SampleRing<CellularInfo>,
    movement: SampleRing<Acceleration>,
    ui: SampleRing<ButtonPress>,
}

impl Buffers {
    fn new() -> Self {
        Self {
            modem_static: None,
            modem_dynamic: SampleRing::new(),
            battery: SampleRing::new(),
            environmental: SampleRing::new(),
            gnss: SampleRing::new(),
            neighbor_cells: SampleRing::new(),
            movement: SampleRing::new(),
            ui: SampleRing::new(),
        }
    }

    /// Newest unpublished sample of each kind, stamped in Unix time.
    fn newest(&mut self, sync: &TimeSync) -> DataRecord {
        let modem_static = self.modem_static.as_mut().and_then(|s| {
            let fresh = s.queued;
            s.queued = false;
            fresh.then(|| s.sample.clone())
        });
        DataRecord {
            modem_static: modem_static.map(|s| s.into_unix(sync)),
            modem_dynamic: self.modem_dynamic.take_newest().map(|s| s.into_unix(sync)),
            battery: self.battery.take_newest().map(|s| s.into_unix(sync)),
            environmental: self.environmental.take_newest().map(|s| s.into_unix(sync)),
            gnss: self.gnss.take_newest().map(|s| s.into_unix(sync)),
            neighbor_cells: self.neighbor_cells.take_newest().map(|s| s.into_unix(sync)),
            movement: self.movement.take_newest().map(|s| s.into_unix(sync)),
        }
    }

    fn backlog(&mut self, sync: &TimeSync) -> BatchRecord {
        BatchRecord {
            modem_dynamic: all_into_unix(self.modem_dynamic.take_queued(), sync),
            battery: all_into_unix(self.battery.take_queued(), sync),
            environmental: all_into_unix(self.environmental.take_queued(), sync),
            gnss: all_into_unix(self.gnss.take_queued(), sync),
            neighbor_cells: all_into_unix(self.neighbor_cells.take_queued(), sync),
            movement: all_into_unix(self.movement.take_queued(), sync),
        }
    }
}

// ─── Module ─────────────────────────────────────────────────────────

pub struct DataModule {
    state: StateCell<DataState>,
    config: DeviceConfig,
    settings: Arc<dyn SettingsStore>,
    codec: Box<dyn CloudCodec>,
    clock: Box<dyn DateTimeSource>,
    /// Set once wall-clock time is known.
    time: Option<TimeSync>,
    manifest: SamplingManifest,
    collection_timer: Timer,
    buffers: Buffers,
    pending: heapless::Vec<OutboundPayload, PENDING_DATA_COUNT>,
    failed: heapless::Vec<OutboundPayload, FAILED_DATA_COUNT>,
    next_payload_id: u32,
}

impl DataModule {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        codec: Box<dyn CloudCodec>,
        clock: Box<dyn DateTimeSource>,
    ) -> Self {
        Self {
            state: StateCell::new("data", DataState::CloudDisconnected),
            config: DeviceConfig::default(),
            settings,
            codec,
            clock,
            time: None,
            manifest: SamplingManifest::new(),
            collection_timer: Timer::new("data_collection"),
            buffers: Buffers::new(),
            pending: heapless::Vec::new(),
            failed: heapless::Vec::new(),
            next_payload_id: 1,
        }
    }

    fn load_config(&mut self) {
        self.config = match self.settings.load(DEVICE_SETTINGS_KEY) {
            Ok(Some(bytes)) => DeviceConfig::from_stored(&bytes),
            Ok(None) => {
                info!("No stored configuration, using defaults");
                DeviceConfig::default()
            }
            Err(e) => {
                error!("Loading configuration failed: {e}");
                DeviceConfig::default()
            }
        };
    }

    // ── Fan-in ──

    fn begin_cycle(&mut self, ctx: &ModuleContext, request: &DataRequest) {
        if request.kinds.is_empty() {
            warn!("Empty sampling request ignored");
            return;
        }
        let cycle = self.manifest.begin(request.kinds);
        debug!(
            "Cycle {cycle}: expecting {} responses within {:?}",
            self.manifest.requested_count(),
            request.timeout
        );
        self.collection_timer.start_once(
            request.timeout,
            ctx.bus(),
            DataEvent::CollectionTimeout { cycle },
        );
    }

    fn store(&mut self, event: &Event) {
        match event {
            Event::Modem(ModemEvent::StaticDataReady(s)) => {
                self.buffers.modem_static = Some(Queued {
                    sample: s.clone(),
                    queued: true,
                });
            }
            Event::Modem(ModemEvent::DynamicDataReady(d)) => {
                self.buffers.modem_dynamic.push(d.clone())
            }
            Event::Modem(ModemEvent::BatteryDataReady(b)) => self.buffers.battery.push(*b),
            Event::Sensor(SensorEvent::EnvironmentalDataReady(e)) => {
                self.buffers.environmental.push(*e)
            }
            Event::Sensor(SensorEvent::MovementDataReady(a)) => {
                if self.config.active_mode {
                    debug!("Movement data ignored in active mode");
                } else {
                    self.buffers.movement.push(*a);
                }
            }
            Event::Location(LocationEvent::GnssDataReady(fix)) => self.buffers.gnss.push(*fix),
            Event::Location(LocationEvent::CloudLocationDataReady(cells)) => {
                self.buffers.neighbor_cells.push(cells.clone())
            }
            _ => {}
        }
    }

    fn count(&mut self, ctx: &ModuleContext, event: &Event) {
        let Some(kind) = event.answered_kind() else {
            return;
        };
        match self.manifest.record(kind) {
            RecordOutcome::Complete => {
                self.collection_timer.cancel();
                let cycle = self.manifest.cycle();
                debug!("Cycle {cycle}: all responses received");
                ctx.send(DataEvent::DataReady { cycle });
            }
            RecordOutcome::Counted { remaining } => debug!("{kind:?} received, {remaining} left"),
            RecordOutcome::Duplicate | RecordOutcome::NotRequested | RecordOutcome::Idle => {}
        }
    }

    fn collection_timeout(&mut self, ctx: &ModuleContext, cycle: u32) {
        if self.manifest.expire(cycle) {
            warn!(
                "Cycle {cycle}: collection timed out with {}/{} responses",
                self.manifest.responses_received(),
                self.manifest.requested_count()
            );
            ctx.send(DataEvent::DataReady { cycle });
        }
    }

    // ── Payloads ──

    fn encode(&mut self, ctx: &ModuleContext, message: &CloudMessage) -> Option<Vec<u8>> {
        match self.codec.encode(message) {
            Ok(bytes) => Some(bytes),
            Err(CodecError::NoData) => {
                debug!("Nothing to encode");
                None
            }
            Err(e) => {
                error!("{e}");
                ctx.send_error(ErrorCode::Driver);
                None
            }
        }
    }

    fn send_payload(&mut self, ctx: &ModuleContext, kind: PayloadKind, bytes: Vec<u8>) {
        let ack = match kind {
            PayloadKind::Config => AckMode::Disabled,
            PayloadKind::Data | PayloadKind::Batch | PayloadKind::Ui => AckMode::Required,
        };
        let payload = OutboundPayload {
            id: self.next_payload_id,
            kind,
            bytes: Arc::from(bytes),
            ack,
        };
        self.next_payload_id = self.next_payload_id.wrapping_add(1).max(1);
        self.dispatch_payload(ctx, payload);
    }

    fn dispatch_payload(&mut self, ctx: &ModuleContext, payload: OutboundPayload) {
        if self.pending.push(payload.clone()).is_err() {
            error!("Pending list full, payload {} untracked", payload.id);
            ctx.send_error(ErrorCode::ListFull);
        }
        let event = match payload.kind {
            PayloadKind::Data => DataEvent::DataSend(payload),
            PayloadKind::Batch => DataEvent::DataSendBatch(payload),
            PayloadKind::Ui => DataEvent::UiDataSend(payload),
            PayloadKind::Config => DataEvent::ConfigSend(payload),
        };
        ctx.send(event);
    }

    fn resend_failed(&mut self, ctx: &ModuleContext) {
        let failed = std::mem::take(&mut self.failed);
        for payload in failed {
            warn!("Resending payload {}", payload.id);
            self.dispatch_payload(ctx, payload);
        }
    }

    fn data_send(&mut self, ctx: &ModuleContext) {
        let Some(sync) = self.time else {
            debug!("Time not obtained yet, samples stay buffered");
            return;
        };
        let newest = CloudMessage::Data(self.buffers.newest(&sync));
        let Some(bytes) = self.encode(ctx, &newest) else {
            return;
        };
        self.send_payload(ctx, PayloadKind::Data, bytes);

        let backlog = CloudMessage::Batch(self.buffers.backlog(&sync));
        if let Some(bytes) = self.encode(ctx, &backlog) {
            self.send_payload(ctx, PayloadKind::Batch, bytes);
        }
    }

    fn ui_send(&mut self, ctx: &ModuleContext) {
        let Some(sync) = self.time else {
            debug!("Time not obtained yet, button presses stay buffered");
            return;
        };
        let presses = all_into_unix(self.buffers.ui.take_queued(), &sync);
        if let Some(bytes) = self.encode(ctx, &CloudMessage::Ui(presses)) {
            self.send_payload(ctx, PayloadKind::Ui, bytes);
        }
    }

    fn config_send(&mut self, ctx: &ModuleContext) {
        if let Some(bytes) = self.encode(ctx, &CloudMessage::Config(self.config)) {
            self.send_payload(ctx, PayloadKind::Config, bytes);
        }
    }

    fn data_ack(&mut self, ctx: &ModuleContext, id: u32, sent: bool) {
        let Some(index) = self.pending.iter().position(|p| p.id == id) else {
            error!("No pending payload with id {id}");
            ctx.send_error(ErrorCode::NotFound);
            return;
        };
        let payload = self.pending.swap_remove(index);
        if sent {
            debug!("Payload {id} acknowledged");
            return;
        }
        debug!("Payload {id} moved to failed list");
        if self.failed.is_full() {
            warn!("Failed list full, clearing {} entries", self.failed.len());
            self.failed.clear();
        }
        let _ = self.failed.push(payload);
    }

    fn time_update(&mut self, ctx: &ModuleContext) {
        if self.time.is_some() {
            return;
        }
        if let Err(e) = self.clock.update(DateTimeLink::new(ctx.bus().clone())) {
            warn!("Requesting date and time failed: {e}");
        }
    }

    fn time_obtained(&mut self, sync: &TimeSync) {
        if self.time.is_some() {
            debug!("Date and time already known");
            return;
        }
        info!("Date and time obtained ({} ms since epoch)", sync.unix_ms);
        self.time = Some(*sync);
    }

    // ── Configuration ──

    fn config_received(&mut self, ctx: &ModuleContext, update: &ConfigUpdate) {
        let diff = self.config.apply_update(update);
        for field in &diff.rejected {
            warn!("Rejected out-of-range {field}, kept {field} unchanged");
        }
        if diff.changed {
            if let Err(e) = self.settings.save(DEVICE_SETTINGS_KEY, &self.config.to_stored()) {
                warn!("Configuration not stored: {e}");
            }
        }
        ctx.send(DataEvent::ConfigReady(self.config));
        if diff.changed {
            self.config_send(ctx);
        } else {
            warn!("No change in current device configuration");
        }
    }

    #[cfg(test)]
    fn pending_ids(&self) -> Vec<u32> {
        self.pending.iter().map(|p| p.id).collect()
    }
}

impl Module for DataModule {
    fn name(&self) -> &'static str {
        "data"
    }

    fn family(&self) -> Family {
        Family::Data
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        vec![
            (Family::App, Rank::Normal),
            (Family::Data, Rank::Normal),
            (Family::Cloud, Rank::Normal),
            (Family::Modem, Rank::Normal),
            (Family::Location, Rank::Normal),
            (Family::Sensor, Rank::Normal),
            (Family::Ui, Rank::Normal),
            (Family::Util, Rank::Normal),
        ]
    }

    fn on_start(&mut self, _ctx: &ModuleContext) {
        self.load_config();
        info!("Device configuration v{} loaded", self.config.version);
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match (self.state.get(), event) {
            (DataState::CloudDisconnected, Event::Cloud(CloudEvent::Connected)) => {
                self.state.set(DataState::CloudConnected);
                self.time_update(ctx);
            }
            (DataState::CloudConnected, Event::Cloud(CloudEvent::Disconnected)) => {
                self.state.set(DataState::CloudDisconnected);
            }
            (DataState::CloudConnected, Event::Data(DataEvent::DataReady { .. })) => {
                self.resend_failed(ctx);
                self.data_send(ctx);
            }
            (DataState::CloudConnected, Event::Data(DataEvent::UiDataReady)) => self.ui_send(ctx),
            (DataState::CloudConnected, Event::App(AppEvent::ConfigGet)) => {
                ctx.send(DataEvent::ConfigGet);
            }
            (DataState::CloudConnected, Event::Cloud(CloudEvent::ConfigEmpty)) => {
                self.config_send(ctx);
            }
            (DataState::CloudConnected, Event::Cloud(CloudEvent::ConfigReceived(update))) => {
                self.config_received(ctx, update);
            }
            _ => {}
        }
    }

    fn on_all_states(&mut self, ctx: &ModuleContext, event: &Event) {
        match event {
            Event::App(AppEvent::Start) => ctx.send(DataEvent::ConfigInit(self.config)),
            Event::App(AppEvent::DataGet(request)) => self.begin_cycle(ctx, request),
            Event::Data(DataEvent::CollectionTimeout { cycle }) => {
                self.collection_timeout(ctx, *cycle)
            }
            Event::Cloud(CloudEvent::DataAck { id, sent }) => self.data_ack(ctx, *id, *sent),
            Event::Data(DataEvent::DateTimeObtained(sync)) => self.time_obtained(sync),
            Event::Ui(UiEvent::ButtonDataReady(press)) => {
                self.buffers.ui.push(*press);
                debug!("{} button presses queued", self.buffers.ui.queued());
                ctx.send(DataEvent::UiDataReady);
            }
            Event::Util(UtilEvent::ShutdownRequest(_)) if !self.state.is(DataState::Shutdown) => {
                self.collection_timer.cancel();
                ctx.send_shutdown_ack();
                self.state.set(DataState::Shutdown);
            }
            _ => {
                self.store(event);
                self.count(ctx, event);
            }
        }
    }
}
