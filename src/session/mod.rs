//! Spa session
//!
//! A [`Session`] owns everything about one spa: configuration, the dialect
//! table, the state snapshot, pending targets and the transmit queue. Its
//! [`run`](Session::run) loop keeps a gateway connection alive; while
//! connected, a receive loop and a health supervisor run side by side on the
//! same task. Clones share the same session, so adapters hold a clone and use
//! the accessors and commands concurrently with the running loop.

pub mod engine;
pub mod state;

pub use self::engine::{Engine, Outcome};
pub use self::state::SpaState;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::command::{self, encoder, ClockFields, QueueReceiver, Targets, TransmitQueue};
use crate::core::{ChangeDetection, ConnectionState, Error, Result, SessionConfig, MAX_PUMPS};
use crate::network::{self, Transport};
use crate::protocol::{ArbitrationConfig, CommandStyle, DialectTable, Frame};
use self::state::{FilterStatus, LightState, LockState};

/// Connection lifecycle together with the channel held on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Link {
    pub state: ConnectionState,
    pub channel: Option<u8>,
}

struct Inner {
    config: SessionConfig,
    dialect: &'static DialectTable,
    nonce: [u8; 2],
    state: RwLock<SpaState>,
    targets: Mutex<Targets>,
    link: watch::Sender<Link>,
    queue: TransmitQueue,
    outbox: Mutex<QueueReceiver>,
    /// Bumped whenever a status broadcast changes the snapshot
    updates: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
}

/// Handle to one spa
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Creates a session; nothing is connected until [`run`](Session::run) is polled
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let dialect = DialectTable::for_dialect(config.dialect);
        let nonce = config.assignment_nonce.unwrap_or_else(rand::random);
        let (queue, outbox) = command::transmit_queue();

        Ok(Session {
            inner: Arc::new(Inner {
                state: RwLock::new(SpaState::new(&dialect.topology)),
                targets: Mutex::new(Targets::default()),
                link: watch::Sender::new(Link::default()),
                queue,
                outbox: Mutex::new(outbox),
                updates: watch::Sender::new(0),
                shutdown: watch::Sender::new(false),
                config,
                dialect,
                nonce,
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn dialect(&self) -> &'static DialectTable {
        self.inner.dialect
    }

    /// Gateway port, falling back to the dialect default
    pub fn port(&self) -> u16 {
        self.inner.config.port.unwrap_or(self.inner.dialect.default_port)
    }

    fn change_detection(&self) -> ChangeDetection {
        self.inner
            .config
            .change_detection
            .unwrap_or(self.inner.dialect.change_detection)
    }

    // ---- connection lifecycle ----

    /// Keeps a connection to the gateway until [`shutdown`](Session::shutdown).
    ///
    /// Connect failures and lost connections are logged and retried after a
    /// fixed delay, forever.
    pub async fn run(&self) -> Result<()> {
        let config = &self.inner.config;
        let port = self.port();
        let mut shutdown = self.inner.shutdown.subscribe();

        info!(host = %config.host, port, dialect = %config.dialect, "starting session");
        while !*shutdown.borrow_and_update() {
            self.set_link(ConnectionState::Connecting, None);
            match network::connect(&config.host, port, config.connect_timeout).await {
                Ok(stream) => {
                    if let Err(e) = self.serve(stream).await {
                        warn!(error = %e, "connection lost");
                    }
                }
                Err(e) => error!(error = %e, "connect failed"),
            }
            self.set_link(ConnectionState::Disconnected, None);

            if *shutdown.borrow_and_update() {
                break;
            }
            debug!(delay = ?config.reconnect_delay, "reconnecting");
            tokio::select! {
                _ = time::sleep(config.reconnect_delay) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("session stopped");
        Ok(())
    }

    /// Speaks the bus protocol over an established byte stream until it
    /// fails, goes stale, or the session shuts down
    pub async fn serve<T>(&self, io: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut transport = Transport::new(io, self.inner.dialect.checksum);
        let mut outbox = self.inner.outbox.lock().await;
        let stale = outbox.drain();
        if stale > 0 {
            debug!(frames = stale, "dropped frames queued for the previous connection");
        }

        let arbitration = ArbitrationConfig {
            probe_threshold: self.inner.config.probe_threshold,
            nonce: self.inner.nonce,
        };
        let mut engine = Engine::new(self.inner.dialect, arbitration, self.change_detection());
        let shutdown = self.inner.shutdown.subscribe();

        tokio::select! {
            result = self.receive(&mut transport, &mut engine, &mut outbox) => result,
            result = self.supervise() => result,
            _ = wait_for_shutdown(shutdown) => Ok(()),
        }
    }

    async fn receive<T>(
        &self,
        transport: &mut Transport<T>,
        engine: &mut Engine,
        outbox: &mut QueueReceiver,
    ) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let frame = transport
                .read_frame()
                .await?
                .ok_or_else(|| Error::connect("gateway closed the connection"))?;

            if self.connection_state() == ConnectionState::Connecting {
                self.set_link(ConnectionState::Connected, engine.channel());
            }

            let outcome = {
                let mut state = self.inner.state.write().await;
                let mut targets = self.inner.targets.lock().await;
                engine.handle(&frame, &mut state, &mut targets)
            };

            for reply in outcome.replies {
                transport.write_frame(reply).await?;
            }

            if let Some(channel) = outcome.assigned {
                self.set_link(ConnectionState::Connected, Some(channel));
                if self.inner.dialect.command_style == CommandStyle::DirectFrames {
                    // refresh the filter schedule, the panel never broadcasts it
                    self.inner.queue.push(encoder::panel_request(channel, 1, 0))?;
                }
            }

            for press in outcome.presses {
                self.inner.queue.push(press)?;
            }

            if outcome.changed {
                if self.connection_state() != ConnectionState::Connected {
                    self.set_link(ConnectionState::Connected, engine.channel());
                }
                self.inner.updates.send_modify(|n| *n = n.wrapping_add(1));
            }

            if outcome.grant {
                if let Some(next) = outbox.pop() {
                    transport.write_frame(next).await?;
                } else if self.inner.config.send_nothing_to_send {
                    if let Some(channel) = engine.channel() {
                        transport.write_frame(encoder::idle(channel, self.inner.dialect)).await?;
                    }
                }
            }
        }
    }

    /// Watches for status silence.
    ///
    /// After `status_timeout` without a changed status broadcast the session
    /// is marked disconnected and, where the dialect supports it, the
    /// controller is probed for its module identity. If nothing arrives
    /// within `probe_grace` either, the connection is abandoned.
    async fn supervise(&self) -> Result<()> {
        let config = &self.inner.config;
        let mut updates = self.inner.updates.subscribe();
        let mut last_seen = Instant::now();
        let mut ticker = time::interval(config.health_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if updates.has_changed().unwrap_or(false) {
                updates.borrow_and_update();
                last_seen = Instant::now();
                continue;
            }
            let silent = last_seen.elapsed();
            if silent < config.status_timeout {
                continue;
            }

            warn!(silent = ?silent, "no status update from the controller");
            self.set_link(ConnectionState::Disconnected, self.channel());
            if let Some(channel) = self.channel() {
                if self.inner.dialect.command_style == CommandStyle::DirectFrames {
                    info!(channel, "requesting module identity");
                    self.inner.queue.push(encoder::module_ident_request(channel))?;
                }
            }

            time::sleep(config.probe_grace).await;
            if updates.has_changed().unwrap_or(false) {
                info!("controller is responding again");
                updates.borrow_and_update();
                last_seen = Instant::now();
                continue;
            }
            return Err(Error::connect(format!(
                "no status update for {:?}",
                last_seen.elapsed()
            )));
        }
    }

    /// Asks a running session to disconnect and stop
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    fn set_link(&self, state: ConnectionState, channel: Option<u8>) {
        let link = Link { state, channel };
        let previous = self.inner.link.send_replace(link);
        if previous != link {
            info!(state = %state, channel = ?channel, "connection state changed");
        }
    }

    // ---- accessors ----

    pub fn link(&self) -> Link {
        *self.inner.link.borrow()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link().state
    }

    /// Channel currently held on the bus
    pub fn channel(&self) -> Option<u8> {
        self.link().channel
    }

    /// Receiver that changes whenever the connection state or channel does
    pub fn watch_link(&self) -> watch::Receiver<Link> {
        self.inner.link.subscribe()
    }

    /// Receiver whose value increments on every status change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.updates.subscribe()
    }

    /// Copy of the full state snapshot
    pub async fn snapshot(&self) -> SpaState {
        self.inner.state.read().await.clone()
    }

    pub async fn current_temperature(&self) -> Option<f64> {
        self.inner.state.read().await.current_temp
    }

    /// Set point reported by the controller
    pub async fn target_temperature(&self) -> Option<f64> {
        self.inner.state.read().await.set_temp
    }

    /// Set point requested but not yet reached (button-press dialects)
    pub async fn pending_temperature(&self) -> Option<f64> {
        self.inner.targets.lock().await.set_temp
    }

    pub async fn pumps(&self) -> [u8; MAX_PUMPS] {
        self.inner.state.read().await.pumps
    }

    pub async fn pump(&self, index: usize) -> Option<u8> {
        self.inner.state.read().await.pumps.get(index).copied()
    }

    pub async fn circulation_pump(&self) -> u8 {
        self.inner.state.read().await.circulation_pump
    }

    pub async fn lights(&self) -> LightState {
        self.inner.state.read().await.lights
    }

    pub async fn filter_status(&self) -> FilterStatus {
        self.inner.state.read().await.filter
    }

    pub async fn locks(&self) -> LockState {
        self.inner.state.read().await.locks
    }

    /// e.g. `Connected (Channel: 16)`
    pub fn connection_state_text(&self) -> String {
        let link = self.link();
        match link.channel {
            Some(channel) => format!("{} (Channel: {})", link.state, channel),
            None => format!("{} (Channel: None)", link.state),
        }
    }

    /// e.g. `Last Update: 4s ago`
    pub async fn last_update_text(&self) -> String {
        match self.inner.state.read().await.seconds_since_update(Utc::now()) {
            Some(seconds) => format!("Last Update: {}s ago", seconds),
            None => "Last Update: N/A".to_string(),
        }
    }

    /// Rounds a set point to what the panel can display in its current scale
    pub async fn format_set_temperature(&self, value: f64) -> f64 {
        self.inner.state.read().await.temp_scale.round(value)
    }

    // ---- commands ----
    //
    // The plain variants log and swallow rejections; the `try_` variants
    // return them.

    /// Channel to send from, if commands can go out at all
    fn sender(&self) -> Result<u8> {
        let link = self.link();
        if link.state != ConnectionState::Connected {
            return Err(Error::invalid_state(format!("not connected ({})", link.state)));
        }
        link.channel
            .ok_or_else(|| Error::invalid_state("no channel assigned yet"))
    }

    fn direct_frames_only(&self, what: &str) -> Result<()> {
        match self.inner.dialect.command_style {
            CommandStyle::DirectFrames => Ok(()),
            CommandStyle::ButtonPresses => Err(Error::rejected(format!(
                "{} not supported by {} panels",
                what, self.inner.dialect.name
            ))),
        }
    }

    fn enqueue(&self, frame: Frame) -> Result<()> {
        self.inner.queue.push(frame)
    }

    pub async fn set_temperature(&self, value: f64) {
        log_rejection("temperature change", self.try_set_temperature(value).await);
    }

    pub async fn try_set_temperature(&self, value: f64) -> Result<()> {
        let scale = self.inner.state.read().await.temp_scale;
        let value = command::validate_set_point(&self.inner.dialect.topology.limits, scale, value)?;

        match self.inner.dialect.command_style {
            CommandStyle::DirectFrames => {
                let channel = self.sender()?;
                info!(value, %scale, "requesting set point");
                self.enqueue(encoder::set_temperature(channel, scale.encode(value)))
            }
            CommandStyle::ButtonPresses => {
                info!(value, %scale, "set point target stored");
                self.inner.targets.lock().await.set_temp = Some(value);
                Ok(())
            }
        }
    }

    pub async fn set_pump(&self, index: usize, state: u8) {
        log_rejection("pump change", self.try_set_pump(index, state).await);
    }

    /// Moves pump `index` to `state` (0 off, 1 low, 2 high)
    pub async fn try_set_pump(&self, index: usize, state: u8) -> Result<()> {
        let presses = {
            let snapshot = self.inner.state.read().await;
            command::validate_pump(&self.inner.dialect.topology, &snapshot, index, state)?
        };

        match self.inner.dialect.command_style {
            CommandStyle::DirectFrames => {
                let channel = self.sender()?;
                info!(pump = index, state, presses, "changing pump");
                for press in 0..presses {
                    if press > 0 {
                        time::sleep(self.inner.config.press_interval).await;
                    }
                    self.enqueue(encoder::pump_press(channel, index))?;
                }
                Ok(())
            }
            CommandStyle::ButtonPresses => {
                info!(pump = index, state, "pump target stored");
                self.inner.targets.lock().await.pumps[index] = Some(state);
                Ok(())
            }
        }
    }

    pub async fn set_light(&self, index: usize, mode: u8) {
        log_rejection("light change", self.try_set_light(index, mode).await);
    }

    /// Changes light `index`.
    ///
    /// Jacuzzi panels take the mode directly. Sundance panels only offer
    /// a light button and a colour button, so the mode is ignored and
    /// the matching button is pressed once.
    pub async fn try_set_light(&self, index: usize, mode: u8) -> Result<()> {
        let channel = self.sender()?;
        let frame = match self.inner.dialect.command_style {
            CommandStyle::DirectFrames => {
                if index != 0 {
                    return Err(Error::rejected(format!("light {} does not exist", index)));
                }
                encoder::light_mode(channel, mode)
            }
            CommandStyle::ButtonPresses => {
                command::validate_light(&self.inner.dialect.topology, index)?;
                let button = if index == 0 {
                    command::Button::Light
                } else {
                    command::Button::LightColour
                };
                encoder::button_press(channel, button)
            }
        };
        info!(light = index, mode, "changing light");
        self.enqueue(frame)
    }

    pub async fn set_brightness(&self, level: u8) {
        log_rejection("brightness change", self.try_set_brightness(level).await);
    }

    pub async fn try_set_brightness(&self, level: u8) -> Result<()> {
        self.direct_frames_only("brightness control")?;
        let channel = self.sender()?;
        info!(level, "changing brightness");
        self.enqueue(encoder::light_brightness(channel, level))
    }

    pub async fn set_primary_filter(&self, start_hour: u8, duration_hours: u8, frequency: u8) {
        log_rejection(
            "primary filter change",
            self.try_set_primary_filter(start_hour, duration_hours, frequency).await,
        );
    }

    /// Reprograms the primary filter cycle and asks the panel to read it back
    pub async fn try_set_primary_filter(&self, start_hour: u8, duration_hours: u8, frequency: u8) -> Result<()> {
        self.direct_frames_only("filter scheduling")?;
        command::validate_primary_filter(start_hour, duration_hours, frequency)?;
        let channel = self.sender()?;
        info!(start_hour, duration_hours, frequency, "changing primary filter cycle");
        self.enqueue(encoder::primary_filter(channel, start_hour, duration_hours, frequency))?;
        time::sleep(self.inner.config.settle_delay).await;
        self.enqueue(encoder::panel_request(channel, 1, 0))
    }

    pub async fn set_secondary_filter(&self, mode: u8) {
        log_rejection("secondary filter change", self.try_set_secondary_filter(mode).await);
    }

    /// Sets the secondary filter mode (0 holiday, 1 light, 2 heavy) and asks
    /// the panel to read it back
    pub async fn try_set_secondary_filter(&self, mode: u8) -> Result<()> {
        self.direct_frames_only("filter scheduling")?;
        command::validate_secondary_filter(mode)?;
        let channel = self.sender()?;
        info!(mode, "changing secondary filter cycle");
        self.enqueue(encoder::secondary_filter(channel, mode))?;
        time::sleep(self.inner.config.settle_delay).await;
        self.enqueue(encoder::panel_request(channel, 2, 0))
    }

    pub async fn set_time(&self, time: NaiveTime) {
        log_rejection("time change", self.try_set_time(time).await);
    }

    pub async fn try_set_time(&self, time: NaiveTime) -> Result<()> {
        self.direct_frames_only("clock setting")?;
        let channel = self.sender()?;
        let fields = ClockFields::with_time(&*self.inner.state.read().await, time)?;
        info!(%time, "setting spa clock");
        self.enqueue(fields.to_frame(channel))
    }

    pub async fn set_date(&self, date: NaiveDate) {
        log_rejection("date change", self.try_set_date(date).await);
    }

    pub async fn try_set_date(&self, date: NaiveDate) -> Result<()> {
        self.direct_frames_only("calendar setting")?;
        let channel = self.sender()?;
        let fields = ClockFields::with_date(&*self.inner.state.read().await, date)?;
        info!(%date, "setting spa calendar");
        self.enqueue(fields.to_frame(channel))
    }

    /// Asks the controller to identify itself
    pub async fn request_module_ident(&self) {
        let result = self
            .direct_frames_only("module identification")
            .and_then(|_| self.sender())
            .and_then(|channel| self.enqueue(encoder::module_ident_request(channel)));
        log_rejection("module identification", result);
    }
}

fn log_rejection(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "{} ignored", what);
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
