//! Activity arbiter: the single owner of the relay and the firmware update.
//!
//! Each call to [`Arbiter::poll`] is one step of the device's main loop:
//!
//! ```text
//!  poll ─▶ service session ─▶ drain remote events ─▶ updater outcome
//!       ─▶ fire due timers  ─▶ step current mode
//! ```
//!
//! Remote events are handled the moment they are drained, so an update
//! request that lands while the relay is energized releases it before
//! anything else happens.  The busy-wait pulse runs the same drain inside
//! its loop, which is what keeps it preemptible.
//!
//! All device access goes through the [`Platform`] bundle handed to each
//! step; the arbiter itself owns no hardware.

pub mod mode;

use log::{debug, info, warn};

use crate::app::commands::ConsoleCommand;
use crate::app::events::{RemoteEvent, StatusEvent, UpdateOutcome};
use crate::app::ports::Platform;
use crate::button::ButtonLatch;
use crate::clock::{OneShotTimers, TimerHandle};
use crate::config::{AfterPulse, DeviceConfig, PulseWait};
use crate::error::{ConnectivityError, UpdateError};
use crate::pins::virtual_pins;
use crate::power::SleepScheduler;
use crate::status::StatusReporter;

pub use mode::{BootPhase, Mode, PulseState, UpdateState};

/// Delay between poll steps in [`Arbiter::run`].
const POLL_INTERVAL_MS: u32 = 10;

/// Work scheduled on the one-shot timer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerToken {
    PulseComplete,
    UpdateDeadline,
}

/// How a process lifetime ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Sleeping,
    Rebooting,
}

pub struct Arbiter {
    config: DeviceConfig,
    mode: Mode,
    button: ButtonLatch,
    timers: OneShotTimers<TimerToken, 4>,
    sleeper: SleepScheduler,
    status: StatusReporter,
    /// Update requested before boot finished; started at the first decision.
    pending_update: Option<String>,
    /// A pulse has completed with [`AfterPulse::StayResident`].
    resident: bool,
    decided_once: bool,
    info_published: bool,
    pulses_completed: u32,
    connectivity_losses: u32,
}

impl Arbiter {
    pub fn new(config: DeviceConfig) -> Self {
        let sleeper = SleepScheduler::new(config.sleep_policy());
        let status = StatusReporter::new(config.utc_offset_secs);
        Self {
            config,
            mode: Mode::Booting(BootPhase::TimeSync { since_ms: 0 }),
            button: ButtonLatch::new(),
            timers: OneShotTimers::new(),
            sleeper,
            status,
            pending_update: None,
            resident: false,
            decided_once: false,
            info_published: false,
            pulses_completed: 0,
            connectivity_losses: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Latch the control channel sets when the remote button is pressed.
    pub fn button_latch(&self) -> &ButtonLatch {
        &self.button
    }

    pub fn is_terminal(&self) -> bool {
        self.mode.is_terminal()
    }

    pub fn pulses_completed(&self) -> u32 {
        self.pulses_completed
    }

    pub fn connectivity_losses(&self) -> u32 {
        self.connectivity_losses
    }

    /// Update held back until boot completes.
    pub fn pending_update(&self) -> Option<&str> {
        self.pending_update.as_deref()
    }

    /// Read and clear the pending button request.
    pub fn consume_button_event(&self) -> bool {
        self.button.take()
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Release the relay and restart the boot sequence from now.
    pub fn start(&mut self, hw: &mut impl Platform) {
        hw.release();
        let since_ms = hw.now_ms();
        info!(
            "Arbiter: boot, firmware {} (pulse {} ms, {:?})",
            self.config.firmware_version, self.config.pulse_duration_ms, self.config.pulse_wait
        );
        self.mode = Mode::Booting(BootPhase::TimeSync { since_ms });
    }

    /// Poll until the lifetime ends.  On hardware this never returns.
    pub fn run(&mut self, hw: &mut impl Platform) -> Terminal {
        self.start(hw);
        loop {
            self.poll(hw);
            match self.mode {
                Mode::Sleeping => return Terminal::Sleeping,
                Mode::Rebooting => return Terminal::Rebooting,
                _ => hw.delay_ms(POLL_INTERVAL_MS),
            }
        }
    }

    /// One main-loop step.  No effect once the mode is terminal.
    pub fn poll(&mut self, hw: &mut impl Platform) {
        if self.mode.is_terminal() {
            return;
        }

        self.pump_events(hw);
        self.poll_update_outcome(hw);
        self.fire_due_timers(hw);

        if !self.mode.is_terminal() {
            self.step(hw);
        }
    }

    fn step(&mut self, hw: &mut impl Platform) {
        match &self.mode {
            Mode::Booting(phase) => {
                let phase = *phase;
                self.step_boot(hw, phase);
            }
            Mode::Deciding => self.decide(hw),
            Mode::Pulsing(pulse) => {
                // Only reached when no completion timer could be registered.
                if pulse.timer.is_none() && hw.now_ms() >= pulse.ends_at_ms() {
                    self.complete_pulse(hw);
                }
            }
            Mode::UpdatingFirmware(update) => {
                if update.timer.is_none()
                    && hw.elapsed_since(update.started_at_ms) >= update.deadline_ms
                {
                    self.update_timed_out(hw);
                }
            }
            Mode::Resident => {
                if !self.info_published && hw.is_connected() {
                    self.publish_device_info(hw);
                }
                if self.button.is_set() {
                    self.transition(Mode::Deciding);
                }
            }
            Mode::Sleeping | Mode::Rebooting => {}
        }
    }

    // -----------------------------------------------------------------------
    // Boot
    // -----------------------------------------------------------------------

    fn step_boot(&mut self, hw: &mut impl Platform, phase: BootPhase) {
        let now = hw.now_ms();
        match phase {
            BootPhase::TimeSync { since_ms } => {
                let synced = hw.unix_time().is_some();
                let waited = now.saturating_sub(since_ms);
                if synced || waited >= u64::from(self.config.time_sync_timeout_ms) {
                    if !synced {
                        warn!("Arbiter: wall clock not synced after {} ms", waited);
                    }
                    self.transition(Mode::Booting(BootPhase::Connecting { since_ms: now }));
                }
            }
            BootPhase::Connecting { since_ms } => {
                if hw.is_connected() {
                    hw.request_button_sync();
                    self.transition(Mode::Booting(BootPhase::SyncingButton { since_ms: now }));
                } else if now.saturating_sub(since_ms) >= u64::from(self.config.connect_timeout_ms) {
                    warn!("Arbiter: {}, deciding offline", ConnectivityError::ConnectTimeout);
                    self.finish_boot(hw);
                }
            }
            BootPhase::SyncingButton { since_ms } => {
                if now.saturating_sub(since_ms) >= u64::from(self.config.button_sync_settle_ms) {
                    self.finish_boot(hw);
                }
            }
        }
    }

    fn finish_boot(&mut self, hw: &mut impl Platform) {
        if hw.is_connected() && !self.info_published {
            self.publish_device_info(hw);
        }
        self.transition(Mode::Deciding);
    }

    fn publish_device_info(&mut self, hw: &mut impl Platform) {
        let ip = hw
            .local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "0.0.0.0".into());
        let rssi = hw.rssi().map(|r| r.to_string()).unwrap_or_else(|| "0".into());

        hw.write_virtual(virtual_pins::IP_ADDRESS, &ip);
        hw.write_virtual(virtual_pins::SIGNAL_STRENGTH, &rssi);
        hw.write_virtual(virtual_pins::FIRMWARE_VERSION, &self.config.firmware_version);
        info!("Arbiter: published ip={} rssi={} fw={}", ip, rssi, self.config.firmware_version);
        self.info_published = true;
    }

    // -----------------------------------------------------------------------
    // Decision
    // -----------------------------------------------------------------------

    fn decide(&mut self, hw: &mut impl Platform) {
        if let Some(url) = self.pending_update.take() {
            self.start_update(hw, url);
            return;
        }

        let first = !self.decided_once;
        self.decided_once = true;

        if self.consume_button_event() {
            self.start_pulse(hw);
        } else if first && self.config.pulse_on_boot {
            info!("Arbiter: pulse on boot");
            self.start_pulse(hw);
        } else if self.resident {
            self.transition(Mode::Resident);
        } else {
            self.enter_sleep(hw);
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Service the session and handle every queued event.
    fn pump_events(&mut self, hw: &mut impl Platform) {
        hw.service();
        while let Some(event) = hw.next_event() {
            self.handle_event(hw, event);
            if self.mode.is_terminal() {
                break;
            }
        }
    }

    fn handle_event(&mut self, hw: &mut impl Platform, event: RemoteEvent) {
        match event {
            RemoteEvent::Button(true) => {
                debug!("Arbiter: button pressed");
                self.button.set();
            }
            RemoteEvent::Button(false) => {}
            RemoteEvent::UpdateRequested(url) => self.begin_update(hw, url),
            RemoteEvent::Console(line) => self.handle_console(hw, &line),
            RemoteEvent::ConnectivityLost => {
                self.connectivity_losses = self.connectivity_losses.saturating_add(1);
                warn!("Arbiter: session lost ({} so far)", self.connectivity_losses);
            }
        }
    }

    fn handle_console(&mut self, hw: &mut impl Platform, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match ConsoleCommand::parse(line) {
            Ok(ConsoleCommand::Restart) => {
                self.status.report(hw, &StatusEvent::Restarting);
                self.reboot(hw);
            }
            Err(e) => {
                warn!("Arbiter: {}", e);
                self.status.echo(hw, &e.to_string());
            }
        }
    }

    fn fire_due_timers(&mut self, hw: &mut impl Platform) {
        while let Some(token) = self.timers.pop_due(hw.now_ms()) {
            match token {
                TimerToken::PulseComplete if self.mode.is_pulsing() => self.complete_pulse(hw),
                TimerToken::UpdateDeadline if self.mode.is_updating() => self.update_timed_out(hw),
                token => debug!("Arbiter: stale {:?} in {}", token, self.mode.name()),
            }
            if self.mode.is_terminal() {
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pulse
    // -----------------------------------------------------------------------

    fn start_pulse(&mut self, hw: &mut impl Platform) {
        let now = hw.now_ms();
        let duration_ms = u64::from(self.config.pulse_duration_ms);
        let timer = match self.config.pulse_wait {
            PulseWait::BusyWait => None,
            PulseWait::TimerCallback => self.schedule(now, duration_ms, TimerToken::PulseComplete),
        };

        self.transition(Mode::Pulsing(PulseState {
            started_at_ms: now,
            duration_ms,
            timer,
        }));
        hw.energize();
        self.status.report(hw, &StatusEvent::PulseStarted);

        if self.config.pulse_wait == PulseWait::BusyWait {
            self.wait_out_pulse(hw);
        }
    }

    /// Busy-wait variant: stay inside the pulse, draining events every step
    /// so an update request can still cut it short.
    fn wait_out_pulse(&mut self, hw: &mut impl Platform) {
        let step_ms = self.config.busy_wait_step_ms;
        loop {
            self.pump_events(hw);
            let Mode::Pulsing(pulse) = &self.mode else {
                return;
            };
            if hw.now_ms() >= pulse.ends_at_ms() {
                self.complete_pulse(hw);
                return;
            }
            hw.delay_ms(step_ms);
        }
    }

    fn complete_pulse(&mut self, hw: &mut impl Platform) {
        if let Mode::Pulsing(pulse) = &self.mode {
            if let Some(handle) = pulse.timer {
                self.timers.cancel(handle);
            }
        }

        hw.release();
        self.pulses_completed = self.pulses_completed.saturating_add(1);
        match self.config.after_pulse {
            AfterPulse::Sleep => self.transition(Mode::Deciding),
            AfterPulse::StayResident => {
                self.resident = true;
                self.transition(Mode::Resident);
            }
        }

        hw.write_virtual(virtual_pins::BUTTON, "0");
        self.status.report(hw, &StatusEvent::PulseDone);
    }

    /// Cut an energized pulse short in favour of an update.  The relay is
    /// released before anything else runs.
    fn preempt_pulse(&mut self, hw: &mut impl Platform, url: String) {
        hw.release();
        if let Mode::Pulsing(pulse) = &self.mode {
            if let Some(handle) = pulse.timer {
                self.timers.cancel(handle);
            }
        }
        warn!("Arbiter: update request preempts pulse");
        self.status.report(hw, &StatusEvent::PulseInterrupted);
        self.start_update(hw, url);
    }

    // -----------------------------------------------------------------------
    // Firmware update
    // -----------------------------------------------------------------------

    /// Accept an update request from `url`.
    ///
    /// Held until the first decision while booting, preempts a pulse, and
    /// is ignored while another update is running.
    pub fn begin_update(&mut self, hw: &mut impl Platform, url: String) {
        match &self.mode {
            Mode::Booting(_) if self.pending_update.is_none() => {
                info!("Arbiter: update from {} held until boot completes", url);
                self.pending_update = Some(url);
            }
            Mode::Booting(_) => warn!("Arbiter: update already held, ignoring {}", url),
            Mode::Deciding | Mode::Resident => self.start_update(hw, url),
            Mode::Pulsing(_) => self.preempt_pulse(hw, url),
            Mode::UpdatingFirmware(update) => {
                warn!(
                    "Arbiter: update from {} in progress, ignoring {}",
                    update.source_url, url
                );
            }
            Mode::Sleeping | Mode::Rebooting => {}
        }
    }

    fn start_update(&mut self, hw: &mut impl Platform, url: String) {
        hw.release();
        let now = hw.now_ms();
        let deadline_ms = u64::from(self.config.update_deadline_ms);
        let timer = self.schedule(now, deadline_ms, TimerToken::UpdateDeadline);

        let url_line = format!("URL: {url}");
        self.transition(Mode::UpdatingFirmware(UpdateState {
            source_url: url,
            started_at_ms: now,
            deadline_ms,
            timer,
        }));
        self.status.report(hw, &StatusEvent::UpdateStarted);
        self.status.echo(hw, &url_line);

        if let Mode::UpdatingFirmware(update) = &self.mode {
            hw.begin_update(&update.source_url);
        }
    }

    fn poll_update_outcome(&mut self, hw: &mut impl Platform) {
        if let Some(outcome) = hw.poll_outcome() {
            self.end_update(hw, outcome);
        }
    }

    /// Settle the running update.  Outcomes arriving with no update in
    /// progress (for example after the deadline) are logged and dropped.
    pub fn end_update(&mut self, hw: &mut impl Platform, outcome: UpdateOutcome) {
        let timer = match &self.mode {
            Mode::UpdatingFirmware(update) => update.timer,
            mode => {
                warn!("Arbiter: dropping update outcome {:?} in {}", outcome, mode.name());
                return;
            }
        };
        if let Some(handle) = timer {
            self.timers.cancel(handle);
        }

        match outcome {
            UpdateOutcome::Succeeded => {
                self.status.report(hw, &StatusEvent::UpdateSucceeded);
                self.reboot(hw);
            }
            UpdateOutcome::NoUpdates => {
                self.status.report(hw, &StatusEvent::UpdateNoUpdates);
                self.transition(Mode::Deciding);
            }
            UpdateOutcome::Failed(reason) => {
                warn!("Arbiter: update failed: {}", reason);
                self.status.report(hw, &StatusEvent::UpdateFailed(reason));
                self.transition(Mode::Deciding);
            }
        }
    }

    fn update_timed_out(&mut self, hw: &mut impl Platform) {
        warn!(
            "Arbiter: {} after {} ms",
            UpdateError::Timeout,
            self.config.update_deadline_ms
        );
        self.status.report(hw, &StatusEvent::UpdateTimedOut);
        self.transition(Mode::Deciding);
    }

    // -----------------------------------------------------------------------
    // Terminal actions
    // -----------------------------------------------------------------------

    fn enter_sleep(&mut self, hw: &mut impl Platform) {
        hw.release();
        self.transition(Mode::Sleeping);
        self.sleeper.enter_low_power(hw, &self.status);
    }

    fn reboot(&mut self, hw: &mut impl Platform) {
        hw.release();
        self.transition(Mode::Rebooting);
        hw.restart();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn schedule(&mut self, now_ms: u64, delay_ms: u64, token: TimerToken) -> Option<TimerHandle> {
        match self.timers.after(now_ms, delay_ms, token) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Arbiter: {}; {:?} falls back to polling", e, token);
                None
            }
        }
    }

    fn transition(&mut self, next: Mode) {
        info!("Arbiter: {} -> {}", self.mode.name(), next.name());
        self.mode = next;
    }
}
