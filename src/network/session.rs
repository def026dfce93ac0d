//! Session Coordination
//!
//! Owns both participant simulations, both sequence generators and the tick
//! scheduler for one lobby, and translates between protocol frames and
//! simulation commands.
//!
//! Everything here runs on one task. Inbound frames are drained at the start
//! of each tick and applied to completion before the simulations advance, so
//! no state is ever touched concurrently.

use std::time::{Duration, Instant};

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::core::rng::{SequenceGenerator, Seed};
use crate::game::avatar::Avatar;
use crate::game::config::RunnerConfig;
use crate::game::clock::TickScheduler;
use crate::game::events::{RenderFrame, SimEvent};
use crate::game::simulation::{InputEdge, Lifecycle, ParticipantSimulation, Role};
use crate::network::channel::{ChannelError, MessageChannel};
use crate::network::protocol::ProtocolMessage;

/// Lobby identifier.
pub type LobbyId = i64;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seed both generators are reset to at every round start.
    pub seed: Seed,
    /// Target time between ticks (milliseconds).
    pub tick_interval_ms: u64,
    /// Simulation tuning shared by both participants.
    pub runner: RunnerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: crate::ROUND_SEED,
            tick_interval_ms: 16,
            runner: RunnerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Tick interval as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionLifecycle {
    /// No opponent in the lobby.
    AwaitingOpponent,
    /// Opponent present, round can be started.
    Ready,
    /// Round in progress.
    Active,
    /// Someone crashed; a fresh start re-arms the session.
    Ended,
}

/// Output of the coordinator, drained by the peer driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Event from one participant's simulation.
    Sim {
        /// Which participant
        role: Role,
        /// What happened
        event: SimEvent,
    },
    /// Session state transition.
    LifecycleChanged {
        /// Previous state
        from: SessionLifecycle,
        /// New state
        to: SessionLifecycle,
    },
    /// Opponent joined or left.
    Presence {
        /// Opponent present
        joined: bool,
    },
    /// Error text from the relay.
    RelayError(String),
    /// Channel closed; no reconnect is attempted.
    Disconnected,
}

/// Coordinates the local and mirrored simulations over one channel.
pub struct SessionCoordinator<C: MessageChannel> {
    lobby_id: LobbyId,
    config: SessionConfig,
    channel: C,
    connected: bool,
    joined: bool,
    lifecycle: SessionLifecycle,
    simulations: [ParticipantSimulation; 2],
    streams: [SequenceGenerator; 2],
    clock: TickScheduler,
    pending: Vec<SessionEvent>,
}

impl<C: MessageChannel> std::fmt::Debug for SessionCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("lobby_id", &self.lobby_id)
            .field("joined", &self.joined)
            .field("lifecycle", &self.lifecycle)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl<C: MessageChannel> SessionCoordinator<C> {
    /// Create a coordinator for a lobby.
    pub fn new(lobby_id: LobbyId, channel: C, config: SessionConfig) -> Self {
        let simulations = [
            ParticipantSimulation::new(Role::Local, config.runner.clone()),
            ParticipantSimulation::new(Role::Remote, config.runner.clone()),
        ];
        Self::from_simulations(lobby_id, channel, config, simulations)
    }

    /// Create a coordinator whose avatars come from `make_avatar`, called
    /// once per role.
    pub fn with_avatars<F>(
        lobby_id: LobbyId,
        channel: C,
        config: SessionConfig,
        mut make_avatar: F,
    ) -> Self
    where
        F: FnMut(Role, &RunnerConfig) -> Box<dyn Avatar>,
    {
        let simulations = [Role::Local, Role::Remote].map(|role| {
            let avatar = make_avatar(role, &config.runner);
            ParticipantSimulation::with_avatar(role, config.runner.clone(), avatar)
        });
        Self::from_simulations(lobby_id, channel, config, simulations)
    }

    fn from_simulations(
        lobby_id: LobbyId,
        channel: C,
        config: SessionConfig,
        simulations: [ParticipantSimulation; 2],
    ) -> Self {
        let streams = [
            SequenceGenerator::new(config.seed),
            SequenceGenerator::new(config.seed),
        ];

        Self {
            lobby_id,
            config,
            channel,
            connected: true,
            joined: false,
            lifecycle: SessionLifecycle::AwaitingOpponent,
            simulations,
            streams,
            clock: TickScheduler::new(),
            pending: Vec::new(),
        }
    }

    // =========================================================================
    // LOCAL INTENTS
    // =========================================================================

    /// Start a round from this side.
    ///
    /// Rejected (returns false, nothing sent) unless the opponent is present
    /// and the session is `Ready` or `Ended`.
    pub fn request_start(&mut self, now: Instant) -> bool {
        let startable = matches!(self.lifecycle, SessionLifecycle::Ready | SessionLifecycle::Ended);
        if !self.connected || !self.joined || !startable {
            debug!(lobby = self.lobby_id, joined = self.joined, lifecycle = ?self.lifecycle, "start rejected");
            return false;
        }

        info!(lobby = self.lobby_id, "starting round");
        self.begin_round(now);
        self.send(ProtocolMessage::Start);
        true
    }

    /// Apply a local input edge and forward it to the opponent.
    ///
    /// Applied immediately, without waiting for the relay. Ignored unless
    /// the local participant is in a live round.
    pub fn local_input(&mut self, edge: InputEdge) -> bool {
        let local = &mut self.simulations[Role::Local.index()];
        if !local.lifecycle().is_live() {
            return false;
        }
        local.apply_input(edge);
        self.send(ProtocolMessage::from_edge(edge));
        true
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Drain every frame that has arrived on the channel.
    pub fn pump_inbound(&mut self, now: Instant) {
        while self.connected {
            match self.channel.try_recv() {
                Ok(Some(frame)) => self.handle_frame(&frame, now),
                Ok(None) => break,
                Err(e) => {
                    warn!(lobby = self.lobby_id, "Inbound channel failed: {}", e);
                    self.on_disconnect();
                }
            }
        }
    }

    /// Apply one inbound frame. Malformed frames are logged and dropped.
    pub fn handle_frame(&mut self, frame: &str, now: Instant) {
        let msg = match ProtocolMessage::decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(lobby = self.lobby_id, frame, "Dropping frame: {}", e);
                return;
            }
        };

        match msg {
            ProtocolMessage::Start => {
                if self.lifecycle == SessionLifecycle::Active {
                    debug!(lobby = self.lobby_id, "ignoring start while active");
                    return;
                }
                info!(lobby = self.lobby_id, "opponent started round");
                self.set_joined(true);
                self.begin_round(now);
            }
            ProtocolMessage::Crash => {
                let events = self.simulations[Role::Remote.index()].crash();
                self.push_sim(Role::Remote, events);
                if self.lifecycle == SessionLifecycle::Active {
                    self.set_lifecycle(SessionLifecycle::Ended);
                }
            }
            ProtocolMessage::InputDown(_) | ProtocolMessage::InputUp(_) => {
                if let Some(edge) = msg.as_edge() {
                    self.simulations[Role::Remote.index()].apply_input(edge);
                }
            }
            ProtocolMessage::Presence(true) => {
                self.set_joined(true);
                if self.lifecycle == SessionLifecycle::AwaitingOpponent {
                    self.set_lifecycle(SessionLifecycle::Ready);
                }
            }
            ProtocolMessage::Presence(false) => {
                info!(lobby = self.lobby_id, "opponent left");
                self.halt();
                self.set_joined(false);
            }
            ProtocolMessage::Error(text) => {
                warn!(lobby = self.lobby_id, "Relay error: {}", text);
                self.pending.push(SessionEvent::RelayError(text));
            }
        }
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Run one tick if one is scheduled, after draining inbound frames.
    ///
    /// Returns every event produced since the previous call.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        self.pump_inbound(now);

        if let Some(frame) = self.clock.begin_tick(now) {
            let mut local_crashed = false;

            for role in [Role::Local, Role::Remote] {
                let i = role.index();
                let events = self.simulations[i].advance(frame.delta_ms, &mut self.streams[i]);
                if role == Role::Local {
                    local_crashed = events.iter().any(|e| matches!(e, SimEvent::Crashed { .. }));
                }
                self.push_sim(role, events);
            }

            if local_crashed {
                info!(lobby = self.lobby_id, distance = self.simulations[0].distance(), "local crash");
                self.send(ProtocolMessage::Crash);
                if self.lifecycle == SessionLifecycle::Active {
                    self.set_lifecycle(SessionLifecycle::Ended);
                }
            }

            if self.simulations.iter().any(|s| s.lifecycle().is_live()) {
                self.clock.end_tick(frame.handle);
            } else {
                self.clock.cancel();
            }
        }

        self.drain_events()
    }

    /// Take buffered events.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn begin_round(&mut self, now: Instant) {
        for stream in &mut self.streams {
            stream.seed(self.config.seed);
        }
        for role in [Role::Local, Role::Remote] {
            let events = self.simulations[role.index()].start();
            self.push_sim(role, events);
        }
        self.set_lifecycle(SessionLifecycle::Active);

        self.clock.cancel();
        self.clock.arm(now);
    }

    /// Stop both simulations and the tick; back to waiting.
    fn halt(&mut self) {
        for role in [Role::Local, Role::Remote] {
            if let Some(event) = self.simulations[role.index()].stop() {
                self.pending.push(SessionEvent::Sim { role, event });
            }
        }
        self.clock.cancel();
        self.set_lifecycle(SessionLifecycle::AwaitingOpponent);
    }

    fn on_disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        warn!(lobby = self.lobby_id, "Disconnected from relay");
        self.halt();
        self.set_joined(false);
        self.pending.push(SessionEvent::Disconnected);
    }

    fn send(&mut self, msg: ProtocolMessage) {
        if !self.connected {
            return;
        }
        if let Err(e) = self.channel.send(&msg.encode()) {
            match e {
                ChannelError::Closed => debug!(lobby = self.lobby_id, "send on closed channel"),
                ChannelError::WebSocket(ref e) => warn!(lobby = self.lobby_id, "Send failed: {}", e),
            }
            self.on_disconnect();
        }
    }

    fn set_joined(&mut self, joined: bool) {
        if self.joined != joined {
            self.joined = joined;
            self.pending.push(SessionEvent::Presence { joined });
        }
    }

    fn set_lifecycle(&mut self, to: SessionLifecycle) {
        if self.lifecycle != to {
            let from = self.lifecycle;
            self.lifecycle = to;
            debug!(lobby = self.lobby_id, ?from, ?to, "session transition");
            self.pending.push(SessionEvent::LifecycleChanged { from, to });
        }
    }

    fn push_sim(&mut self, role: Role, events: Vec<SimEvent>) {
        self.pending
            .extend(events.into_iter().map(|event| SessionEvent::Sim { role, event }));
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Lobby this session belongs to.
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Session state.
    pub fn lifecycle(&self) -> SessionLifecycle {
        self.lifecycle
    }

    /// Whether the opponent is present; gates the start action.
    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Whether the channel is still open.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Whether a tick is scheduled.
    pub fn is_ticking(&self) -> bool {
        self.clock.is_armed()
    }

    /// One participant's simulation.
    pub fn simulation(&self, role: Role) -> &ParticipantSimulation {
        &self.simulations[role.index()]
    }

    /// One participant's generator.
    pub fn stream(&self, role: Role) -> &SequenceGenerator {
        &self.streams[role.index()]
    }

    /// Render frames for both participants, local first.
    pub fn frames(&self) -> [RenderFrame; 2] {
        [self.simulations[0].frame(), self.simulations[1].frame()]
    }

    /// Both simulations are idle.
    pub fn is_idle(&self) -> bool {
        self.simulations.iter().all(|s| !s.lifecycle().is_live())
    }

    /// Participant lifecycles, local first.
    pub fn participant_lifecycles(&self) -> [Lifecycle; 2] {
        [self.simulations[0].lifecycle(), self.simulations[1].lifecycle()]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::game::avatar::{ArcAvatar, AvatarPose, AvatarState};
    use crate::game::collision::CollisionBox;
    use crate::game::events::SoundCue;
    use crate::game::simulation::InputChannel;
    use crate::network::channel::LoopbackChannel;

    const TICK: Duration = Duration::from_millis(16);

    type CallLog = Arc<Mutex<Vec<(Role, &'static str)>>>;

    /// Default avatar that records every jump command it receives.
    struct CountingAvatar {
        role: Role,
        inner: ArcAvatar,
        log: CallLog,
    }

    impl CountingAvatar {
        fn record(&self, call: &'static str) {
            self.log.lock().unwrap().push((self.role, call));
        }
    }

    impl Avatar for CountingAvatar {
        fn start_jump(&mut self, speed: f64) {
            self.record("start_jump");
            self.inner.start_jump(speed);
        }
        fn end_jump(&mut self) {
            self.record("end_jump");
            self.inner.end_jump();
        }
        fn set_speed_drop(&mut self) {
            self.inner.set_speed_drop();
        }
        fn clear_speed_drop(&mut self) {
            self.inner.clear_speed_drop();
        }
        fn set_duck(&mut self, ducking: bool) {
            self.inner.set_duck(ducking);
        }
        fn update_jump(&mut self, delta_ms: f64) {
            self.inner.update_jump(delta_ms);
        }
        fn crash(&mut self) {
            self.inner.crash();
        }
        fn reset(&mut self) {
            self.inner.reset();
        }
        fn state(&self) -> AvatarState {
            self.inner.state()
        }
        fn jump_count(&self) -> u32 {
            self.inner.jump_count()
        }
        fn pose(&self) -> AvatarPose {
            self.inner.pose()
        }
        fn outer_box(&self) -> CollisionBox {
            self.inner.outer_box()
        }
        fn collision_boxes(&self) -> &'static [CollisionBox] {
            self.inner.collision_boxes()
        }
    }

    fn drain(channel: &mut LoopbackChannel) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = channel.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn joined_session() -> (SessionCoordinator<LoopbackChannel>, LoopbackChannel, Instant) {
        let (ours, mut theirs) = LoopbackChannel::pair();
        let mut session = SessionCoordinator::new(7, ours, SessionConfig::default());
        let now = Instant::now();
        theirs.send("4|1").unwrap();
        session.tick(now);
        (session, theirs, now)
    }

    /// Tick until both participants are past the intro.
    fn run_until_running(session: &mut SessionCoordinator<LoopbackChannel>, now: &mut Instant) {
        for _ in 0..500 {
            *now += TICK;
            session.tick(*now);
            if session.participant_lifecycles() == [Lifecycle::Running, Lifecycle::Running] {
                return;
            }
        }
        panic!("intro never finished");
    }

    fn crashes(events: &[SessionEvent], role: Role) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Sim { role: r, event: SimEvent::Crashed { .. } } if *r == role))
            .count()
    }

    #[test]
    fn test_presence_gates_start() {
        let (ours, _theirs) = LoopbackChannel::pair();
        let mut session = SessionCoordinator::new(1, ours, SessionConfig::default());
        let now = Instant::now();

        assert_eq!(session.lifecycle(), SessionLifecycle::AwaitingOpponent);
        assert!(!session.request_start(now));
        assert!(!session.is_ticking());

        session.handle_frame("4|1", now);
        assert!(session.joined());
        assert_eq!(session.lifecycle(), SessionLifecycle::Ready);
        assert!(session.request_start(now));
        assert_eq!(session.lifecycle(), SessionLifecycle::Active);
        assert!(session.is_ticking());
    }

    #[test]
    fn test_local_start_reseeds_and_sends() {
        let (mut session, mut theirs, mut now) = joined_session();
        assert!(session.request_start(now));
        assert_eq!(drain(&mut theirs), vec!["0".to_string()]);

        let events = session.drain_events();
        assert!(events.contains(&SessionEvent::Sim {
            role: Role::Remote,
            event: SimEvent::Sound { cue: SoundCue::ButtonPress },
        }));
        assert_eq!(session.stream(Role::Local).state(), 32);
        assert_eq!(session.stream(Role::Remote).state(), 32);

        run_until_running(&mut session, &mut now);
        // Start while active is refused.
        assert!(!session.request_start(now));
        assert!(drain(&mut theirs).is_empty());
    }

    #[test]
    fn test_repeated_presence_is_idempotent() {
        let (mut session, mut theirs, now) = joined_session();
        session.drain_events();
        session.request_start(now);
        session.drain_events();

        // The relay acknowledges every forwarded frame with 4|1.
        theirs.send("4|1").unwrap();
        let events = session.tick(now);
        assert_eq!(session.lifecycle(), SessionLifecycle::Active);
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::Presence { .. })));
    }

    #[test]
    fn test_inbound_jump_drives_mirror_only() {
        let (mut session, mut theirs, mut now) = joined_session();
        session.request_start(now);
        run_until_running(&mut session, &mut now);
        drain(&mut theirs);

        theirs.send("2|0").unwrap();
        session.pump_inbound(now);

        assert!(session.simulation(Role::Remote).avatar().state().jumping);
        assert!(!session.simulation(Role::Local).avatar().state().jumping);
        assert!(drain(&mut theirs).is_empty());
    }

    #[test]
    fn test_inbound_jump_edges_applied_exactly_once() {
        let log = CallLog::default();
        let (ours, mut theirs) = LoopbackChannel::pair();
        let mut session = SessionCoordinator::with_avatars(7, ours, SessionConfig::default(), |role, runner| {
            let avatar = CountingAvatar { role, inner: ArcAvatar::new(runner), log: log.clone() };
            Box::new(avatar) as Box<dyn Avatar>
        });
        let mut now = Instant::now();
        theirs.send("4|1").unwrap();
        session.tick(now);
        session.request_start(now);
        run_until_running(&mut session, &mut now);
        drain(&mut theirs);
        log.lock().unwrap().clear();

        theirs.send("2|0").unwrap();
        theirs.send("3|0").unwrap();
        session.pump_inbound(now);

        assert_eq!(
            *log.lock().unwrap(),
            vec![(Role::Remote, "start_jump"), (Role::Remote, "end_jump")]
        );
        assert!(drain(&mut theirs).is_empty());
    }

    #[test]
    fn test_local_input_applies_and_forwards() {
        let (mut session, mut theirs, mut now) = joined_session();
        session.request_start(now);
        run_until_running(&mut session, &mut now);
        drain(&mut theirs);

        assert!(session.local_input(InputEdge::down(InputChannel::Duck)));
        assert!(session.simulation(Role::Local).avatar().state().ducking);
        assert!(!session.simulation(Role::Remote).avatar().state().ducking);

        assert!(session.local_input(InputEdge::up(InputChannel::Duck)));
        assert_eq!(drain(&mut theirs), vec!["2|1".to_string(), "3|1".to_string()]);
    }

    #[test]
    fn test_local_input_ignored_before_start() {
        let (mut session, mut theirs, _) = joined_session();
        assert!(!session.local_input(InputEdge::down(InputChannel::Jump)));
        assert!(drain(&mut theirs).is_empty());
    }

    #[test]
    fn test_opponent_leaving_stops_and_gates() {
        let (mut session, mut theirs, mut now) = joined_session();
        session.request_start(now);
        run_until_running(&mut session, &mut now);
        drain(&mut theirs);

        theirs.send("4|0").unwrap();
        now += TICK;
        session.tick(now);

        assert_eq!(session.lifecycle(), SessionLifecycle::AwaitingOpponent);
        assert!(!session.joined());
        assert!(!session.is_ticking());
        assert_eq!(session.participant_lifecycles(), [Lifecycle::Paused, Lifecycle::Paused]);

        // Start is refused until the opponent is back.
        assert!(!session.request_start(now));
        assert!(drain(&mut theirs).is_empty());
        assert_eq!(session.participant_lifecycles(), [Lifecycle::Paused, Lifecycle::Paused]);

        theirs.send("4|1").unwrap();
        session.tick(now);
        assert!(session.request_start(now));
        assert_eq!(drain(&mut theirs), vec!["0".to_string()]);
    }

    #[test]
    fn test_local_crash_sent_once_and_duplicates_ignored() {
        let (mut session, mut theirs, mut now) = joined_session();
        session.request_start(now);
        session.drain_events();

        let mut local_crashes = 0;
        for _ in 0..2000 {
            now += TICK;
            local_crashes += crashes(&session.tick(now), Role::Local);
            if session.simulation(Role::Local).lifecycle() == Lifecycle::Crashed {
                break;
            }
        }
        assert_eq!(local_crashes, 1);
        assert_eq!(session.lifecycle(), SessionLifecycle::Ended);

        let sent = drain(&mut theirs);
        assert_eq!(sent.iter().filter(|f| f.as_str() == "1").count(), 1);

        // Opponent crash arrives, then a duplicate.
        theirs.send("1").unwrap();
        theirs.send("1").unwrap();
        let mut remote_events = Vec::new();
        for _ in 0..5 {
            now += TICK;
            let events = session.tick(now);
            local_crashes += crashes(&events, Role::Local);
            remote_events.extend(events);
        }

        assert_eq!(crashes(&remote_events, Role::Remote), 1);
        let hits = remote_events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Sim { role: Role::Remote, event: SimEvent::Sound { cue: SoundCue::Hit } }))
            .count();
        assert_eq!(hits, 1);
        assert_eq!(local_crashes, 1);
        assert!(drain(&mut theirs).is_empty());
        assert!(session.is_idle());
        assert!(!session.is_ticking());

        // Ended re-arms with a fresh start.
        assert!(session.request_start(now));
    }

    #[test]
    fn test_remote_start_restarts_from_ended() {
        let (mut session, mut theirs, now) = joined_session();
        session.request_start(now);
        theirs.send("1").unwrap();
        session.tick(now);
        assert_eq!(session.lifecycle(), SessionLifecycle::Ended);

        theirs.send("0").unwrap();
        session.tick(now);
        assert_eq!(session.lifecycle(), SessionLifecycle::Active);
        assert_eq!(session.participant_lifecycles(), [Lifecycle::Intro, Lifecycle::Intro]);
    }

    #[test]
    fn test_remote_start_while_active_is_ignored() {
        let (mut session, mut theirs, mut now) = joined_session();
        session.request_start(now);
        run_until_running(&mut session, &mut now);
        drain(&mut theirs);
        session.drain_events();

        let distances = [Role::Local, Role::Remote].map(|r| session.simulation(r).distance());
        let states = [Role::Local, Role::Remote].map(|r| session.stream(r).state());
        let rounds = [Role::Local, Role::Remote].map(|r| session.simulation(r).rounds());

        theirs.send("0").unwrap();
        session.pump_inbound(now);

        assert_eq!(session.lifecycle(), SessionLifecycle::Active);
        assert_eq!(session.participant_lifecycles(), [Lifecycle::Running, Lifecycle::Running]);
        assert_eq!([Role::Local, Role::Remote].map(|r| session.simulation(r).distance()), distances);
        assert_eq!([Role::Local, Role::Remote].map(|r| session.stream(r).state()), states);
        assert_eq!([Role::Local, Role::Remote].map(|r| session.simulation(r).rounds()), rounds);
        assert!(session.drain_events().is_empty());
        assert!(drain(&mut theirs).is_empty());
        assert!(session.is_ticking());
    }

    #[test]
    fn test_malformed_and_error_frames() {
        let (mut session, mut theirs, now) = joined_session();
        session.drain_events();

        theirs.send("7|x").unwrap();
        theirs.send("2|9").unwrap();
        theirs.send("9|Lobby Full").unwrap();
        let events = session.tick(now);

        assert_eq!(events, vec![SessionEvent::RelayError("Lobby Full".into())]);
        assert_eq!(session.lifecycle(), SessionLifecycle::Ready);
    }

    #[test]
    fn test_disconnect_surfaces_once() {
        let (mut session, theirs, mut now) = joined_session();
        session.request_start(now);
        run_until_running(&mut session, &mut now);
        session.drain_events();

        drop(theirs);
        now += TICK;
        let events = session.tick(now);

        assert_eq!(events.iter().filter(|e| **e == SessionEvent::Disconnected).count(), 1);
        assert!(!session.connected());
        assert!(!session.joined());
        assert_eq!(session.lifecycle(), SessionLifecycle::AwaitingOpponent);
        assert!(!session.is_ticking());

        now += TICK;
        assert!(session.tick(now).is_empty());
        assert!(!session.request_start(now));
    }

    #[test]
    fn test_peers_converge_over_loopback() {
        let (a_end, b_end) = LoopbackChannel::pair();
        let mut a = SessionCoordinator::new(3, a_end, SessionConfig::default());
        let mut b = SessionCoordinator::new(3, b_end, SessionConfig::default());

        let t0 = Instant::now();
        a.handle_frame("4|1", t0);
        b.handle_frame("4|1", t0);
        assert!(a.request_start(t0));

        let mut now = t0;
        for _ in 0..1000 {
            let ev_a = a.tick(now);
            let ev_b = b.tick(now);

            let crashed = [&ev_a, &ev_b]
                .iter()
                .any(|evs| crashes(evs, Role::Local) + crashes(evs, Role::Remote) > 0);
            if crashed {
                break;
            }

            assert_eq!(
                a.simulation(Role::Local).track_digest(),
                b.simulation(Role::Remote).track_digest()
            );
            assert_eq!(
                b.simulation(Role::Local).track_digest(),
                a.simulation(Role::Remote).track_digest()
            );
            assert_eq!(a.stream(Role::Local).state(), b.stream(Role::Remote).state());
            now += TICK;
        }

        assert!(a.joined() && b.joined());
        assert!(a.simulation(Role::Local).scheduler().emitted() > 0);
    }
}
