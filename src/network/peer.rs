//! Headless Peer
//!
//! Drives a [`SessionCoordinator`] from a tokio interval, feeds it commands
//! read from stdin and hands its output to a [`PresentationSink`].
//!
//! Commands, one per line: `start`, `jump`, `/jump`, `duck`, `/duck`, `quit`.

use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::game::events::{PresentationSink, RenderFrame, SimEvent, SoundCue};
use crate::game::simulation::{InputChannel, InputEdge, Role};
use crate::network::channel::{ChannelError, MessageChannel, WebSocketChannel};
use crate::network::relay::ENDPOINT_PATH;
use crate::network::session::{LobbyId, SessionConfig, SessionCoordinator, SessionEvent};

/// A command from the input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCommand {
    /// Start a round
    Start,
    /// Press or release a button
    Input(InputEdge),
    /// Leave
    Quit,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Option<PeerCommand> {
    match line.trim() {
        "start" | "s" => Some(PeerCommand::Start),
        "jump" => Some(PeerCommand::Input(InputEdge::down(InputChannel::Jump))),
        "/jump" => Some(PeerCommand::Input(InputEdge::up(InputChannel::Jump))),
        "duck" => Some(PeerCommand::Input(InputEdge::down(InputChannel::Duck))),
        "/duck" => Some(PeerCommand::Input(InputEdge::up(InputChannel::Duck))),
        "quit" | "q" => Some(PeerCommand::Quit),
        _ => None,
    }
}

/// Relay URL for a lobby.
pub fn lobby_url(base: &str, lobby_id: LobbyId) -> String {
    format!("{}{}?lobby={}", base.trim_end_matches('/'), ENDPOINT_PATH, lobby_id)
}

/// Presentation that writes everything to the log.
#[derive(Debug, Default)]
pub struct TracingSink {
    last_distance: [u32; 2],
}

impl PresentationSink for TracingSink {
    fn render(&mut self, frame: &RenderFrame) {
        let slot = &mut self.last_distance[frame.role.index()];
        if *slot != frame.display_distance {
            *slot = frame.display_distance;
            debug!(
                role = ?frame.role,
                distance = frame.display_distance,
                speed = frame.speed,
                obstacles = frame.obstacles.len(),
                inverted = frame.inverted,
                "frame"
            );
        } else {
            trace!(role = ?frame.role, lifecycle = ?frame.lifecycle, "frame");
        }
    }

    fn play(&mut self, role: Role, cue: SoundCue) {
        info!(?role, ?cue, "sound");
    }

    fn show_error(&mut self, text: &str) {
        warn!("{}", text);
    }

    fn opponent_presence(&mut self, joined: bool) {
        info!(joined, "opponent presence");
    }
}

/// Read commands from stdin until EOF.
pub fn spawn_stdin_commands() -> mpsc::UnboundedReceiver<PeerCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None => warn!("Unknown command: {:?}", line),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin error: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

fn present<C: MessageChannel, S: PresentationSink>(
    session: &SessionCoordinator<C>,
    events: Vec<SessionEvent>,
    sink: &mut S,
) {
    for event in events {
        match event {
            SessionEvent::Sim { role, event: SimEvent::Sound { cue } } => sink.play(role, cue),
            SessionEvent::Sim { role, event: SimEvent::Crashed { distance, high_score } } => {
                let digest = session.simulation(role).track_digest();
                info!(
                    ?role,
                    distance,
                    high_score,
                    track = %hex::encode(&digest[..8]),
                    "round over"
                );
            }
            SessionEvent::Sim { role, event } => debug!(?role, ?event, "sim event"),
            SessionEvent::LifecycleChanged { from, to } => info!(?from, ?to, "session"),
            SessionEvent::Presence { joined } => sink.opponent_presence(joined),
            SessionEvent::RelayError(text) => sink.show_error(&text),
            SessionEvent::Disconnected => sink.show_error("Disconnected from relay"),
        }
    }
}

/// Run the cooperative loop until the channel closes or `Quit`.
pub async fn run_loop<C: MessageChannel, S: PresentationSink>(
    session: &mut SessionCoordinator<C>,
    sink: &mut S,
    commands: &mut mpsc::UnboundedReceiver<PeerCommand>,
) {
    let mut ticker = interval(session.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut commands_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let was_ticking = session.is_ticking();
                let events = session.tick(Instant::now());
                let changed = !events.is_empty();
                present(session, events, sink);

                if was_ticking || changed {
                    for frame in session.frames() {
                        sink.render(&frame);
                    }
                }

                if !session.connected() {
                    break;
                }
            }
            command = commands.recv(), if commands_open => {
                match command {
                    Some(PeerCommand::Start) => {
                        if !session.request_start(Instant::now()) {
                            info!(joined = session.joined(), lifecycle = ?session.lifecycle(), "start unavailable");
                        }
                    }
                    Some(PeerCommand::Input(edge)) => {
                        session.local_input(edge);
                    }
                    Some(PeerCommand::Quit) => break,
                    None => commands_open = false,
                }
            }
        }
    }
}

/// Connect to a relay lobby and play from stdin.
pub async fn run(base_url: &str, lobby_id: LobbyId, config: SessionConfig) -> Result<(), ChannelError> {
    let url = lobby_url(base_url, lobby_id);
    info!("Connecting to {}", url);

    let channel = WebSocketChannel::connect(&url).await?;
    let mut session = SessionCoordinator::new(lobby_id, channel, config);
    let mut sink = TracingSink::default();
    let mut commands = spawn_stdin_commands();

    run_loop(&mut session, &mut sink, &mut commands).await;

    info!(lobby = lobby_id, "peer exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::channel::LoopbackChannel;
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingSink {
        renders: usize,
        sounds: Vec<(Role, SoundCue)>,
        errors: Vec<String>,
        presence: Vec<bool>,
    }

    impl PresentationSink for RecordingSink {
        fn render(&mut self, _frame: &RenderFrame) {
            self.renders += 1;
        }
        fn play(&mut self, role: Role, cue: SoundCue) {
            self.sounds.push((role, cue));
        }
        fn show_error(&mut self, text: &str) {
            self.errors.push(text.to_string());
        }
        fn opponent_presence(&mut self, joined: bool) {
            self.presence.push(joined);
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("start\n"), Some(PeerCommand::Start));
        assert_eq!(
            parse_command(" jump "),
            Some(PeerCommand::Input(InputEdge::down(InputChannel::Jump)))
        );
        assert_eq!(
            parse_command("/duck"),
            Some(PeerCommand::Input(InputEdge::up(InputChannel::Duck)))
        );
        assert_eq!(parse_command("q"), Some(PeerCommand::Quit));
        assert_eq!(parse_command("fly"), None);
    }

    #[test]
    fn test_lobby_url() {
        assert_eq!(lobby_url("ws://127.0.0.1:2222", 4), "ws://127.0.0.1:2222/ws?lobby=4");
        assert_eq!(lobby_url("ws://relay/", -1), "ws://relay/ws?lobby=-1");
    }

    #[tokio::test]
    async fn test_loop_runs_until_disconnect() {
        let (ours, mut theirs) = LoopbackChannel::pair();
        let mut session = SessionCoordinator::new(1, ours, SessionConfig::default());
        session.handle_frame("4|1", Instant::now());

        let mut sink = RecordingSink::default();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        cmd_tx.send(PeerCommand::Start).unwrap();

        let script = async move {
            sleep(Duration::from_millis(150)).await;
            let first = theirs.try_recv().unwrap();
            drop(theirs);
            first
        };

        let ((), first) = tokio::join!(run_loop(&mut session, &mut sink, &mut cmd_rx), script);

        assert_eq!(first.as_deref(), Some("0"));
        assert!(sink.renders > 0);
        assert!(sink.sounds.contains(&(Role::Local, SoundCue::ButtonPress)));
        assert!(sink.presence.contains(&false));
        assert_eq!(sink.errors, vec!["Disconnected from relay".to_string()]);
        assert!(!session.connected());
    }

    #[tokio::test]
    async fn test_quit_command_ends_loop() {
        let (ours, _theirs) = LoopbackChannel::pair();
        let mut session = SessionCoordinator::new(1, ours, SessionConfig::default());
        let mut sink = RecordingSink::default();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        cmd_tx.send(PeerCommand::Quit).unwrap();

        run_loop(&mut session, &mut sink, &mut cmd_rx).await;
        assert!(session.connected());
    }
}
