//! Turn-taking transition table
//!
//! [`Conversation`] is synchronous and owns no I/O: every input is an
//! [`Event`], every side effect a [`Command`] for the actor to execute.
//! Each turn gets a fresh [`TurnId`]; asynchronous results carrying an older
//! id are dropped, which is what makes barge-in a single transition.

use std::fmt;

use crate::bus::BusEvent;
use crate::config::Config;
use crate::protocol::{ActionCue, AuthPayload, Envelope, ReplyPayload, Utterance, parse_reply};
use crate::transport::ConnectionState;

use super::ambient::AmbientRotation;

/// Identifies one user or character turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TurnId(u64);

impl TurnId {
    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who holds the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ambient animation, nobody speaking
    Idle,
    /// The user is recording or typing
    Capturing,
    /// Waiting for the character's reply
    AwaitingReply,
    /// The character is speaking or acting
    Responding,
}

/// Connection status as reported by the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Progress(String),
    Connected,
    Failed(String),
    Disconnected,
}

/// Input to the transition table
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartInput,
    SubmitText(String),
    SubmitAudio(Vec<u8>),
    Transcribed { turn: TurnId, text: Option<String> },
    Synthesized { turn: TurnId, audio: Option<Vec<u8>> },
    PlaybackFinished { turn: TurnId },
    ActionFinished { name: String },
    Link(LinkEvent),
    Inbound(String),
    SoundToggled(bool),
    CallRequested,
    HangUp,
}

/// Side effect requested by the transition table
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Close,
    Send(Envelope),
    Transcribe { turn: TurnId, audio: Vec<u8> },
    Synthesize { turn: TurnId, text: String, emotion: String },
    PlayAudio { turn: TurnId, audio: Vec<u8> },
    StopAudio,
    PlayAction(ActionCue),
    SetBrightness(f32),
    Publish(BusEvent),
}

/// Conversation state for one session
pub struct Conversation {
    phase: Phase,
    turn: TurnId,
    link: ConnectionState,
    sound: bool,
    transcribing: bool,
    auth: AuthPayload,
    character_id: String,
    dim_brightness: f32,
    ambient: AmbientRotation,
    /// Ambient cue on screen while idle
    idle_cue: Option<String>,
    /// Cue whose completion ends the current reply
    reply_cue: Option<String>,
    /// Turn whose speech is audible
    speaking: Option<TurnId>,
}

impl Conversation {
    /// Create a conversation with an explicit ambient rotation
    #[must_use]
    pub fn new(config: &Config, ambient: AmbientRotation) -> Self {
        Self {
            phase: Phase::Idle,
            turn: TurnId::default(),
            link: ConnectionState::Disconnected,
            sound: true,
            transcribing: false,
            auth: config.auth.payload(),
            character_id: config.auth.character_id.clone(),
            dim_brightness: config.ambient.dim_brightness,
            ambient,
            idle_cue: None,
            reply_cue: None,
            speaking: None,
        }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current turn
    #[must_use]
    pub const fn turn(&self) -> TurnId {
        self.turn
    }

    /// Connection state as last reported
    #[must_use]
    pub const fn link(&self) -> ConnectionState {
        self.link
    }

    /// Whether synthesized speech is played
    #[must_use]
    pub const fn sound_enabled(&self) -> bool {
        self.sound
    }

    /// Commands that bring the presenter into its initial idle state
    pub fn start(&mut self) -> Vec<Command> {
        let mut commands = vec![Command::SetBrightness(self.dim_brightness)];
        self.enter_idle(&mut commands);
        commands
    }

    /// Apply one event
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        let mut commands = Vec::new();
        match event {
            Event::StartInput => self.on_start_input(&mut commands),
            Event::SubmitText(text) => self.on_submit_text(&text, &mut commands),
            Event::SubmitAudio(audio) => self.on_submit_audio(audio, &mut commands),
            Event::Transcribed { turn, text } => self.on_transcribed(turn, text, &mut commands),
            Event::Synthesized { turn, audio } => self.on_synthesized(turn, audio, &mut commands),
            Event::PlaybackFinished { turn } => self.on_playback_finished(turn, &mut commands),
            Event::ActionFinished { name } => self.on_action_finished(&name, &mut commands),
            Event::Link(link) => self.on_link(link, &mut commands),
            Event::Inbound(text) => self.on_inbound(&text, &mut commands),
            Event::SoundToggled(enabled) => self.on_sound_toggled(enabled, &mut commands),
            Event::CallRequested => self.on_call_requested(&mut commands),
            Event::HangUp => self.on_hang_up(&mut commands),
        }
        commands
    }

    fn on_start_input(&mut self, commands: &mut Vec<Command>) {
        match self.phase {
            Phase::Capturing if !self.transcribing => {}
            Phase::Capturing => {
                tracing::info!(turn = %self.turn, "recording restarted, pending transcript discarded");
                self.begin_capture();
            }
            Phase::Responding | Phase::Idle | Phase::AwaitingReply => {
                self.silence(commands);
                self.begin_capture();
            }
        }
    }

    /// Stop the character mid-sentence, if it is talking at all
    fn silence(&mut self, commands: &mut Vec<Command>) {
        if self.phase == Phase::Responding || self.speaking.is_some() {
            tracing::debug!(turn = %self.turn, "barge-in");
            commands.push(Command::StopAudio);
            self.speaking = None;
        }
    }

    fn begin_capture(&mut self) {
        self.turn = self.turn.next();
        self.phase = Phase::Capturing;
        self.transcribing = false;
        self.reply_cue = None;
    }

    fn on_submit_text(&mut self, text: &str, commands: &mut Vec<Command>) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.silence(commands);
        self.submit_user(text, commands);
    }

    fn submit_user(&mut self, text: &str, commands: &mut Vec<Command>) {
        self.turn = self.turn.next();
        self.transcribing = false;
        self.reply_cue = None;
        commands.push(Command::Publish(BusEvent::MessageAdded(Utterance::user(text))));

        if self.link != ConnectionState::Connected {
            tracing::warn!(state = %self.link, "not connected, message not sent");
            self.enter_idle(commands);
            return;
        }

        commands.push(Command::Send(Envelope::message(text, &self.character_id)));
        self.phase = Phase::AwaitingReply;
    }

    fn on_submit_audio(&mut self, audio: Vec<u8>, commands: &mut Vec<Command>) {
        if self.phase != Phase::Capturing || self.transcribing {
            tracing::warn!(phase = ?self.phase, bytes = audio.len(), "recording dropped");
            return;
        }
        self.transcribing = true;
        commands.push(Command::Transcribe {
            turn: self.turn,
            audio,
        });
    }

    fn on_transcribed(&mut self, turn: TurnId, text: Option<String>, commands: &mut Vec<Command>) {
        if turn != self.turn || self.phase != Phase::Capturing {
            tracing::debug!(%turn, "stale transcript dropped");
            return;
        }
        self.transcribing = false;

        match text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => self.submit_user(text, commands),
            _ => {
                tracing::info!("nothing recognised");
                self.enter_idle(commands);
            }
        }
    }

    fn on_synthesized(&mut self, turn: TurnId, audio: Option<Vec<u8>>, commands: &mut Vec<Command>) {
        // The reply's cue may already be over; speech still plays for its turn
        if turn != self.turn {
            tracing::debug!(%turn, "stale synthesis dropped");
            return;
        }

        match audio {
            Some(audio) if self.sound => {
                commands.push(Command::StopAudio);
                commands.push(Command::PlayAudio { turn, audio });
                self.speaking = Some(turn);
            }
            _ => {
                if self.phase == Phase::Responding && self.reply_cue.is_none() {
                    self.enter_idle(commands);
                }
            }
        }
    }

    fn on_playback_finished(&mut self, turn: TurnId, commands: &mut Vec<Command>) {
        if self.speaking == Some(turn) {
            self.speaking = None;
        }
        if turn == self.turn && self.phase == Phase::Responding && self.reply_cue.is_none() {
            self.enter_idle(commands);
        }
    }

    fn on_action_finished(&mut self, name: &str, commands: &mut Vec<Command>) {
        match self.phase {
            Phase::Responding if self.reply_cue.as_deref() == Some(name) => {
                self.enter_idle(commands);
            }
            Phase::Idle if self.idle_cue.as_deref() == Some(name) => {
                self.play_next_idle(commands);
            }
            _ => tracing::trace!(name, "action completion ignored"),
        }
    }

    fn on_link(&mut self, link: LinkEvent, commands: &mut Vec<Command>) {
        match link {
            LinkEvent::Progress(text) => {
                commands.push(Command::Publish(BusEvent::ConnectingProgress(text)));
            }
            LinkEvent::Connected => {
                self.set_link(ConnectionState::Connected, commands);
                commands.push(Command::SetBrightness(1.0));
                commands.push(Command::Send(Envelope::auth(self.auth.clone())));
            }
            LinkEvent::Failed(reason) => {
                tracing::warn!(%reason, "session could not be opened");
                self.drop_link(commands);
            }
            LinkEvent::Disconnected => self.drop_link(commands),
        }
    }

    fn drop_link(&mut self, commands: &mut Vec<Command>) {
        self.set_link(ConnectionState::Disconnected, commands);
        commands.push(Command::SetBrightness(self.dim_brightness));

        let in_turn = matches!(self.phase, Phase::AwaitingReply | Phase::Responding);
        let speaking = self.speaking.take().is_some();
        if in_turn || speaking {
            tracing::info!(turn = %self.turn, "turn abandoned");
            commands.push(Command::StopAudio);
            self.turn = self.turn.next();
        }
        if in_turn {
            self.enter_idle(commands);
        }
    }

    fn set_link(&mut self, state: ConnectionState, commands: &mut Vec<Command>) {
        if self.link != state {
            self.link = state;
            commands.push(Command::Publish(BusEvent::ConnectionStatusChanged(state)));
        }
    }

    fn on_inbound(&mut self, text: &str, commands: &mut Vec<Command>) {
        let reply = match parse_reply(text) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "dropping inbound message");
                return;
            }
        };
        if reply.answer.is_empty() {
            tracing::debug!("reply without answer ignored");
            return;
        }

        match self.phase {
            Phase::Capturing => {
                commands.push(Command::Publish(BusEvent::MessageAdded(Utterance::character(
                    &reply,
                ))));
            }
            Phase::Responding | Phase::Idle | Phase::AwaitingReply => {
                self.silence(commands);
                self.respond(reply, commands);
            }
        }
    }

    fn respond(&mut self, reply: ReplyPayload, commands: &mut Vec<Command>) {
        self.turn = self.turn.next();
        self.phase = Phase::Responding;
        self.idle_cue = None;
        tracing::info!(turn = %self.turn, action = %reply.action, emotion = %reply.emotion, "character replied");

        commands.push(Command::Publish(BusEvent::MessageAdded(Utterance::character(&reply))));

        self.reply_cue = (!reply.action.is_empty()).then(|| reply.action.clone());
        if let Some(cue) = &self.reply_cue {
            commands.push(Command::PlayAction(ActionCue::once(cue.clone())));
        }

        if self.sound {
            commands.push(Command::Synthesize {
                turn: self.turn,
                text: reply.answer,
                emotion: reply.emotion,
            });
        } else if self.reply_cue.is_none() {
            self.enter_idle(commands);
        }
    }

    fn on_sound_toggled(&mut self, enabled: bool, commands: &mut Vec<Command>) {
        if self.sound == enabled {
            return;
        }
        self.sound = enabled;
        if !enabled {
            commands.push(Command::StopAudio);
            self.speaking = None;
        }
        commands.push(Command::Publish(BusEvent::SoundToggle(enabled)));
    }

    fn on_call_requested(&mut self, commands: &mut Vec<Command>) {
        if self.link != ConnectionState::Disconnected {
            tracing::debug!(state = %self.link, "call ignored");
            return;
        }
        commands.push(Command::Publish(BusEvent::CallRequested));
        self.set_link(ConnectionState::Connecting, commands);
        commands.push(Command::Connect);
    }

    fn on_hang_up(&mut self, commands: &mut Vec<Command>) {
        if self.link == ConnectionState::Disconnected {
            return;
        }
        commands.push(Command::Publish(BusEvent::CallEnded));
        commands.push(Command::Close);
    }

    fn enter_idle(&mut self, commands: &mut Vec<Command>) {
        self.phase = Phase::Idle;
        self.transcribing = false;
        // Ambient must not open with the cue that just finished
        if let Some(cue) = self.reply_cue.take() {
            self.idle_cue = Some(cue);
        }
        self.play_next_idle(commands);
    }

    fn play_next_idle(&mut self, commands: &mut Vec<Command>) {
        self.idle_cue = self.ambient.next(self.idle_cue.as_deref());
        if let Some(cue) = &self.idle_cue {
            commands.push(Command::PlayAction(ActionCue::once(cue.clone())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::ConfigFile;

    const REPLY: &str = r#"{"event":"message_response","data":{"action":"idle_6","answer":"Hello","emotion":"happy"}}"#;

    fn conversation() -> Conversation {
        let config = Config::from_sources(ConfigFile::default(), |_| None).unwrap();
        Conversation::new(&config, AmbientRotation::seeded(&config.ambient, 1))
    }

    fn connected() -> Conversation {
        let mut conversation = conversation();
        conversation.start();
        conversation.handle(Event::CallRequested);
        conversation.handle(Event::Link(LinkEvent::Connected));
        conversation
    }

    fn responding() -> Conversation {
        let mut conversation = connected();
        conversation.handle(Event::SubmitText("hi".to_string()));
        conversation.handle(Event::Inbound(REPLY.to_string()));
        assert_eq!(conversation.phase(), Phase::Responding);
        conversation
    }

    fn plays_audio(commands: &[Command]) -> bool {
        commands.iter().any(|c| matches!(c, Command::PlayAudio { .. }))
    }

    #[test]
    fn starts_idle_and_dimmed() {
        let mut conversation = conversation();
        let commands = conversation.start();

        assert_eq!(commands[0], Command::SetBrightness(0.6));
        assert!(matches!(commands[1], Command::PlayAction(ref cue) if cue.name.starts_with("idle_")));
        assert_eq!(conversation.phase(), Phase::Idle);
    }

    #[test]
    fn auth_is_sent_on_connect() {
        let mut conversation = conversation();
        let commands = conversation.handle(Event::CallRequested);
        assert!(commands.contains(&Command::Connect));
        assert_eq!(conversation.link(), ConnectionState::Connecting);

        let commands = conversation.handle(Event::Link(LinkEvent::Connected));
        assert!(commands.contains(&Command::SetBrightness(1.0)));
        assert!(commands.iter().any(|c| matches!(c, Command::Send(Envelope::Auth(_)))));
    }

    #[test]
    fn call_ignored_while_connected() {
        let mut conversation = connected();

        assert!(conversation.handle(Event::CallRequested).is_empty());
    }

    #[test]
    fn reply_yields_utterance_synthesis_and_cue() {
        let mut conversation = connected();
        conversation.handle(Event::SubmitText("hi".to_string()));
        assert_eq!(conversation.phase(), Phase::AwaitingReply);

        let commands = conversation.handle(Event::Inbound(REPLY.to_string()));

        let utterances: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::Publish(BusEvent::MessageAdded(u)) => Some(u),
                _ => None,
            })
            .collect();
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].text, "Hello");
        assert!(!utterances[0].is_user());

        let syntheses: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, Command::Synthesize { emotion, .. } if emotion == "happy"))
            .collect();
        assert_eq!(syntheses.len(), 1);
        assert!(commands.contains(&Command::PlayAction(ActionCue::once("idle_6"))));
    }

    #[test]
    fn barge_in_discards_pending_synthesis() {
        let mut conversation = responding();
        let stale = conversation.turn();

        let commands = conversation.handle(Event::StartInput);
        assert_eq!(commands, vec![Command::StopAudio]);
        assert_eq!(conversation.phase(), Phase::Capturing);

        let commands = conversation.handle(Event::Synthesized {
            turn: stale,
            audio: Some(vec![1, 2, 3]),
        });
        assert!(commands.is_empty());

        let commands = conversation.handle(Event::ActionFinished {
            name: "idle_6".to_string(),
        });
        assert!(commands.is_empty());
        assert_eq!(conversation.phase(), Phase::Capturing);
    }

    #[test]
    fn synthesis_plays_for_current_turn() {
        let mut conversation = responding();
        let turn = conversation.turn();

        let commands = conversation.handle(Event::Synthesized {
            turn,
            audio: Some(vec![0; 4]),
        });

        assert_eq!(
            commands,
            vec![
                Command::StopAudio,
                Command::PlayAudio {
                    turn,
                    audio: vec![0; 4]
                }
            ]
        );
    }

    #[test]
    fn reply_cue_completion_resumes_ambient() {
        let mut conversation = responding();

        let commands = conversation.handle(Event::ActionFinished {
            name: "idle_6".to_string(),
        });

        assert_eq!(conversation.phase(), Phase::Idle);
        assert!(matches!(commands.as_slice(), [Command::PlayAction(cue)] if cue.name != "idle_6"));
    }

    #[test]
    fn idle_rotation_follows_completion() {
        let mut conversation = conversation();
        let commands = conversation.start();
        let Some(Command::PlayAction(first)) = commands.last().cloned() else {
            panic!("no idle cue");
        };

        let commands = conversation.handle(Event::ActionFinished { name: first.name.clone() });
        let Some(Command::PlayAction(second)) = commands.last().cloned() else {
            panic!("no rotation");
        };
        assert_ne!(first.name, second.name);

        // A completion for a cue no longer on screen changes nothing
        assert!(conversation
            .handle(Event::ActionFinished { name: first.name })
            .is_empty());
    }

    #[test]
    fn malformed_inbound_is_dropped() {
        let mut conversation = connected();
        conversation.handle(Event::SubmitText("hi".to_string()));

        for frame in ["{oops", r#"{"event":"ping","data":{}}"#, r#"{"event":"message","data":{"content":"x","characterId":"c"}}"#] {
            assert!(conversation.handle(Event::Inbound(frame.to_string())).is_empty());
        }
        assert_eq!(conversation.phase(), Phase::AwaitingReply);
    }

    #[test]
    fn empty_answer_is_ignored() {
        let mut conversation = connected();
        let commands = conversation.handle(Event::Inbound(
            r#"{"event":"message_response","data":{"action":"wave","answer":""}}"#.to_string(),
        ));

        assert!(commands.is_empty());
        assert_eq!(conversation.phase(), Phase::Idle);
    }

    #[test]
    fn reply_while_capturing_goes_to_chat_only() {
        let mut conversation = connected();
        conversation.handle(Event::StartInput);

        let commands = conversation.handle(Event::Inbound(REPLY.to_string()));

        assert!(matches!(commands.as_slice(), [Command::Publish(BusEvent::MessageAdded(_))]));
        assert_eq!(conversation.phase(), Phase::Capturing);
    }

    #[test]
    fn new_reply_supersedes_current() {
        let mut conversation = responding();
        let first = conversation.turn();

        let commands = conversation.handle(Event::Inbound(REPLY.to_string()));

        assert_eq!(commands[0], Command::StopAudio);
        assert!(conversation.turn() > first);
        assert!(!plays_audio(&conversation.handle(Event::Synthesized {
            turn: first,
            audio: Some(vec![0; 2]),
        })));
    }

    #[test]
    fn voice_turn_sends_transcript() {
        let mut conversation = connected();
        conversation.handle(Event::StartInput);
        let turn = conversation.turn();

        let commands = conversation.handle(Event::SubmitAudio(vec![9; 8]));
        assert_eq!(
            commands,
            vec![Command::Transcribe {
                turn,
                audio: vec![9; 8]
            }]
        );

        let commands = conversation.handle(Event::Transcribed {
            turn,
            text: Some("how are you".to_string()),
        });
        assert!(commands.contains(&Command::Send(Envelope::message("how are you", ""))));
        assert_eq!(conversation.phase(), Phase::AwaitingReply);
    }

    #[test]
    fn empty_transcript_returns_to_idle() {
        let mut conversation = connected();
        conversation.handle(Event::StartInput);
        let turn = conversation.turn();
        conversation.handle(Event::SubmitAudio(vec![0; 4]));

        conversation.handle(Event::Transcribed { turn, text: None });

        assert_eq!(conversation.phase(), Phase::Idle);
    }

    #[test]
    fn text_while_disconnected_is_logged_only() {
        let mut conversation = conversation();
        conversation.start();

        let commands = conversation.handle(Event::SubmitText("anyone?".to_string()));

        assert!(!commands.iter().any(|c| matches!(c, Command::Send(_))));
        assert!(commands.iter().any(|c| matches!(c, Command::Publish(BusEvent::MessageAdded(u)) if u.is_user())));
        assert_eq!(conversation.phase(), Phase::Idle);
    }

    #[test]
    fn whitespace_text_is_ignored() {
        let mut conversation = connected();

        assert!(conversation.handle(Event::SubmitText("  \n".to_string())).is_empty());
    }

    #[test]
    fn muted_session_is_text_only() {
        let mut conversation = connected();
        let commands = conversation.handle(Event::SoundToggled(false));
        assert_eq!(
            commands,
            vec![Command::StopAudio, Command::Publish(BusEvent::SoundToggle(false))]
        );

        conversation.handle(Event::SubmitText("hi".to_string()));
        let commands = conversation.handle(Event::Inbound(REPLY.to_string()));
        assert!(!commands.iter().any(|c| matches!(c, Command::Synthesize { .. })));
        assert!(commands.contains(&Command::PlayAction(ActionCue::once("idle_6"))));
    }

    #[test]
    fn disconnect_abandons_turn() {
        let mut conversation = responding();
        let turn = conversation.turn();

        let commands = conversation.handle(Event::Link(LinkEvent::Disconnected));

        assert!(commands.contains(&Command::StopAudio));
        assert!(commands.contains(&Command::SetBrightness(0.6)));
        assert!(commands.contains(&Command::Publish(BusEvent::ConnectionStatusChanged(
            ConnectionState::Disconnected
        ))));
        assert_eq!(conversation.phase(), Phase::Idle);
        assert!(!plays_audio(&conversation.handle(Event::Synthesized {
            turn,
            audio: Some(vec![1]),
        })));
    }

    #[test]
    fn hang_up_closes() {
        let mut conversation = connected();

        let commands = conversation.handle(Event::HangUp);

        assert_eq!(commands, vec![Command::Publish(BusEvent::CallEnded), Command::Close]);
    }

    #[test]
    fn reply_without_cue_ends_with_playback() {
        let mut conversation = connected();
        conversation.handle(Event::Inbound(
            r#"{"event":"message_response","data":{"answer":"Hi"}}"#.to_string(),
        ));
        let turn = conversation.turn();
        assert_eq!(conversation.phase(), Phase::Responding);

        conversation.handle(Event::Synthesized {
            turn,
            audio: Some(vec![0; 2]),
        });
        assert_eq!(conversation.phase(), Phase::Responding);

        conversation.handle(Event::PlaybackFinished { turn });
        assert_eq!(conversation.phase(), Phase::Idle);
    }

    #[test]
    fn speech_outliving_the_cue_still_plays() {
        let mut conversation = responding();
        let turn = conversation.turn();
        conversation.handle(Event::ActionFinished {
            name: "idle_6".to_string(),
        });
        assert_eq!(conversation.phase(), Phase::Idle);

        let commands = conversation.handle(Event::Synthesized {
            turn,
            audio: Some(vec![0; 4]),
        });

        assert!(plays_audio(&commands));
        assert_eq!(conversation.phase(), Phase::Idle);
    }

    #[test]
    fn talking_over_lingering_speech_stops_it() {
        let mut conversation = responding();
        let turn = conversation.turn();
        conversation.handle(Event::Synthesized {
            turn,
            audio: Some(vec![0; 4]),
        });
        conversation.handle(Event::ActionFinished {
            name: "idle_6".to_string(),
        });

        let commands = conversation.handle(Event::StartInput);

        assert_eq!(commands, vec![Command::StopAudio]);
        assert_eq!(conversation.phase(), Phase::Capturing);
    }

    #[test]
    fn finished_speech_needs_no_stop() {
        let mut conversation = responding();
        let turn = conversation.turn();
        conversation.handle(Event::Synthesized {
            turn,
            audio: Some(vec![0; 4]),
        });
        conversation.handle(Event::ActionFinished {
            name: "idle_6".to_string(),
        });
        conversation.handle(Event::PlaybackFinished { turn });

        assert!(conversation.handle(Event::StartInput).is_empty());
    }

    #[test]
    fn restarting_capture_discards_pending_transcript() {
        let mut conversation = connected();
        conversation.handle(Event::StartInput);
        let first = conversation.turn();
        conversation.handle(Event::SubmitAudio(vec![1; 4]));

        conversation.handle(Event::StartInput);
        let second = conversation.turn();
        assert!(second > first);
        assert_eq!(conversation.phase(), Phase::Capturing);

        let commands = conversation.handle(Event::SubmitAudio(vec![2; 4]));
        assert_eq!(
            commands,
            vec![Command::Transcribe {
                turn: second,
                audio: vec![2; 4]
            }]
        );
        assert!(conversation
            .handle(Event::Transcribed {
                turn: first,
                text: Some("old".to_string()),
            })
            .is_empty());
    }
}
