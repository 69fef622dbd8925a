//! Session actor
//!
//! One task owns the [`Conversation`] and applies every event to it in
//! arrival order. Speech calls, playback and handshakes run as spawned tasks
//! and post their outcome back as events, so the loop never waits on I/O.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::ambient::AmbientRotation;
use super::machine::{Command, Conversation, Event, LinkEvent};
use crate::bus::EventBus;
use crate::config::Config;
use crate::presenter::Presenter;
use crate::speech::{Synthesizer, Transcriber};
use crate::transport::{Channel, ChannelEvent, Connector};
use crate::voice::{AudioSink, codec};

/// Message accepted by the actor
#[derive(Debug)]
pub enum SessionInput {
    Event(Event),
    Shutdown,
}

/// Cloneable front door to a running [`Orchestrator`]
#[derive(Clone)]
pub struct OrchestratorHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
}

impl OrchestratorHandle {
    /// Create a handle and the queue the orchestrator reads from
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionInput>) {
        let (inputs, rx) = mpsc::unbounded_channel();
        (Self { inputs }, rx)
    }

    fn post(&self, event: Event) {
        if self.inputs.send(SessionInput::Event(event)).is_err() {
            tracing::debug!("session stopped, input dropped");
        }
    }

    /// The user started talking or typing
    pub fn start_input(&self) {
        self.post(Event::StartInput);
    }

    /// Submit a typed message
    pub fn submit_text(&self, text: impl Into<String>) {
        self.post(Event::SubmitText(text.into()));
    }

    /// Submit a finished WAV recording
    pub fn submit_audio(&self, wav: Vec<u8>) {
        self.post(Event::SubmitAudio(wav));
    }

    /// The presenter finished playing `name`
    pub fn action_finished(&self, name: impl Into<String>) {
        self.post(Event::ActionFinished { name: name.into() });
    }

    /// Switch speech output on or off
    pub fn toggle_sound(&self, enabled: bool) {
        self.post(Event::SoundToggled(enabled));
    }

    /// Open the session
    pub fn call(&self) {
        self.post(Event::CallRequested);
    }

    /// Close the session
    pub fn hang_up(&self) {
        self.post(Event::HangUp);
    }

    /// Stop the orchestrator
    pub fn shutdown(&self) {
        let _ = self.inputs.send(SessionInput::Shutdown);
    }
}

/// Collaborators the orchestrator drives
pub struct Services {
    pub connector: Arc<dyn Connector>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub sink: Arc<dyn AudioSink>,
    pub presenter: Arc<dyn Presenter>,
    pub bus: Arc<EventBus>,
}

/// Session actor
pub struct Orchestrator {
    conversation: Conversation,
    channel: Arc<Channel>,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    address: String,
    services: Services,
    inputs: mpsc::UnboundedReceiver<SessionInput>,
    results: mpsc::UnboundedSender<Event>,
    results_rx: mpsc::UnboundedReceiver<Event>,
}

impl Orchestrator {
    /// Build an orchestrator reading from `inputs`
    #[must_use]
    pub fn new(
        config: &Config,
        services: Services,
        inputs: mpsc::UnboundedReceiver<SessionInput>,
    ) -> Self {
        let conversation = Conversation::new(config, AmbientRotation::new(&config.ambient));
        Self::with_conversation(config, conversation, services, inputs)
    }

    /// Build an orchestrator around an existing conversation
    #[must_use]
    pub fn with_conversation(
        config: &Config,
        conversation: Conversation,
        services: Services,
        inputs: mpsc::UnboundedReceiver<SessionInput>,
    ) -> Self {
        let (channel, channel_events) =
            Channel::new(Arc::clone(&services.connector), config.server.max_message_size);
        let (results, results_rx) = mpsc::unbounded_channel();

        Self {
            conversation,
            channel: Arc::new(channel),
            channel_events,
            address: config.server.url.clone(),
            services,
            inputs,
            results,
            results_rx,
        }
    }

    /// Run until shutdown is requested or every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(server = %self.address, "session started");
        let commands = self.conversation.start();
        self.execute(commands);

        loop {
            let event = tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(SessionInput::Event(event)) => event,
                    Some(SessionInput::Shutdown) | None => break,
                },
                Some(event) = self.results_rx.recv() => event,
                Some(event) = self.channel_events.recv() => match link_event(event) {
                    Some(event) => event,
                    None => continue,
                },
            };

            let before = self.conversation.phase();
            let commands = self.conversation.handle(event);
            let after = self.conversation.phase();
            if before != after {
                tracing::debug!(from = ?before, to = ?after, turn = %self.conversation.turn(), "phase changed");
            }
            self.execute(commands);
        }

        self.services.sink.stop();
        self.channel.close();
        tracing::info!("session stopped");
    }

    fn execute(&self, commands: Vec<Command>) {
        for command in commands {
            self.execute_one(command);
        }
    }

    fn execute_one(&self, command: Command) {
        match command {
            Command::Connect => {
                let channel = Arc::clone(&self.channel);
                let address = self.address.clone();
                tokio::spawn(async move {
                    // Outcome arrives as a channel event
                    if let Err(e) = channel.connect(&address).await {
                        tracing::debug!(error = %e, "connect attempt ended");
                    }
                });
            }
            Command::Close => self.channel.close(),
            Command::Send(envelope) => self.channel.send(&envelope),
            Command::Transcribe { turn, audio } => {
                let transcriber = Arc::clone(&self.services.transcriber);
                let results = self.results.clone();
                tokio::spawn(async move {
                    let text = transcriber.transcribe(audio).await;
                    let _ = results.send(Event::Transcribed { turn, text });
                });
            }
            Command::Synthesize {
                turn,
                text,
                emotion,
            } => {
                let synthesizer = Arc::clone(&self.services.synthesizer);
                let results = self.results.clone();
                tokio::spawn(async move {
                    let audio = synthesizer.synthesize(text, emotion).await;
                    let _ = results.send(Event::Synthesized { turn, audio });
                });
            }
            Command::PlayAudio { turn, audio } => {
                let results = self.results.clone();
                let buffer = match codec::decode(&audio) {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping playback of undecodable audio");
                        let _ = results.send(Event::PlaybackFinished { turn });
                        return;
                    }
                };

                let sink = Arc::clone(&self.services.sink);
                tokio::spawn(async move {
                    tracing::debug!(%turn, duration = ?buffer.duration(), "playing reply");
                    if let Err(e) = sink.play(buffer).await {
                        tracing::warn!(error = %e, "playback failed");
                    }
                    let _ = results.send(Event::PlaybackFinished { turn });
                });
            }
            Command::StopAudio => self.services.sink.stop(),
            Command::PlayAction(cue) => self.services.presenter.play_action(&cue),
            Command::SetBrightness(level) => {
                self.services.presenter.set_brightness(level.clamp(0.0, 1.0));
            }
            Command::Publish(event) => self.services.bus.publish(&event),
        }
    }
}

fn link_event(event: ChannelEvent) -> Option<Event> {
    Some(match event {
        ChannelEvent::Progress(text) => Event::Link(LinkEvent::Progress(text)),
        ChannelEvent::Connected => Event::Link(LinkEvent::Connected),
        ChannelEvent::Failed(reason) => Event::Link(LinkEvent::Failed(reason)),
        ChannelEvent::Disconnected => Event::Link(LinkEvent::Disconnected),
        ChannelEvent::MessageReceived(text) => Event::Inbound(text),
        ChannelEvent::SendFailed(reason) => {
            tracing::warn!(%reason, "outbound message lost");
            return None;
        }
    })
}
