//! One trajectory: conversation history, codec and environment glued
//! together.
//!
//! ```text
//!   initialize(input) ──▶ prompt (system + seeded turns + tools + generation prompt)
//!   step_from_text(text) ──parse──▶ Action ──env.step──▶ observations ──▶ Observation (+ reward)
//! ```

use std::sync::Arc;

use agentrl_core::{
    Action, Conversation, DomainEvent, EventBus, Message, Observation, Question, Result,
    RewardSample, Role,
};
use agentrl_env::Environment;
use agentrl_protocol::ChatProtocol;
use agentrl_rewards::RewardPipeline;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

/// Prior turns a trajectory starts from.
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// Messages appended verbatim after the system prompt.
    Messages(Vec<Message>),
    /// A previously rendered transcript, decoded with the session's protocol.
    Completion(String),
}

impl From<Vec<Message>> for SessionInput {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

impl From<String> for SessionInput {
    fn from(text: String) -> Self {
        Self::Completion(text)
    }
}

impl From<&str> for SessionInput {
    fn from(text: &str) -> Self {
        Self::Completion(text.to_string())
    }
}

/// What to do with system messages found inside a seeded transcript.
///
/// The environment's own system prompt always comes first. Keeping the
/// embedded one as well yields two system messages in history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SystemPromptSeeding {
    #[default]
    KeepEmbedded,
    DropEmbedded,
}

/// What one step produced.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    /// Set when a label was supplied and a reward pipeline is configured
    pub reward: Option<f64>,
}

/// Maintains chat history and bridges the protocol with the environment.
pub struct AgentSession {
    id: String,
    environment: Box<dyn Environment>,
    protocol: Arc<dyn ChatProtocol>,
    reward_pipeline: Option<Arc<RewardPipeline>>,
    seeding: SystemPromptSeeding,
    event_bus: Option<Arc<EventBus>>,
    history: Conversation,
    initial_question: Vec<Message>,
}

impl AgentSession {
    pub fn new(environment: Box<dyn Environment>, protocol: Arc<dyn ChatProtocol>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            environment,
            protocol,
            reward_pipeline: None,
            seeding: SystemPromptSeeding::default(),
            event_bus: None,
            history: Conversation::new(),
            initial_question: Vec::new(),
        }
    }

    pub fn with_reward_pipeline(mut self, pipeline: Arc<RewardPipeline>) -> Self {
        self.reward_pipeline = Some(pipeline);
        self
    }

    pub fn with_seeding(mut self, seeding: SystemPromptSeeding) -> Self {
        self.seeding = seeding;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    pub fn protocol(&self) -> &dyn ChatProtocol {
        self.protocol.as_ref()
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    /// The turns the trajectory was seeded with.
    pub fn initial_question(&self) -> &[Message] {
        &self.initial_question
    }

    /// Reset the environment and history, seed prior turns, and return the
    /// first prompt (tools included, generation prompt appended).
    pub fn initialize(&mut self, input: impl Into<SessionInput>) -> String {
        self.environment.reset_step();

        self.initial_question = match input.into() {
            SessionInput::Messages(messages) => messages,
            SessionInput::Completion(text) => {
                let parsed = self.protocol.parse_messages_from_completion_text(&text);
                match self.seeding {
                    SystemPromptSeeding::KeepEmbedded => parsed,
                    SystemPromptSeeding::DropEmbedded => {
                        parsed.into_iter().filter(|m| m.role != Role::System).collect()
                    }
                }
            }
        };

        self.history.reset(self.environment.system_prompt());
        self.history.extend(self.initial_question.iter().cloned());

        info!(
            session_id = %self.id,
            environment = self.environment.name(),
            protocol = self.protocol.name(),
            seeded = self.initial_question.len(),
            "Session initialized"
        );

        self.protocol
            .render(self.history.messages(), &self.environment.tools_manifest(), true)
    }

    /// Apply a parsed assistant action to the environment.
    ///
    /// `raw_text` replaces the recorded content when the action failed to
    /// parse and carries no salvageable tool calls.
    pub async fn step(
        &mut self,
        action: &Action,
        label: Option<&Value>,
        raw_text: Option<&str>,
    ) -> Result<StepResult> {
        let mut action_message = action.to_message();
        if action.has_parse_error() && action.tool_calls.is_empty() {
            if let Some(raw) = raw_text {
                action_message.content = Some(raw.to_string());
                action_message.reasoning_content = None;
            }
        }
        self.history.push(action_message.clone());

        let outcome = self.environment.step(action).await?;
        let step_index = self.environment.step_index();
        let done = outcome.terminated;

        debug!(
            session_id = %self.id,
            step_index,
            calls = action.tool_calls.len(),
            observations = outcome.observations.len(),
            done,
            "Step applied"
        );

        // Snapshot before the tool messages land in history.
        let sample = (label.is_some() && self.reward_pipeline.is_some()).then(|| RewardSample {
            question: Some(Question::Messages(self.initial_question.clone())),
            process_messages: self.history.tail(1 + self.initial_question.len()).to_vec(),
        });

        let tool_messages: Vec<Message> = outcome.observations.into_iter().map(Message::tool).collect();
        self.history.extend(tool_messages.iter().cloned());

        let protocol = &self.protocol;
        let observation = Observation::new(step_index, action_message, tool_messages, done, |messages| {
            protocol.render(messages, &[], true)
        });

        self.publish(DomainEvent::StepCompleted {
            session_id: self.id.clone(),
            step_index,
            observations: observation.tool_messages().len(),
            done,
            timestamp: Utc::now(),
        });

        let reward = match (&self.reward_pipeline, label) {
            (Some(pipeline), Some(label)) => {
                let reward = pipeline.score(action, Some(label), done, sample.as_ref()).await;
                self.publish(DomainEvent::RewardScored {
                    session_id: self.id.clone(),
                    step_index,
                    reward,
                    timestamp: Utc::now(),
                });
                Some(reward)
            }
            _ => None,
        };

        Ok(StepResult { observation, reward })
    }

    /// Parse raw model text and forward it to [`step`](Self::step).
    pub async fn step_from_text(&mut self, text: &str, label: Option<&Value>) -> Result<StepResult> {
        let action = self.protocol.parse_assistant_text(text);
        self.step(&action, label, Some(text)).await
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("id", &self.id)
            .field("environment", &self.environment.name())
            .field("protocol", &self.protocol.name())
            .field("history", &self.history.len())
            .finish()
    }
}
