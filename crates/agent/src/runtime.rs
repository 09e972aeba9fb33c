//! Interactive loop: generate, step, stream, repeat.
//!
//! The runtime keeps a running token buffer. Each iteration appends the
//! generated tokens, then the tokenized feedback text, so the backend
//! always continues the exact transcript the session rendered.

use std::sync::Arc;

use agentrl_core::{GenerateRequest, LlmEngine, Message, Prompt, Result, Role};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::RuntimeEvent;
use crate::session::{AgentSession, SessionInput};

const BUDGET_EXHAUSTED: &str = "Max steps reached without final response.";

/// Generation settings applied to every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeSettings {
    pub max_new_tokens_per_step: u32,
    pub temperature: f32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_new_tokens_per_step: 10240,
            temperature: 0.6,
        }
    }
}

/// Coordinates the language model with a session at inference time.
pub struct AgentRuntime {
    engine: Arc<dyn LlmEngine>,
    session: AgentSession,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(engine: Arc<dyn LlmEngine>, session: AgentSession) -> Self {
        Self {
            engine,
            session,
            settings: RuntimeSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> RuntimeSettings {
        self.settings
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    /// Drive one trajectory, sending every produced message to `tx`.
    ///
    /// Ends with a `Done` event. Backend failures are returned as errors;
    /// a dropped receiver stops the loop quietly.
    pub async fn run_steps(&mut self, messages: Vec<Message>, tx: &mpsc::Sender<RuntimeEvent>) -> Result<()> {
        let prompt = self.session.initialize(SessionInput::Messages(messages));
        let mut prompt_ids = self.engine.tokenize(&prompt).await?;
        let max_steps = self.session.environment().max_steps();

        for step in 1..=max_steps {
            let request = GenerateRequest {
                prompt: Prompt::Tokens(prompt_ids.clone()),
                max_tokens: self.settings.max_new_tokens_per_step,
                temperature: self.settings.temperature,
            };
            let generation = self.engine.generate(request).await?;
            prompt_ids.extend_from_slice(&generation.token_ids);

            debug!(
                session_id = %self.session.id(),
                step,
                generated = generation.token_ids.len(),
                "Generated action"
            );

            let result = self.session.step_from_text(&generation.text, None).await?;
            let observation = result.observation;

            for message in observation.feedback_messages {
                if tx.send(RuntimeEvent::Message { message }).await.is_err() {
                    return Ok(());
                }
            }

            if observation.done {
                let _ = tx.send(RuntimeEvent::Done { steps: step, terminated: true }).await;
                return Ok(());
            }

            if !observation.feedback_text.is_empty() {
                let feedback_ids = self.engine.tokenize(&observation.feedback_text).await?;
                prompt_ids.extend(feedback_ids);
            }
        }

        warn!(session_id = %self.session.id(), max_steps, "Step budget exhausted");
        let message = Message::assistant(BUDGET_EXHAUSTED);
        if tx.send(RuntimeEvent::Message { message }).await.is_ok() {
            let _ = tx.send(RuntimeEvent::Done { steps: max_steps, terminated: false }).await;
        }
        Ok(())
    }

    /// Run the loop on a background task and stream its events.
    ///
    /// Errors arrive as a final `Error` event.
    pub fn run_stream(mut self, messages: Vec<Message>) -> mpsc::Receiver<RuntimeEvent> {
        let (tx, rx) = mpsc::channel::<RuntimeEvent>(128);

        tokio::spawn(async move {
            if let Err(e) = self.run_steps(messages, &tx).await {
                warn!(error = %e, "Runtime aborted");
                let _ = tx.send(RuntimeEvent::Error { message: e.to_string() }).await;
            }
        });

        rx
    }

    /// Content of the last assistant message without tool calls.
    pub async fn run_final(&mut self, messages: Vec<Message>) -> Result<Option<String>> {
        let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(128);

        let run = async {
            let tx = tx;
            self.run_steps(messages, &tx).await
        };
        let collect = async {
            let mut final_text = None;
            while let Some(event) = rx.recv().await {
                if let RuntimeEvent::Message { message } = event {
                    if message.role == Role::Assistant && message.tool_calls.is_empty() {
                        if let Some(content) = message.content.filter(|c| !c.is_empty()) {
                            final_text = Some(content);
                        }
                    }
                }
            }
            final_text
        };

        let (outcome, final_text) = tokio::join!(run, collect);
        outcome?;
        Ok(final_text)
    }
}
