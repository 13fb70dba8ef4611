use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::llm::{LlmClient, Message};
use crate::sandbox::SandboxRoot;
use crate::skills::{SkillContext, SkillRegistry, ToolDescriptor};

use super::events::{AgentEvent, ApprovalGate, EventSink};
use super::invocation::{parse_invocation, strip_tool_markup};
use super::preamble::load_preamble;

/// Tool whose invocations must pass the approval gate.
pub const GATED_TOOL: &str = "execute_command";

/// Observation recorded when the operator refuses a command.
pub const DENIAL_TEXT: &str = "Command execution denied by user.";

/// Outcome of one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The model's final answer.
    Answer(String),
    /// The model service could not be reached or returned an error.
    ServiceFailure(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer(text) | Reply::ServiceFailure(text) => text,
        }
    }
}

/// The agent: conversation state plus the Think-Act-Observe loop.
///
/// History is append-only between resets. The assistant's raw completion,
/// tool-call markup included, is what gets recorded; tool results come back
/// as `user` observations.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    skills: SkillRegistry,
    descriptors: Vec<ToolDescriptor>,
    context: SkillContext,
    preamble: Option<String>,
    keep_preamble_on_reset: bool,
    history: Vec<Message>,
}

impl Agent {
    /// Builds an agent over `root`, seeding the history with the workspace
    /// preamble when one exists.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        skills: SkillRegistry,
        root: SandboxRoot,
        config: &AgentConfig,
    ) -> Self {
        let preamble = load_preamble(root.path());
        if preamble.is_some() {
            info!("Loaded context preamble from workspace");
        }
        let descriptors = skills.descriptors();

        let mut agent = Self {
            llm,
            skills,
            descriptors,
            context: SkillContext { root },
            preamble,
            keep_preamble_on_reset: config.keep_preamble_on_reset,
            history: Vec::new(),
        };
        agent.seed();
        agent
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn llm_description(&self) -> String {
        self.llm.description()
    }

    /// Runs the Think-Act-Observe loop for one prompt.
    ///
    /// Tool failures never end the loop; they are folded back as
    /// observations. Only a model-service failure ends it early.
    pub async fn think_act_observe(
        &mut self,
        prompt: &str,
        gate: Option<&dyn ApprovalGate>,
        sink: Option<&dyn EventSink>,
    ) -> Reply {
        self.history.push(Message::user(prompt));

        loop {
            // ── Think ─────────────────────────────────────
            let completion = match self.llm.complete(&self.history, &self.descriptors).await {
                Ok(response) => response.text,
                Err(e) => {
                    warn!("Model service failed: {e:#}");
                    return Reply::ServiceFailure(format!(
                        "Error communicating with {}: {e}",
                        self.llm.description()
                    ));
                }
            };
            self.history.push(Message::assistant(completion.clone()));

            let Some(invocation) = parse_invocation(&completion) else {
                debug!("Completion has no tool call, returning answer");
                return Reply::Answer(completion);
            };

            let thinking = strip_tool_markup(&completion);
            if !thinking.is_empty() {
                emit(sink, AgentEvent::Thinking(thinking)).await;
            }

            // ── Act ───────────────────────────────────────
            if invocation.name == GATED_TOOL {
                if let Some(gate) = gate {
                    let command = invocation.command_text();
                    if !gate.approve(&command).await {
                        info!("Command denied by operator: {command}");
                        self.observe(&invocation.name, DENIAL_TEXT);
                        continue;
                    }
                }
            }

            info!("Tool call: {}", invocation.name);
            emit(
                sink,
                AgentEvent::ToolCall {
                    tool: invocation.name.clone(),
                    args: invocation.arguments.clone(),
                },
            )
            .await;

            let result = self
                .skills
                .execute(&invocation.name, Value::Object(invocation.arguments), &self.context)
                .await;

            emit(
                sink,
                AgentEvent::ToolOutput {
                    tool: invocation.name.clone(),
                    content: result.clone(),
                },
            )
            .await;

            // ── Observe ───────────────────────────────────
            self.observe(&invocation.name, &result);
        }
    }

    /// Clears the conversation. The preamble is put back only when
    /// `keep_preamble_on_reset` is set.
    pub fn reset(&mut self) {
        self.history.clear();
        if self.keep_preamble_on_reset {
            self.seed();
        }
        info!("Conversation reset ({} messages kept)", self.history.len());
    }

    fn seed(&mut self) {
        if let Some(ref preamble) = self.preamble {
            self.history.push(Message::system(preamble.clone()));
        }
    }

    fn observe(&mut self, tool: &str, result: &str) {
        self.history
            .push(Message::user(format!("Tool '{tool}' result: {result}")));
    }
}

async fn emit(sink: Option<&dyn EventSink>, event: AgentEvent) {
    if let Some(sink) = sink {
        sink.emit(event).await;
    }
}
