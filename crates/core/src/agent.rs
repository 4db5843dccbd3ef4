//! The observe / ask / act loop.
//!
//! ```text
//! Init -> Observing -> AwaitingModel -> Dispatching -> (Observing | AwaitingModel | Terminated)
//! ```
//!
//! `observe` requests produce their own observation, so the next state skips
//! straight to `AwaitingModel`. Every other executed action is followed by a
//! fresh capture.

use serde_json::Value;
use tracing::{info, warn};

use crate::actions::{self, ActionContext, ActionRequest, ActionResult};
use crate::artifacts::ArtifactSink;
use crate::catalog;
use crate::conversation::{strip_reasoning, Conversation};
use crate::error::Result;
use crate::model::ModelClient;
use crate::platform::Platform;
use crate::settings::Settings;
use crate::sleep::sleep_secs;
use crate::types::ScreenDimensions;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub target: ScreenDimensions,
    pub max_steps: usize,
    pub keep_images: usize,
    pub keep_reasoning: usize,
    pub step_delay_secs: f64,
}

impl From<&Settings> for AgentConfig {
    fn from(s: &Settings) -> Self {
        Self {
            target: s.target(),
            max_steps: s.max_steps,
            keep_images: s.keep_last_screenshots,
            keep_reasoning: s.keep_last_reasoning,
            step_delay_secs: s.step_delay_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model replied without requesting an action.
    Completed,
    /// `max_steps` model exchanges were used up.
    StepLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Latest assistant text. Reasoning is removed when the run completed.
    pub text: String,
    /// Model exchanges performed.
    pub steps: usize,
    pub reason: StopReason,
}

enum LoopState {
    Init,
    Observing,
    AwaitingModel,
    Dispatching(Vec<ActionRequest>),
    Terminated(StopReason),
}

pub struct Agent<'a> {
    platform: &'a mut dyn Platform,
    model: &'a mut dyn ModelClient,
    sink: &'a mut dyn ArtifactSink,
    config: AgentConfig,
    tools: Value,
    conversation: Conversation,
    screen: ScreenDimensions,
    steps: usize,
}

impl<'a> Agent<'a> {
    pub fn new(
        platform: &'a mut dyn Platform,
        model: &'a mut dyn ModelClient,
        sink: &'a mut dyn ArtifactSink,
        config: AgentConfig,
    ) -> Self {
        Self {
            platform,
            model,
            sink,
            config,
            tools: catalog::tools(),
            conversation: Conversation::new(),
            // replaced by the first observation
            screen: ScreenDimensions::new(1920, 1080),
            steps: 0,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Native size recorded by the latest observation.
    pub fn screen(&self) -> ScreenDimensions {
        self.screen
    }

    fn context(&mut self) -> ActionContext<'_> {
        ActionContext {
            platform: &mut *self.platform,
            screen: &mut self.screen,
            sink: &mut *self.sink,
            target: self.config.target,
        }
    }

    /// Run one task from a fresh conversation. Infrastructure errors end the run.
    pub fn run(&mut self, system_prompt: &str, task: &str) -> Result<RunOutcome> {
        let mut state = LoopState::Init;
        loop {
            state = match state {
                LoopState::Init => {
                    self.conversation = Conversation::seeded(system_prompt, task);
                    self.steps = 0;
                    info!(target: "agent", "task: {}", task);
                    LoopState::Observing
                }
                LoopState::Observing => {
                    let (obs, _) = self.context().observe()?;
                    self.conversation.push(actions::observation_entry(&obs));
                    self.conversation.prune_images(self.config.keep_images);
                    LoopState::AwaitingModel
                }
                LoopState::AwaitingModel => self.ask()?,
                LoopState::Dispatching(requests) => self.dispatch(requests)?,
                LoopState::Terminated(reason) => return Ok(self.finish(reason)),
            };
        }
    }

    fn ask(&mut self) -> Result<LoopState> {
        if self.steps >= self.config.max_steps {
            return Ok(LoopState::Terminated(StopReason::StepLimit));
        }
        self.steps += 1;
        info!(target: "agent", "step {}/{}", self.steps, self.config.max_steps);

        let reply = self.model.complete(self.conversation.entries(), &self.tools)?;
        let requests = reply.requests.clone();
        self.conversation.push(reply.into_entry());

        if requests.is_empty() {
            return Ok(LoopState::Terminated(StopReason::Completed));
        }
        Ok(LoopState::Dispatching(requests))
    }

    fn dispatch(&mut self, requests: Vec<ActionRequest>) -> Result<LoopState> {
        let (first, extra) = match requests.split_first() {
            Some(split) => split,
            None => return Ok(LoopState::Terminated(StopReason::Completed)),
        };
        if !extra.is_empty() {
            warn!(target: "agent", "{} extra action request(s) rejected", extra.len());
        }

        let result = actions::execute(first, &mut self.context())?;
        info!(target: "agent", "{} -> {}", first.name, result.outcome.to_payload());

        self.conversation.push(result.tool_entry());
        for req in extra {
            self.conversation.push(ActionResult::rejected(req).tool_entry());
        }
        let observed = match result.observation {
            Some(entry) => {
                self.conversation.push(entry);
                true
            }
            None => false,
        };

        self.conversation.prune_images(self.config.keep_images);
        self.conversation.prune_reasoning(self.config.keep_reasoning);

        if self.steps >= self.config.max_steps {
            return Ok(LoopState::Terminated(StopReason::StepLimit));
        }
        sleep_secs(self.config.step_delay_secs);
        Ok(if observed { LoopState::AwaitingModel } else { LoopState::Observing })
    }

    fn finish(&self, reason: StopReason) -> RunOutcome {
        let latest = self.conversation.last_assistant_text().unwrap_or_default();
        // an interrupted run hands back what the model last said, untouched
        let text = match reason {
            StopReason::Completed => strip_reasoning(latest),
            StopReason::StepLimit => latest.to_string(),
        };
        info!(target: "agent", "finished after {} step(s): {:?}", self.steps, reason);
        RunOutcome { text, steps: self.steps, reason }
    }
}

