pub mod human;
pub mod json;
pub mod replacer;

use crate::domain::LogEvent;
use crate::error::LoggerError;
use serde::{Deserialize, Serialize};

pub use human::HumanRenderer;
pub use json::{JsonRenderer, LogRecord};

/// Projects a normalized event into one output line (or block).
pub trait Render: Send + Sync {
    fn render(&self, event: &LogEvent) -> Result<String, LoggerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    Json,
    Human,
}

/// Both projections, rendered at most once per event.
#[derive(Debug, Clone)]
pub struct Renderers {
    pub json: JsonRenderer,
    pub human: HumanRenderer,
}

impl Renderers {
    pub fn new(service: impl Into<String>, colorize: bool) -> Self {
        Self {
            json: JsonRenderer::new(service),
            human: HumanRenderer::new(colorize),
        }
    }

    pub fn get(&self, kind: RendererKind) -> &dyn Render {
        match kind {
            RendererKind::Json => &self.json,
            RendererKind::Human => &self.human,
        }
    }
}

/// Lazily rendered lines for one event, shared by all destinations.
pub struct RenderCache<'a> {
    renderers: &'a Renderers,
    event: &'a LogEvent,
    json: Option<Result<String, String>>,
    human: Option<Result<String, String>>,
}

impl<'a> RenderCache<'a> {
    pub fn new(renderers: &'a Renderers, event: &'a LogEvent) -> Self {
        Self {
            renderers,
            event,
            json: None,
            human: None,
        }
    }

    /// The rendered line, or the render error's message.
    pub fn line(&mut self, kind: RendererKind) -> Result<&str, &str> {
        let renderers = self.renderers;
        let event = self.event;
        let slot = match kind {
            RendererKind::Json => &mut self.json,
            RendererKind::Human => &mut self.human,
        };
        let rendered = slot.get_or_insert_with(|| {
            renderers
                .get(kind)
                .render(event)
                .map_err(|e| e.to_string())
        });
        match rendered {
            Ok(line) => Ok(line.as_str()),
            Err(reason) => Err(reason.as_str()),
        }
    }
}
