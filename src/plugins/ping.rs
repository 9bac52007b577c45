//! Demo `ping` plugin
//!
//! `ping [content]` and `ping2 -r <content>` echo their input back, falling
//! back to `default_reply` from `config/ping.json`.

use async_trait::async_trait;
use clap::{Arg, Command};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

use crate::application::errors::BotError;
use crate::application::messaging::{ClapGrammar, CommandRegistration, Flow, HandlerResult};
use crate::application::{Bot, SendOptions};
use crate::domain::entities::{MessageEvent, Segment};
use crate::domain::traits::{Dependencies, Plugin};

/// Catalog export id
pub const EXPORT: &str = "ping";

const DESCRIPTION: &str = "检查Bot是否在线, 并返回指定内容";

pub struct PingPlugin {
    bot: Arc<Bot>,
}

impl PingPlugin {
    pub fn new(bot: Arc<Bot>) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Plugin for PingPlugin {
    fn name(&self) -> &str {
        "ping"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::from([("help".to_string(), "^1.0.0".to_string())])
    }

    fn default_config(&self) -> Value {
        json!({ "default_reply": "pong" })
    }

    async fn init(&mut self, config: &Value) -> Result<(), BotError> {
        let default_reply = config
            .get("default_reply")
            .and_then(Value::as_str)
            .unwrap_or("pong")
            .to_string();

        let bot = Arc::downgrade(&self.bot);
        self.bot.register(
            CommandRegistration::new(self.name(), "ping", move |ctx| {
                let content = ctx.arg(0).unwrap_or_default().to_string();
                echo(bot.clone(), ctx.event, content)
            })
            .with_grammar(ClapGrammar::new(
                Command::new("ping").about(DESCRIPTION).arg(
                    Arg::new("content")
                        .help("要回复的内容")
                        .default_value(default_reply.clone()),
                ),
            )),
        );

        let bot = Arc::downgrade(&self.bot);
        self.bot.register(
            CommandRegistration::new(self.name(), "ping2", move |ctx| {
                let content = ctx
                    .params
                    .get("reply")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                echo(bot.clone(), ctx.event, content)
            })
            .with_grammar(ClapGrammar::new(
                Command::new("ping2").about(DESCRIPTION).arg(
                    Arg::new("reply")
                        .short('r')
                        .long("reply")
                        .value_name("content")
                        .help("要回复的内容")
                        .default_value(default_reply),
                ),
            )),
        );

        Ok(())
    }
}

async fn echo(bot: Weak<Bot>, event: Arc<MessageEvent>, content: String) -> HandlerResult {
    if let Some(bot) = bot.upgrade() {
        bot.send_msg(event.as_ref(), vec![Segment::text(content)], SendOptions::plain())
            .await?;
    }
    Ok(Flow::Continue)
}
