//! Built-in `help` command
//!
//! `help` lists every visible command, `help <name>` prints the usage of one.

use async_trait::async_trait;
use clap::{Arg, Command};
use serde_json::Value;
use std::sync::{Arc, Weak};

use crate::application::errors::BotError;
use crate::application::messaging::{ClapGrammar, CommandRegistration, Flow};
use crate::application::{Bot, SendOptions};
use crate::domain::entities::Segment;
use crate::domain::traits::Plugin;

/// Catalog export id
pub const EXPORT: &str = "help";

pub struct HelpPlugin {
    bot: Arc<Bot>,
}

impl HelpPlugin {
    pub fn new(bot: Arc<Bot>) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Plugin for HelpPlugin {
    fn name(&self) -> &str {
        "help"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn auto_load_config(&self) -> bool {
        false
    }

    async fn init(&mut self, _config: &Value) -> Result<(), BotError> {
        let grammar = Command::new("help")
            .about("显示帮助信息")
            .arg(Arg::new("action").help("显示指定命令的帮助文档"));

        let bot = Arc::downgrade(&self.bot);
        self.bot.register(
            CommandRegistration::new(self.name(), "help", move |ctx| {
                let bot: Weak<Bot> = bot.clone();
                async move {
                    let Some(bot) = bot.upgrade() else {
                        return Ok(Flow::Continue);
                    };
                    let text = render(&bot, ctx.arg(0));
                    bot.send_msg(ctx.event.as_ref(), vec![Segment::text(text)], SendOptions::default())
                        .await?;
                    Ok(Flow::Continue)
                }
            })
            .with_grammar(ClapGrammar::new(grammar)),
        );
        Ok(())
    }
}

fn render(bot: &Bot, action: Option<&str>) -> String {
    let Some(action) = action else {
        let commands: Vec<String> = bot
            .command_list()
            .into_iter()
            .map(|command| format!("- {}: {}", command.name, command.description))
            .collect();
        return format!(
            "可用命令列表:\n{}help [命令名] 查询详细用法\n{}",
            bot.parser().primary_prefix(),
            commands.join("\n")
        );
    };

    bot.command_help(action)
        .unwrap_or_else(|| "未找到该命令的帮助信息".to_string())
}
