use std::io::{IsTerminal, Read};

use coinfeed_core::ProviderId;
use serde_json::json;

use crate::cli::NotifyArgs;
use crate::error::CliError;
use crate::notify::{NotifyError, TelegramNotifier};

use super::CommandResult;

pub async fn run(args: &NotifyArgs, provider: ProviderId) -> Result<CommandResult, CliError> {
    let message = message_from_args(args)?;
    let notifier = TelegramNotifier::from_overrides(args.token.as_deref(), args.chat_id.as_deref())?;
    notifier.send(&message, args.parse_mode.as_deref()).await?;

    Ok(CommandResult::ok(
        json!({ "sent": true, "chars": message.chars().count() }),
        provider,
    ))
}

fn message_from_args(args: &NotifyArgs) -> Result<String, CliError> {
    if let Some(message) = args.message.as_deref().filter(|text| !text.trim().is_empty()) {
        return Ok(message.to_owned());
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(NotifyError::EmptyMessage.into());
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Err(NotifyError::EmptyMessage.into());
    }
    Ok(trimmed.to_owned())
}
