use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::Result;
use crate::history::{Access, HistoryService};
use crate::message::{Message, Role};
use crate::storage;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands against the configured store
pub async fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let store = storage::connect(&config.store).await?;
    let service = HistoryService::new(store, config.history.clone());
    run_history(&service, config.admin.key.as_deref(), command).await
}

/// Execute one history command with an already constructed service
pub async fn run_history(
    service: &HistoryService,
    configured_admin_key: Option<&str>,
    command: HistoryCommand,
) -> Result<()> {
    match command {
        HistoryCommand::Show { id, last, json } => {
            let messages = service.history(&id, last).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else if messages.is_empty() {
                println!("{}", format!("No history for conversation {}", id).yellow());
            } else {
                println!("\nConversation {} ({} messages):", id.cyan(), messages.len());
                print_messages(&messages, 1);
            }
        }
        HistoryCommand::Page {
            id,
            page,
            size,
            json,
        } => {
            let descriptor = service.page(&id, page, size).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&descriptor)?);
                return Ok(());
            }
            if descriptor.messages.is_empty() {
                println!(
                    "{}",
                    format!("No messages on page {} of conversation {}", page, id).yellow()
                );
            } else {
                // Newest first, so number messages by their position from the end
                let first = descriptor.total - (descriptor.page - 1) * descriptor.size;
                print_messages_descending(&descriptor.messages, first);
            }
            println!(
                "Page {} of {} ({} messages total)",
                descriptor.page, descriptor.total_pages, descriptor.total
            );
            if descriptor.has_previous {
                println!(
                    "Use {} for newer messages.",
                    format!("--page {}", descriptor.page - 1).cyan()
                );
            }
            if descriptor.has_next {
                println!(
                    "Use {} for older messages.",
                    format!("--page {}", descriptor.page + 1).cyan()
                );
            }
        }
        HistoryCommand::Info { id, json } => {
            let info = service.info(&id).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else if !info.exists {
                println!("{}", format!("Conversation {} does not exist", id).yellow());
            } else {
                println!("Conversation: {}", info.conversation_id.cyan());
                println!("Messages:     {}", info.message_count);
                println!(
                    "Expires in:   {}s (~{}h)",
                    info.remaining_ttl, info.remaining_ttl_hours
                );
            }
        }
        HistoryCommand::Refresh { id } => {
            let outcome = service.refresh(&id).await;
            if outcome.refreshed {
                println!(
                    "{}",
                    format!(
                        "Refreshed conversation {} (expires in {}s)",
                        id, outcome.remaining_ttl
                    )
                    .green()
                );
            } else {
                println!("{}", format!("Conversation {} does not exist", id).yellow());
            }
        }
        HistoryCommand::Clear { id } => {
            service.clear(&id).await?;
            println!("{}", format!("Cleared conversation {}", id).green());
        }
        HistoryCommand::Check { ids } => {
            let check = service.batch_exists(&ids).await;
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.set_titles(prettytable::row!["ID".bold(), "Exists".bold()]);
            for (id, exists) in &check.exists {
                let marker = if *exists { "yes".green() } else { "no".red() };
                table.add_row(prettytable::row![id.cyan(), marker]);
            }
            table.printstd();
        }
        HistoryCommand::List {
            prefix,
            admin_key,
            json,
        } => {
            let access = Access::from_admin_key(configured_admin_key, admin_key.as_deref());
            let listing = service.conversations(access, &prefix).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
                return Ok(());
            }
            if listing.conversations.is_empty() {
                println!("{}", "No conversations found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.set_titles(prettytable::row![
                "ID".bold(),
                "Messages".bold(),
                "Expires In".bold()
            ]);
            for detail in &listing.conversations {
                table.add_row(prettytable::row![
                    detail.conversation_id.cyan(),
                    detail.message_count,
                    format_ttl(detail.remaining_ttl)
                ]);
            }
            println!("\nConversations ({}):", listing.total);
            table.printstd();
        }
    }

    Ok(())
}

fn message_table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.set_titles(prettytable::row![
        "#".bold(),
        "Role".bold(),
        "Content".bold(),
        "Created".bold()
    ]);
    table
}

fn add_message_row(table: &mut Table, number: usize, message: &Message) {
    let role = match message.role {
        Role::User => message.role.to_string().cyan(),
        Role::Assistant => message.role.to_string().green(),
        Role::System => message.role.to_string().magenta(),
    };
    let created = message
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    table.add_row(prettytable::row![number, role, preview(&message.content), created]);
}

fn print_messages(messages: &[Message], first: usize) {
    let mut table = message_table();
    for (i, message) in messages.iter().enumerate() {
        add_message_row(&mut table, first + i, message);
    }
    table.printstd();
}

fn print_messages_descending(messages: &[Message], first: usize) {
    let mut table = message_table();
    for (i, message) in messages.iter().enumerate() {
        add_message_row(&mut table, first.saturating_sub(i), message);
    }
    table.printstd();
}

/// Single-line preview of message content
fn preview(content: &str) -> String {
    const MAX_CHARS: usize = 60;
    let flat = content.replace('\n', " ");
    if flat.chars().count() > MAX_CHARS {
        let cut: String = flat.chars().take(MAX_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

fn format_ttl(seconds: i64) -> String {
    match seconds {
        s if s < 0 => "-".to_string(),
        s if s >= 3600 => format!("{}h {}m", s / 3600, (s % 3600) / 60),
        s if s >= 60 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}s", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use crate::error::MemoryError;
    use crate::storage::{ConversationStore, InMemoryConversationStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> (HistoryService, Arc<dyn ConversationStore>) {
        let store: Arc<dyn ConversationStore> =
            Arc::new(InMemoryConversationStore::new("t:", Duration::from_secs(60)));
        (
            HistoryService::new(Arc::clone(&store), HistoryConfig::default()),
            store,
        )
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(100);
        let short = preview(&long);
        assert_eq!(short.chars().count(), 60);
        assert!(short.ends_with("..."));
        assert_eq!(preview("a\nb"), "a b");
    }

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(-2), "-");
        assert_eq!(format_ttl(42), "42s");
        assert_eq!(format_ttl(125), "2m 5s");
        assert_eq!(format_ttl(7260), "2h 1m");
    }

    #[tokio::test]
    async fn test_clear_command_removes_conversation() {
        let (service, store) = service();
        store.append("c1", &[Message::user("hi")]).await.unwrap();

        run_history(&service, None, HistoryCommand::Clear { id: "c1".to_string() })
            .await
            .unwrap();
        assert!(!store.exists("c1").await);
    }

    #[tokio::test]
    async fn test_list_command_requires_admin_key() {
        let (service, _) = service();
        let command = HistoryCommand::List {
            prefix: String::new(),
            admin_key: Some("guess".to_string()),
            json: true,
        };
        let err = run_history(&service, Some("secret"), command)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MemoryError>(),
            Some(MemoryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_page_command_rejects_oversized_page() {
        let (service, _) = service();
        let command = HistoryCommand::Page {
            id: "c1".to_string(),
            page: 1,
            size: Some(500),
            json: false,
        };
        assert!(run_history(&service, None, command).await.is_err());
    }
}
