use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use recall::memory::{ContextItem, ConversationTurn, Summary};
use recall::session::MemorySession;

use crate::cli::{Commands, OutputFormat, RoleArg};

const PREVIEW_CHARS: usize = 100;

pub fn run(session: &mut MemorySession, command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Add { text, role } => add_turn(session, text, role, format),
        Commands::Recent { count } => show_recent(session, count, format),
        Commands::Search { query, limit } => search(session, &query, limit, format),
        Commands::Context { query } => show_context(session, &query, format),
        Commands::Clear => clear(session, format),
        Commands::Summarize => summarize(session, format),
        Commands::Summaries => list_summaries(session, format),
        Commands::Stats => show_stats(session, format),
        Commands::Config => show_config(session),
    }
}

fn add_turn(session: &mut MemorySession, text: String, role: RoleArg, format: OutputFormat) -> Result<()> {
    let turn = match role {
        RoleArg::User => ConversationTurn::user(text),
        RoleArg::Assistant => ConversationTurn::assistant(text),
    };
    let outcome = session.append_turn(turn)?;

    if format.is_json() {
        return print_json(&json!({
            "turn_id": outcome.turn_id,
            "evicted": outcome.evicted(),
            "summaries": outcome.summaries(),
        }));
    }

    println!("Stored turn {}", outcome.turn_id);
    if outcome.evicted() > 0 {
        println!(
            "Folded {} older turns into {} summaries",
            outcome.evicted(),
            outcome.summaries().len()
        );
    }
    Ok(())
}

fn show_recent(session: &MemorySession, count: i64, format: OutputFormat) -> Result<()> {
    let turns = session.recent(count)?;
    if format.is_json() {
        return print_json(&turns);
    }
    if turns.is_empty() {
        println!("No turns in short-term memory.");
    }
    for turn in turns {
        print_turn(turn);
    }
    Ok(())
}

fn search(session: &MemorySession, query: &str, limit: usize, format: OutputFormat) -> Result<()> {
    let results = session.search(query, limit);

    if format.is_json() {
        let rows: Vec<_> = results
            .iter()
            .map(|r| json!({ "score": r.score, "turn": r.turn }))
            .collect();
        return print_json(&rows);
    }

    if results.is_empty() {
        println!("No relevant turns for \"{}\".", query);
    }
    for (index, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {}: {}",
            index + 1,
            result.score,
            result.turn.role.label(),
            preview_text(&result.turn.text)
        );
    }
    Ok(())
}

fn show_context(session: &MemorySession, query: &str, format: OutputFormat) -> Result<()> {
    let context = session.build_context(query);

    if format.is_json() {
        return print_json(&json!({
            "estimated_tokens": context.estimated_tokens,
            "token_budget": context.token_budget,
            "budget_exceeded": context.budget_exceeded,
            "sources": context.sources(),
            "messages": context.to_prompt_messages(),
        }));
    }

    println!(
        "~{} / {} tokens, {} items",
        context.estimated_tokens,
        context.token_budget,
        context.items.len()
    );
    if let Some(warning) = context.warning() {
        println!("warning: {}", warning);
    }
    for item in &context.items {
        let body = match item {
            ContextItem::Recent(turn) | ContextItem::Relevant { turn, .. } => {
                format!("{}: {}", turn.role.label(), preview_text(&turn.text))
            }
            ContextItem::Summary { summary, .. } => preview_text(&summary.digest_text),
        };
        println!("  [{}] {}", item.source_label(), body);
    }
    Ok(())
}

fn clear(session: &mut MemorySession, format: OutputFormat) -> Result<()> {
    let cleared = session.clear_short_term();
    if format.is_json() {
        return print_json(&json!({ "cleared": cleared }));
    }
    println!("Cleared {} turns from short-term memory.", cleared);
    Ok(())
}

fn summarize(session: &mut MemorySession, format: OutputFormat) -> Result<()> {
    let summaries = session.force_summarize()?;
    if format.is_json() {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("Nothing older than the recent window to summarize.");
    }
    for summary in &summaries {
        print_summary(summary);
    }
    Ok(())
}

fn list_summaries(session: &MemorySession, format: OutputFormat) -> Result<()> {
    let summaries = session.store().summaries();
    if format.is_json() {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No summaries yet.");
    }
    for summary in summaries {
        print_summary(summary);
    }
    Ok(())
}

fn show_stats(session: &MemorySession, format: OutputFormat) -> Result<()> {
    let stats = session.stats();
    if format.is_json() {
        return print_json(&stats);
    }

    let memory = &stats.memory;
    println!("Active turns:      {}", memory.active_turns);
    println!("Lifetime turns:    {}", memory.lifetime_turns);
    println!("Summaries:         {}", memory.summary_count);
    println!("Summarized turns:  {}", memory.summarized_turns);
    println!("Short-term tokens: ~{}", memory.short_term_tokens);
    println!("Summary tokens:    ~{}", memory.summary_tokens);
    Ok(())
}

fn show_config(session: &MemorySession) -> Result<()> {
    print!("{}", session.config().to_yaml()?);
    Ok(())
}

fn print_turn(turn: &ConversationTurn) {
    println!(
        "{} {}: {}",
        turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
        turn.role.label(),
        preview_text(&turn.text)
    );
}

fn print_summary(summary: &Summary) {
    println!(
        "[{}] {} turns, {} -> {}",
        summary.period_label,
        summary.source_turn_count,
        summary.period_start.format("%Y-%m-%d %H:%M"),
        summary.period_end.format("%Y-%m-%d %H:%M"),
    );
    if !summary.topics.is_empty() {
        println!("  topics: {}", summary.topics.join(", "));
    }
    println!("  {}", summary.digest_text);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn preview_text(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }
    let mut preview: String = single_line.chars().take(PREVIEW_CHARS - 3).collect();
    preview.push_str("...");
    preview
}
