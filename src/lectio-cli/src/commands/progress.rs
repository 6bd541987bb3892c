//! Challenge progress command handlers

use anyhow::Result;
use chrono::{DateTime, Utc};
use lectio::{Engine, ProgressEvent, ProgressResult, RewardStore, Subject};

use super::{engine_error, print_json};
use crate::cli::{OutputFormat, ProgressCommand};

/// Handle `progress book|chapter|item|show`
pub fn handle<S: RewardStore>(
    engine: &Engine<S>,
    command: ProgressCommand,
    now: DateTime<Utc>,
    format: OutputFormat,
) -> Result<()> {
    let event = match command {
        ProgressCommand::Book {
            user,
            content,
            genres,
        } => ProgressEvent::BookCompleted {
            user_id: user,
            content_id: content,
            genres,
        },
        ProgressCommand::Chapter { user, book, genres } => ProgressEvent::ChapterCompleted {
            user_id: user,
            book_id: book,
            genres,
        },
        ProgressCommand::Item {
            user,
            reward,
            quantity,
        } => ProgressEvent::ItemCollected {
            user_id: user,
            reward_id: reward,
            quantity,
        },
        ProgressCommand::Show {
            objective,
            user,
            guild,
        } => {
            let subject = match (user, guild) {
                (_, Some(guild)) => Subject::Guild(guild),
                (Some(user), None) => Subject::User(user),
                (None, None) => anyhow::bail!("Either --user or --guild is required"),
            };
            return show(engine, &objective, &subject, format);
        }
    };

    let results = report(engine, &event, now)?;
    match format {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Text if results.is_empty() => println!("No active objective matched"),
        OutputFormat::Text => print_progress(&results),
    }
    Ok(())
}

/// Feed one event to the challenge engine
pub fn report<S: RewardStore>(
    engine: &Engine<S>,
    event: &ProgressEvent,
    now: DateTime<Utc>,
) -> Result<Vec<ProgressResult>> {
    engine.advance(event, now).map_err(engine_error)
}

fn show<S: RewardStore>(
    engine: &Engine<S>,
    objective: &str,
    subject: &Subject,
    format: OutputFormat,
) -> Result<()> {
    let progress = engine.progress(objective, subject).map_err(engine_error)?;

    match (format, progress) {
        (OutputFormat::Json, progress) => print_json(&progress)?,
        (OutputFormat::Text, None) => {
            println!("No progress on {} for {} {}", objective, subject.kind(), subject.id());
        }
        (OutputFormat::Text, Some(p)) => {
            println!("{} for {} {}", p.objective_id, subject.kind(), subject.id());
            println!("  Count:     {}", p.current_count);
            match p.completed_at {
                Some(at) => println!("  Completed: {}", at.format("%Y-%m-%d %H:%M")),
                None => println!("  Completed: no"),
            }
        }
    }
    Ok(())
}

/// Print objective progress lines, shared by the chest and wheel output
pub fn print_progress(results: &[ProgressResult]) {
    for result in results {
        let marker = if result.newly_completed {
            " completed!"
        } else {
            ""
        };
        println!(
            "  Objective {}: {}/{}{}",
            result.objective_id, result.current_count, result.target_count, marker
        );
        if !result.paid_users.is_empty() {
            println!(
                "  Challenge {} paid out to {}",
                result.challenge_id,
                result.paid_users.join(", ")
            );
        }
        if result.payout_pending {
            println!(
                "  Challenge {} payout pending, it will be retried",
                result.challenge_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::seeded;
    use chrono::TimeZone;
    use lectio::{Challenge, ChallengeObjective, ChallengeScope, ObjectiveType, RewardGrant};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 20, 0, 0).unwrap()
    }

    fn with_challenge() -> Engine<lectio::SqliteDb> {
        let engine = seeded();
        engine
            .save_challenge(&Challenge {
                id: "autumn".to_string(),
                name: "Autumn".to_string(),
                scope: ChallengeScope::Individual,
                starts_at: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
                ends_at: Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap(),
                payouts: vec![RewardGrant {
                    reward_id: "chest-key".to_string(),
                    quantity: 1,
                }],
                objectives: vec![ChallengeObjective {
                    id: "autumn-books".to_string(),
                    challenge_id: String::new(),
                    scope: ChallengeScope::Individual,
                    objective: ObjectiveType::ReadAnyBook,
                    target_count: 2,
                }],
            })
            .unwrap();
        engine
    }

    fn book(user: &str) -> ProgressCommand {
        ProgressCommand::Book {
            user: user.to_string(),
            content: "book-1".to_string(),
            genres: vec!["fantasy".to_string()],
        }
    }

    #[test]
    fn test_books_complete_the_challenge() {
        let engine = with_challenge();
        handle(&engine, book("alice"), now(), OutputFormat::Text).unwrap();
        handle(&engine, book("alice"), now(), OutputFormat::Json).unwrap();

        let progress = engine
            .progress("autumn-books", &Subject::User("alice".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(progress.current_count, 2);
        assert!(progress.completed);
        assert_eq!(engine.inventory("alice").unwrap()[0].quantity, 1);
    }

    #[test]
    fn test_show_requires_subject() {
        let engine = with_challenge();
        let command = ProgressCommand::Show {
            objective: "autumn-books".to_string(),
            user: None,
            guild: None,
        };
        assert!(handle(&engine, command, now(), OutputFormat::Text).is_err());
    }

    #[test]
    fn test_unmatched_event_reports_nothing() {
        let engine = with_challenge();
        let event = ProgressEvent::ItemCollected {
            user_id: "alice".to_string(),
            reward_id: "chest-key".to_string(),
            quantity: 3,
        };
        assert!(report(&engine, &event, now()).unwrap().is_empty());
    }
}
