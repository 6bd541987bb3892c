//! Gift code minting and delivery.
//!
//! Codes look like `LECT-7KQ2-MZ4P-X9HD`: a fixed prefix and three groups
//! drawn from an alphabet without `0/O` and `1/I`, so they survive being read
//! aloud or typed from a printed voucher.

use crate::error::EngineResult;
use crate::repository::{ProgressionRepository, RepoError};
use crate::types::GiftCode;
use chrono::{Months, NaiveDate};
use rand::Rng;

pub const CODE_PREFIX: &str = "LECT";

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const GROUPS: usize = 3;
const GROUP_LEN: usize = 4;

/// Fresh codes tried before giving up on a collision streak
pub const MINT_ATTEMPTS: usize = 8;

/// Generate a random code. Uniqueness is checked by [`mint`].
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(CODE_PREFIX.len() + GROUPS * (GROUP_LEN + 1));
    code.push_str(CODE_PREFIX);
    for _ in 0..GROUPS {
        code.push('-');
        for _ in 0..GROUP_LEN {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            code.push(CODE_ALPHABET[idx] as char);
        }
    }
    code
}

/// Whether a string has the shape of a minted code
pub fn is_well_formed(code: &str) -> bool {
    let mut parts = code.split('-');
    if parts.next() != Some(CODE_PREFIX) {
        return false;
    }
    let groups: Vec<&str> = parts.collect();
    groups.len() == GROUPS
        && groups.iter().all(|g| {
            g.len() == GROUP_LEN && g.bytes().all(|b| CODE_ALPHABET.contains(&b))
        })
}

/// Expiry of a code issued on `issued_on`
pub fn expiry_for(issued_on: NaiveDate, validity_months: u32) -> NaiveDate {
    issued_on
        .checked_add_months(Months::new(validity_months))
        .unwrap_or(NaiveDate::MAX)
}

/// Mint a code that is not yet in the store.
///
/// The store's unique column still guards the insert; a code taken between
/// this check and the commit surfaces as a commit conflict.
pub fn mint<P, R>(
    repo: &P,
    rng: &mut R,
    user_id: &str,
    value_cents: u32,
    issued_on: NaiveDate,
    validity_months: u32,
) -> EngineResult<GiftCode>
where
    P: ProgressionRepository + ?Sized,
    R: Rng + ?Sized,
{
    for attempt in 1..=MINT_ATTEMPTS {
        let code = generate_code(rng);
        if repo.gift_code_exists(&code)? {
            tracing::debug!(attempt, "gift code collision, drawing another");
            continue;
        }
        return Ok(GiftCode {
            code,
            user_id: user_id.to_string(),
            value_cents,
            issued_on,
            expires_on: expiry_for(issued_on, validity_months),
        });
    }
    Err(RepoError::Conflict(format!(
        "no unique gift code after {} attempts",
        MINT_ATTEMPTS
    ))
    .into())
}

/// Failure to hand a code to the delivery channel
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Delivers minted gift codes to their owner (email, push, ...)
pub trait GiftCodeNotifier {
    fn notify(&self, code: &GiftCode) -> Result<(), NotifyError>;
}

/// Notifier that only records the code in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl GiftCodeNotifier for LogNotifier {
    fn notify(&self, code: &GiftCode) -> Result<(), NotifyError> {
        tracing::info!(
            user = %code.user_id,
            code = %code.code,
            value_cents = code.value_cents,
            expires_on = %code.expires_on,
            "gift code issued"
        );
        Ok(())
    }
}

/// Notify after commit. A failed delivery never undoes the spin.
pub fn notify_best_effort(notifier: &dyn GiftCodeNotifier, code: &GiftCode) {
    if let Err(e) = notifier.notify(code) {
        tracing::warn!(user = %code.user_id, code = %code.code, error = %e, "gift code notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;

    struct FailingNotifier {
        calls: RefCell<u32>,
    }

    impl GiftCodeNotifier for FailingNotifier {
        fn notify(&self, _code: &GiftCode) -> Result<(), NotifyError> {
            *self.calls.borrow_mut() += 1;
            Err(NotifyError::Delivery("smtp unreachable".to_string()))
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_generated_codes_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 19);
            assert!(is_well_formed(&code), "{}", code);
            assert!(!code[5..].contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn test_is_well_formed_rejects_foreign_shapes() {
        assert!(!is_well_formed("GIFT-AAAA-BBBB-CCCC"));
        assert!(!is_well_formed("LECT-AAAA-BBBB"));
        assert!(!is_well_formed("LECT-AAAA-BBBB-CCC0"));
        assert!(is_well_formed("LECT-AAAA-BBBB-CCC2"));
    }

    #[test]
    fn test_expiry_is_one_year_later() {
        assert_eq!(expiry_for(day("2026-10-17"), 12), day("2027-10-17"));
        // Leap day clamps to the end of February
        assert_eq!(expiry_for(day("2028-02-29"), 12), day("2029-02-28"));
    }

    #[test]
    fn test_notification_failure_is_swallowed() {
        let notifier = FailingNotifier {
            calls: RefCell::new(0),
        };
        let code = GiftCode {
            code: "LECT-AAAA-BBBB-CCCC".to_string(),
            user_id: "alice".to_string(),
            value_cents: 1000,
            issued_on: day("2026-10-17"),
            expires_on: day("2027-10-17"),
        };
        notify_best_effort(&notifier, &code);
        assert_eq!(*notifier.calls.borrow(), 1);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_mint_skips_existing_codes() {
        use crate::repository::{CatalogRepository, SpinCommit, SpinCommitOutcome};
        use crate::sqlite::SqliteDb;
        use crate::types::{parse_timestamp, SpinKind, UserStreak};

        let db = SqliteDb::open_in_memory().unwrap();
        db.init().unwrap();

        let taken = generate_code(&mut StdRng::seed_from_u64(21));
        let spun_at = parse_timestamp("2026-10-17T08:00:00Z").unwrap();
        let commit = SpinCommit {
            spin_id: "spin-1".to_string(),
            user_id: "bob".to_string(),
            wheel_id: "daily".to_string(),
            kind: SpinKind::Paid,
            segment_index: 2,
            spun_at,
            previous_streak: None,
            streak: UserStreak::new("bob"),
            ledger: vec![],
            inventory: vec![],
            progress: vec![],
            gift_code: Some(GiftCode {
                code: taken.clone(),
                user_id: "bob".to_string(),
                value_cents: 500,
                issued_on: spun_at.date_naive(),
                expires_on: expiry_for(spun_at.date_naive(), 12),
            }),
        };
        assert_eq!(
            db.commit_spin(&commit).unwrap(),
            SpinCommitOutcome::Committed { progress: vec![] }
        );

        let mut rng = StdRng::seed_from_u64(21);
        let minted = mint(&db, &mut rng, "alice", 1000, day("2026-10-17"), 12).unwrap();
        assert_ne!(minted.code, taken);
        assert!(is_well_formed(&minted.code));
        assert_eq!(minted.expires_on, day("2027-10-17"));
    }
}
