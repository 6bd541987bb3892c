//! Shared types for the reward engine.
//!
//! These types are storage-agnostic and used by the resolvers, the store
//! implementations and the CLI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Rarity of an obtainable reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common = 1,
    Rare = 2,
    Epic = 3,
    Legendary = 4,
}

impl Default for Rarity {
    fn default() -> Self {
        Self::Common
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Common => write!(f, "common"),
            Self::Rare => write!(f, "rare"),
            Self::Epic => write!(f, "epic"),
            Self::Legendary => write!(f, "legendary"),
        }
    }
}

impl std::str::FromStr for Rarity {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "common" => Ok(Self::Common),
            "rare" => Ok(Self::Rare),
            "epic" => Ok(Self::Epic),
            "legendary" => Ok(Self::Legendary),
            _ => Err(ParseError::InvalidRarity(s.to_string())),
        }
    }
}

/// What a consumable item does when spent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemEffect {
    /// Reopens an already claimed chest for the current period
    ChestKey,
    /// Profile decoration, no engine effect
    Cosmetic,
    /// Reserved for the streak UI, no engine effect
    StreakShield,
}

/// Category-specific metadata of a reward.
///
/// Each category carries exactly the fields it needs, so a card can never
/// be given an item effect and a currency reward always has an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RewardKind {
    Currency { amount: u32 },
    Experience { amount: u32 },
    Fragment { collection: String, set_size: u32 },
    Card { series: String, number: u32 },
    Item { effect: ItemEffect },
}

impl RewardKind {
    /// Category name as stored in the catalog
    pub fn category(&self) -> &'static str {
        match self {
            Self::Currency { .. } => "currency",
            Self::Experience { .. } => "experience",
            Self::Fragment { .. } => "fragment",
            Self::Card { .. } => "card",
            Self::Item { .. } => "item",
        }
    }

    /// Whether granting this reward lands in the inventory (as opposed to the ledger)
    pub fn is_inventory(&self) -> bool {
        matches!(
            self,
            Self::Fragment { .. } | Self::Card { .. } | Self::Item { .. }
        )
    }
}

/// Descriptor of an obtainable thing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rarity: Rarity,
    pub kind: RewardKind,
}

impl RewardDescriptor {
    /// Whether this descriptor is a chest bypass key
    pub fn is_chest_key(&self) -> bool {
        matches!(
            self.kind,
            RewardKind::Item {
                effect: ItemEffect::ChestKey
            }
        )
    }
}

/// A readable content item (book, saga volume, interactive story)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    /// Configured orydor value of the chest for this content
    pub reward_value: u32,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Chest quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChestTier {
    Silver,
    Gold,
}

impl std::fmt::Display for ChestTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Silver => write!(f, "silver"),
            Self::Gold => write!(f, "gold"),
        }
    }
}

impl std::str::FromStr for ChestTier {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            _ => Err(ParseError::InvalidChestTier(s.to_string())),
        }
    }
}

/// Where a loot table entry applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "value", rename_all = "snake_case")]
pub enum LootScope {
    Global,
    Genre(String),
    Content(String),
}

impl LootScope {
    /// Whether this scope applies to the given content
    pub fn applies_to(&self, content: &ContentItem) -> bool {
        match self {
            Self::Global => true,
            Self::Genre(genre) => content.genres.iter().any(|g| g == genre),
            Self::Content(id) => *id == content.id,
        }
    }
}

/// One independently rolled possible drop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootTableEntry {
    #[serde(default)]
    pub id: i64,
    pub scope: LootScope,
    pub tier: ChestTier,
    pub reward_id: String,
    /// Percent chance in (0, 100]
    pub drop_chance: f64,
    pub min_quantity: u32,
    pub max_quantity: u32,
}

/// Reward carried by a wheel segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentReward {
    Currency { amount: u32 },
    Experience { amount: u32 },
    Item { reward_id: String, quantity: u32 },
    GiftCard { value_cents: u32 },
}

/// One mutually exclusive slice of the fortune wheel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelSegment {
    pub label: String,
    pub reward: SegmentReward,
    pub weight: u32,
}

/// A wheel configuration with its effective window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub premium_only: bool,
    pub starts_on: NaiveDate,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
    pub segments: Vec<WheelSegment>,
}

impl WheelConfig {
    /// Whether the wheel is in effect on the given day (inclusive range)
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.starts_on <= day && self.ends_on.map_or(true, |end| day <= end)
    }
}

/// How a streak bonus modifies a spin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreakBonusKind {
    /// Multiplies the weight of notable segments before the draw
    ProbabilityBoost { factor: f64 },
    /// Multiplies the winning quantity or value after the draw
    QuantityBoost { factor: f64 },
}

/// Streak threshold unlocking a wheel bonus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakBonus {
    pub threshold_days: u32,
    pub kind: StreakBonusKind,
}

/// Modifier carried by a skill-tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillBonusKind {
    /// Weekdays are 0 = Sunday through 6 = Saturday
    CurrencyByDay { percent: u32, weekdays: Vec<u8> },
    CurrencyByGenre { percent: u32, genres: Vec<String> },
    ExperienceBoost { percent: u32 },
    DropChanceBoost { percent: u32, reward_id: String },
}

impl SkillBonusKind {
    pub fn percent(&self) -> u32 {
        match self {
            Self::CurrencyByDay { percent, .. }
            | Self::CurrencyByGenre { percent, .. }
            | Self::ExperienceBoost { percent }
            | Self::DropChanceBoost { percent, .. } => *percent,
        }
    }
}

/// Skill-tree node definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillNode {
    pub id: String,
    pub name: String,
    pub bonus: SkillBonusKind,
}

/// An active bonus attributed to the skill that granted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillBonus {
    pub skill_id: String,
    pub kind: SkillBonusKind,
}

/// Consecutive-day participation record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreak {
    pub user_id: String,
    pub current_streak: u32,
    pub max_streak: u32,
    pub last_participation_date: Option<NaiveDate>,
    /// Value lost on the last break, recoverable for a fee
    pub broken_streak_value: Option<u32>,
}

impl UserStreak {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }
}

/// Collaborator view of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub premium_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

impl UserProfile {
    /// Whether the subscription is active at `now`
    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.premium_until.is_some_and(|until| until > now)
    }
}

/// Ledger currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Orydors,
    Experience,
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Orydors => write!(f, "orydors"),
            Self::Experience => write!(f, "experience"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orydors" => Ok(Self::Orydors),
            "experience" | "xp" => Ok(Self::Experience),
            _ => Err(ParseError::InvalidCurrency(s.to_string())),
        }
    }
}

/// Reason code attached to ledger entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    Chest,
    WheelSpin,
    StreakRecovery,
    ChallengePayout,
}

impl std::fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chest => write!(f, "chest"),
            Self::WheelSpin => write!(f, "wheel_spin"),
            Self::StreakRecovery => write!(f, "streak_recovery"),
            Self::ChallengePayout => write!(f, "challenge_payout"),
        }
    }
}

impl std::str::FromStr for LedgerReason {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chest" => Ok(Self::Chest),
            "wheel_spin" => Ok(Self::WheelSpin),
            "streak_recovery" => Ok(Self::StreakRecovery),
            "challenge_payout" => Ok(Self::ChallengePayout),
            _ => Err(ParseError::InvalidLedgerReason(s.to_string())),
        }
    }
}

/// Additive balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub currency: Currency,
    /// Signed; debits are negative
    pub amount: i64,
    pub reason: LedgerReason,
    pub reference_id: String,
}

/// Signed inventory change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDelta {
    pub reward_id: String,
    pub quantity: i64,
}

/// Held quantity of one reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub reward_id: String,
    pub quantity: i64,
}

/// Current balances of a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub orydors: i64,
    pub experience: i64,
}

/// Free spins are capped to one per day; paid spins are settled upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinKind {
    Free,
    Paid,
}

impl std::fmt::Display for SpinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Paid => write!(f, "paid"),
        }
    }
}

impl std::str::FromStr for SpinKind {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "paid" => Ok(Self::Paid),
            _ => Err(ParseError::InvalidSpinKind(s.to_string())),
        }
    }
}

/// Redeemable gift code won on the wheel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCode {
    pub code: String,
    pub user_id: String,
    pub value_cents: u32,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
}

/// Who a challenge's progress belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeScope {
    Individual,
    Guild,
}

impl std::fmt::Display for ChallengeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Guild => write!(f, "guild"),
        }
    }
}

impl std::str::FromStr for ChallengeScope {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(Self::Individual),
            "guild" => Ok(Self::Guild),
            _ => Err(ParseError::InvalidChallengeScope(s.to_string())),
        }
    }
}

/// What an objective counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectiveType {
    ReadBook { content_id: String },
    ReadAnyBook,
    ReadBookFromSet { content_ids: Vec<String> },
    ReadBooksOfGenre { genres: Vec<String> },
    ReadChaptersOfBook { content_id: String },
    ReadChaptersOfGenre { genres: Vec<String> },
    ReadChaptersOfSelection { content_ids: Vec<String> },
    CollectItem { reward_id: String },
}

/// Objective definition inside a challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeObjective {
    pub id: String,
    #[serde(default)]
    pub challenge_id: String,
    pub objective: ObjectiveType,
    pub target_count: u32,
    /// Inherited from the owning challenge when loaded from the store
    #[serde(default = "default_scope")]
    pub scope: ChallengeScope,
}

fn default_scope() -> ChallengeScope {
    ChallengeScope::Individual
}

/// Reward paid out when every objective of a challenge is complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    pub reward_id: String,
    pub quantity: u32,
}

/// Challenge definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub name: String,
    pub scope: ChallengeScope,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub payouts: Vec<RewardGrant>,
    pub objectives: Vec<ChallengeObjective>,
}

/// Progress owner: a user for individual scope, a guild for guild scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    User(String),
    Guild(String),
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Guild(_) => "guild",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Guild(id) => id,
        }
    }
}

/// Progress of one subject on one objective
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveProgress {
    pub objective_id: String,
    pub subject: Subject,
    pub current_count: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parse errors for string conversions
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid rarity: {0}")]
    InvalidRarity(String),
    #[error("Invalid chest tier: {0}")]
    InvalidChestTier(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
    #[error("Invalid ledger reason: {0}")]
    InvalidLedgerReason(String),
    #[error("Invalid spin kind: {0}")]
    InvalidSpinKind(String),
    #[error("Invalid challenge scope: {0}")]
    InvalidChallengeScope(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Parse a stored `YYYY-MM-DD` day
pub fn parse_day(s: &str) -> Result<NaiveDate, ParseError> {
    s.parse().map_err(|_| ParseError::InvalidDate(s.to_string()))
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_parse_and_display() {
        assert_eq!("legendary".parse::<Rarity>().unwrap(), Rarity::Legendary);
        assert_eq!(Rarity::Epic.to_string(), "epic");
        assert!("mythic".parse::<Rarity>().is_err());
        assert!(Rarity::Legendary > Rarity::Common);
    }

    #[test]
    fn test_chest_tier_parse() {
        assert_eq!("gold".parse::<ChestTier>().unwrap(), ChestTier::Gold);
        assert_eq!("silver".parse::<ChestTier>().unwrap(), ChestTier::Silver);
        assert!("bronze".parse::<ChestTier>().is_err());
    }

    #[test]
    fn test_currency_accepts_xp_alias() {
        assert_eq!("xp".parse::<Currency>().unwrap(), Currency::Experience);
        assert_eq!(Currency::Orydors.to_string(), "orydors");
    }

    #[test]
    fn test_reward_kind_tagged_json() {
        let json = r#"{"category":"item","effect":"chest_key"}"#;
        let kind: RewardKind = serde_json::from_str(json).unwrap();
        assert_eq!(
            kind,
            RewardKind::Item {
                effect: ItemEffect::ChestKey
            }
        );
        assert!(kind.is_inventory());

        // A card without its series is rejected
        let bad = r#"{"category":"card","number":3}"#;
        assert!(serde_json::from_str::<RewardKind>(bad).is_err());
    }

    #[test]
    fn test_loot_scope_applies_to() {
        let content = ContentItem {
            id: "book-1".to_string(),
            title: "The Long Road".to_string(),
            reward_value: 100,
            genres: vec!["fantasy".to_string(), "adventure".to_string()],
        };
        assert!(LootScope::Global.applies_to(&content));
        assert!(LootScope::Genre("fantasy".to_string()).applies_to(&content));
        assert!(!LootScope::Genre("horror".to_string()).applies_to(&content));
        assert!(LootScope::Content("book-1".to_string()).applies_to(&content));
        assert!(!LootScope::Content("book-2".to_string()).applies_to(&content));
    }

    #[test]
    fn test_wheel_active_window() {
        let wheel = WheelConfig {
            id: "w".to_string(),
            name: "Autumn".to_string(),
            premium_only: false,
            starts_on: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            ends_on: Some(NaiveDate::from_ymd_opt(2026, 10, 31).unwrap()),
            segments: vec![],
        };
        assert!(wheel.is_active_on(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()));
        assert!(wheel.is_active_on(NaiveDate::from_ymd_opt(2026, 10, 31).unwrap()));
        assert!(!wheel.is_active_on(NaiveDate::from_ymd_opt(2026, 11, 1).unwrap()));
        assert!(!wheel.is_active_on(NaiveDate::from_ymd_opt(2026, 9, 30).unwrap()));
    }

    #[test]
    fn test_subscription_expiry() {
        let now = parse_timestamp("2026-10-17T12:00:00Z").unwrap();
        let mut profile = UserProfile {
            id: "u".to_string(),
            ..Default::default()
        };
        assert!(!profile.has_active_subscription(now));
        profile.premium_until = Some(parse_timestamp("2026-11-01T00:00:00Z").unwrap());
        assert!(profile.has_active_subscription(now));
        profile.premium_until = Some(parse_timestamp("2026-10-01T00:00:00Z").unwrap());
        assert!(!profile.has_active_subscription(now));
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(
            parse_day("2026-10-17").unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
        );
        assert!(parse_day("17/10/2026").is_err());
    }
}
