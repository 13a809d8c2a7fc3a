use serde::{Deserialize, Serialize};

/// Every per-player statistic carried through assembly and cleaning.
///
/// The discriminant doubles as the index into [`StatLine`], so the order here
/// is also the column order of the merged and cleaned tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stat {
    GamesPlayed,
    GamesStarted,
    MinutesPlayed,
    FieldGoalsMade,
    FieldGoalAttempts,
    FieldGoalPct,
    ThreePointersMade,
    ThreePointAttempts,
    ThreePointPct,
    TwoPointersMade,
    TwoPointAttempts,
    TwoPointPct,
    EffectiveFgPct,
    FreeThrowsMade,
    FreeThrowAttempts,
    FreeThrowPct,
    OffensiveRebounds,
    DefensiveRebounds,
    TotalRebounds,
    Assists,
    Steals,
    Blocks,
    Turnovers,
    PersonalFouls,
    Points,
    TripleDoubles,
    EfficiencyRating,
    TrueShootingPct,
    ThreePointAttemptRate,
    FreeThrowAttemptRate,
    OffensiveReboundPct,
    DefensiveReboundPct,
    TotalReboundPct,
    AssistPct,
    StealPct,
    BlockPct,
    TurnoverPct,
    UsagePct,
    OffensiveWinShares,
    DefensiveWinShares,
    WinShares,
    WinSharesPer48,
    OffensiveBoxPlusMinus,
    DefensiveBoxPlusMinus,
    BoxPlusMinus,
    ValueOverReplacement,
}

/// How the cleaner treats a missing or out-of-scale value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Season total; absent means the stat was not tracked yet, so zero.
    Counting,
    /// Made/attempted ratio; defined as zero when there were no attempts.
    Shooting { attempts: Stat },
    /// Scraped on a 0-100 scale, stored as a fraction after cleaning.
    PercentRate,
    /// Everything else; imputed with the column median.
    Advanced,
}

impl Stat {
    pub const COUNT: usize = 46;

    pub const ALL: [Stat; Stat::COUNT] = [
        Stat::GamesPlayed,
        Stat::GamesStarted,
        Stat::MinutesPlayed,
        Stat::FieldGoalsMade,
        Stat::FieldGoalAttempts,
        Stat::FieldGoalPct,
        Stat::ThreePointersMade,
        Stat::ThreePointAttempts,
        Stat::ThreePointPct,
        Stat::TwoPointersMade,
        Stat::TwoPointAttempts,
        Stat::TwoPointPct,
        Stat::EffectiveFgPct,
        Stat::FreeThrowsMade,
        Stat::FreeThrowAttempts,
        Stat::FreeThrowPct,
        Stat::OffensiveRebounds,
        Stat::DefensiveRebounds,
        Stat::TotalRebounds,
        Stat::Assists,
        Stat::Steals,
        Stat::Blocks,
        Stat::Turnovers,
        Stat::PersonalFouls,
        Stat::Points,
        Stat::TripleDoubles,
        Stat::EfficiencyRating,
        Stat::TrueShootingPct,
        Stat::ThreePointAttemptRate,
        Stat::FreeThrowAttemptRate,
        Stat::OffensiveReboundPct,
        Stat::DefensiveReboundPct,
        Stat::TotalReboundPct,
        Stat::AssistPct,
        Stat::StealPct,
        Stat::BlockPct,
        Stat::TurnoverPct,
        Stat::UsagePct,
        Stat::OffensiveWinShares,
        Stat::DefensiveWinShares,
        Stat::WinShares,
        Stat::WinSharesPer48,
        Stat::OffensiveBoxPlusMinus,
        Stat::DefensiveBoxPlusMinus,
        Stat::BoxPlusMinus,
        Stat::ValueOverReplacement,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stat::GamesPlayed => "games_played",
            Stat::GamesStarted => "games_started",
            Stat::MinutesPlayed => "minutes_played",
            Stat::FieldGoalsMade => "field_goals_made",
            Stat::FieldGoalAttempts => "field_goal_attempts",
            Stat::FieldGoalPct => "field_goal_pct",
            Stat::ThreePointersMade => "three_pointers_made",
            Stat::ThreePointAttempts => "three_point_attempts",
            Stat::ThreePointPct => "three_point_pct",
            Stat::TwoPointersMade => "two_pointers_made",
            Stat::TwoPointAttempts => "two_point_attempts",
            Stat::TwoPointPct => "two_point_pct",
            Stat::EffectiveFgPct => "effective_fg_pct",
            Stat::FreeThrowsMade => "free_throws_made",
            Stat::FreeThrowAttempts => "free_throw_attempts",
            Stat::FreeThrowPct => "free_throw_pct",
            Stat::OffensiveRebounds => "offensive_rebounds",
            Stat::DefensiveRebounds => "defensive_rebounds",
            Stat::TotalRebounds => "total_rebounds",
            Stat::Assists => "assists",
            Stat::Steals => "steals",
            Stat::Blocks => "blocks",
            Stat::Turnovers => "turnovers",
            Stat::PersonalFouls => "personal_fouls",
            Stat::Points => "points",
            Stat::TripleDoubles => "triple_doubles",
            Stat::EfficiencyRating => "efficiency_rating",
            Stat::TrueShootingPct => "true_shooting_pct",
            Stat::ThreePointAttemptRate => "three_point_attempt_rate",
            Stat::FreeThrowAttemptRate => "free_throw_attempt_rate",
            Stat::OffensiveReboundPct => "offensive_rebound_pct",
            Stat::DefensiveReboundPct => "defensive_rebound_pct",
            Stat::TotalReboundPct => "total_rebound_pct",
            Stat::AssistPct => "assist_pct",
            Stat::StealPct => "steal_pct",
            Stat::BlockPct => "block_pct",
            Stat::TurnoverPct => "turnover_pct",
            Stat::UsagePct => "usage_pct",
            Stat::OffensiveWinShares => "offensive_win_shares",
            Stat::DefensiveWinShares => "defensive_win_shares",
            Stat::WinShares => "win_shares",
            Stat::WinSharesPer48 => "win_shares_per_48",
            Stat::OffensiveBoxPlusMinus => "offensive_box_plus_minus",
            Stat::DefensiveBoxPlusMinus => "defensive_box_plus_minus",
            Stat::BoxPlusMinus => "box_plus_minus",
            Stat::ValueOverReplacement => "value_over_replacement",
        }
    }

    pub fn from_name(name: &str) -> Option<Stat> {
        Stat::ALL.iter().copied().find(|s| s.name() == name)
    }

    pub fn kind(self) -> StatKind {
        match self {
            Stat::GamesPlayed
            | Stat::GamesStarted
            | Stat::MinutesPlayed
            | Stat::FieldGoalsMade
            | Stat::FieldGoalAttempts
            | Stat::ThreePointersMade
            | Stat::ThreePointAttempts
            | Stat::TwoPointersMade
            | Stat::TwoPointAttempts
            | Stat::FreeThrowsMade
            | Stat::FreeThrowAttempts
            | Stat::OffensiveRebounds
            | Stat::DefensiveRebounds
            | Stat::TotalRebounds
            | Stat::Assists
            | Stat::Steals
            | Stat::Blocks
            | Stat::Turnovers
            | Stat::PersonalFouls
            | Stat::Points
            | Stat::TripleDoubles => StatKind::Counting,
            Stat::FieldGoalPct | Stat::EffectiveFgPct => StatKind::Shooting {
                attempts: Stat::FieldGoalAttempts,
            },
            Stat::ThreePointPct => StatKind::Shooting {
                attempts: Stat::ThreePointAttempts,
            },
            Stat::TwoPointPct => StatKind::Shooting {
                attempts: Stat::TwoPointAttempts,
            },
            Stat::FreeThrowPct => StatKind::Shooting {
                attempts: Stat::FreeThrowAttempts,
            },
            Stat::OffensiveReboundPct
            | Stat::DefensiveReboundPct
            | Stat::TotalReboundPct
            | Stat::AssistPct
            | Stat::StealPct
            | Stat::BlockPct
            | Stat::TurnoverPct
            | Stat::UsagePct => StatKind::PercentRate,
            _ => StatKind::Advanced,
        }
    }
}

/// Fixed-width bag of optional statistics indexed by [`Stat`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatLine([Option<f64>; Stat::COUNT]);

impl Default for StatLine {
    fn default() -> Self {
        StatLine([None; Stat::COUNT])
    }
}

impl StatLine {
    pub fn get(&self, stat: Stat) -> Option<f64> {
        self.0[stat.index()]
    }

    pub fn set(&mut self, stat: Stat, value: Option<f64>) {
        self.0[stat.index()] = value;
    }

    /// Value or zero; only for stats the cleaner has already filled.
    pub fn value(&self, stat: Stat) -> f64 {
        self.get(stat).unwrap_or(0.0)
    }

    pub fn missing(&self) -> impl Iterator<Item = Stat> + '_ {
        Stat::ALL.iter().copied().filter(|s| self.get(*s).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    C,
    PF,
    PG,
    SF,
    SG,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::C,
        Position::PF,
        Position::PG,
        Position::SF,
        Position::SG,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Position::C => "C",
            Position::PF => "PF",
            Position::PG => "PG",
            Position::SF => "SF",
            Position::SG => "SG",
        }
    }

    /// Parses a listed position; hybrids such as `PG-SG` keep the first entry.
    pub fn parse(raw: &str) -> Option<Position> {
        let first = raw.trim().split(&['-', '/', ','][..]).next()?.trim();
        match first.to_ascii_uppercase().as_str() {
            "C" => Some(Position::C),
            "PF" => Some(Position::PF),
            "PG" => Some(Position::PG),
            "SF" => Some(Position::SF),
            "SG" => Some(Position::SG),
            // Older listings use G/F.
            "G" => Some(Position::SG),
            "F" => Some(Position::SF),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Conference {
    East,
    West,
}

impl Conference {
    pub fn code(self) -> &'static str {
        match self {
            Conference::East => "E",
            Conference::West => "W",
        }
    }

    pub fn parse(raw: &str) -> Option<Conference> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "E" | "EAST" | "EASTERN" => Some(Conference::East),
            "W" | "WEST" | "WESTERN" => Some(Conference::West),
            _ => None,
        }
    }

    pub fn as_feature(self) -> f64 {
        match self {
            Conference::East => 0.0,
            Conference::West => 1.0,
        }
    }
}

/// Scale of the [`StatKind::PercentRate`] columns of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateScale {
    #[default]
    Percent,
    Fraction,
}

impl RateScale {
    pub fn code(self) -> &'static str {
        match self {
            RateScale::Percent => "percent",
            RateScale::Fraction => "fraction",
        }
    }

    pub fn parse(raw: &str) -> Option<RateScale> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "percent" => Some(RateScale::Percent),
            "fraction" => Some(RateScale::Fraction),
            _ => None,
        }
    }
}

/// One row per (player, season) once stints are consolidated.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSeasonRecord {
    pub player: String,
    pub season: i32,
    /// Primary team abbreviation (the stint that represents the season).
    pub team: String,
    /// Number of teams the player appeared for that season.
    pub stints: u32,
    pub position: Option<Position>,
    pub age: Option<f64>,
    pub conference: Option<Conference>,
    pub win_pct: Option<f64>,
    pub stats: StatLine,
    pub rate_scale: RateScale,
    pub label: Option<f64>,
}

impl PlayerSeasonRecord {
    pub fn new(player: &str, season: i32, team: &str) -> Self {
        Self {
            player: player.to_string(),
            season,
            team: team.to_string(),
            stints: 1,
            position: None,
            age: None,
            conference: None,
            win_pct: None,
            stats: StatLine::default(),
            rate_scale: RateScale::Percent,
            label: None,
        }
    }

    pub fn stat(&self, stat: Stat) -> Option<f64> {
        self.stats.get(stat)
    }

    pub fn with_stat(mut self, stat: Stat, value: f64) -> Self {
        self.stats.set(stat, Some(value));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonRecord {
    pub team: String,
    pub season: i32,
    pub conference: Conference,
    pub win_pct: f64,
}
