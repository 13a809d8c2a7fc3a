//! Player and franchise name handling shared by the assembler and cleaner.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonical player name: ASCII-folded, no Hall-of-Fame `*` marker, no
/// generational suffix, single-spaced. Applying it twice is a no-op.
pub fn normalize_player_name(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| *c != '*').collect();
    let folded = fold_accents(&stripped);

    let mut words: Vec<&str> = folded.split_whitespace().collect();
    while words.len() > 1 {
        let Some(last) = words.last() else { break };
        let bare = last.trim_end_matches('.').trim_start_matches(',');
        if is_generational_suffix(bare) {
            words.pop();
        } else {
            break;
        }
    }

    let joined = words.join(" ");
    joined.trim_end_matches(',').to_string()
}

/// Join key for players: lowercase alphanumerics separated by `_`.
pub fn player_key(input: &str) -> String {
    let canonical = normalize_player_name(input).to_ascii_lowercase();
    let mut out = String::with_capacity(canonical.len());
    let mut prev_us = false;
    for ch in canonical.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_us = false;
        } else if ch == '\'' || ch == '.' {
            // "D'Angelo" and "J.J." join with their unpunctuated spellings.
            continue;
        } else if !prev_us && !out.is_empty() {
            out.push('_');
            prev_us = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn is_generational_suffix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "jr" | "sr" | "ii" | "iii" | "iv"
    )
}

/// ASCII-folds a name: canonical decomposition with combining marks removed,
/// then the letters that have no decomposition.
fn fold_accents(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.nfd().filter(|c| !is_combining_mark(*c)) {
        match ch {
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'đ' | 'ð' => out.push('d'),
            'Đ' | 'Ð' => out.push('D'),
            'ı' => out.push('i'),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("Ae"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("Oe"),
            'þ' => out.push_str("th"),
            'Þ' => out.push_str("Th"),
            other => out.push(other),
        }
    }
    out
}

/// Rows such as `TOT`, `2TM`, `3TM` summarise a traded player's stints.
pub fn is_multi_team_code(team: &str) -> bool {
    let t = team.trim().to_ascii_uppercase();
    if t == "TOT" {
        return true;
    }
    t.len() == 3 && t.ends_with("TM") && t.as_bytes()[0].is_ascii_digit()
}

pub fn is_league_average(player: &str) -> bool {
    player.trim().eq_ignore_ascii_case("league average")
}

/// Franchise abbreviation for a standings name in a given season (start year).
///
/// Returns the input unchanged when it already looks like an abbreviation,
/// `None` when the name is unknown.
pub fn team_abbreviation(name: &str, season: i32) -> Option<String> {
    let cleaned = name.trim().trim_end_matches('*').trim();
    let abbr = match cleaned {
        "Atlanta Hawks" => "ATL",
        "Boston Celtics" => "BOS",
        "Brooklyn Nets" => "BRK",
        "Chicago Bulls" => "CHI",
        "Charlotte Hornets" if season < 2004 => "CHH",
        "Charlotte Hornets" => "CHO",
        "Charlotte Bobcats" => "CHA",
        "Cleveland Cavaliers" => "CLE",
        "Dallas Mavericks" => "DAL",
        "Denver Nuggets" => "DEN",
        "Detroit Pistons" => "DET",
        "Golden State Warriors" => "GSW",
        "Houston Rockets" => "HOU",
        "Indiana Pacers" => "IND",
        "Kansas City Kings" => "KCK",
        "Los Angeles Clippers" => "LAC",
        "San Diego Clippers" => "SDC",
        "Los Angeles Lakers" => "LAL",
        "Memphis Grizzlies" => "MEM",
        "Vancouver Grizzlies" => "VAN",
        "Miami Heat" => "MIA",
        "Milwaukee Bucks" => "MIL",
        "Minnesota Timberwolves" => "MIN",
        "New Jersey Nets" => "NJN",
        "New Orleans Pelicans" => "NOP",
        "New Orleans Hornets" if (2005..=2006).contains(&season) => "NOK",
        "New Orleans Hornets" => "NOH",
        "New Orleans/Oklahoma City Hornets" => "NOK",
        "New York Knicks" => "NYK",
        "Oklahoma City Thunder" => "OKC",
        "Seattle SuperSonics" => "SEA",
        "Orlando Magic" => "ORL",
        "Philadelphia 76ers" => "PHI",
        "Phoenix Suns" => "PHO",
        "Portland Trail Blazers" => "POR",
        "Sacramento Kings" => "SAC",
        "San Antonio Spurs" => "SAS",
        "Toronto Raptors" => "TOR",
        "Utah Jazz" => "UTA",
        "Washington Wizards" => "WAS",
        "Washington Bullets" => "WSB",
        other => {
            let looks_like_code = (2..=4).contains(&other.len())
                && other
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if looks_like_code && !is_multi_team_code(other) {
                return Some(other.to_string());
            }
            return None;
        }
    };
    Some(abbr.to_string())
}
