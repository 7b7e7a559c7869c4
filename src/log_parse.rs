//! Line-level parsing of tournament engine logs
//!
//! A session log interleaves engine chatter with three kinds of lines we
//! care about: game-start markers, round-result lines, and dealt-hand
//! announcements. This module splits a log into numbered game segments and
//! extracts structured data from the individual lines.

use lazy_static::lazy_static;
use regex::Regex;

/// Marker printed by the engine at the start of every game.
pub const GAME_START_MARKER: &str = "Engine: Starting Game";

/// Substring present in every round-result line.
pub const RESULT_MARKER: &str = "finished with";

lazy_static! {
    /// Full shape of a round-result line. Matching is purely syntactic;
    /// lines that fail it are tolerated and skipped upstream.
    static ref RESULT_PATTERN: Regex = Regex::new(
        r"Engine: (.*) finished with (\d+) cards in hand\. They are now on (-?\d+) points"
    )
    .unwrap();

    /// Bracketed card list in a dealt-hand line.
    static ref HAND_PATTERN: Regex = Regex::new(r"\[(.*?)\]").unwrap();
}

/// One parsed round-result line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub team_name: String,
    /// Cards the team still held when the round ended.
    pub cards_left: u32,
    /// Points reported for this round; may be negative.
    pub reported_points: i64,
}

/// Result lines for one game, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSegment {
    /// 1-based game number in file-encounter order.
    pub game_no: u32,
    pub result_lines: Vec<String>,
}

/// Segmentation output: ordered game segments plus a diagnostic count of
/// the lines that were neither markers nor result lines.
#[derive(Debug, Clone, Default)]
pub struct SegmentedLog {
    pub segments: Vec<GameSegment>,
    pub ignored_lines: usize,
}

/// Split a log's lines into numbered game segments.
///
/// Numbering starts at 1 and increments on every start marker, and a
/// marker pushes the segment it closes even when that segment is empty.
/// A log that opens with a start marker therefore records its first
/// results under game 2; the first game is numbered 1 only when results
/// appear before any marker. A trailing non-empty segment is pushed at
/// end of input.
pub fn segment_games(lines: &[String]) -> SegmentedLog {
    let mut segments = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut game_no: u32 = 1;
    let mut ignored = 0usize;

    for line in lines {
        if line.contains(GAME_START_MARKER) {
            segments.push(GameSegment {
                game_no,
                result_lines: std::mem::take(&mut current),
            });
            game_no += 1;
        } else if line.contains(RESULT_MARKER) {
            current.push(line.trim().to_string());
        } else {
            ignored += 1;
        }
    }
    if !current.is_empty() {
        segments.push(GameSegment {
            game_no,
            result_lines: current,
        });
    }

    SegmentedLog {
        segments,
        ignored_lines: ignored,
    }
}

/// Parse one result line, or `None` if it does not fit the full pattern.
///
/// Numeric fields are validated here; a value that does not fit the field
/// type makes the line malformed rather than panicking downstream.
pub fn parse_round_result(line: &str) -> Option<RoundResult> {
    let caps = RESULT_PATTERN.captures(line)?;
    let cards_left: u32 = caps[2].parse().ok()?;
    let reported_points: i64 = caps[3].parse().ok()?;
    Some(RoundResult {
        team_name: caps[1].to_string(),
        cards_left,
        reported_points,
    })
}

/// Find a team's dealt hand anywhere in the file.
///
/// Returns the card list from the first line containing
/// "`<team>` was dealt" that carries a bracketed list, with quotes
/// stripped from each code. The search is file-wide, not scoped to one
/// game: every game a team plays in this file sees the same hand. An
/// empty vector means no such line exists.
pub fn find_dealt_hand(lines: &[String], team_name: &str) -> Vec<String> {
    let needle = format!("{} was dealt", team_name);
    for line in lines {
        if !line.contains(&needle) {
            continue;
        }
        if let Some(caps) = HAND_PATTERN.captures(line) {
            return caps[1]
                .split(',')
                .map(|code| {
                    code.trim()
                        .trim_matches(|c| c == '\'' || c == '"')
                        .to_string()
                })
                .filter(|code| !code.is_empty())
                .collect();
        }
    }
    Vec::new()
}
