//! Batch pipeline: per-file aggregation, cross-file tables, CSV export.
//!
//! These functions drive the segmenter, round parser and feature extractor
//! over whole files and batches, returning structured data so both the CLI
//! and tests use the same code paths. The batch entry point owns the one
//! destructive step in the system: deleting source logs after their
//! aggregate tables have been durably written.

use crate::hand_features::{compute_hand_features, HandFeatures};
use crate::log_parse::{find_dealt_hand, parse_round_result, segment_games};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Record types
// ============================================================================

/// One output record per (game, team) pair with a parsed result.
#[derive(Debug, Clone)]
pub struct PlayerGameRecord {
    pub game_no: u32,
    pub team_name: String,
    /// The team's dealt hand, from the file-wide lookup; empty if the file
    /// never announces one.
    pub hand: Vec<String>,
    /// Dense rank within the game, 1 = best.
    pub rank: u32,
    pub cards_left: u32,
    /// Points reported for this game alone.
    pub game_points: i64,
    /// Running sum of `game_points` for this team within the source file.
    pub total_points: i64,
    pub timestamp: DateTime<Local>,
    pub features: HandFeatures,
}

/// Wins table row: rank-1 finishes per team across the batch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WinsEntry {
    pub team_name: String,
    pub wins: u64,
}

/// Leaderboard row: summed `game_points` across the batch, dense-ranked.
///
/// `total_points` here is the cross-file sum, a different quantity from
/// the per-record running total that shares its name.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub team_name: String,
    pub total_points: i64,
    pub rank: u32,
}

// ============================================================================
// Per-file aggregation
// ============================================================================

/// Diagnostics from processing one log file.
#[derive(Debug, Clone, Default)]
pub struct FileSummary {
    /// Game segments found, including empty ones.
    pub games: usize,
    /// Records emitted.
    pub records: usize,
    /// Lines that were neither markers nor parseable results.
    pub skipped_lines: usize,
    /// Records whose hand failed card parsing and got zeroed features.
    pub zeroed_hands: usize,
}

/// One team's standing within the game currently being scored, kept in
/// first-encounter order.
struct GameLine {
    team_name: String,
    cards_left: u32,
    game_points: i64,
    total_points: i64,
}

/// Assign dense ranks for one game from (team, cumulative score) pairs.
///
/// The sort is stable and descending, so tied teams keep their
/// first-encounter order and every team gets a distinct consecutive rank.
fn rank_game(scores: &[(String, i64)]) -> Vec<(String, u32)> {
    let mut ordered: Vec<&(String, i64)> = scores.iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1));
    ordered
        .iter()
        .enumerate()
        .map(|(idx, (team, _))| (team.clone(), idx as u32 + 1))
        .collect()
}

/// Process one log file into per-(game, team) records.
pub fn process_log_file(path: &Path) -> Result<(Vec<PlayerGameRecord>, FileSummary)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    Ok(process_log_lines(&lines))
}

/// Process one log's lines into per-(game, team) records.
///
/// The cumulative score table lives here and only here: it threads through
/// every game of this log in order and is dropped when the function
/// returns, so nothing carries over into the next file.
pub fn process_log_lines(lines: &[String]) -> (Vec<PlayerGameRecord>, FileSummary) {
    let segmented = segment_games(lines);
    let mut summary = FileSummary {
        games: segmented.segments.len(),
        skipped_lines: segmented.ignored_lines,
        ..Default::default()
    };

    let mut cumulative: Vec<(String, i64)> = Vec::new();
    let mut records: Vec<PlayerGameRecord> = Vec::new();
    let now = Local::now();

    for segment in &segmented.segments {
        let mut game_lines: Vec<GameLine> = Vec::new();

        for line in &segment.result_lines {
            let result = match parse_round_result(line) {
                Some(r) => r,
                None => {
                    summary.skipped_lines += 1;
                    log::debug!("Skipping unparseable result line: {}", line);
                    continue;
                }
            };

            let running = match cumulative.iter_mut().find(|(t, _)| *t == result.team_name) {
                Some((_, total)) => {
                    *total += result.reported_points;
                    *total
                }
                None => {
                    cumulative.push((result.team_name.clone(), result.reported_points));
                    result.reported_points
                }
            };

            // A repeated result line for the same team in one game replaces
            // the earlier entry in place, keeping its first-seen position.
            match game_lines
                .iter_mut()
                .find(|g| g.team_name == result.team_name)
            {
                Some(existing) => {
                    existing.cards_left = result.cards_left;
                    existing.game_points = result.reported_points;
                    existing.total_points = running;
                }
                None => game_lines.push(GameLine {
                    team_name: result.team_name,
                    cards_left: result.cards_left,
                    game_points: result.reported_points,
                    total_points: running,
                }),
            }
        }

        if game_lines.is_empty() {
            continue;
        }

        let scores: Vec<(String, i64)> = game_lines
            .iter()
            .map(|g| (g.team_name.clone(), g.total_points))
            .collect();
        let ranks = rank_game(&scores);

        for entry in game_lines {
            let rank = ranks
                .iter()
                .find(|(team, _)| *team == entry.team_name)
                .map(|(_, r)| *r)
                .unwrap_or(0);
            let hand = find_dealt_hand(lines, &entry.team_name);
            let features = match compute_hand_features(&hand) {
                Ok(f) => f,
                Err(e) => {
                    summary.zeroed_hands += 1;
                    log::warn!(
                        "Game {}: invalid card in hand for {}: {}; features zeroed",
                        segment.game_no,
                        entry.team_name,
                        e
                    );
                    HandFeatures::default()
                }
            };
            records.push(PlayerGameRecord {
                game_no: segment.game_no,
                team_name: entry.team_name,
                hand,
                rank,
                cards_left: entry.cards_left,
                game_points: entry.game_points,
                total_points: entry.total_points,
                timestamp: now,
                features,
            });
        }
    }

    summary.records = records.len();
    (records, summary)
}

// ============================================================================
// Cross-file aggregation
// ============================================================================

/// Build the wins table: rank-1 counts per team, zero-win teams omitted,
/// rows ordered by team name.
pub fn build_wins(records: &[PlayerGameRecord]) -> Vec<WinsEntry> {
    let mut wins: Vec<WinsEntry> = Vec::new();
    for record in records.iter().filter(|r| r.rank == 1) {
        match wins.iter_mut().find(|w| w.team_name == record.team_name) {
            Some(entry) => entry.wins += 1,
            None => wins.push(WinsEntry {
                team_name: record.team_name.clone(),
                wins: 1,
            }),
        }
    }
    wins.sort_by(|a, b| a.team_name.cmp(&b.team_name));
    wins
}

/// Build the leaderboard: summed `game_points` per team across the whole
/// batch, dense-ranked descending, ties kept in first-appearance order.
pub fn build_leaderboard(records: &[PlayerGameRecord]) -> Vec<LeaderboardEntry> {
    let mut totals: Vec<(String, i64)> = Vec::new();
    for record in records {
        match totals.iter_mut().find(|(t, _)| *t == record.team_name) {
            Some((_, total)) => *total += record.game_points,
            None => totals.push((record.team_name.clone(), record.game_points)),
        }
    }
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals
        .into_iter()
        .enumerate()
        .map(|(idx, (team_name, total_points))| LeaderboardEntry {
            team_name,
            total_points,
            rank: idx as u32 + 1,
        })
        .collect()
}

// ============================================================================
// Batch run and export
// ============================================================================

/// Configuration for one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory holding the downloaded log files.
    pub input_dir: PathBuf,
    /// Directory the export tables are written into.
    pub output_dir: PathBuf,
    /// Also export the full per-(game, team) record table.
    pub export_records: bool,
    /// Keep source files instead of deleting them after export.
    pub keep_inputs: bool,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub files: usize,
    pub games: usize,
    pub records: usize,
    pub skipped_lines: usize,
    pub zeroed_hands: usize,
    pub wins_path: PathBuf,
    pub leaderboard_path: PathBuf,
    pub records_path: Option<PathBuf>,
}

const WINS_HEADERS: [&str; 2] = ["team_name", "wins"];
const LEADERBOARD_HEADERS: [&str; 3] = ["team_name", "total_points", "rank"];
const RECORD_HEADERS: [&str; 15] = [
    "game_no",
    "team_name",
    "hand",
    "rank",
    "cards_left",
    "game_points",
    "total_points",
    "timestamp",
    "flush_count",
    "pair_count",
    "three_kind_count",
    "four_kind_count",
    "straight_count",
    "straight_flush_count",
    "leftover_card_count",
];

/// Run a full batch: parse every file in the input directory, export the
/// aggregate tables, then delete the sources.
///
/// Files are visited in lexical order. Deletion happens only after every
/// export has been written to a temporary file, flushed and renamed into
/// place; any failure before that point leaves all inputs untouched. An
/// unreadable input likewise aborts the whole batch, since its partial
/// records would poison the aggregate.
pub fn run_batch(config: &BatchConfig) -> Result<BatchSummary> {
    let mut files: Vec<PathBuf> = fs::read_dir(&config.input_dir)
        .with_context(|| {
            format!(
                "Failed to read input directory {}",
                config.input_dir.display()
            )
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut all_records: Vec<PlayerGameRecord> = Vec::new();
    let mut summary = BatchSummary {
        files: files.len(),
        ..Default::default()
    };

    for path in &files {
        let (records, file_summary) = process_log_file(path)?;
        log::info!(
            "{}: {} games, {} records, {} lines skipped",
            path.display(),
            file_summary.games,
            file_summary.records,
            file_summary.skipped_lines
        );
        summary.games += file_summary.games;
        summary.skipped_lines += file_summary.skipped_lines;
        summary.zeroed_hands += file_summary.zeroed_hands;
        all_records.extend(records);
    }
    summary.records = all_records.len();

    let wins = build_wins(&all_records);
    let leaderboard = build_leaderboard(&all_records);

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let wins_path = config.output_dir.join(format!("wins_{}.csv", stamp));
    write_export(&wins_path, |writer| {
        writer.write_record(WINS_HEADERS)?;
        for row in &wins {
            writer.serialize(row)?;
        }
        Ok(())
    })?;

    let leaderboard_path = config
        .output_dir
        .join(format!("leaderboard_{}.csv", stamp));
    write_export(&leaderboard_path, |writer| {
        writer.write_record(LEADERBOARD_HEADERS)?;
        for row in &leaderboard {
            writer.serialize(row)?;
        }
        Ok(())
    })?;

    let records_path = if config.export_records {
        let path = config.output_dir.join(format!("records_{}.csv", stamp));
        write_export(&path, |writer| {
            writer.write_record(RECORD_HEADERS)?;
            for record in &all_records {
                writer.write_record(record_row(record))?;
            }
            Ok(())
        })?;
        Some(path)
    } else {
        None
    };

    // Every table is durably in place; the sources may now go.
    if !config.keep_inputs {
        for path in &files {
            fs::remove_file(path)
                .with_context(|| format!("Failed to delete source file {}", path.display()))?;
        }
        log::info!("Deleted {} source files", files.len());
    }

    summary.wins_path = wins_path;
    summary.leaderboard_path = leaderboard_path;
    summary.records_path = records_path;
    Ok(summary)
}

/// Write one CSV export via a temporary sibling, renaming into place only
/// after the write has flushed. Failures remove the temporary file and
/// leave the final path absent.
fn write_export<F>(path: &Path, write_rows: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<fs::File>) -> Result<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = (|| -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .with_context(|| format!("Failed to create export file {}", tmp.display()))?;
        write_rows(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush export file {}", tmp.display()))?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move export into place at {}", path.display()))
}

/// Flatten one record into the wide per-record CSV row.
fn record_row(record: &PlayerGameRecord) -> Vec<String> {
    let f = &record.features;
    vec![
        record.game_no.to_string(),
        record.team_name.clone(),
        record.hand.join(" "),
        record.rank.to_string(),
        record.cards_left.to_string(),
        record.game_points.to_string(),
        record.total_points.to_string(),
        record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        f.flush_count.to_string(),
        f.pair_count.to_string(),
        f.three_kind_count.to_string(),
        f.four_kind_count.to_string(),
        f.straight_count.to_string(),
        f.straight_flush_count.to_string(),
        f.leftover_card_count.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    fn result_line(team: &str, cards: u32, points: i64) -> String {
        format!(
            "Engine: {} finished with {} cards in hand. They are now on {} points",
            team, cards, points
        )
    }

    #[test]
    fn test_rank_game_dense_with_insertion_tiebreak() {
        let scores = vec![
            ("Bob".to_string(), 5),
            ("Alice".to_string(), 10),
            ("Carol".to_string(), 5),
        ];
        let ranks = rank_game(&scores);
        assert_eq!(ranks[0], ("Alice".to_string(), 1));
        // Bob and Carol tie on 5; Bob was seen first.
        assert_eq!(ranks[1], ("Bob".to_string(), 2));
        assert_eq!(ranks[2], ("Carol".to_string(), 3));
    }

    #[test]
    fn test_ranking_within_one_game() {
        let log = lines(&[
            "Engine: Starting Game",
            &result_line("Alice", 0, 10),
            &result_line("Bob", 3, -5),
            "Engine: Starting Game",
        ]);
        let (records, _) = process_log_lines(&log);
        assert_eq!(records.len(), 2);
        let alice = records.iter().find(|r| r.team_name == "Alice").unwrap();
        let bob = records.iter().find(|r| r.team_name == "Bob").unwrap();
        assert_eq!(alice.rank, 1);
        assert_eq!(bob.rank, 2);
        assert_eq!(alice.game_no, 2);
    }

    #[test]
    fn test_cumulative_score_threads_through_file() {
        let mut log = vec!["Engine: Starting Game".to_string()];
        for points in [10i64, 5, -3] {
            log.push(result_line("Alice", 0, points));
            log.push("Engine: Starting Game".to_string());
        }
        let (records, _) = process_log_lines(&log);
        let totals: Vec<i64> = records
            .iter()
            .filter(|r| r.team_name == "Alice")
            .map(|r| r.total_points)
            .collect();
        assert_eq!(totals, vec![10, 15, 12]);
        let game_points: Vec<i64> = records.iter().map(|r| r.game_points).collect();
        assert_eq!(game_points, vec![10, 5, -3]);
    }

    #[test]
    fn test_duplicate_result_line_replaces_and_reapplies() {
        let log = lines(&[
            &result_line("Alice", 5, 3),
            &result_line("Alice", 1, 4),
        ]);
        let (records, _) = process_log_lines(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cards_left, 1);
        assert_eq!(records[0].game_points, 4);
        // Both lines hit the running score.
        assert_eq!(records[0].total_points, 7);
    }

    #[test]
    fn test_malformed_result_lines_are_counted_not_fatal() {
        let log = lines(&[
            &result_line("Alice", 0, 10),
            "Engine: Bob finished with several cards in hand",
        ]);
        let (records, summary) = process_log_lines(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(summary.skipped_lines, 1);
    }

    #[test]
    fn test_hand_lookup_is_file_wide() {
        let log = lines(&[
            "Alice was dealt [ '3C', '3D' ]",
            "Engine: Starting Game",
            &result_line("Alice", 0, 10),
            "Engine: Starting Game",
            "Alice was dealt [ '9H' ]",
            &result_line("Alice", 2, 5),
        ]);
        let (records, _) = process_log_lines(&log);
        // Every game sees the first-found hand, wherever it appears.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hand, vec!["3C", "3D"]);
        assert_eq!(records[1].hand, vec!["3C", "3D"]);
        assert_eq!(records[0].features.pair_count, 1);
    }

    #[test]
    fn test_missing_hand_gives_empty_features() {
        let log = lines(&[&result_line("Alice", 0, 10)]);
        let (records, summary) = process_log_lines(&log);
        assert!(records[0].hand.is_empty());
        assert_eq!(records[0].features, HandFeatures::default());
        assert_eq!(summary.zeroed_hands, 0);
    }

    #[test]
    fn test_bad_card_zeroes_features_without_aborting() {
        let log = lines(&[
            "Alice was dealt [ 'ZZ' ]",
            &result_line("Alice", 0, 10),
        ]);
        let (records, summary) = process_log_lines(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].features, HandFeatures::default());
        assert_eq!(summary.zeroed_hands, 1);
    }

    #[test]
    fn test_build_wins_omits_zero_win_teams() {
        let log = lines(&[
            &result_line("Alice", 0, 10),
            &result_line("Bob", 3, -5),
        ]);
        let (records, _) = process_log_lines(&log);
        let wins = build_wins(&records);
        assert_eq!(wins.len(), 1);
        assert_eq!(wins[0].team_name, "Alice");
        assert_eq!(wins[0].wins, 1);
    }

    #[test]
    fn test_build_leaderboard_ranks_and_tiebreaks() {
        let log = lines(&[
            &result_line("Bob", 0, 5),
            &result_line("Alice", 1, 8),
            &result_line("Carol", 2, 5),
        ]);
        let (records, _) = process_log_lines(&log);
        let board = build_leaderboard(&records);
        assert_eq!(board[0].team_name, "Alice");
        assert_eq!(board[0].rank, 1);
        // Bob appeared before Carol; the 5-point tie keeps that order.
        assert_eq!(board[1].team_name, "Bob");
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[2].team_name, "Carol");
        assert_eq!(board[2].rank, 3);
    }

    #[test]
    fn test_aggregation_is_pure_over_records() {
        let log = lines(&[
            &result_line("Alice", 0, 10),
            &result_line("Bob", 3, -5),
        ]);
        let (records, _) = process_log_lines(&log);
        assert_eq!(build_wins(&records), build_wins(&records));
        assert_eq!(build_leaderboard(&records), build_leaderboard(&records));
    }

    #[test]
    fn test_write_export_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wins_test.csv");
        let failed: Result<()> = write_export(&path, |_| Err(anyhow::anyhow!("disk full")));
        assert!(failed.is_err());
        assert!(!path.exists());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
