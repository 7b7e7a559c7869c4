//! Big Two Stats Tool - Parse tournament logs and build result tables
//!
//! This tool processes directories of engine log files into timestamped
//! wins/leaderboard CSV exports, and offers spot-check commands for single
//! files and single hands.

use anyhow::Result;
use bigtwo_stats::hand_features::compute_hand_features;
use bigtwo_stats::pipeline::{process_log_file, run_batch, BatchConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bigtwo-stats")]
#[command(about = "Parse Big Two tournament logs and build wins/leaderboard tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of log files into timestamped CSV exports.
    ///
    /// Source files are deleted once the exports are durably written;
    /// any failure before that point leaves them in place.
    Process {
        /// Directory containing the downloaded log files
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the export tables into
        #[arg(short, long, default_value = "data/processed")]
        output: PathBuf,

        /// Also export the full per-(game, team) record table
        #[arg(long)]
        records: bool,

        /// Keep source files instead of deleting them after export
        #[arg(long)]
        keep_inputs: bool,
    },

    /// Parse one log file and print its records without exporting or deleting
    Inspect {
        /// Log file to inspect
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compute hand features for a hand given as comma-separated card codes
    Features {
        /// Hand as card codes, e.g. "3C,4C,5C,6C,7C"
        hand: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            records,
            keep_inputs,
        } => {
            let summary = run_batch(&BatchConfig {
                input_dir: input,
                output_dir: output,
                export_records: records,
                keep_inputs,
            })?;
            println!(
                "Processed {} files: {} games, {} records ({} lines skipped, {} hands zeroed)",
                summary.files,
                summary.games,
                summary.records,
                summary.skipped_lines,
                summary.zeroed_hands
            );
            println!("Wins table:        {}", summary.wins_path.display());
            println!("Leaderboard table: {}", summary.leaderboard_path.display());
            if let Some(path) = summary.records_path {
                println!("Records table:     {}", path.display());
            }
        }

        Commands::Inspect { input } => {
            let (records, summary) = process_log_file(&input)?;
            println!(
                "{}: {} games, {} records, {} lines skipped",
                input.display(),
                summary.games,
                summary.records,
                summary.skipped_lines
            );
            for record in &records {
                println!(
                    "game {:>3}  rank {}  {:<20} cards_left={:<2} game_points={:<5} total_points={:<5} hand=[{}]",
                    record.game_no,
                    record.rank,
                    record.team_name,
                    record.cards_left,
                    record.game_points,
                    record.total_points,
                    record.hand.join(" ")
                );
            }
        }

        Commands::Features { hand } => {
            let cards: Vec<String> = hand
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            let features = compute_hand_features(&cards)?;
            println!("flush_count:          {}", features.flush_count);
            println!("pair_count:           {}", features.pair_count);
            println!("three_kind_count:     {}", features.three_kind_count);
            println!("four_kind_count:      {}", features.four_kind_count);
            println!("straight_count:       {}", features.straight_count);
            println!("straight_flush_count: {}", features.straight_flush_count);
            println!("leftover_card_count:  {}", features.leftover_card_count);
        }
    }

    Ok(())
}
