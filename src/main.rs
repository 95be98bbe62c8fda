use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use colloquy::{
    parse_diarizer_file, process, write_report_json, ChunkerConfig, DispatchConfig, EngineConfig,
    ExtractionConfig, HttpExtractionClient, ReportDigest, SpeakerConfig, TranscriptMetadata,
};

#[derive(Parser)]
#[command(name = "colloquy")]
#[command(author, version, about = "Intelligence aggregation over diarized transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities, topics and key moments from a diarized transcript
    Process {
        /// Input diarized transcript (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the intelligence report (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Optional human-readable digest (text)
        #[arg(long)]
        digest: Option<PathBuf>,

        /// Title of the recording, passed to extraction as context
        #[arg(long)]
        title: Option<String>,

        /// Source of the recording (feed, channel, publication)
        #[arg(long)]
        source: Option<String>,

        /// Maximum characters per extraction chunk
        #[arg(long, default_value = "45000")]
        max_chunk_chars: usize,

        /// Expected maximum number of real speakers
        #[arg(long, default_value = "4")]
        expected_speakers: usize,

        /// Concurrent chunk extractions
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Skip the speaker verification pass
        #[arg(long)]
        no_verify: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the chunk plan and speaker statistics without calling any service
    Inspect {
        /// Input diarized transcript (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Maximum characters per extraction chunk
        #[arg(long, default_value = "45000")]
        max_chunk_chars: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            digest,
            title,
            source,
            max_chunk_chars,
            expected_speakers,
            concurrency,
            no_verify,
            verbose,
        } => {
            setup_logging(verbose);
            process_transcript(
                input,
                output,
                digest,
                title,
                source,
                max_chunk_chars,
                expected_speakers,
                concurrency,
                no_verify,
            )
            .await
        }
        Commands::Inspect {
            input,
            max_chunk_chars,
            verbose,
        } => {
            setup_logging(verbose);
            inspect_transcript(input, max_chunk_chars).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn process_transcript(
    input: PathBuf,
    output: PathBuf,
    digest: Option<PathBuf>,
    title: Option<String>,
    source: Option<String>,
    max_chunk_chars: usize,
    expected_speakers: usize,
    concurrency: usize,
    no_verify: bool,
) -> Result<()> {
    info!("Loading transcript from {:?}", input);
    let transcript =
        parse_diarizer_file(&input).context("Failed to parse input transcript")?;

    info!(
        "Loaded {} segments, {} speakers, {:.1} minutes",
        transcript.segments.len(),
        transcript.speakers.len(),
        transcript.duration_ms() as f64 / 60_000.0
    );

    let api_config = ExtractionConfig::from_env()?;
    let client = HttpExtractionClient::new(api_config)?;

    let config = EngineConfig {
        chunker: ChunkerConfig {
            max_chars: max_chunk_chars,
        },
        dispatch: DispatchConfig {
            concurrency,
            ..Default::default()
        },
        speakers: SpeakerConfig {
            expected_max_speakers: expected_speakers,
            ..Default::default()
        },
        ..Default::default()
    };

    let metadata = TranscriptMetadata {
        title,
        source,
        duration_ms: 0,
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; letting in-flight chunks finish");
            cancel_tx.send(true).ok();
        }
    });

    let verifier = (!no_verify).then_some(&client);
    let report = process(&transcript, metadata, &client, verifier, &config, &cancel_rx).await?;

    write_report_json(&report, &output).context("Failed to write report")?;
    info!("Report written to {:?}", output);

    if let Some(digest_path) = digest {
        ReportDigest::new(&report)
            .write_file(&digest_path)
            .context("Failed to write digest")?;
        info!("Digest written to {:?}", digest_path);
    }

    if report.incomplete {
        warn!(
            "Run incomplete: {} chunks degraded",
            report.diagnostics.degraded_chunk_count()
        );
    }
    info!(
        "Complete: {} entities, {} relationships, {} key moments, ${:.4}",
        report.entities.len(),
        report.relationships.len(),
        report.key_moments.len(),
        report.cost_report.total_cost_usd
    );

    Ok(())
}

async fn inspect_transcript(input: PathBuf, max_chunk_chars: usize) -> Result<()> {
    use colloquy::models::format_timestamp;
    use colloquy::pipeline::{chunk_segments, correct_speakers};

    info!("Inspecting transcript from {:?}", input);
    let transcript =
        parse_diarizer_file(&input).context("Failed to parse input transcript")?;

    println!("Transcript Inspection");
    println!("=====================");
    println!("Segments: {}", transcript.segments.len());
    println!("Characters: {}", transcript.char_count());
    println!(
        "Duration: {:.1}s",
        transcript.duration_ms() as f64 / 1000.0
    );
    println!(
        "Language: {}",
        transcript.detected_language.as_deref().unwrap_or("unknown")
    );
    println!();

    let chunker_config = ChunkerConfig {
        max_chars: max_chunk_chars,
    };
    let chunks = chunk_segments(&transcript.segments, &chunker_config);

    println!("Chunk Plan");
    println!("----------");
    for chunk in &chunks {
        println!(
            "chunk {}: {} segments, {} chars (~{} tokens), {} to {}",
            chunk.index,
            chunk.segments.len(),
            chunk.char_count,
            chunk.token_estimate(),
            format_timestamp(chunk.start_ms()),
            format_timestamp(chunk.end_ms())
        );
    }
    println!();

    println!("Speaker Statistics");
    println!("------------------");
    for label in &transcript.speakers {
        let segment_count = transcript
            .segments
            .iter()
            .filter(|s| &s.speaker == label)
            .count();
        let overlapped = transcript
            .segments
            .iter()
            .filter(|s| &s.speaker == label && s.overlapped)
            .count();
        let embedding = if transcript.speaker_embeddings.contains_key(label) {
            "yes"
        } else {
            "no"
        };
        println!(
            "{}: {} segments ({} overlapped), {:.1} min, embedding: {}",
            label,
            segment_count,
            overlapped,
            transcript.speech_ms_for(label) as f64 / 60_000.0,
            embedding
        );
    }
    println!();

    // Embedding pass only; `process` adds the verifier pass when needed.
    let speaker_result =
        correct_speakers(&transcript, None::<&HttpExtractionClient>, &SpeakerConfig::default())
            .await;

    println!("Speaker Merge Preview");
    println!("---------------------");
    for speaker in &speaker_result.map.merged {
        let members: Vec<&str> = speaker.members.iter().map(String::as_str).collect();
        println!(
            "{} <- {} ({:.1} min, {} segments)",
            speaker.merged_id,
            members.join(" + "),
            speaker.total_speech_ms as f64 / 60_000.0,
            speaker.segment_count
        );
    }
    println!(
        "{} raw labels -> {} speakers ({} embedding merges)",
        transcript.speakers.len(),
        speaker_result.map.merged_count(),
        speaker_result.embedding_merges
    );

    Ok(())
}
