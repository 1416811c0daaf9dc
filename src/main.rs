use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use legalcode_pipeline::config::{Config, ConfigLoader};
use legalcode_pipeline::storage::Database;
use legalcode_pipeline::types::{Classification, PipelineError, Result, Section, SectionId, SimilarityPair};
use legalcode_pipeline::{corpus, dedup, filters, loader, similarity, stages};

#[derive(Parser)]
#[command(name = "legalcode-pipeline")]
#[command(version, about = "Checkpointed legal-corpus analysis pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, env = "PIPELINE_CONFIG", default_value = "pipeline.toml")]
    config: PathBuf,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

/// Arguments shared by every one-input/one-output stage (S3, S4, S6, S7,
/// S8, S10, S11).
#[derive(clap::Args)]
struct StageArgs {
    #[arg(long)]
    jurisdiction: String,
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    output: PathBuf,
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// S1: parse a jurisdiction's pre-structured corpus JSON into structure/section NDJSON.
    ParseCorpus {
        #[arg(long)]
        jurisdiction: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        structure_out: PathBuf,
        #[arg(long)]
        sections_out: PathBuf,
    },

    /// S2: near-duplicate detection across one jurisdiction's sections.
    Dedup {
        #[arg(long)]
        jurisdiction: String,
        #[arg(long)]
        sections: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// S3: regex cross-reference extraction.
    ExtractRefs(StageArgs),

    /// S4: regex obligation extraction.
    ExtractObligations(StageArgs),

    /// S5: embed sections and emit cross-jurisdiction similarity pairs.
    Embed {
        #[arg(long)]
        jurisdiction: String,
        #[arg(long)]
        sections: PathBuf,
        #[arg(long)]
        cache: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// S6: LLM obligation extraction, gated by the S4 regex disjunction.
    FilterObligations(StageArgs),

    /// S7: cross-encoder reporting-obligation pre-filter.
    FilterReporting(StageArgs),

    /// S8: LLM reporting-obligation indicator analysis.
    LlmReporting(StageArgs),

    /// S9: LLM classification of each S5 similarity pair's relationship.
    LlmClassify {
        #[arg(long)]
        jurisdiction: String,
        #[arg(long)]
        sections: PathBuf,
        #[arg(long)]
        pairs: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },

    /// S10: LLM anachronism analysis.
    LlmAnachronisms(StageArgs),

    /// S11: LLM implementation-gap analysis.
    LlmImplementation(StageArgs),

    /// S12: bulk-load one jurisdiction's NDJSON stage outputs into SQLite.
    Load {
        #[arg(long)]
        jurisdiction: String,
        #[arg(long)]
        data_dir: PathBuf,
    },
}

/// Set up panic handler for graceful error reporting.
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mThe pipeline encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(Some(exit_code)) => ExitCode::from(exit_code),
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Reads every record of an NDJSON file into memory. Used by the stages
/// that need the whole jurisdiction's sections at once (S2, S5, S9)
/// rather than streaming through [`stages::run_stage`].
fn read_ndjson_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<Vec<T>> {
    let contents = std::fs::read_to_string(path).map_err(PipelineError::Io)?;
    let mut records = Vec::new();
    for (line_number, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(line_number, error = %err, "skipping malformed NDJSON line");
            }
        }
    }
    Ok(records)
}

fn write_ndjson_file<T: serde::Serialize>(path: &PathBuf, records: &[T]) -> Result<()> {
    let mut writer = legalcode_pipeline::ndjson::AppendWriter::<T>::open(path)?;
    for record in records {
        writer.write(record)?;
    }
    writer.close()
}

fn load_config(path: &PathBuf) -> Result<Config> {
    if path.exists() {
        ConfigLoader::load_from_file(path)
    } else {
        ConfigLoader::load()
    }
}

fn run_cli() -> anyhow::Result<Option<u8>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli.config)?;
    let db = Database::open(&config.database_path)?;
    db.initialize()?;
    let rt = Runtime::new()?;

    match cli.command {
        Commands::ParseCorpus {
            jurisdiction,
            input,
            structure_out,
            sections_out,
        } => {
            run_parse_corpus(&jurisdiction, &input, &structure_out, &sections_out)?;
            println!("parse-corpus: wrote {} and {}", structure_out.display(), sections_out.display());
            Ok(None)
        }

        Commands::Dedup {
            jurisdiction: _,
            sections,
            output,
        } => {
            let summary = run_dedup(&sections, &output, &config)?;
            println!("dedup: {summary}");
            Ok(None)
        }

        Commands::ExtractRefs(args) => {
            let summary = rt.block_on(run_extract_refs(&db, args))?;
            println!("extract-refs: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::ExtractObligations(args) => {
            let summary = rt.block_on(run_extract_obligations(&db, args))?;
            println!("extract-obligations: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::Embed {
            jurisdiction: _,
            sections,
            cache,
            output,
        } => {
            let summary = rt.block_on(run_embed(&sections, &cache, &output, &config))?;
            println!("embed: {summary}");
            Ok(None)
        }

        Commands::FilterObligations(args) => {
            let summary = rt.block_on(run_filter_obligations(&db, args, &config))?;
            println!("filter-obligations: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::FilterReporting(args) => {
            let summary = rt.block_on(run_filter_reporting(&db, args, &config))?;
            println!("filter-reporting: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::LlmReporting(args) => {
            let summary = rt.block_on(run_llm_indicators(
                &db,
                args,
                &config,
                "llm_reporting",
                stages::llm::reporting_prompt,
            ))?;
            println!("llm-reporting: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::LlmAnachronisms(args) => {
            let summary = rt.block_on(run_llm_indicators(
                &db,
                args,
                &config,
                "llm_anachronisms",
                stages::llm::anachronism_prompt,
            ))?;
            println!("llm-anachronisms: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::LlmImplementation(args) => {
            let summary = rt.block_on(run_llm_indicators(
                &db,
                args,
                &config,
                "llm_implementation",
                stages::llm::implementation_prompt,
            ))?;
            println!("llm-implementation: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::LlmClassify {
            jurisdiction,
            sections,
            pairs,
            output,
            workers,
        } => {
            let summary = rt.block_on(run_llm_classify(&db, &jurisdiction, &sections, &pairs, &output, workers, &config))?;
            println!("llm-classify: {}", summary.report());
            Ok(summary.interrupted_by_signal.map(|n| 128u8.saturating_add(n)))
        }

        Commands::Load { jurisdiction, data_dir } => {
            let report = run_load(&db, &jurisdiction, &data_dir, &config)?;
            println!("load: {report}");
            Ok(None)
        }
    }
}

fn run_parse_corpus(
    jurisdiction: &str,
    input: &PathBuf,
    structure_out: &PathBuf,
    sections_out: &PathBuf,
) -> Result<()> {
    #[derive(serde::Deserialize)]
    struct CorpusInput {
        structure: Vec<legalcode_pipeline::types::StructureNode>,
        sections: Vec<(Section, Option<String>)>,
    }

    let raw = std::fs::read_to_string(input).map_err(PipelineError::Io)?;
    let parsed: CorpusInput = serde_json::from_str(&raw)?;
    tracing::info!(jurisdiction, "parsing corpus");

    let parser = corpus::InMemoryCorpus::new(parsed.structure, parsed.sections);
    let structure = parser.parse_structure()?;
    let sections = parser.parse_sections(&structure)?;

    write_ndjson_file(structure_out, &structure)?;
    write_ndjson_file(sections_out, &sections)?;
    Ok(())
}

fn run_dedup(sections_path: &PathBuf, output: &PathBuf, config: &Config) -> Result<String> {
    let sections: Vec<Section> = read_ndjson_file(sections_path)?;
    let count = sections.len();
    let map = dedup::run(&sections, &config.dedup);
    let bytes = serde_json::to_vec_pretty(&map)?;
    std::fs::write(output, bytes).map_err(PipelineError::Io)?;
    Ok(format!("sections={count} duplicates={}", map.len()))
}

async fn run_extract_refs(
    db: &Database,
    args: StageArgs,
) -> Result<stages::StageSummary> {
    let stage_config = stages::StageConfig {
        stage: "extract_refs".to_string(),
        jurisdiction: args.jurisdiction,
        input_path: args.input,
        output_path: args.output,
        workers: args.workers,
    };
    stages::run_fanout_stage(db, stage_config, |section: Section| async move {
        Ok(filters::extract_references(&section))
    })
    .await
}

async fn run_extract_obligations(
    db: &Database,
    args: StageArgs,
) -> Result<stages::StageSummary> {
    let stage_config = stages::StageConfig {
        stage: "extract_obligations".to_string(),
        jurisdiction: args.jurisdiction,
        input_path: args.input,
        output_path: args.output,
        workers: args.workers,
    };
    stages::run_fanout_stage(db, stage_config, |section: Section| async move {
        Ok(filters::extract_obligations(&section))
    })
    .await
}

async fn run_embed(
    sections_path: &PathBuf,
    cache_path: &PathBuf,
    output: &PathBuf,
    config: &Config,
) -> Result<String> {
    let sections: Vec<Section> = read_ndjson_file(sections_path)?;
    let embedder = similarity::HttpEmbedder::new(
        config.similarity.embedder_api_base.clone(),
        config.similarity.embedder_model.clone(),
        config.similarity.embedding_dim,
        config.llm.timeout_secs,
    )?;

    let mut cache = legalcode_pipeline::similarity::EmbeddingCache::open(cache_path)?;
    let mut entries = Vec::with_capacity(sections.len());
    let mut newly_embedded = 0u64;

    for section in &sections {
        if !cache.contains(&section.id) {
            let vector = {
                use legalcode_pipeline::similarity::Embedder;
                embedder.embed(&section.text).await?
            };
            cache.insert(&section.id, vector);
            newly_embedded += 1;
            if newly_embedded % 500 == 0 {
                cache.save()?;
            }
        }
        if let Some(vector) = cache.get(&section.id) {
            entries.push((section.id.clone(), vector.clone()));
        }
    }
    cache.save()?;

    let pairs = similarity::top_k_pairs(&entries, &config.similarity);
    write_ndjson_file(output, &pairs)?;

    Ok(format!(
        "sections={} newly_embedded={newly_embedded} pairs={}",
        sections.len(),
        pairs.len()
    ))
}

async fn run_filter_obligations(
    db: &Database,
    args: StageArgs,
    config: &Config,
) -> Result<stages::StageSummary> {
    let regex_filter = filters::RegexFilter::new();
    let cascade = stages::build_cascade(&config.llm)?;
    let schema = stages::llm::obligation_schema();

    let stage_config = stages::StageConfig {
        stage: "filter_obligations".to_string(),
        jurisdiction: args.jurisdiction,
        input_path: args.input,
        output_path: args.output,
        workers: args.workers,
    };

    stages::run_fanout_stage(db, stage_config, |section: Section| {
        let regex_filter = &regex_filter;
        let cascade = &cascade;
        let schema = &schema;
        async move {
            if !regex_filter.matches(&section) {
                return Ok(Vec::new());
            }
            let prompt = stages::llm::obligation_prompt(&section);
            let (response, _stats) = cascade.generate(&prompt, schema).await?;
            stages::llm::parse_obligations(&response.content, &section.id)
        }
    })
    .await
}

async fn run_filter_reporting(
    db: &Database,
    args: StageArgs,
    config: &Config,
) -> Result<stages::StageSummary> {
    let encoder = filters::LexicalOverlapEncoder;
    let threshold = config.filter.nli_threshold;

    let stage_config = stages::StageConfig {
        stage: "filter_reporting".to_string(),
        jurisdiction: args.jurisdiction,
        input_path: args.input,
        output_path: args.output,
        workers: args.workers,
    };

    stages::run_stage(db, stage_config, |section: Section| {
        let encoder = &encoder;
        async move {
            if filters::passes(encoder, &section, threshold) {
                Ok(Some(section))
            } else {
                Ok(None)
            }
        }
    })
    .await
}

async fn run_llm_indicators(
    db: &Database,
    args: StageArgs,
    config: &Config,
    stage_name: &'static str,
    prompt_fn: fn(&Section) -> String,
) -> Result<stages::StageSummary> {
    let cascade = stages::build_cascade(&config.llm)?;
    let schema = stages::llm::indicator_schema();

    let stage_config = stages::StageConfig {
        stage: stage_name.to_string(),
        jurisdiction: args.jurisdiction,
        input_path: args.input,
        output_path: args.output,
        workers: args.workers,
    };

    stages::run_stage(db, stage_config, |section: Section| {
        let cascade = &cascade;
        let schema = &schema;
        async move {
            let prompt = prompt_fn(&section);
            let (response, _stats) = cascade.generate(&prompt, schema).await?;
            let indicators = stages::llm::parse_indicators(&response.content)?;
            if indicators.is_empty() {
                Ok(None)
            } else {
                Ok(Some(IndicatorRecord {
                    section_id: section.id,
                    indicators,
                }))
            }
        }
    })
    .await
}

/// Shared output shape for S8/S10/S11; each writes to a differently-named
/// NDJSON file but the record layout is identical (spec §3).
#[derive(serde::Serialize)]
struct IndicatorRecord {
    section_id: SectionId,
    indicators: Vec<legalcode_pipeline::types::Indicator>,
}

async fn run_llm_classify(
    db: &Database,
    jurisdiction: &str,
    sections_path: &PathBuf,
    pairs_path: &PathBuf,
    output: &PathBuf,
    workers: usize,
    config: &Config,
) -> Result<stages::StageSummary> {
    let sections: Vec<Section> = read_ndjson_file(sections_path)?;
    let by_id: HashMap<SectionId, Section> =
        sections.into_iter().map(|s| (s.id.clone(), s)).collect();

    let cascade = stages::build_cascade(&config.llm)?;
    let schema = stages::llm::classification_schema();

    let stage_config = stages::StageConfig {
        stage: "llm_classify".to_string(),
        jurisdiction: jurisdiction.to_string(),
        input_path: pairs_path.clone(),
        output_path: output.clone(),
        workers,
    };

    stages::run_stage(db, stage_config, |pair: SimilarityPair| {
        let cascade = &cascade;
        let schema = &schema;
        let by_id = &by_id;
        async move {
            let (Some(section_a), Some(section_b)) = (by_id.get(&pair.section_a), by_id.get(&pair.section_b)) else {
                tracing::warn!(
                    section_a = %pair.section_a,
                    section_b = %pair.section_b,
                    "skipping similarity pair referencing an unknown section"
                );
                return Ok::<Option<Classification>, PipelineError>(None);
            };
            let prompt = stages::llm::classification_prompt(section_a, section_b, pair.score);
            let (response, _stats) = cascade.generate(&prompt, schema).await?;
            let classification =
                stages::llm::parse_classification(&response.content, pair.section_a, pair.section_b)?;
            Ok(Some(classification))
        }
    })
    .await
}

fn run_load(db: &Database, jurisdiction: &str, data_dir: &PathBuf, config: &Config) -> Result<String> {
    let driver = loader::LoaderDriver::new(db, config.loader.clone());
    let mut totals = loader::LoaderReport::default();

    macro_rules! load_table {
        ($stage:literal, $file:literal, $write_batch:expr) => {
            let path = data_dir.join($file);
            if path.exists() {
                let report = driver.run($stage, jurisdiction, &path, $write_batch)?;
                tracing::info!(stage = $stage, inserted = report.inserted, updated = report.updated, "table loaded");
                totals.inserted += report.inserted;
                totals.updated += report.updated;
                totals.skipped += report.skipped;
                totals.errors += report.errors;
            } else {
                tracing::info!(stage = $stage, path = %path.display(), "no output file, skipping table");
            }
        };
    }

    load_table!("load_structure", "structure.ndjson", loader::write_structure);
    load_table!("load_sections", "sections.ndjson", loader::write_sections);
    load_table!("load_refs", "refs.ndjson", loader::write_section_refs(jurisdiction));
    load_table!("load_obligations", "obligations.ndjson", loader::write_obligations(jurisdiction));
    load_table!("load_similarities", "similarities.ndjson", loader::write_similarities(jurisdiction));
    load_table!("load_classifications", "classifications.ndjson", loader::write_classifications(jurisdiction));
    load_table!("load_reporting", "reporting.ndjson", loader::write_reporting(jurisdiction));
    load_table!("load_anachronisms", "anachronisms.ndjson", loader::write_anachronisms(jurisdiction));
    load_table!("load_implementation", "implementation.ndjson", loader::write_implementation(jurisdiction));

    Ok(format!(
        "inserted={} updated={} skipped={} errors={}",
        totals.inserted, totals.updated, totals.skipped, totals.errors
    ))
}
