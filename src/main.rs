use std::{error::Error, fs, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use guitar_tab::{
    config::{verbosity_to_level, PipelineConfig, Tuning},
    constants::{MODEL_PATH, POSITIONS_PER_LINE},
    dataset::{AssemblyOptions, CorpusLayout, DatasetBuilder, ErrorPolicy, RecordingMode},
    inference::{transcribe, OnnxFretModel},
    postprocessing::tab::{render_ascii, to_json},
    preprocessing::{cqt::ConstantQ, load_audio::WavFile},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Guitar audio to tablature")]
struct Args {
    /// Pipeline settings as TOML; missing keys keep their defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// 0 = silent .. 4 = debug. Overrides the config file.
    #[arg(short, long, global = true)]
    verbosity: Option<u8>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a training set from annotated recordings.
    Dataset {
        #[arg(long, default_value = "data/raw")]
        audio_root: PathBuf,
        /// Defaults to <audio_root>/annotation.
        #[arg(long)]
        annotation_root: Option<PathBuf>,
        #[arg(long, default_value = "data/output")]
        output: PathBuf,
        /// Recording modes: mm, mp, pd, po or all.
        #[arg(short, long, value_delimiter = ',', default_value = "mm")]
        modes: Vec<String>,
        /// Only use takes whose name contains this, e.g. "solo" or "comp".
        #[arg(short, long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        subset: f32,
        #[arg(long, default_value_t = guitar_tab::constants::DEFAULT_REMOVE_NOISE)]
        remove_noise: f32,
        #[arg(long)]
        fail_fast: bool,
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        no_save: bool,
    },
    /// Transcribe a WAV file with a trained model.
    Transcribe {
        audio: PathBuf,
        #[arg(short, long, default_value = MODEL_PATH)]
        model: PathBuf,
        /// standard, drop_d or half_step_down.
        #[arg(short, long)]
        tuning: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Ascii)]
        format: OutputFormat,
        /// Write here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Ascii,
    Json,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(verbosity) = args.verbosity {
        config.verbosity = verbosity;
    }
    let log_level = verbosity_to_level(config.verbosity).to_string();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Dataset {
            audio_root,
            annotation_root,
            output,
            modes,
            filter,
            subset,
            remove_noise,
            fail_fast,
            parallel,
            no_save,
        } => {
            let options = AssemblyOptions {
                modes: RecordingMode::parse_list(&modes)?,
                filter,
                subset,
                remove_noise,
                policy: if fail_fast { ErrorPolicy::FailFast } else { ErrorPolicy::SkipFile },
                parallel,
                save: !no_save,
            };
            let annotation_root = annotation_root.unwrap_or_else(|| audio_root.join("annotation"));
            let layout = CorpusLayout::new(audio_root, annotation_root, output);

            let transform = ConstantQ::new(&config)?;
            let builder = DatasetBuilder::new(layout, config, &transform)?;
            let (set, report) = builder.assemble(&options)?;

            println!(
                "{} windows from {} takes ({} skipped)",
                set.len(),
                report.processed.len(),
                report.skipped.len()
            );
            for skipped in &report.skipped {
                println!("  skipped {}: {}", skipped.entry.audio_path.display(), skipped.reason);
            }
            if let Some((data, labels)) = report.saved_to {
                println!("saved {} and {}", data.display(), labels.display());
            }
        }
        Command::Transcribe { audio, model, tuning, format, output } => {
            if let Some(name) = tuning {
                config.tuning = Tuning::from_name(&name)?;
                config.validate()?;
            }

            let transform = ConstantQ::new(&config)?;
            let mut model = OnnxFretModel::from_file(&model, &config)?;
            let events = transcribe(&WavFile::new(&audio), &transform, &mut model, &config)?;
            info!("Transcribed {} notes from {}.", events.len(), audio.display());

            let rendered = match format {
                OutputFormat::Ascii => render_ascii(&events, &config.tuning, POSITIONS_PER_LINE),
                OutputFormat::Json => to_json(&events)?,
            };
            match output {
                Some(path) => fs::write(&path, rendered + "\n")?,
                None => println!("{}", rendered),
            }
        }
    }

    Ok(())
}
