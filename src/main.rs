use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use oodlab::data::filter::Interval;
use oodlab::niqe::params::{DatasetName, ImbalanceType};
use oodlab::partition::{MixedConfig, SplitConfig, VisualizeOptions};
use oodlab::visualize::compare::CompareOptions;
use oodlab::visualize::{RegionBounds, SingleOptions};
use oodlab::{inspect, niqe, partition, visualize};

#[derive(Parser)]
#[command(name = "oodlab")]
#[command(about = "ID/OOD experiment tooling: metrics, charts, partitions and NIQE models")]
#[command(version)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<log::LevelFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PartitionMode {
    /// Separate ID / OOD / full copies for analysis
    Split,
    /// One training set: all ID samples plus a few OOD samples per label
    Mixed,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the arrays of a metrics bundle and check their lengths
    Inspect {
        /// Bundle file (.npz, .json, .csv, .parquet)
        path: PathBuf,

        /// Emit a JSON document instead of the text report
        #[arg(long)]
        json: bool,
    },

    /// Chart ID vs OOD metrics for one experiment, or compare several
    Visualize {
        /// Bundle of a single experiment
        #[arg(long)]
        npz_path: Option<PathBuf>,

        /// Image file to write (.png or .svg); single mode opens a window without it
        #[arg(long)]
        output_path: Option<PathBuf>,

        #[arg(long, default_value_t = 0.0)]
        id_min: f64,

        #[arg(long, default_value_t = 45.0)]
        id_max: f64,

        #[arg(long, default_value_t = 45.0)]
        ood_min: f64,

        #[arg(long, default_value_t = 90.0)]
        ood_max: f64,

        /// Chart title; defaults to the experiment directory name
        #[arg(long)]
        experiment_name: Option<String>,

        /// X axis description
        #[arg(long, default_value = "Label (Rotation Angle in Degrees)")]
        label_name: String,

        /// Evaluation directories to overlay (comparison mode)
        #[arg(long, num_args = 1..)]
        compare: Option<Vec<PathBuf>>,

        /// TrueType font for chart text
        #[arg(long)]
        font: Option<PathBuf>,
    },

    /// Split an HDF5 image dataset into ID / OOD partitions
    Partition {
        #[arg(long)]
        data_path: PathBuf,

        #[arg(long)]
        output_path: PathBuf,

        #[arg(long, value_enum, default_value_t = PartitionMode::Split)]
        mode: PartitionMode,

        #[arg(long, default_value_t = 1.0)]
        train_min: f64,

        #[arg(long, default_value_t = 30.0)]
        train_max: f64,

        #[arg(long, default_value_t = 30.0)]
        test_min: f64,

        #[arg(long, default_value_t = 60.0)]
        test_max: f64,

        #[arg(long, default_value_t = 1.0)]
        id_min: f64,

        #[arg(long, default_value_t = 30.0)]
        id_max: f64,

        /// Exclusive lower OOD bound in mixed mode
        #[arg(long, default_value_t = 30.0)]
        ood_min: f64,

        #[arg(long, default_value_t = 60.0)]
        ood_max: f64,

        /// Per-label cap on OOD samples (0 leaves the OOD part empty)
        #[arg(long, default_value_t = 5)]
        ood_samples_per_label: usize,

        /// Keep every OOD sample instead of capping per label (split mode)
        #[arg(long, conflicts_with = "ood_samples_per_label")]
        keep_all_ood: bool,

        /// Write label histograms next to the split file (split mode)
        #[arg(long)]
        visualize: bool,

        #[arg(long, default_value_t = 2025)]
        seed: u64,

        /// X axis description of the histograms
        #[arg(long, default_value = "Age (years)")]
        label_name: String,

        #[arg(long)]
        font: Option<PathBuf>,
    },

    /// Fit a reference NIQE model on a training split through MATLAB
    TrainNiqe {
        #[arg(long, value_enum, default_value_t = DatasetName::Rc49)]
        data_name: DatasetName,

        #[arg(long, value_enum, default_value_t = ImbalanceType::Unimodal)]
        imb_type: ImbalanceType,

        /// Models go to <root-path>/niqe_models/<data-name>/
        #[arg(long, default_value = ".")]
        root_path: PathBuf,

        /// HDF5 dataset with images, labels and optional indx_train
        #[arg(long)]
        data_path: PathBuf,

        #[arg(long, default_value_t = 2025)]
        seed: u64,

        #[arg(long, default_value_t = 0.0)]
        min_label: f64,

        #[arg(long, default_value_t = 90.0)]
        max_label: f64,

        #[arg(long, default_value_t = 3)]
        num_channels: usize,

        #[arg(long, default_value_t = 64)]
        img_size: u32,

        /// MATLAB executable
        #[arg(long, default_value = "matlab")]
        matlab_bin: PathBuf,

        /// Where the temporary image export directory is created
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },
}

fn init_logging(level: Option<log::LevelFilter>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Commands::Inspect { path, json } => inspect::run(&path, json),

        Commands::Visualize {
            npz_path,
            output_path,
            id_min,
            id_max,
            ood_min,
            ood_max,
            experiment_name,
            label_name,
            compare,
            font,
        } => {
            if let Some(dirs) = compare {
                return visualize::compare::run(&CompareOptions {
                    dirs,
                    output: output_path,
                    id_max,
                    label_name,
                    font,
                });
            }
            let Some(path) = npz_path else {
                log::error!("Single-experiment mode needs --npz-path (or use --compare <dir>...)");
                return Ok(());
            };
            visualize::run_single(SingleOptions {
                path,
                output: output_path,
                bounds: RegionBounds {
                    id_min,
                    id_max,
                    ood_min,
                    ood_max,
                },
                label_name,
                experiment_name,
                font,
            })
        }

        Commands::Partition {
            data_path,
            output_path,
            mode,
            train_min,
            train_max,
            test_min,
            test_max,
            id_min,
            id_max,
            ood_min,
            ood_max,
            ood_samples_per_label,
            keep_all_ood,
            visualize,
            seed,
            label_name,
            font,
        } => match mode {
            PartitionMode::Split => {
                let cfg = SplitConfig {
                    train: Interval::closed(train_min, train_max),
                    test: Interval::closed(test_min, test_max),
                    ood_samples_per_label: (!keep_all_ood).then_some(ood_samples_per_label),
                    seed,
                };
                let vis = visualize.then_some(VisualizeOptions { label_name, font });
                partition::run_split(&data_path, &output_path, &cfg, vis.as_ref())
            }
            PartitionMode::Mixed => {
                if visualize {
                    log::info!("--visualize only applies to split mode; ignoring");
                }
                if keep_all_ood {
                    log::info!("--keep-all-ood only applies to split mode; ignoring");
                }
                let cfg = MixedConfig::new(id_min, id_max, ood_min, ood_max, ood_samples_per_label, seed);
                partition::run_mixed(&data_path, &output_path, &cfg)
            }
        },

        Commands::TrainNiqe {
            data_name,
            imb_type,
            root_path,
            data_path,
            seed,
            min_label,
            max_label,
            num_channels,
            img_size,
            matlab_bin,
            scratch_dir,
        } => niqe::run(&niqe::TrainOptions {
            data_name,
            imb_type,
            root_path,
            data_path,
            min_label,
            max_label,
            img_size,
            num_channels,
            matlab_bin,
            scratch_dir,
            seed,
        }),
    }
}
