use crate::constants::DEFAULT_QUALITY;
use crate::convert::PackageLayout;
use crate::probe::ProbeOptions;
use crate::scan::ScanOptions;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "img-convert",
    about = "Batch-convert HEIC and other images to JPEG",
    long_about = "img-convert collects images from files, folders and zip archives, predicts how large \
                  the JPEG output will be at a given quality, and converts the whole set into a single \
                  zip or folder. Unreadable files are reported and skipped; they never stop the batch.",
    version,
    after_help = "EXAMPLES:\n  \
    img-convert scan ~/Pictures/iPhone photos.zip\n  \
    img-convert estimate ~/Pictures/iPhone -q 70\n  \
    img-convert convert ~/Pictures/iPhone -o ~/Desktop -q 85\n  \
    img-convert convert \"./shots/*.heic\" -o ./out --layout dir --json"
)]
pub struct Args {
    #[arg(long, global = true, help = "Only print warnings and errors")]
    pub quiet: bool,

    #[arg(
        short,
        long,
        global = true,
        help = "Print debug diagnostics",
        long_help = "Print debug diagnostics such as worker pool sizing. RUST_LOG overrides this."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "List the images found in the given paths",
        long_about = "Expand files, folders (recursively), zip archives and glob patterns, read each \
                      image header, and print the resulting inventory."
    )]
    Scan {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, help = "Decode each image for an embedded preview thumbnail")]
        thumbnails: bool,
    },

    #[command(
        about = "Predict the JPEG output size without converting",
        long_about = "Scan the inputs and estimate the total JPEG size at the given quality. \
                      Nothing is decoded beyond the image headers."
    )]
    Estimate {
        #[command(flatten)]
        input: InputArgs,

        #[arg(
            short = 'q',
            long,
            default_value_t = DEFAULT_QUALITY,
            value_parser = clap::value_parser!(u8).range(1..=100),
            help = "JPEG quality (1-100)"
        )]
        quality: u8,
    },

    #[command(
        about = "Convert every image to JPEG and package the result",
        long_about = "Scan the inputs, convert every image to JPEG at the given quality and write one \
                      converted_<timestamp>.zip (or folder) into the output directory. Images that fail \
                      to convert are listed and left out of the package."
    )]
    Convert {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short = 'o', long, help = "Directory that receives the package")]
        output: PathBuf,

        #[arg(
            short = 'q',
            long,
            default_value_t = DEFAULT_QUALITY,
            value_parser = clap::value_parser!(u8).range(1..=100),
            help = "JPEG quality (1-100)"
        )]
        quality: u8,

        #[arg(
            long,
            value_enum,
            default_value_t = LayoutArg::Zip,
            help = "Package as a zip archive or a plain folder"
        )]
        layout: LayoutArg,
    },
}

impl Commands {
    pub fn input(&self) -> &InputArgs {
        match self {
            Commands::Scan { input, .. }
            | Commands::Estimate { input, .. }
            | Commands::Convert { input, .. } => input,
        }
    }

    /// Thumbnails are only decoded when `scan --thumbnails` asks for them.
    pub fn scan_options(&self) -> ScanOptions {
        let thumbnails = matches!(self, Commands::Scan { thumbnails: true, .. });
        ScanOptions {
            probe: ProbeOptions {
                thumbnails,
                ..ProbeOptions::default()
            },
            threads: self.input().threads,
        }
    }
}

#[derive(ClapArgs)]
pub struct InputArgs {
    #[arg(
        required = true,
        help = "Image files, folders, zip archives or glob patterns",
        long_help = "Any mix of image files, folders, zip archives and quoted glob patterns. \
                     Folders are searched recursively; hidden files are skipped."
    )]
    pub paths: Vec<PathBuf>,

    #[arg(
        short = 'j',
        long,
        help = "Number of parallel threads (default: auto)",
        long_help = "Number of worker threads for scanning and converting. \
                     If not specified, uses number of CPU cores (at most 16)."
    )]
    pub threads: Option<usize>,

    #[arg(long, help = "Print machine-readable JSON instead of text")]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    Zip,
    #[value(alias = "directory")]
    Dir,
}

impl From<LayoutArg> for PackageLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Zip => PackageLayout::Zip,
            LayoutArg::Dir => PackageLayout::Directory,
        }
    }
}
