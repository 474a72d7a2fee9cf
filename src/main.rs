use clap::{Parser, Subcommand};

// Import the library
use vast_playback::config::{AdsOptions, CompanionOptions};
use vast_playback::models::AdRequest;
use vast_playback::{fetch, parser, resolver};

/// VAST ad tag inspector and resolver
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a VAST file or URL
    Parse {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Resolve a VAST file or URL into a linear ad selection
    Resolve {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,

        /// Maximum number of wrapper hops to follow
        #[arg(long, default_value_t = 10)]
        wrapper_depth_limit: usize,

        /// Companion placement element ID
        #[arg(long)]
        element_id: Option<String>,

        /// Requested companion width
        #[arg(long)]
        max_width: Option<u32>,

        /// Requested companion height
        #[arg(long)]
        max_height: Option<u32>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Parse { input, pretty } => {
            // Fetch the VAST content and parse the single document
            let content = fetch::fetch_content(input, true).await?;
            let vast = parser::parse_vast(&content)?;

            if *pretty {
                println!("{:#?}", vast);
            } else {
                println!("{:?}", vast);
            }
        }
        Commands::Resolve {
            input,
            pretty,
            wrapper_depth_limit,
            element_id,
            max_width,
            max_height,
        } => {
            let mut options = AdsOptions {
                url: Some(input.clone()),
                wrapper_depth_limit: *wrapper_depth_limit,
                ..AdsOptions::default()
            };
            if let (Some(element_id), Some(max_width), Some(max_height)) =
                (element_id, max_width, max_height)
            {
                options.companion = Some(CompanionOptions {
                    element_id: element_id.clone(),
                    max_width: *max_width,
                    max_height: *max_height,
                });
            }

            // Unwrap the wrapper chain and pick the first linear ad
            let request = AdRequest::Url(input.clone());
            let selection = resolver::resolve(&request, &options).await?;

            if *pretty {
                println!("{:#?}", selection);
            } else {
                println!("{:?}", selection);
            }
        }
    }

    Ok(())
}
