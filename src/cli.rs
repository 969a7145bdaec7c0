use clap::Parser;
use std::time::Duration;

use crate::download::{DownloadOptions, MAX_CONCURRENCY};

#[derive(Parser, Debug)]
#[command(name = "mediazip")]
#[command(version)]
#[command(about = "Download media concurrently and bundle it into a ZIP archive", long_about = None)]
#[command(after_help = "Examples:\n  \
  mediazip https://a.example/1.jpg https://a.example/2.jpg   archive two images into media.zip\n  \
  mediazip -i urls.txt -a trip.zip -c 4 -r 2                 archive a URL list with retries\n  \
  mediazip -s https://a.example/clip.mp4                     download one file without archiving\n  \
  mediazip -l trip.zip                                       list files in an archive")]
pub struct Cli {
    /// Media URLs (or, with -l, the archive to list)
    #[arg(value_name = "INPUTS")]
    pub inputs: Vec<String>,

    /// Read additional URLs from FILE, one per line as `URL [NAME]`
    #[arg(short = 'i', value_name = "FILE")]
    pub input_file: Option<String>,

    /// Directory to save into
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub output_dir: String,

    /// Archive filename
    #[arg(short = 'a', value_name = "NAME", default_value = "media.zip")]
    pub archive_name: String,

    /// Simultaneous downloads (1-8)
    #[arg(short = 'c', long = "concurrency", default_value_t = 6)]
    pub concurrency: usize,

    /// Retries per file after the first attempt
    #[arg(short = 'r', long = "retries", default_value_t = 0)]
    pub retries: u32,

    /// Per-request timeout in seconds
    #[arg(short = 't', long = "timeout", value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Save each URL directly instead of archiving
    #[arg(short = 's')]
    pub single: bool,

    /// List files in an existing archive
    #[arg(short = 'l')]
    pub list: bool,

    /// Debug logging
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }

    /// Options for the download calls, without progress or cancellation wiring.
    pub fn download_options(&self) -> DownloadOptions {
        let timeout = Duration::from_secs(self.timeout.max(1));
        DownloadOptions {
            concurrency: self.concurrency(),
            retries: self.retries,
            request_timeout: timeout,
            single_timeout: timeout * 2,
            archive_name: self.archive_name.clone(),
            ..DownloadOptions::default()
        }
    }
}

/// Parse an input list: one `URL [NAME]` per line, `#` starts a comment.
pub fn parse_url_list(text: &str) -> Vec<(String, Option<String>)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((url, name)) => (url.to_string(), Some(name.trim().to_string())),
            None => (line.to_string(), None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "mediazip", "-c", "20", "-r", "2", "-a", "out.zip", "https://a/1.png",
        ]);
        assert_eq!(cli.inputs, ["https://a/1.png"]);
        assert_eq!(cli.concurrency(), 8);

        let options = cli.download_options();
        assert_eq!(options.retries, 2);
        assert_eq!(options.archive_name, "out.zip");
        assert_eq!(options.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_url_list() {
        let list = "\n# favourites\nhttps://a/1.png\n  https://a/2.png   second.png \n";
        assert_eq!(
            parse_url_list(list),
            vec![
                ("https://a/1.png".to_string(), None),
                ("https://a/2.png".to_string(), Some("second.png".to_string())),
            ]
        );
    }
}
