use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use domain::{LabelLanguage, TransportKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "Talk to receipt and label printers", long_about = None)]
pub struct Cli {
    /// Path to config directory
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: String,

    /// Grant every device permission prompt without asking
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Which printer to talk to
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// serial, usb, bluetooth or tcp
    #[arg(long, short = 't')]
    pub transport: TransportKind,

    /// Device path, USB node, MAC address or host:port
    #[arg(long, short = 'a')]
    pub address: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List printers reachable over one or all transports
    Scan {
        #[arg(long, short = 't')]
        transport: Option<TransportKind>,

        /// Machine readable output
        #[arg(long)]
        json: bool,
    },

    /// Connect, print, disconnect
    Print {
        #[command(flatten)]
        target: Target,

        #[arg(long, conflicts_with_all = ["file", "image"])]
        text: Option<String>,

        /// Send a file byte for byte
        #[arg(long, conflicts_with = "image")]
        file: Option<PathBuf>,

        /// Print a PNG or JPEG as a bitmap (tspl or escpos)
        #[arg(long)]
        image: Option<PathBuf>,

        #[arg(long, short = 'l', default_value = "tspl")]
        language: LabelLanguage,

        /// Probe status first and refuse on paper out, cover open or fault
        #[arg(long)]
        check_status: bool,
    },

    /// Print the fixed test label
    TestLabel {
        #[command(flatten)]
        target: Target,

        #[arg(long, short = 'l', default_value = "tspl", conflicts_with = "universal")]
        language: LabelLanguage,

        /// Language-agnostic plain text label
        #[arg(long)]
        universal: bool,
    },

    /// Run the status probe
    Status {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        json: bool,
    },

    /// Ask the printer to identify itself
    Info {
        #[command(flatten)]
        target: Target,
    },

    /// Show everything the printer sends
    Listen {
        #[command(flatten)]
        target: Target,

        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },

    /// Write encoder output without touching hardware
    Encode {
        #[arg(long, short = 'l')]
        language: LabelLanguage,

        /// Label text; the fixed test label when omitted
        #[arg(long)]
        text: Option<String>,

        /// Output file, stdout when omitted
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_print_with_target() {
        let cli = Cli::try_parse_from([
            "printlink", "print", "-t", "wifi", "-a", "10.0.0.5:9100", "--text", "Hello", "-l", "zpl",
        ])
        .unwrap();

        match cli.command {
            Command::Print { target, text, language, check_status, .. } => {
                assert_eq!(target.transport, TransportKind::TcpSocket);
                assert_eq!(target.address, "10.0.0.5:9100");
                assert_eq!(text.as_deref(), Some("Hello"));
                assert_eq!(language, LabelLanguage::Zpl);
                assert!(!check_status);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.config_dir, "config");
        assert!(!cli.yes);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["printlink", "scan", "--json", "--yes", "--config-dir", "/etc/printlink"])
            .unwrap();
        assert!(cli.yes);
        assert_eq!(cli.config_dir, "/etc/printlink");
        assert!(matches!(cli.command, Command::Scan { transport: None, json: true }));
    }

    #[test]
    fn test_rejects_unknown_transport() {
        let result = Cli::try_parse_from(["printlink", "status", "-t", "parallel", "-a", "lpt1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_text_and_file_conflict() {
        let result = Cli::try_parse_from([
            "printlink", "print", "-t", "serial", "-a", "simulated", "--text", "x", "--file", "job.bin",
        ]);
        assert!(result.is_err());
    }
}
