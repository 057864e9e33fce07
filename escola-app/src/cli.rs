use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "escola")]
#[command(about = "Escola Digital MZ - free study materials and support from the command line")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./escola.yaml, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level and mirror logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Html,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a material page in the reader
    #[command(group(ArgGroup::new("target").required(true).args(["url", "subject"])))]
    View {
        /// Page to read
        #[arg(long)]
        url: Option<String>,
        /// Subject from the catalog whose page should be opened
        #[arg(long, conflicts_with = "title")]
        subject: Option<String>,
        /// Title shown above the content (defaults to the page title)
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Fail immediately instead of offering to try again
        #[arg(long)]
        no_prompt: bool,
    },

    /// List the free subjects
    #[command(alias = "ls")]
    Materials,

    /// Ask the support bot a question
    Ask {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Create an order and print the WhatsApp hand-off link
    Order {
        #[arg(long)]
        product: String,
        /// Price in meticais
        #[arg(long)]
        price: u32,
        #[arg(long)]
        name: String,
        /// Customer's WhatsApp number
        #[arg(long)]
        whatsapp: String,
    },

    /// Print a one-click WhatsApp purchase link for a product
    Buy {
        #[arg(long)]
        product: String,
        /// Price in meticais
        #[arg(long)]
        price: u32,
    },

    /// Print the USSD payment instructions
    PayUssd,

    /// Print the effective configuration as YAML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_needs_url_or_subject() {
        assert!(Cli::try_parse_from(["escola", "view"]).is_err());
        assert!(
            Cli::try_parse_from(["escola", "view", "--url", "https://a.example", "--subject", "Física"])
                .is_err()
        );
    }

    #[test]
    fn view_defaults_to_text() {
        let cli = Cli::try_parse_from(["escola", "view", "--url", "https://a.example/x"]).unwrap();
        match cli.command {
            Command::View { url, format, no_prompt, .. } => {
                assert_eq!(url.as_deref(), Some("https://a.example/x"));
                assert_eq!(format, OutputFormat::Text);
                assert!(!no_prompt);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn ask_takes_free_text() {
        let cli = Cli::try_parse_from(["escola", "ask", "qual", "o", "preço"]).unwrap();
        assert!(matches!(cli.command, Command::Ask { ref message } if message.len() == 3));
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["escola", "pay-ussd", "--config", "x.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
        assert!(matches!(cli.command, Command::PayUssd));
    }

    #[test]
    fn order_price_must_be_whole_meticais() {
        let args = ["escola", "order", "--product", "Livro", "--price", "12.5", "--name", "Ana", "--whatsapp", "84"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
