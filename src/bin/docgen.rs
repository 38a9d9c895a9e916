//! docgen - command-line merge form
//!
//! Fills the merge form from flags and downloads the merged documents:
//!
//! ```text
//! docgen -t receiptTemplate.docx -d invoice.json --format both -o out/
//! docgen --list-templates
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docgen_server::client::{DirectorySink, HttpTransport, MergeForm, MergeTransport, Notification};
use docgen_server::merge::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "docgen", version, about = "Merge JSON data into a DOCX template")]
struct Cli {
    /// Docgen server URL
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,

    /// Template file name (defaults to the server's default template)
    #[arg(short, long)]
    template: Option<String>,

    /// JSON data file
    #[arg(short, long, conflicts_with = "json")]
    data: Option<PathBuf>,

    /// Inline JSON data
    #[arg(long)]
    json: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Both)]
    format: Format,

    /// Download directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// List the available templates and exit
    #[arg(long)]
    list_templates: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Docx,
    Pdf,
    Both,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let transport = Arc::new(HttpTransport::new(&cli.server));

    if cli.list_templates {
        let list = transport.list_templates().await.context("Failed to list templates")?;
        for template in &list.templates {
            let marker = if template.name == list.default_template { " (default)" } else { "" };
            println!("{}\t{} bytes{}", template.name, template.size, marker);
        }
        return Ok(());
    }

    let template = match cli.template {
        Some(template) => template,
        None => {
            transport
                .list_templates()
                .await
                .context("No --template given and the server default is unavailable")?
                .default_template
        }
    };

    let form = MergeForm::new(transport, Arc::new(DirectorySink::new(&cli.out)));
    form.set_template(template);
    match (cli.data, cli.json) {
        (Some(path), _) => form
            .attach_file(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(json)) => form.set_json_text(json),
        (None, None) => bail!("Provide JSON data with --data <file> or --json <text>"),
    }

    let notifications = match cli.format {
        Format::Docx => vec![form.submit(OutputFormat::Docx).await?],
        Format::Pdf => vec![form.submit(OutputFormat::Pdf).await?],
        Format::Both => {
            let (docx, pdf) = tokio::join!(form.submit(OutputFormat::Docx), form.submit(OutputFormat::Pdf));
            vec![docx?, pdf?]
        }
    };

    for notification in &notifications {
        match notification {
            Notification::Success { .. } => println!("{}", notification),
            Notification::Error { .. } => eprintln!("{}", notification),
        }
    }

    if notifications.iter().any(|notification| !notification.is_success()) {
        bail!("One or more downloads failed");
    }
    Ok(())
}
