use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::{
    domain::{ArrangementId, TemplateId},
    protocol::ArrangementScope,
};
use tierlist_core::{
    config::{load_settings, ClientSettings},
    ClientError, ItemUpload, TierListClient,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse, arrange and share tier lists from the command line")]
struct Cli {
    /// Settings file; `tierlist.toml` in the working directory is used when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    share_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Templates {
        #[arg(long)]
        search: Option<String>,
    },
    Items {
        template_id: String,
    },
    Lists {
        template_id: String,
        #[arg(long)]
        public: bool,
    },
    /// Prints a saved list tier by tier.
    Show {
        list_id: String,
    },
    /// Opens a share link and prints the resulting board.
    Open {
        link: String,
    },
    Share {
        template_id: String,
        #[arg(long)]
        list_id: Option<String>,
    },
    Publish {
        list_id: String,
        #[arg(long)]
        private: bool,
    },
    Delete {
        list_id: String,
    },
    CreateTemplate {
        name: String,
        #[arg(long)]
        public: bool,
    },
    Upload {
        template_id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn settings_from(cli: &Cli) -> Result<ClientSettings> {
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(api_url) = &cli.api_url {
        settings.api_base_url = api_url.clone();
    }
    if let Some(share_url) = &cli.share_url {
        settings.share_base_url = share_url.clone();
    }
    if let Some(token) = &cli.token {
        settings.api_token = Some(token.clone());
    }
    Ok(settings)
}

/// `RUST_LOG` directives when given and valid, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn read_upload(path: PathBuf) -> Result<ItemUpload> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image.bin")
        .to_string();
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let mime_type = mime_guess::from_path(&path)
        .first_raw()
        .map(str::to_string);
    Ok(ItemUpload {
        filename,
        mime_type,
        bytes,
    })
}

async fn print_board(client: &TierListClient) {
    client
        .with_board(|board| {
            if let Some(template) = board.selected_template() {
                println!("{} ({})", template.name, template.id);
            }
            for container in board.containers_view() {
                let names: Vec<&str> = container
                    .items
                    .iter()
                    .map(|item| item.name.as_str())
                    .collect();
                println!("{:>8} | {}", container.label, names.join(", "));
            }
        })
        .await;
}

async fn run(client: &TierListClient, settings: &ClientSettings, command: Command) -> Result<()> {
    match command {
        Command::Templates { search } => {
            for template in client.list_templates(search.as_deref()).await? {
                let visibility = if template.is_public { "public" } else { "private" };
                println!("{}\t{}\t{visibility}", template.id, template.name);
            }
        }
        Command::Items { template_id } => {
            client
                .select_template_by_id(&TemplateId::new(template_id))
                .await?;
            client
                .with_board(|board| {
                    for item in board.items() {
                        println!("{}\t{}\t{}", item.id, item.name, item.image_url);
                    }
                })
                .await;
        }
        Command::Lists {
            template_id,
            public,
        } => {
            let scope = if public {
                ArrangementScope::Public
            } else {
                ArrangementScope::Mine
            };
            client
                .select_template_by_id(&TemplateId::new(template_id))
                .await?;
            for list in client.list_saved(scope).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    list.id,
                    list.name.as_deref().unwrap_or("(untitled)"),
                    if list.is_public { "public" } else { "private" },
                    list.created_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        Command::Show { list_id } => {
            client.load_arrangement(&ArrangementId::new(list_id)).await?;
            print_board(client).await;
        }
        Command::Open { link } => {
            client.open_share_link(&link).await?;
            print_board(client).await;
        }
        Command::Share {
            template_id,
            list_id,
        } => {
            client
                .select_template_by_id(&TemplateId::new(template_id))
                .await?;
            let list_id = list_id.map(ArrangementId::new);
            let link = client
                .share_link(&settings.share_base_url, list_id.as_ref())
                .await?;
            println!("{link}");
        }
        Command::Publish { list_id, private } => {
            let updated = client
                .set_visibility(&ArrangementId::new(list_id), !private)
                .await?;
            println!(
                "{} is now {}",
                updated.id,
                if updated.is_public { "public" } else { "private" }
            );
        }
        Command::Delete { list_id } => {
            client.delete_arrangement(&ArrangementId::new(list_id)).await?;
        }
        Command::CreateTemplate { name, public } => {
            let template = client.create_template(&name, public).await?;
            println!("created template_id={}", template.id);
        }
        Command::Upload { template_id, files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in files {
                uploads.push(read_upload(path).await?);
            }
            client
                .select_template_by_id(&TemplateId::new(template_id))
                .await?;
            client.upload_items(uploads).await?;
            client
                .with_board(|board| println!("template now has {} items", board.items().len()))
                .await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .init();

    let cli = Cli::parse();
    let settings = settings_from(&cli)?;
    info!(api = %settings.api_base_url, "using tier list backend");

    let client = TierListClient::from_settings(&settings)?;
    if settings.api_token.is_some() {
        if let Some(session) = client.refresh_session().await? {
            info!(user_id = %session.user_id, "signed in");
        }
    }

    if let Err(err) = run(&client, &settings, cli.command).await {
        match err.downcast_ref::<ClientError>() {
            Some(client_err) => bail!("{}", client_err.user_message()),
            None => return Err(err),
        }
    }
    Ok(())
}
