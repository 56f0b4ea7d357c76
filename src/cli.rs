//! Command-line shell driving the worker.

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;

use nutrimasr::{
    config::Config,
    errors::Alert,
    image::ImageFormat,
    nutrition::{self, ServingBasis},
    product::{Category, Product, ProductDraft},
    repository::{FixedReachability, Reachability},
    submission::{SubmissionState, SubmitOutcome},
    supabase::{SupabaseBackend, reachability::TcpProbe},
    worker::{self, Services, WorkerCmd, WorkerEvent},
};

/// Scan-free product lookup and submission against the NutriMasr table.
#[derive(Debug, Parser)]
#[command(name = "nutrimasr", version)]
pub struct Cli {
    /// Config file; created with defaults when missing.
    #[arg(long, default_value = "nutrimasr.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a new product from a draft file.
    Submit {
        /// Draft in TOML form (see `sample-draft`).
        #[arg(long)]
        draft: PathBuf,
        /// Product image (WEBP by default).
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Show nutrition facts for a barcode.
    Product {
        barcode: String,
        /// serving, 100g or 100ml.
        #[arg(long, default_value = "100g")]
        basis: ServingBasis,
    },
    /// List the most scanned products.
    Top,
    /// List products in a category.
    Category { name: Category },
    /// Write a filled-in demo draft.
    SampleDraft { path: PathBuf },
}

/// Execute one command.
pub async fn run(cli: Cli) -> Result<()> {
    if let Command::SampleDraft { path } = &cli.command {
        let s = toml::to_string_pretty(&ProductDraft::pepsi_diet())?;
        tokio::fs::write(path, s).await?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let cfg = Config::load_or_default(&cli.config)?;
    let backend = SupabaseBackend::from_config(&cfg);
    let image_format = listed_image_format(&cfg);

    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(16);
    let (tx_ev, mut rx_ev) = mpsc::channel::<WorkerEvent>(64);
    tokio::spawn(worker::run(rx_cmd, tx_ev, Arc::new(supabase_services), cfg));

    match cli.command {
        Command::Submit { draft, image } => {
            let text = tokio::fs::read_to_string(&draft).await?;
            let draft: ProductDraft = toml::from_str(&text)?;
            tx_cmd.send(WorkerCmd::ReplaceDraft(draft)).await?;
            if let Some(path) = image {
                let bytes = tokio::fs::read(&path).await?;
                tx_cmd.send(WorkerCmd::SelectImage(bytes)).await?;
            }
            tx_cmd.send(WorkerCmd::Submit).await?;
            wait_for_submit(&mut rx_ev).await
        }
        Command::Product { barcode, basis } => {
            tx_cmd.send(WorkerCmd::FetchProduct { barcode }).await?;
            match next_result(&mut rx_ev).await? {
                WorkerEvent::ProductLoaded(p) => {
                    print_product(&p, basis, &backend.image_url(&id_of(&p), image_format));
                    Ok(())
                }
                other => fail_with(other),
            }
        }
        Command::Top => {
            tx_cmd.send(WorkerCmd::FetchMostScanned).await?;
            print_list(&mut rx_ev).await
        }
        Command::Category { name } => {
            tx_cmd.send(WorkerCmd::FetchCategory(name)).await?;
            print_list(&mut rx_ev).await
        }
        Command::SampleDraft { .. } => Ok(()),
    }
}

/// Format product images are listed under: the first accepted one.
fn listed_image_format(cfg: &Config) -> ImageFormat {
    cfg.upload
        .accepted_formats
        .first()
        .copied()
        .unwrap_or(ImageFormat::Webp)
}

/// Backend handles for one config: Supabase plus a TCP probe of its host.
fn supabase_services(cfg: &Config) -> Services {
    let backend = Arc::new(SupabaseBackend::from_config(cfg));
    let network: Arc<dyn Reachability> =
        match TcpProbe::for_url(&cfg.supabase.url, cfg.probe_timeout()) {
            Some(probe) => Arc::new(probe),
            None => Arc::new(FixedReachability(false)),
        };
    Services {
        repository: backend.clone(),
        catalog: backend,
        network,
    }
}

async fn next_event(rx: &mut mpsc::Receiver<WorkerEvent>) -> Result<WorkerEvent> {
    rx.recv().await.ok_or_else(|| anyhow!("worker stopped"))
}

/// Skip log lines and return the first result-bearing event.
async fn next_result(rx: &mut mpsc::Receiver<WorkerEvent>) -> Result<WorkerEvent> {
    loop {
        match next_event(rx).await? {
            WorkerEvent::Log(s) => tracing::info!("{s}"),
            ev => return Ok(ev),
        }
    }
}

async fn wait_for_submit(rx: &mut mpsc::Receiver<WorkerEvent>) -> Result<()> {
    loop {
        match next_event(rx).await? {
            WorkerEvent::StateChanged { state, .. } => println!("{}", state_label(&state)),
            WorkerEvent::FieldErrors(errors) => {
                for field in errors.iter() {
                    println!("  invalid: {field:?} {}", field.unit_hint());
                }
            }
            WorkerEvent::Blocked(_) => {}
            WorkerEvent::Alert(alert) => print_alert(&alert),
            WorkerEvent::SubmitFinished { outcome, .. } => {
                return match outcome {
                    SubmitOutcome::Succeeded => Ok(()),
                    other => Err(anyhow!("submission did not succeed: {other:?}")),
                };
            }
            WorkerEvent::Error(e) => bail!(e),
            WorkerEvent::Log(s) => tracing::info!("{s}"),
            WorkerEvent::ProductLoaded(_) | WorkerEvent::ProductsLoaded(_) => {}
        }
    }
}

async fn print_list(rx: &mut mpsc::Receiver<WorkerEvent>) -> Result<()> {
    match next_result(rx).await? {
        WorkerEvent::ProductsLoaded(products) => {
            for p in &products {
                println!(
                    "{:<16} {:<32} scans={}",
                    p.id.as_deref().unwrap_or("-"),
                    p.name.as_deref().unwrap_or("-"),
                    p.scans.unwrap_or(0)
                );
            }
            Ok(())
        }
        other => fail_with(other),
    }
}

fn fail_with(ev: WorkerEvent) -> Result<()> {
    match ev {
        WorkerEvent::Alert(alert) => {
            print_alert(&alert);
            bail!(alert.title)
        }
        WorkerEvent::Error(e) => bail!(e),
        other => bail!("unexpected worker event: {other:?}"),
    }
}

fn print_alert(alert: &Alert) {
    println!("! {}", alert.title);
    if let Some(msg) = &alert.message {
        println!("  {msg}");
    }
    println!("  [{:?}]", alert.action);
}

fn state_label(state: &SubmissionState) -> String {
    match state {
        SubmissionState::Idle => "idle".into(),
        SubmissionState::Validating => "validating...".into(),
        SubmissionState::CreatingRecord => "creating record...".into(),
        SubmissionState::UploadingImage => "uploading image...".into(),
        SubmissionState::Succeeded => "done".into(),
        SubmissionState::Failed(f) if f.record_created() => {
            format!("failed after record was created: {f:?}")
        }
        SubmissionState::Failed(f) => format!("failed: {f:?}"),
    }
}

fn id_of(p: &Product) -> String {
    p.id.clone().unwrap_or_else(|| "-".into())
}

/// `image_url` assumes the image was uploaded in the first accepted format.
fn print_product(p: &Product, basis: ServingBasis, image_url: &str) {
    println!("{} ({})", p.name.as_deref().unwrap_or("-"), id_of(p));
    if let Some(c) = p.category {
        println!("  category       {c}");
    }
    println!(
        "  calories       {} kcal / {}",
        nutrition::calories_for(p, basis),
        basis.label()
    );
    let facts = [
        ("weight", p.weight),
        ("protein", p.protein),
        ("fat", p.fat),
        ("carbohydrates", p.carbohydrates),
        ("sugars", p.sugars),
        ("fiber", p.fiber),
        ("sodium", p.sodium),
    ];
    for (label, value) in facts {
        if let Some(v) = value {
            println!("  {label:<14} {v}");
        }
    }
    if let Some(ingredients) = &p.ingredients {
        let listed: Vec<&str> = ingredients
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        println!("  ingredients    {}", listed.join(", "));
    }
    println!("  image          {image_url}");
}
