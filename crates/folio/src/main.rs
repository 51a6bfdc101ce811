use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use folio::broadcast::TaskProgressBroadcaster;
use folio::catalog::NewProduct;
use folio::config::load_config;
use folio::db::task_repo;
use folio::issuance::BulkIssueRequest;
use folio::model::CertificateKind;
use folio::{telemetry, Folio, FolioError};

#[derive(Parser, Debug)]
#[command(
    name = "folio",
    version,
    about = "Issue, deliver and verify course certificates"
)]
struct Cli {
    /// Path to the JSON configuration file.
    ///
    /// Environment variable: `FOLIO_CONFIG`
    #[arg(short, long, env = "FOLIO_CONFIG", default_value = "folio.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage participants
    #[command(subcommand)]
    Participant(PersonCommand),

    /// Manage teachers
    #[command(subcommand)]
    Teacher(PersonCommand),

    /// Manage products (courses)
    #[command(subcommand)]
    Product(ProductCommand),

    /// Enroll a participant in a product
    Enroll {
        participant_id: String,
        product_id: String,
    },

    /// Issue one certificate for an enrollment
    Issue {
        enrollment_id: String,
        #[arg(short, long, value_parser = parse_kind, default_value = "approval")]
        kind: CertificateKind,
    },

    /// Issue certificates for every eligible enrollment of a product
    Bulk {
        product_id: String,
        #[arg(long)]
        with_competencies: bool,
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<CertificateKind>,
        /// Restrict the batch to these participants
        #[arg(short, long = "participant")]
        participants: Vec<String>,
        /// Run through the worker queue instead of inline
        #[arg(long)]
        queued: bool,
    },

    /// Show the status of a queued bulk issuance
    Task { task_id: String },

    /// Look up a certificate by folio
    Verify { folio: String },

    /// Re-send a certificate email, or every failed one
    Redeliver { certificate_id: Option<String> },

    /// Revoke a certificate
    Revoke {
        certificate_id: String,
        #[arg(short, long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PersonCommand {
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum ProductCommand {
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        hours: u32,
        #[arg(long)]
        competencies: Option<String>,
    },
    List,
    /// Replace the competencies text (empty clears it)
    Competencies { product_id: String, text: String },
    /// Assign a teacher to a product
    AssignTeacher {
        product_id: String,
        teacher_id: String,
    },
    /// List the certificates issued for a product
    Certificates { product_id: String },
}

fn parse_kind(value: &str) -> Result<CertificateKind, String> {
    CertificateKind::parse(value).ok_or_else(|| {
        format!(
            "unknown kind '{}' (expected attendance, approval, participation or competencies)",
            value
        )
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    telemetry::init_logging(&config.logging)?;

    let app = Folio::from_config(&config)?;
    run(&app, cli.command)
}

fn run(app: &Folio, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Participant(PersonCommand::Add { name, email }) => {
            let p = app.catalog.create_participant(&name, &email)?;
            println!("{}", p.id);
        }
        Commands::Participant(PersonCommand::List) => {
            for p in app.catalog.participants()? {
                println!("{}\t{}\t{}", p.id, p.full_name, p.email);
            }
        }
        Commands::Teacher(PersonCommand::Add { name, email }) => {
            let t = app.catalog.create_teacher(&name, &email)?;
            println!("{}", t.id);
        }
        Commands::Teacher(PersonCommand::List) => {
            for t in app.catalog.teachers()? {
                println!("{}\t{}\t{}", t.id, t.full_name, t.email);
            }
        }
        Commands::Product(command) => run_product(app, command)?,
        Commands::Enroll {
            participant_id,
            product_id,
        } => {
            let e = app.catalog.enroll(&participant_id, &product_id)?;
            println!("{}", e.id);
        }
        Commands::Issue {
            enrollment_id,
            kind,
        } => {
            let issued = app.issuer.issue(&enrollment_id, kind)?;
            println!("{}", serde_json::to_string_pretty(&issued)?);
        }
        Commands::Bulk {
            product_id,
            with_competencies,
            kind,
            participants,
            queued,
        } => {
            let mut request = BulkIssueRequest::new(product_id);
            request.with_competencies = with_competencies;
            request.kind = kind;
            if !participants.is_empty() {
                request = request.participants(participants);
            }

            if queued {
                run_queued(app, request)?;
            } else {
                let result = app.issuer.issue_bulk(&request)?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Commands::Task { task_id } => {
            let row = task_repo::find_by_id(&app.db, &task_id)?
                .ok_or_else(|| FolioError::not_found("Task", &task_id))?;
            println!("{}\t{}", row.id, row.status);
            if let Some(result) = row.result {
                println!("{}", result);
            }
            if let Some(error) = row.error {
                println!("error: {}", error);
            }
        }
        Commands::Verify { folio } => {
            let record = app.issuer.verify(&folio)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Redeliver { certificate_id } => match certificate_id {
            Some(id) => {
                let row = app.issuer.redeliver(&id)?;
                println!("{}\t{}", row.serial, row.delivery_status);
            }
            None => {
                let result = app.issuer.redeliver_failed()?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        },
        Commands::Revoke {
            certificate_id,
            reason,
        } => {
            let row = app.issuer.revoke(&certificate_id, reason.as_deref())?;
            println!("{}\t{}", row.serial, row.status);
        }
    }
    Ok(())
}

fn run_product(app: &Folio, command: ProductCommand) -> anyhow::Result<()> {
    match command {
        ProductCommand::Add {
            name,
            hours,
            competencies,
        } => {
            let product = app.catalog.create_product(NewProduct {
                name,
                hours,
                competencies,
                ..Default::default()
            })?;
            println!("{}", product.id);
        }
        ProductCommand::List => {
            for p in app.catalog.products()? {
                println!("{}\t{}\t{}h", p.id, p.name, p.hours);
            }
        }
        ProductCommand::Competencies { product_id, text } => {
            app.catalog.set_competencies(&product_id, Some(&text))?;
        }
        ProductCommand::AssignTeacher {
            product_id,
            teacher_id,
        } => {
            app.catalog.assign_teacher(&product_id, &teacher_id)?;
        }
        ProductCommand::Certificates { product_id } => {
            for c in app.catalog.certificates_for_product(&product_id)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    c.id, c.serial, c.kind, c.status, c.delivery_status
                );
            }
        }
    }
    Ok(())
}

/// Submits through the worker queue, prints progress, then the result.
fn run_queued(app: &Folio, request: BulkIssueRequest) -> anyhow::Result<()> {
    let queue = app.start_queue(TaskProgressBroadcaster::default());
    let mut events = queue.subscribe();
    queue.resume_pending()?;

    let task_id = queue.submit(request)?;
    eprintln!("task {}", task_id);

    let outcome = loop {
        match queue.recv_result() {
            Some(outcome) if outcome.task_id == task_id => break outcome,
            Some(_) => continue,
            None => bail!("issuance queue stopped before task {} finished", task_id),
        }
    };
    while let Ok(event) = events.try_recv() {
        eprintln!("[{}] {}", event.phase, event.message);
    }
    queue.shutdown();
    queue.wait();

    match outcome.result {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => bail!(
            "task {} failed: {}",
            outcome.task_id,
            outcome.error.unwrap_or_default()
        ),
    }
    Ok(())
}
