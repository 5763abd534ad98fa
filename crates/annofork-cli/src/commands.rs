//! Command handlers
//!
//! Each handler returns the text to print on stdout; progress and logs go to
//! stderr.

use crate::cli::{Cli, Command, JudgeArgs};
use annofork_store::{
    known_reviewers, AnnotatedTable, AnnotatorConfig, CancelFlag, Filesystem, LocalFs,
    ProgressEvent, RowKey, Session, TableKind, Topology, AUTHOR_FIELD,
};
use annofork_table::Reviewer;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::sync::Arc;

fn print_progress(event: ProgressEvent) {
    eprintln!("[{:>3}%] {}", event.percent, event.message);
}

/// Dispatch one parsed command
pub(crate) async fn run(cli: Cli, cancel: &CancelFlag) -> Result<String> {
    let config = match &cli.config {
        Some(path) => AnnotatorConfig::load(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnnotatorConfig::default(),
    };
    let fs: Arc<dyn Filesystem> = Arc::new(LocalFs::new(&cli.root));

    match cli.command {
        Command::Reviewers => {
            let names = known_reviewers(&Topology::new(fs)).await?;
            Ok(names.into_iter().collect::<Vec<_>>().join("\n"))
        }
        Command::Fork { reviewer } => {
            let reviewer = Reviewer::new(reviewer)?;
            let (_, report) = Session::create(fs, reviewer, config, &print_progress, cancel)
                .await
                .context("fork failed")?;
            Ok(format!(
                "Created {} ({} tables, {} other files, {} columns added)",
                report.workspace.display(),
                report.tables,
                report.copied,
                report.columns_added
            ))
        }
        Command::Show {
            reviewer,
            author,
            json,
        } => {
            let session = open(fs, &reviewer, config, cancel).await?;
            show(session, author.as_deref(), json).await
        }
        Command::Note {
            reviewer,
            author,
            text,
            row,
        } => {
            let mut session = open(fs, &reviewer, config, cancel).await?;
            let (mut table, key) = match row {
                Some(row) => (
                    session.open_trajectory(&author).await?.table,
                    RowKey::Position(row),
                ),
                None => (session.open_users().await?.table, RowKey::Author(author.clone())),
            };
            table.set_notes(&key, &text)?;
            session.save(&mut table).await?;
            let summary = table.get_annotation(&key)?.summary;
            Ok(format!(
                "Saved notes for {key} in {} (summary: {summary})",
                table.path().display()
            ))
        }
        Command::Judge(args) => {
            let mut session = open(fs, &args.reviewer, config, cancel).await?;
            let mut table = session.open_trajectory(&args.author).await?.table;
            let key = RowKey::Position(args.row);
            judge(&mut table, &key, args)?;
            session.save(&mut table).await?;
            Ok(format!("Saved judgments for {key} in {}", table.path().display()))
        }
        Command::Reconcile { reviewer } => {
            let session = open(fs, &reviewer, config, cancel).await?;
            let result = session
                .reconcile(&print_progress, cancel)
                .await
                .context("send-back failed")?;
            let mut out = String::new();
            for file in &result.files {
                writeln!(
                    out,
                    "{:<16} {}  ({} updated, {} unmatched)",
                    format!("{:?}", file.status),
                    file.path.display(),
                    file.rows_updated,
                    file.rows_unmatched
                )?;
            }
            write!(
                out,
                "{} files written, {} rows updated",
                result.written().count(),
                result.rows_updated()
            )?;
            Ok(out)
        }
    }
}

async fn open(
    fs: Arc<dyn Filesystem>,
    reviewer: &str,
    config: AnnotatorConfig,
    cancel: &CancelFlag,
) -> Result<Session> {
    let reviewer = Reviewer::new(reviewer)?;
    let (session, report) = Session::open(fs, reviewer.clone(), config, &print_progress, cancel)
        .await
        .with_context(|| format!("opening workspace for {reviewer}"))?;
    if let Some(report) = report {
        tracing::info!("Created workspace {}", report.workspace.display());
    }
    Ok(session)
}

async fn show(mut session: Session, author: Option<&str>, json: bool) -> Result<String> {
    if json {
        let path = match author {
            Some(author) => {
                session
                    .topology()
                    .resolve_trajectory_file(session.workspace(), author)
                    .await?
            }
            None => session.workspace().users_file(),
        };
        let table = session.store().view(&path).await?;
        return Ok(serde_json::to_string_pretty(&table.to_records())?);
    }

    let loaded = match author {
        Some(author) => session.open_trajectory(author).await?,
        None => session.open_users().await?,
    };
    for diagnostic in &loaded.diagnostics {
        tracing::warn!("{diagnostic}");
    }
    let table = loaded.table;
    let mut out = String::new();
    for row in table.table().rows() {
        let (key, label) = match table.kind() {
            TableKind::Users => {
                let author = row.get(AUTHOR_FIELD).map(ToString::to_string).unwrap_or_default();
                (RowKey::Author(author.clone()), author)
            }
            TableKind::Trajectory => {
                let title = row.get("title").map(ToString::to_string).unwrap_or_default();
                (RowKey::Position(row.index() + 1), format!("{:>4}  {title}", row.index() + 1))
            }
        };
        let annotation = table.get_annotation(&key)?;
        writeln!(out, "{label}")?;
        if !annotation.summary.is_empty() {
            writeln!(out, "    summary: {}", annotation.summary)?;
        }
        if !annotation.notes.is_empty() {
            writeln!(out, "    notes:   {}", annotation.notes)?;
        }
        if let Some(judgment) = annotation.structured.filter(|j| !j.is_empty()) {
            writeln!(out, "    topics:  {}", judgment.topics.join("; "))?;
            writeln!(out, "    belief:  {}", judgment.belief_degree)?;
        }
    }
    Ok(out.trim_end().to_string())
}

fn judge(table: &mut AnnotatedTable, key: &RowKey, args: JudgeArgs) -> Result<()> {
    let mut judgment = table
        .get_annotation(key)?
        .structured
        .unwrap_or_default();
    if !args.topics.is_empty() {
        judgment.topics = args.topics;
    }
    if !args.comment_reactions.is_empty() {
        judgment.comment_reactions = args.comment_reactions;
    }
    if !args.sources_used.is_empty() {
        judgment.sources_used = args.sources_used;
    }
    let texts = [
        (args.specific_topic, &mut judgment.specific_topic),
        (args.belief_degree, &mut judgment.belief_degree),
        (args.belief_comments, &mut judgment.belief_comments),
        (args.reaction_comments, &mut judgment.reaction_comments),
        (args.source_comments, &mut judgment.source_comments),
    ];
    for (given, slot) in texts {
        if let Some(value) = given {
            *slot = value;
        }
    }
    table.set_structured(key, &judgment)?;
    Ok(())
}
