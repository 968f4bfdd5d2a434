mod cli;

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use time::macros::format_description;
use tracing::{error, info, warn};
use vodkeep::{
    acquire::{ArchiveOptions, ArchiveOutcome, Archiver},
    archive::{ArchiveIndex, ArchiveLayout},
    download::{Cancellation, HttpFetcher},
    logging::init_logging,
    outside::Ffmpeg,
    remote::GqlClient,
    settings::Settings,
    types::ContentKind,
};

use crate::cli::{Args, Command};

/// One item of work for the archiver
#[derive(Debug)]
enum Job {
    Video(String),
    Clip(String),
    Chat(String),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).wrap_err("Could not load settings")?;
    args.apply(&mut settings);
    init_logging(settings.log_level()?)?;

    let layout = ArchiveLayout::new(&settings.archive_root);

    let jobs = match args.command {
        Command::Index { refresh } => return show_index(layout, refresh),
        Command::Lookup { kind, key } => return lookup(layout, kind.into(), &key),
        Command::Channel { login } => return show_channel(&settings, layout, &login),
        Command::Video { ids, chat } => ids
            .into_iter()
            .flat_map(|id| {
                let chat = chat.then(|| Job::Chat(id.clone()));
                std::iter::once(Job::Video(id)).chain(chat)
            })
            .collect::<Vec<_>>(),
        Command::Clip { slugs } => slugs.into_iter().map(Job::Clip).collect(),
        Command::Chat { ids } => ids.into_iter().map(Job::Chat).collect(),
    };

    let cancel = Cancellation::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupted, stopping the current item");
            cancel.cancel();
        })
        .into_diagnostic()
        .wrap_err("Could not install the interrupt handler")?;
    }

    let gql = GqlClient::new(&settings.client_id, settings.timeout())?;
    let fetcher = HttpFetcher::new(settings.timeout())?;
    let ffmpeg = Ffmpeg::new().wrap_err("ffmpeg is needed to join segments")?;

    let options = ArchiveOptions {
        scratch_dir: settings.scratch_dir(),
        workers: settings.workers,
        retries: settings.retries,
        ffmpeg_loglevel: settings.ffmpeg_loglevel.clone(),
    };
    let mut archiver =
        Archiver::new(&gql, &fetcher, &ffmpeg, layout, options).with_cancellation(cancel.clone());

    let total = jobs.len();
    let mut failures = 0;
    for job in jobs {
        if cancel.is_cancelled() {
            warn!("Cancelled, skipping the remaining items");
            break;
        }

        let (name, res) = match &job {
            Job::Video(id) => (format!("video {id}"), archiver.archive_video(id)),
            Job::Clip(slug) => (format!("clip {slug}"), archiver.archive_clip(slug)),
            Job::Chat(id) => (format!("chat of {id}"), archiver.archive_chat(id)),
        };

        match res {
            Ok(ArchiveOutcome::Archived { path, .. }) => {
                info!("Done with {name}: '{}'", path.display())
            }
            Ok(ArchiveOutcome::AlreadyArchived { login, filename }) => {
                info!("Skipped {name}, already in '{login}/{filename}'")
            }
            Err(err) if err.is_cancellation() => {
                warn!("Stopped during {name}");
                break;
            }
            Err(err) => {
                error!("Could not archive {name}: {:?}", miette::Report::new(err));
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(miette!("{failures} of {total} items could not be archived"));
    }

    info!("All items processed");
    Ok(())
}

fn show_index(layout: ArchiveLayout, refresh: bool) -> Result<()> {
    let mut index = ArchiveIndex::open(layout);
    let snapshot = index.load(refresh)?;

    for (login, channel) in snapshot.channels() {
        println!(
            "{login}: {} videos, {} clips",
            channel.vods.len(),
            channel.clips.len()
        );
    }
    info!("{} items archived", snapshot.len());
    Ok(())
}

fn show_channel(settings: &Settings, layout: ArchiveLayout, login: &str) -> Result<()> {
    let gql = GqlClient::new(&settings.client_id, settings.timeout())?;
    let channel = gql
        .channel(login)?
        .ok_or_else(|| miette!("Channel '{login}' does not exist"))?;

    let created = channel
        .created_at
        .format(format_description!("[year]-[month]-[day]"))
        .into_diagnostic()?;
    println!("{} ({}), id {}, created {created}", channel.display_name, channel.login, channel.id);

    let mut index = ArchiveIndex::open(layout);
    let snapshot = index.load(false)?;
    match snapshot.channel(&channel.login) {
        Some(archived) => println!(
            "{} videos, {} clips archived",
            archived.vods.len(),
            archived.clips.len()
        ),
        None => println!("Nothing archived"),
    }
    Ok(())
}

fn lookup(layout: ArchiveLayout, kind: ContentKind, key: &str) -> Result<()> {
    let mut index = ArchiveIndex::open(layout.clone());
    let snapshot = index.load(false)?;

    let entry = match kind {
        ContentKind::Video => snapshot.find_video(key),
        ContentKind::Clip => snapshot.find_clip(key),
    }
    .ok_or_else(|| miette!("'{key}' is not archived"))?;

    println!(
        "{}",
        layout.file_path(entry.login, kind, entry.filename).display()
    );
    Ok(())
}
