#![warn(clippy::pedantic)]

pub mod global;
pub mod session;

use cardsmith_core::persist::{autosave::AutosaveScheduler, naming};
use cardsmith_core::state::Naming;
use cardsmith_core::Editor;

use anyhow::{Context, Result as AnyResult};

struct Args {
    /// Project archives to open, in order.
    archives: Vec<std::path::PathBuf>,
    /// Where to write the project archive on exit, if anywhere.
    export_dir: Option<std::path::PathBuf>,
}
impl Args {
    fn parse() -> AnyResult<Self> {
        // Paths are OSStrings, let the system handle character encoding restrictions.
        let mut args = std::env::args_os().skip(1);
        let mut archives = Vec::new();
        let mut export_dir = None;
        while let Some(arg) = args.next() {
            if arg == "--export" {
                let dir = args.next().context("--export needs a directory")?;
                export_dir = Some(dir.into());
            } else {
                archives.push(arg.into());
            }
        }
        Ok(Self {
            archives,
            export_dir,
        })
    }
}

fn open_archives(editor: &mut Editor, paths: &[std::path::PathBuf]) -> bool {
    // Did we have at least one success? No paths is a success.
    let mut had_success = paths.is_empty();
    for path in paths {
        let result: AnyResult<_> = (|| {
            let file = std::io::BufReader::new(std::fs::File::open(path)?);
            Ok(editor.import_archive(std::time::Instant::now(), file)?)
        })();
        match result {
            Err(e) => log::error!("failed to open file {path:?}: {e:#}"),
            Ok(missing) => {
                for asset in missing {
                    log::warn!("{path:?}: {asset}");
                }
                log::info!("Opened {path:?}");
                had_success = true;
            }
        }
    }
    had_success
}

fn export(editor: &Editor, dir: &std::path::Path, product: &str) -> AnyResult<()> {
    let name = naming::project_file_name(product, chrono::Local::now().naive_local());
    let path = dir.join(name);
    let file = std::fs::File::create(&path).with_context(|| format!("creating {path:?}"))?;
    editor
        .export_archive(std::io::BufWriter::new(file))?
        .into_inner()
        .map_err(|e| e.into_error())?;
    log::info!("Exported {path:?}");
    Ok(())
}

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Trace);
    }
    let config = global::config::Config::get();
    log::set_max_level(config.level_filter());

    let args = Args::parse()?;
    let mut editor = Editor::new(
        cardsmith_core::settings::Settings::default(),
        Naming::default(),
        AutosaveScheduler::new(config.debounce()),
    );
    let store = global::autosave_store();
    match editor.recover(&**store) {
        Ok(true) => log::info!("Recovered the last session."),
        Ok(false) => (),
        Err(e) => log::error!("Failed to recover the last session: {e}"),
    }

    // False if every file failed.
    if !open_archives(&mut editor, &args.archives) {
        log::warn!("Failed to load any provided project.");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(async {
        let (send, recv) = tokio::sync::mpsc::channel(4);
        let worker = tokio::spawn(session::autosave_worker(store.clone(), recv));
        let result: AnyResult<()> = async {
            session::settle(&mut editor, &send).await?;
            session::flush(&mut editor, &send).await?;
            Ok(())
        }
        .await;
        // Closing the channel lets the worker finish what it has.
        drop(send);
        if let Err(e) = worker.await {
            log::error!("Autosave worker exited with err:\n{e:?}");
        }
        result
    })?;

    if let Some(dir) = &args.export_dir {
        export(&editor, dir, &config.product_name)?;
    }
    Ok(())
}
