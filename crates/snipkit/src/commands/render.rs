//! Batch and watch-mode snippet rendering.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use snipkit_render::{
    DirectEvaluator, PreviewRenderer, RenderState, SandboxLimits, SandboxedInterpreter,
    SnippetExecutor,
};
use snipkit_server::watcher::is_snippet;
use snipkit_server::{SnippetWatcher, WatchEvent};
use walkdir::WalkDir;

pub struct RenderOptions {
    /// Where to write `<stem>.html`; nothing is written when unset
    pub output: Option<PathBuf>,

    /// Use the unrestricted evaluator
    pub trusted: bool,

    pub limits: SandboxLimits,
}

impl RenderOptions {
    fn executor(&self) -> Arc<dyn SnippetExecutor> {
        if self.trusted {
            Arc::new(DirectEvaluator::new())
        } else {
            Arc::new(SandboxedInterpreter::new(self.limits))
        }
    }
}

/// Outcome of rendering one file.
struct Rendered {
    path: PathBuf,
    state: RenderState,
}

/// Render every snippet under `path` once. Fails if any snippet fails.
pub fn run(path: &Path, options: &RenderOptions) -> Result<()> {
    let files = collect_snippets(path)?;
    if files.is_empty() {
        tracing::warn!("No snippets found in {}", path.display());
        return Ok(());
    }

    let executor = options.executor();
    tracing::info!(
        "Rendering {} snippets with the {} executor",
        files.len(),
        executor.name()
    );

    let results: Vec<Result<Rendered>> = files
        .par_iter()
        .map(|file| render_file(file, &executor))
        .collect();

    let mut failed = 0;
    for result in results {
        let rendered = result?;
        report(&rendered);
        if rendered.state.failure().is_some() {
            failed += 1;
        }
        if let Some(output) = &options.output {
            write_preview(output, &rendered)?;
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} snippets failed to render", files.len());
    }
    tracing::info!("All snippets rendered");
    Ok(())
}

/// Render once, then re-render each snippet whenever it changes.
pub async fn watch(path: PathBuf, options: RenderOptions) -> Result<()> {
    if let Err(e) = run(&path, &options) {
        tracing::warn!("{e}");
    }

    let (watcher, mut rx) =
        SnippetWatcher::new(std::slice::from_ref(&path)).context("Failed to watch snippets")?;
    tracing::info!("Watching {} for changes", path.display());

    let executor = options.executor();
    while let Some(event) = rx.recv().await {
        match event {
            WatchEvent::Changed(file) => {
                let executor = executor.clone();
                let rendered =
                    tokio::task::spawn_blocking(move || render_file(&file, &executor)).await?;
                match rendered {
                    Ok(rendered) => {
                        report(&rendered);
                        if let Some(output) = &options.output {
                            write_preview(output, &rendered)?;
                        }
                    }
                    Err(e) => tracing::warn!("{e:#}"),
                }
            }
            WatchEvent::Removed(file) => {
                tracing::info!("Removed {}", file.display());
            }
        }
    }

    drop(watcher);
    Ok(())
}

fn collect_snippets(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_snippet(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    Ok(files)
}

fn render_file(path: &Path, executor: &Arc<dyn SnippetExecutor>) -> Result<Rendered> {
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let state = PreviewRenderer::new(executor.clone()).render(&source);
    Ok(Rendered {
        path: path.to_path_buf(),
        state,
    })
}

fn report(rendered: &Rendered) {
    let name = rendered.path.display();
    match &rendered.state {
        RenderState::Mounted(preview) => {
            tracing::info!("✓ {name}");
            for line in &preview.console {
                tracing::debug!("  {line}");
            }
        }
        RenderState::Failed(failure) => {
            tracing::warn!("✗ {name} ({}): {}", failure.kind.stage(), failure.message);
        }
        other => tracing::debug!("{name} stopped in {}", other.label()),
    }
}

fn write_preview(output: &Path, rendered: &Rendered) -> Result<()> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let stem = rendered
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("snippet");
    let target = output.join(format!("{stem}.html"));
    fs::write(&target, rendered.state.to_html())
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(())
}
