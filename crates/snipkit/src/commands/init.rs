//! Initialize snipkit in the current directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::DEFAULT_CONFIG;

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing snipkit...");

    if !config_path.exists() || yes {
        fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        tracing::info!("Created {}", config_path.display());
    } else {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
    }

    let snippets_dir = Path::new("snippets");
    if !snippets_dir.exists() {
        fs::create_dir_all(snippets_dir).context("Failed to create snippets directory")?;
    }

    let example_path = snippets_dir.join("Counter.jsx");
    if !example_path.exists() || yes {
        fs::write(&example_path, EXAMPLE_SNIPPET).context("Failed to write Counter.jsx")?;
        tracing::info!("Created snippets/Counter.jsx");
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'snipkit render snippets' to preview snippets.");

    Ok(())
}

const EXAMPLE_SNIPPET: &str = r#"exports.default = () => {
  const [count, setCount] = React.useState(0);
  const handleClick = () => setCount(count + 1);

  return (
    <div className="flex items-center gap-4 p-6">
      <span className="text-lg font-semibold">Count: {count}</span>
      <button
        className="rounded-md bg-indigo-600 px-4 py-2 text-white hover:bg-indigo-500"
        onClick={handleClick}
      >
        Increment
      </button>
    </div>
  );
};
"#;
