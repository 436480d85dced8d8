//! svnvcs command-line tool.
//!
//! Exposes each operation of the Subversion adapter as a subcommand:
//! branching, merging, tagging, history, diffs and file content, plus
//! generating and validating the configuration file.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use svnvcs_core::{AdapterConfig, Commit, SvnVcs, Tag, WalkDirection};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// svnvcs command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "svnvcs",
    version,
    about = "Branch, merge, tag and inspect a Subversion repository"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./svnvcs.toml")]
    config: PathBuf,

    /// Print results as JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./svnvcs.toml")]
        output: PathBuf,
    },

    /// Validate the configuration file.
    Validate,

    /// Create trunk/, branches/ and tags/ in an empty repository.
    Layout {
        #[arg(short, long, default_value = "Create standard layout")]
        message: String,
    },

    /// List branches.
    Branches {
        /// Only branches below branches/ starting with this prefix.
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Create a branch from another branch's HEAD.
    CreateBranch {
        name: String,
        /// Source branch (default: trunk).
        #[arg(long)]
        from: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Delete a branch.
    DeleteBranch {
        name: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Merge one branch into another and commit the result.
    Merge {
        /// Source branch.
        src: String,
        /// Destination branch (default: trunk).
        #[arg(long)]
        into: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print a file.
    Cat {
        path: String,
        #[arg(short, long)]
        branch: Option<String>,
        #[arg(short, long)]
        revision: Option<String>,
    },

    /// Commit a local file's content to a branch.
    Put {
        /// Path inside the branch.
        path: String,
        /// Local file providing the content.
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        branch: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Delete a file from a branch.
    Rm {
        path: String,
        #[arg(short, long)]
        branch: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Check whether a file exists on a branch.
    Exists {
        path: String,
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Show the history of a branch.
    Log {
        #[arg(short, long)]
        branch: Option<String>,
        /// Maximum number of commits (0 for all).
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// First revision of an inclusive range, oldest first.
        #[arg(long)]
        from: Option<String>,
        /// Last revision of an inclusive range.
        #[arg(long)]
        to: Option<String>,
        /// Walk the history from --start in this direction.
        #[arg(long, value_enum, conflicts_with_all = ["from", "to"])]
        walk: Option<Direction>,
        /// Starting revision for --walk.
        #[arg(long, requires = "walk")]
        start: Option<String>,
    },

    /// Show what differs between two branches.
    Diff {
        /// Branch whose changes are shown.
        src: String,
        /// Branch compared against (default: trunk).
        #[arg(long)]
        against: Option<String>,
        /// Print the unified diff of each file.
        #[arg(short, long)]
        patch: bool,
    },

    /// List tags.
    Tags {
        /// Only tags cut from this revision.
        #[arg(short, long)]
        revision: Option<String>,
    },

    /// Tag a branch.
    Tag {
        name: String,
        #[arg(short, long)]
        branch: Option<String>,
        #[arg(short, long)]
        revision: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Check a branch out into a local directory.
    Checkout {
        target: PathBuf,
        #[arg(short, long)]
        branch: Option<String>,
        #[arg(short, long)]
        revision: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for WalkDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Asc => WalkDirection::Asc,
            Direction::Desc => WalkDirection::Desc,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.config);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins, then the config's `log_level`, then `warn`.
fn init_logging(config_path: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = AdapterConfig::load_from_file(config_path)
            .map(|c| c.log_level)
            .unwrap_or_else(|_| "warn".to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        command => {
            let config = load_config(&cli.config)?;
            let vcs = SvnVcs::from_config(&config).context("failed to set up svn adapter")?;
            dispatch(&vcs, command, json).await
        }
    }
}

async fn dispatch(vcs: &SvnVcs, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Layout { message } => {
            let commit = vcs
                .create_layout(&message)
                .await
                .context("failed to create repository layout")?;
            report_commit(&commit, "Layout created", json)
        }

        Commands::Branches { filter } => {
            let branches = vcs
                .get_branches(filter.as_deref())
                .await
                .context("failed to list branches")?;
            if json {
                return print_json(&branches);
            }
            for branch in &branches {
                println!("{}", branch);
            }
            Ok(())
        }

        Commands::CreateBranch {
            name,
            from,
            message,
        } => {
            let from = branch_arg(&from);
            let message = message.unwrap_or_else(|| format!("Create branch {}", name));
            vcs.create_branch(from, &name, &message)
                .await
                .with_context(|| format!("failed to create branch '{}'", name))?;
            println!("{}", style::success(&format!("Branch {} created", name)));
            Ok(())
        }

        Commands::DeleteBranch { name, message } => {
            let message = message.unwrap_or_else(|| format!("Delete branch {}", name));
            vcs.delete_branch(&name, &message)
                .await
                .with_context(|| format!("failed to delete branch '{}'", name))?;
            println!("{}", style::success(&format!("Branch {} deleted", name)));
            Ok(())
        }

        Commands::Merge { src, into, message } => {
            let dst = branch_arg(&into);
            let message = message.unwrap_or_else(|| {
                format!(
                    "Merge {} into {}",
                    src,
                    dst.unwrap_or("trunk")
                )
            });
            let result = vcs
                .merge(branch_name(&src), dst, &message)
                .await
                .with_context(|| format!("failed to merge '{}'", src))?;
            if json {
                return print_json(&result);
            }
            if result.success() {
                println!("{}", style::success("Merge committed"));
                return Ok(());
            }
            println!(
                "{}",
                style::warn(&format!(
                    "Merge not committed: {} conflicting file(s)",
                    result.conflicting_files().len()
                ))
            );
            for file in result.conflicting_files() {
                println!("  C {}", file);
            }
            anyhow::bail!("merge produced conflicts")
        }

        Commands::Cat {
            path,
            branch,
            revision,
        } => {
            let content = vcs
                .get_file_content(branch_arg(&branch), &path, revision.as_deref())
                .await
                .with_context(|| format!("failed to read '{}'", path))?;
            print!("{}", content);
            Ok(())
        }

        Commands::Put {
            path,
            file,
            branch,
            message,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let message = message.unwrap_or_else(|| format!("Update {}", path));
            let commit = vcs
                .set_file_content(branch_arg(&branch), &path, &content, &message)
                .await
                .with_context(|| format!("failed to commit '{}'", path))?;
            report_commit(&commit, &format!("{} committed", path), json)
        }

        Commands::Rm {
            path,
            branch,
            message,
        } => {
            let message = message.unwrap_or_else(|| format!("Remove {}", path));
            let commit = vcs
                .remove_file(branch_arg(&branch), &path, &message)
                .await
                .with_context(|| format!("failed to remove '{}'", path))?;
            report_commit(&commit, &format!("{} removed", path), json)
        }

        Commands::Exists { path, branch } => {
            let exists = vcs
                .file_exists(branch_arg(&branch), &path)
                .await
                .context("failed to check file")?;
            if json {
                return print_json(&exists);
            }
            println!("{}", exists);
            if exists {
                Ok(())
            } else {
                anyhow::bail!("'{}' does not exist", path)
            }
        }

        Commands::Log {
            branch,
            limit,
            from,
            to,
            walk,
            start,
        } => {
            let branch = branch_arg(&branch);
            let commits = if let Some(direction) = walk {
                vcs.get_commits_walk(branch, start.as_deref(), direction.into(), limit)
                    .await
            } else if from.is_some() || to.is_some() {
                vcs.get_commits_range(branch, from.as_deref(), to.as_deref())
                    .await
            } else {
                vcs.log(branch, limit).await
            }
            .context("failed to read history")?;
            if json {
                return print_json(&commits);
            }
            print_commits(&commits);
            Ok(())
        }

        Commands::Diff {
            src,
            against,
            patch,
        } => {
            let entries = vcs
                .get_branches_diff(branch_name(&src), branch_arg(&against))
                .await
                .context("failed to diff branches")?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("{}", style::dim("No differences"));
                return Ok(());
            }
            for entry in &entries {
                println!("{} {}", style::change_marker(entry.change_type), entry.file_path);
                if patch {
                    if let Some(text) = &entry.unified_diff {
                        println!("{}", style::unified_diff(text));
                    }
                }
            }
            Ok(())
        }

        Commands::Tags { revision } => {
            let tags = match revision {
                Some(rev) => vcs.get_tags_on_revision(&rev).await,
                None => vcs.get_tags().await,
            }
            .context("failed to list tags")?;
            if json {
                return print_json(&tags);
            }
            print_tags(&tags);
            Ok(())
        }

        Commands::Tag {
            name,
            branch,
            revision,
            message,
        } => {
            let message = message.unwrap_or_else(|| format!("Tag {}", name));
            let tag = vcs
                .create_tag(branch_arg(&branch), &name, &message, revision.as_deref())
                .await
                .with_context(|| format!("failed to create tag '{}'", name))?;
            if json {
                return print_json(&tag);
            }
            println!(
                "{}",
                style::success(&format!(
                    "Tag {} created at r{}",
                    tag.name, tag.related_commit.revision_id
                ))
            );
            Ok(())
        }

        Commands::Checkout {
            target,
            branch,
            revision,
        } => {
            vcs.checkout(branch_arg(&branch), &target, revision.as_deref())
                .await
                .with_context(|| format!("failed to check out into {}", target.display()))?;
            println!(
                "{}",
                style::success(&format!("Checked out into {}", target.display()))
            );
            Ok(())
        }

        Commands::Init { .. } | Commands::Validate => unreachable!("handled before the adapter is built"),
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AdapterConfig> {
    let config = AdapterConfig::load_and_resolve(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    debug!(url = %config.svn.url, "configuration loaded");
    Ok(config)
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# svnvcs configuration

log_level = "warn"

[svn]
url = "https://svn.example.com/repo"
# username = "svn_user"
# password_env = "SVN_PASSWORD"

[workspace]
home = "/var/lib/svnvcs/workspaces"
max_working_copies = 4

# [proxy]
# host = "proxy.example.com"
# port = 3128
# username = "proxy_user"
# password_env = "PROXY_PASSWORD"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your repository URL and credentials");
    println!("  2. Set the referenced environment variables (SVN_PASSWORD, ...)");
    println!(
        "  3. Validate with: svnvcs validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AdapterConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    let _ = config.resolve_env_vars();
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  SVN URL        : {}", config.svn.url);
    println!(
        "  SVN user       : {}",
        config.svn.username.as_deref().unwrap_or("(anonymous)")
    );
    println!(
        "  SVN password   : {}",
        if config.svn.password.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("  Workspace home : {}", config.workspace.home.display());
    println!("  Working copies : {}", config.workspace.max_working_copies);
    match &config.proxy {
        Some(proxy) => println!("  Proxy          : {}:{}", proxy.host, proxy.port),
        None => println!("  Proxy          : none"),
    }
    println!();
    println!("Configuration is valid.");

    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn report_commit(commit: &Commit, what: &str, json: bool) -> Result<()> {
    if json {
        return print_json(commit);
    }
    if commit.is_empty() {
        println!("{}", style::dim("Nothing to commit"));
    } else {
        println!(
            "{}",
            style::success(&format!("{} in r{}", what, commit.revision_id))
        );
    }
    Ok(())
}

fn print_commits(commits: &[Commit]) {
    if commits.is_empty() {
        println!("{}", style::dim("No commits"));
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Rev", "Author", "Message"]);
    for c in commits {
        table.add_row(vec![
            Cell::new(format!("r{}", c.revision_id)),
            Cell::new(&c.author),
            Cell::new(truncate(c.message.lines().next().unwrap_or(""), 72)),
        ]);
    }
    println!("{}", table);
}

fn print_tags(tags: &[Tag]) {
    if tags.is_empty() {
        println!("{}", style::dim("No tags"));
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Tag", "Commit", "Author", "Message"]);
    for t in tags {
        let commit = if t.related_commit.is_empty() {
            "-".to_string()
        } else {
            format!("r{}", t.related_commit.revision_id)
        };
        table.add_row(vec![
            Cell::new(&t.name),
            Cell::new(commit),
            Cell::new(&t.author),
            Cell::new(truncate(t.message.lines().next().unwrap_or(""), 60)),
        ]);
    }
    println!("{}", table);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode JSON")?;
    println!("{}", text);
    Ok(())
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

/// `trunk` (or nothing) selects the default branch.
fn branch_name(name: &str) -> Option<&str> {
    match name {
        "" | "trunk" => None,
        other => Some(other),
    }
}

fn branch_arg(name: &Option<String>) -> Option<&str> {
    name.as_deref().and_then(branch_name)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
