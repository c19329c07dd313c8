use std::{
    io::{self, Write as _},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use client_core::{
    presets::PRESETS,
    settings::parse_server_url,
    view::{ChapterList, SessionView},
    ActionController, ActionOutcome, ClientSettings, ControllerOptions, GenerationFlow,
    HttpSessionGateway, Locale, Preferences, RouteStyle,
};
use shared::domain::{AspectRatio, ExportFormat, StoryId, Theme};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod download;

#[derive(Parser, Debug)]
#[command(name = "storyteller", about = "Drive story sessions on a story service")]
struct Cli {
    /// Settings file; defaults to ./storyteller.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    route_style: Option<RouteStyle>,
    #[arg(long)]
    flow: Option<GenerationFlow>,
    #[arg(long)]
    locale: Option<Locale>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new story from the form fields.
    Generate(FormArgs),
    /// Draft an outline without generating the story.
    Outline(FormArgs),
    /// Print an existing story.
    Show { story_id: String },
    /// Ask for the next chapter of a story.
    Next {
        story_id: String,
        #[arg(long, default_value = "")]
        direction: String,
    },
    Illustrate {
        story_id: String,
        #[arg(long, default_value = "1:1")]
        aspect_ratio: AspectRatio,
    },
    /// List stories known to the service.
    List,
    Delete {
        story_id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Save an export of a story.
    Download {
        story_id: String,
        #[arg(long, default_value = "md")]
        format: ExportFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Presets,
    /// Show or change the stored display theme.
    Theme { set: Option<ThemeChoice> },
}

#[derive(Args, Debug, Clone, Default)]
struct FormArgs {
    #[arg(long)]
    preset: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    tone: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    length: Option<String>,
    #[arg(long)]
    setting: Option<String>,
    #[arg(long)]
    theme: Option<String>,
    #[arg(long)]
    relationships: Option<String>,
    #[arg(long)]
    idea: Option<String>,
    /// Outline to send with generation (outline-first flow).
    #[arg(long)]
    outline: Option<String>,
    /// `name=traits`; replaces the default characters. Repeatable.
    #[arg(long = "character")]
    characters: Vec<String>,
    #[arg(long)]
    no_illustration_prompt: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ThemeChoice {
    Light,
    Dark,
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = ClientSettings::load(cli.config.as_deref())?;
    if let Some(url) = &cli.server_url {
        settings.server_url = parse_server_url(url)?;
    }
    if let Some(route_style) = cli.route_style {
        settings.route_style = route_style;
    }
    if let Some(flow) = cli.flow {
        settings.flow = flow;
    }
    if let Some(locale) = cli.locale {
        settings.locale = locale;
    }

    match cli.command {
        Command::Presets => {
            for preset in &PRESETS {
                println!("{:<10} {} / {} / {}", preset.key, preset.genre, preset.tone, preset.age);
            }
            Ok(())
        }
        Command::Theme { set } => run_theme(&settings, set),
        command => connect_and_run(&settings, command).await,
    }
}

async fn connect_and_run(settings: &ClientSettings, command: Command) -> Result<()> {
    info!(server = %settings.server_url, route_style = ?settings.route_style, flow = ?settings.flow, "using story service");
    let gateway = Arc::new(HttpSessionGateway::from_settings(settings)?);
    let controller = ActionController::new(gateway, ControllerOptions::from(settings));
    let progress = spawn_progress(&controller);

    let result = run(&controller, command).await;
    progress.abort();
    result
}

async fn run(controller: &ActionController, command: Command) -> Result<()> {
    match command {
        Command::Generate(form) => {
            apply_form(controller, form).await?;
            let needs_outline = controller.options().flow == GenerationFlow::OutlineFirst
                && controller.form().await.outline.trim().is_empty();
            if needs_outline {
                expect_completed("outline", controller.generate_outline().await, controller)
                    .await?;
            }
            let outcome = controller.generate().await;
            expect_completed("generate", outcome, controller).await?;
            print_view(&controller.current_view().await);
        }
        Command::Outline(form) => {
            if controller.options().flow != GenerationFlow::OutlineFirst {
                bail!("outlines need the outline-first flow (--flow outline-first)");
            }
            apply_form(controller, form).await?;
            let outcome = controller.generate_outline().await;
            expect_completed("outline", outcome, controller).await?;
            println!("{}", controller.form().await.outline);
        }
        Command::Show { story_id } => {
            open(controller, &story_id).await?;
            print_view(&controller.current_view().await);
        }
        Command::Next {
            story_id,
            direction,
        } => {
            open(controller, &story_id).await?;
            controller
                .update_form(move |form| form.user_direction = direction)
                .await;
            let outcome = controller.advance_chapter().await;
            expect_completed("next chapter", outcome, controller).await?;
            print_view(&controller.current_view().await);
        }
        Command::Illustrate {
            story_id,
            aspect_ratio,
        } => {
            open(controller, &story_id).await?;
            controller
                .update_form(move |form| form.aspect_ratio = aspect_ratio)
                .await;
            let outcome = controller.illustrate().await;
            expect_completed("illustration", outcome, controller).await?;
            let view = controller.current_view().await;
            if let Some(url) = view.illustration.image_url {
                println!("{url}");
            }
        }
        Command::List => {
            let outcome = controller.refresh_listing().await;
            expect_completed("list", outcome, controller).await?;
            print_listing(&controller.current_view().await);
        }
        Command::Delete { story_id, yes } => {
            // Best effort: the listing is only used for the summary printed afterwards.
            controller.refresh_listing().await;
            let story_id = StoryId::new(story_id);
            let outcome = if yes {
                controller
                    .delete_session(story_id, &|_: &str| true)
                    .await
            } else {
                controller.delete_session(story_id, &ask).await
            };
            if outcome == ActionOutcome::Cancelled {
                println!("cancelled");
                return Ok(());
            }
            expect_completed("delete", outcome, controller).await?;
            print_listing(&controller.current_view().await);
        }
        Command::Download {
            story_id,
            format,
            output,
        } => {
            open(controller, &story_id).await?;
            let url = controller
                .download(format)
                .await
                .ok_or_else(|| anyhow!("no story is open"))?;
            let story_id = StoryId::new(story_id);
            let path = download::save_export(&url, &story_id, format, output).await?;
            println!("saved {}", path.display());
        }
        Command::Presets | Command::Theme { .. } => {}
    }
    Ok(())
}

async fn open(controller: &ActionController, story_id: &str) -> Result<()> {
    let outcome = controller.open_session(StoryId::new(story_id)).await;
    expect_completed("open story", outcome, controller).await
}

async fn expect_completed(
    action: &str,
    outcome: ActionOutcome,
    controller: &ActionController,
) -> Result<()> {
    match outcome {
        ActionOutcome::Completed => Ok(()),
        ActionOutcome::Failed => {
            let view = controller.current_view().await;
            let reason = match (&view.status, &view.chapters, &view.illustration.hint) {
                (status, _, _) if !status.is_empty() => status.clone(),
                (_, ChapterList::Placeholder(text), _) => text.clone(),
                (_, _, Some(hint)) => hint.clone(),
                _ => "unknown error".to_string(),
            };
            Err(anyhow!("{action} failed: {reason}"))
        }
        other => Err(anyhow!("{action} did not run ({other:?})")),
    }
}

async fn apply_form(controller: &ActionController, args: FormArgs) -> Result<()> {
    if let Some(key) = &args.preset {
        if !controller.apply_preset(key).await {
            let known: Vec<_> = PRESETS.iter().map(|preset| preset.key).collect();
            bail!("unknown preset '{key}' (known: {})", known.join(", "));
        }
    }
    if !args.characters.is_empty() {
        controller.clear_characters().await;
        for raw in &args.characters {
            let (name, traits) = raw.split_once('=').unwrap_or((raw.as_str(), ""));
            controller
                .add_character(name.trim().to_string(), traits.trim().to_string())
                .await;
        }
    }

    controller
        .update_form(move |form| {
            let fields = [
                (&mut form.genre, args.genre),
                (&mut form.tone, args.tone),
                (&mut form.age, args.age),
                (&mut form.length, args.length),
                (&mut form.setting, args.setting),
                (&mut form.theme, args.theme),
                (&mut form.relationships, args.relationships),
                (&mut form.idea, args.idea),
                (&mut form.outline, args.outline),
            ];
            for (field, value) in fields {
                if let Some(value) = value {
                    *field = value;
                }
            }
            if args.no_illustration_prompt {
                form.want_illustration_prompt = false;
            }
        })
        .await;
    Ok(())
}

fn run_theme(settings: &ClientSettings, set: Option<ThemeChoice>) -> Result<()> {
    let path = settings
        .resolved_preferences_path()
        .context("no configuration directory for preferences")?;
    let mut prefs = Preferences::load(&path)?;
    if let Some(choice) = set {
        prefs.theme = match choice {
            ThemeChoice::Light => Theme::Light,
            ThemeChoice::Dark => Theme::Dark,
            ThemeChoice::Toggle => prefs.theme.toggled(),
        };
        prefs.save(&path)?;
        info!(path = %path.display(), theme = prefs.theme.as_str(), "saved preferences");
    }
    println!("theme: {}", prefs.theme.as_str());
    Ok(())
}

fn ask(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    io::stdin().read_line(&mut answer).is_ok()
        && matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Echoes status transitions to stderr while an action runs.
fn spawn_progress(controller: &ActionController) -> JoinHandle<()> {
    let mut views = controller.subscribe_views();
    tokio::spawn(async move {
        let mut last = String::new();
        loop {
            match views.recv().await {
                Ok(view) => {
                    if !view.status.is_empty() && view.status != last {
                        eprintln!("> {}", view.status);
                        last = view.status;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_view(view: &SessionView) {
    println!("{}", view.story_badge);
    if !view.status.is_empty() {
        println!("status: {}", view.status);
    }
    println!("illustration prompt: {}", view.illustration_prompt);
    if let Some(url) = &view.illustration.image_url {
        println!("illustration: {url}");
    }
    match &view.chapters {
        ChapterList::Placeholder(text) => println!("\n{text}"),
        ChapterList::Items(items) => {
            for item in items {
                println!("\n[{}] {}\n{}", item.badge, item.title, item.body);
            }
        }
    }
}

fn print_listing(view: &SessionView) {
    if view.listing.is_empty() {
        println!("no stories");
        return;
    }
    for item in &view.listing {
        println!("{:<8} {:<22} {}", item.id.as_str(), item.created_at, item.title);
    }
}
