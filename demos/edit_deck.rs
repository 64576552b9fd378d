//! Command-line front end for editing a presentation package.
//!
//! Extracts a `.pptx` into a working directory, applies one operation, and
//! writes the result back to an archive.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example edit_deck -- deck.pptx info
//! cargo run --example edit_deck -- deck.pptx -o out.pptx blank 2 --title "Agenda"
//! cargo run --example edit_deck -- deck.pptx -o out.pptx copy 3 1 --title "Recap"
//! cargo run --example edit_deck -- deck.pptx -o out.pptx animate 2 4 --effect fly-in
//! RUST_LOG=slidesmith=debug cargo run --example edit_deck -- deck.pptx validate
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use slidesmith::ooxml::pptx::{
    AnimationEffect, EffectSpec, ShapeId, TemplateData, TitleAndContentTemplate, TitleSlideTemplate,
    Transition,
};
use slidesmith::{EditorConfig, PackageEditor};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Edit slides of a PowerPoint package while keeping its ids consistent
#[derive(Parser, Debug)]
#[command(name = "edit_deck", version)]
struct Args {
    /// Input .pptx archive
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output archive; required by operations that modify the package
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Directory the package is extracted into (defaults to INPUT.d)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// YAML editor configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List slides in presentation order
    Info,
    /// Run every consistency check
    Validate,
    /// Insert a blank slide
    Blank {
        position: u32,
        #[arg(long)]
        title: Option<String>,
    },
    /// Insert a copy of an existing slide
    Copy {
        position: u32,
        source: u32,
        /// New title for the copy
        #[arg(long)]
        title: Option<String>,
    },
    /// Insert a slide from a built-in template
    Template {
        position: u32,
        #[arg(long, value_enum, default_value = "title")]
        kind: TemplateKind,
        #[arg(long)]
        title: Option<String>,
        /// Subtitle or body text; `\n` separates paragraphs
        #[arg(long)]
        text: Option<String>,
    },
    /// Remove a slide
    Remove { index: u32 },
    /// Animate a shape on a new click trigger
    Animate {
        slide: u32,
        shape: u32,
        #[arg(long, value_enum, default_value = "fade")]
        effect: EffectArg,
        #[arg(long)]
        exit: bool,
        #[arg(long)]
        duration_ms: Option<u32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TemplateKind {
    Title,
    Content,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EffectArg {
    Appear,
    FlyIn,
    Dissolve,
    Fade,
    Split,
    Wipe,
    Zoom,
}

impl From<EffectArg> for AnimationEffect {
    fn from(arg: EffectArg) -> Self {
        match arg {
            EffectArg::Appear => AnimationEffect::Appear,
            EffectArg::FlyIn => AnimationEffect::FlyIn,
            EffectArg::Dissolve => AnimationEffect::Dissolve,
            EffectArg::Fade => AnimationEffect::Fade,
            EffectArg::Split => AnimationEffect::Split,
            EffectArg::Wipe => AnimationEffect::Wipe,
            EffectArg::Zoom => AnimationEffect::Zoom,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = match &args.config {
        Some(path) => EditorConfig::from_yaml_file(path)?,
        None => EditorConfig::default(),
    };
    let workdir = args
        .workdir
        .clone()
        .unwrap_or_else(|| args.input.with_extension("d"));
    let editor = PackageEditor::open_archive(&args.input, &workdir, config)?;

    match args.command {
        Command::Info => {
            for (position, index) in editor.slide_order()?.into_iter().enumerate() {
                let slide = editor.parse_slide(index)?;
                println!(
                    "{:>3}. slide{}.xml  {:<40} {} shapes, {} effects",
                    position + 1,
                    index,
                    slide.title().unwrap_or("(untitled)"),
                    slide.shapes.len(),
                    slide.bindings.len()
                );
            }
            return Ok(());
        },
        Command::Validate => {
            let report = editor.validate();
            print!("{}", report);
            println!("{} errors, {} warnings", report.errors.len(), report.warnings.len());
            return Ok(());
        },
        Command::Blank { position, title } => {
            let index = editor.insert_blank_slide(position, title.as_deref())?;
            println!("Inserted blank slide at {}", index);
        },
        Command::Copy {
            position,
            source,
            title,
        } => {
            let outcome = editor.insert_copied_slide(position, source, title.as_deref())?;
            println!(
                "Copied slide {} to {}: {} shapes renumbered, {} references updated",
                source, outcome.position, outcome.regeneration.shapes_processed, outcome.regeneration.references_updated
            );
            for (old, new) in &outcome.regeneration.mapping {
                println!("  shape {} -> {}", old, new);
            }
        },
        Command::Template {
            position,
            kind,
            title,
            text,
        } => {
            let mut data = TemplateData::new();
            if let Some(title) = title {
                data.insert("title", title);
            }
            let text = text.map(|t| t.replace("\\n", "\n"));
            let outcome = match kind {
                TemplateKind::Title => {
                    if let Some(text) = text {
                        data.insert("subtitle", text);
                    }
                    editor.insert_template_slide(position, &TitleSlideTemplate, &data)?
                },
                TemplateKind::Content => {
                    if let Some(text) = text {
                        data.insert("body", text);
                    }
                    editor.insert_template_slide(position, &TitleAndContentTemplate, &data)?
                },
            };
            println!("Inserted template slide at {}", outcome.position);
        },
        Command::Remove { index } => {
            let count = editor.remove_slide(index)?;
            println!("Removed slide {}; {} slides left", index, count);
        },
        Command::Animate {
            slide,
            shape,
            effect,
            exit,
            duration_ms,
        } => {
            let target = ShapeId::new(shape).ok_or("shape id must be positive")?;
            let mut spec = EffectSpec::new(target, effect.into());
            if exit {
                spec = spec.with_transition(Transition::Out);
            }
            if let Some(ms) = duration_ms {
                spec = spec.with_duration(ms);
            }
            let trigger = editor.create_click_trigger(slide)?;
            let node = editor.bind_effect(slide, trigger, &spec)?;
            println!("Added click {} on slide {} (time node {})", trigger, slide, node);
        },
    }

    let output = args.output.ok_or("--output is required for this operation")?;
    let parts = editor.save_archive(&output)?;
    println!("Wrote {} parts to {}", parts, output.display());
    Ok(())
}
