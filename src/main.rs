//! The CLI binary: argument parsing, file loading and the ASCII main loop.
//! Everything here is the out-of-core presenter/command layer spec.md §1
//! describes as cleanly replaceable; the engine itself never touches a
//! file, a terminal, or `std::env::args`.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use quantum_chess::cli::{ascii_render, apply_command, parse_command, tutorial_accepts, tutorial_allows_collapse, Command};
use quantum_chess::config::{GameModeConfig, TutorialConfig};
use quantum_chess::engine::Engine;
use quantum_chess::tutorial::Progress;

/// Quantum Chess.
///
/// The FILE parameter is just the name of the file, with no extension or
/// path.
#[derive(Parser, Debug)]
#[command(name = "quantum-chess", author, version, about, long_about = None)]
struct Args {
    /// Use the ASCII renderer. This crate carries no graphical board
    /// presenter (drawing the board is a non-goal of the core engine, and
    /// this binary is the reference out-of-core presenter), so it is
    /// currently the only supported rendering mode.
    #[arg(long)]
    ascii_render: bool,

    /// Select a specific game mode from its configuration file in
    /// `game_modes/`.
    #[arg(long, value_name = "FILE", default_value = "micro_chess", conflicts_with_all = ["tutorial", "guided_tutorials"])]
    game_mode: String,

    /// Run a specific tutorial from its configuration file in `tutorials/`.
    #[arg(long, value_name = "FILE", conflicts_with = "guided_tutorials")]
    tutorial: Option<String>,

    /// Run all the tutorials in order, keeping track of progress in
    /// `tutorials/progress`.
    #[arg(long)]
    guided_tutorials: bool,
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args = Args::parse();

    if !args.ascii_render {
        anyhow::bail!(
            "this build carries only the ASCII presenter; pass --ascii-render (drawing a \
             graphical board is a non-goal of the core engine)"
        );
    }

    info!("starting quantum chess");

    if args.guided_tutorials {
        run_guided_tutorials()
    } else if let Some(name) = &args.tutorial {
        run_tutorial(name)
    } else {
        run_game_mode(&args.game_mode)
    }
}

/// Read one trimmed line from stdin, or `Ok(None)` on EOF (Ctrl-D) — the
/// loop's exit path, printing the goodbye message the reference CLI prints
/// on Ctrl-C.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush().ok();
    let mut line = String::new();
    let n = io::stdin().lock().read_line(&mut line).context("failed to read stdin")?;
    if n == 0 {
        println!();
        println!("Goodbye.");
        return Ok(None);
    }
    let trimmed = line.trim().to_string();
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        println!("Goodbye.");
        return Ok(None);
    }
    Ok(Some(trimmed))
}

fn run_game_mode(name: &str) -> Result<()> {
    let cfg = GameModeConfig::load(name)
        .with_context(|| format!("error while loading game mode file '{name}'"))?;
    let mut engine = Engine::from_game_mode(&cfg)?;
    let mut current_turn = engine.starting_color;

    println!("{}", ascii_render(&engine));
    loop {
        let Some(line) = read_line(&format!("{current_turn:?} to move> "))? else {
            return Ok(());
        };
        if line.is_empty() {
            continue;
        }
        let height = engine.board.height;
        match parse_command(&line, height).and_then(|cmd| {
            apply_command(&mut engine, &cmd, current_turn)?;
            Ok(cmd)
        }) {
            Ok(_) => {
                println!("{}", ascii_render(&engine));
                current_turn = current_turn.opposite();
            }
            Err(e) => {
                error!("{e}");
                println!("Invalid move: {e}");
            }
        }
    }
}

fn run_tutorial(name: &str) -> Result<()> {
    let cfg = TutorialConfig::load(name)
        .with_context(|| format!("error while loading tutorial file '{name}'"))?;
    let completed = run_tutorial_config(&cfg)?;
    if completed {
        println!("\nTutorial completed.");
    }
    Ok(())
}

/// Drives one tutorial end-to-end, returning whether it was completed
/// (every step satisfied in order). Mirrors `TutorialQChess.ascii_main_loop`
/// with `check_current_turn = false` and `check_game_over = false`: any
/// color may move, and there is no check/checkmate condition to watch for
/// (both are non-goals of the core engine).
fn run_tutorial_config(cfg: &TutorialConfig) -> Result<bool> {
    let mut engine = Engine::from_game_mode(&cfg.game_mode)?;
    println!("1.- {}", cfg.initial_message());
    println!("{}", ascii_render(&engine));

    for (i, step) in cfg.tutorial_steps.iter().enumerate() {
        loop {
            let Some(line) = read_line("> ")? else {
                return Ok(false);
            };
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case("collapse") {
                if !tutorial_allows_collapse(step) {
                    println!("A collapse is not expected here.");
                    continue;
                }
                engine.collapse_all();
                break;
            }

            let height = engine.board.height;
            match parse_command(&line, height) {
                Ok(cmd) if tutorial_accepts(step, &cmd, &engine, height) => {
                    match &cmd {
                        Command::Standard { source, target } => {
                            engine.standard(*source, *target, false)?;
                        }
                        Command::Split { source, target1, target2 } => {
                            engine.split(*source, *target1, *target2, false)?;
                        }
                        Command::Merge { source1, source2, target } => {
                            engine.merge(*source1, *source2, *target, false)?;
                        }
                    }
                    break;
                }
                Ok(_) => println!("That is not the move this step is looking for."),
                Err(e) => println!("Invalid command: {e}"),
            }
        }
        engine.end_of_ply();
        println!("{}.- {}", i + 2, step.message_text());
        println!("{}", ascii_render(&engine));
    }

    Ok(true)
}

fn run_guided_tutorials() -> Result<()> {
    let mut progress = Progress::load("tutorials")?;

    loop {
        for (name, completed) in progress.entries() {
            println!("{name} {}", if completed { "Completed" } else { "Not completed" });
        }
        println!();

        if progress.all_completed() {
            println!("All tutorials are completed.");
            if !prompt_yes_no("Do you want to start over?")? {
                return Ok(());
            }
            progress.start_over()?;
        } else if !prompt_yes_no("Do you want to resume the tutorials where you left?")? {
            if prompt_yes_no("Do you want to start over?")? {
                progress.start_over()?;
            } else {
                return Ok(());
            }
        }

        let names: Vec<String> = progress.entries().map(|(n, _)| n.to_string()).collect();
        let total = names.len();
        let mut completed_count = names
            .iter()
            .filter(|n| progress.is_completed(n) == Some(true))
            .count();

        for name in &names {
            if progress.is_completed(name) == Some(true) {
                continue;
            }
            let cfg = TutorialConfig::load(name)
                .with_context(|| format!("error while loading tutorial file '{name}'"))?;
            let completed = run_tutorial_config(&cfg)?;
            if completed {
                completed_count += 1;
                progress.mark_completed(name, true);
                progress.save()?;
            }
            println!("Completed {completed_count}/{total}.");
            if !completed {
                return Ok(());
            }
        }

        if completed_count == total {
            println!("\nAll tutorials completed.");
            return Ok(());
        }
    }
}

fn prompt_yes_no(msg: &str) -> Result<bool> {
    let Some(answer) = read_line(&format!("{msg} (y/n)\n"))? else {
        return Ok(false);
    };
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}
